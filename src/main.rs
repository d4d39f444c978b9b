use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};

use grimorio::config::{init_default_config, ResolvedConfig, CONFIG_ENV_VAR, CONFIG_FILE_NAME};
use grimorio::extract::refresh_caches;
use grimorio::progress::ConsoleProgress;
use grimorio::render::{download_link_html, render_spell_list};
use grimorio::select::{build_spell_list, deities_in_group, find_deity, Selection};
use grimorio::store::{is_stale, load_deities, load_spells};

#[derive(Parser, Debug)]
#[command(name = "grimorio")]
#[command(about = "Extract deity and spell data from the sourcebook .docx files and build spell lists", long_about = None)]
struct Args {
    /// Generate a default grimorio.toml, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file to (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Config file path (default: $GRIMORIO_CONFIG, then grimorio.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parse both source documents and rewrite the JSON caches
    #[arg(long)]
    extract: bool,

    /// Deity document (overrides paths.deities_docx)
    #[arg(long, value_name = "DOCX")]
    deities_docx: Option<PathBuf>,

    /// Spell document (overrides paths.spells_docx)
    #[arg(long, value_name = "DOCX")]
    spells_docx: Option<PathBuf>,

    /// Print deity groups, deities and known spheres from the caches
    #[arg(long)]
    list_groups: bool,

    /// Deity group heading: disambiguates --deity, or on its own lists the group
    #[arg(long)]
    group: Option<String>,

    /// Build the list for this deity's major and minor spheres
    #[arg(long)]
    deity: Option<String>,

    /// Extra major sphere (repeatable)
    #[arg(long, value_name = "SPHERE")]
    major: Vec<String>,

    /// Extra minor sphere (repeatable)
    #[arg(long, value_name = "SPHERE")]
    minor: Vec<String>,

    /// Output .docx (default: paths.output)
    #[arg(short, long, value_name = "DOCX")]
    output: Option<PathBuf>,

    /// Also write an HTML download link for the generated list
    #[arg(long, value_name = "HTML")]
    html_link: Option<PathBuf>,

    /// Only print warnings and errors
    #[arg(long)]
    quiet: bool,
}

impl Args {
    fn wants_list(&self) -> bool {
        self.deity.is_some() || !self.major.is_empty() || !self.minor.is_empty()
    }

    /// `--group` on its own lists that group's deities.
    fn group_only(&self) -> Option<&str> {
        match (self.group.as_deref(), self.deity.is_none()) {
            (Some(group), true) => Some(group),
            _ => None,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    if !args.extract && !args.list_groups && !args.wants_list() && args.group_only().is_none() {
        let mut cmd = Args::command();
        cmd.print_help().context("print help")?;
        eprintln!(
            "\n\nUSAGE:\n  grimorio --extract\n  grimorio --deity <NAME> [--group <GROUP>] [-o lista.docx]\n  grimorio --major <SPHERE> --minor <SPHERE>\n\nTIPS:\n  - Default config search: {CONFIG_FILE_NAME} (upwards), or set {CONFIG_ENV_VAR}.\n"
        );
        return Ok(());
    }

    let mut cfg = ResolvedConfig::resolve(args.config.clone()).context("build config")?;
    if let Some(p) = cfg.config_path.as_ref() {
        progress.info(format!("config: {}", p.display()));
    }
    if let Some(p) = args.deities_docx.clone() {
        cfg.deities_docx = p;
    }
    if let Some(p) = args.spells_docx.clone() {
        cfg.spells_docx = p;
    }
    if let Some(p) = args.output.clone() {
        cfg.output = p;
    }

    if args.extract {
        run_extract(&cfg, &progress)?;
    }
    if args.list_groups {
        list_groups(&cfg)?;
    } else if let Some(group) = args.group_only() {
        list_group(&cfg, group)?;
    }
    if args.wants_list() {
        run_build(&args, &cfg, &progress)?;
    }
    Ok(())
}

fn run_extract(cfg: &ResolvedConfig, progress: &ConsoleProgress) -> anyhow::Result<()> {
    progress.info(format!(
        "reading {} and {}",
        cfg.deities_docx.display(),
        cfg.spells_docx.display()
    ));
    let (gods, spells) = refresh_caches(cfg)?;
    let deity_count: usize = gods.values().map(|g| g.len()).sum();
    progress.info(format!(
        "{} groups, {} deities -> {}",
        gods.len(),
        deity_count,
        cfg.deities_cache.display()
    ));
    let spell_count: usize = spells.values().flatten().map(|l| l.len()).sum();
    progress.info(format!(
        "{} spheres, {} spells -> {}",
        spells.len(),
        spell_count,
        cfg.spells_cache.display()
    ));
    Ok(())
}

fn list_groups(cfg: &ResolvedConfig) -> anyhow::Result<()> {
    let gods = load_deities(&cfg.deities_cache)?.data;
    let spells = load_spells(&cfg.spells_cache)?.data;
    for (group, deities) in &gods {
        println!("{group}");
        for name in deities.keys() {
            println!("  {name}");
        }
    }
    println!();
    println!(
        "Sfere: {}",
        spells.keys().cloned().collect::<Vec<_>>().join(", ")
    );
    Ok(())
}

fn list_group(cfg: &ResolvedConfig, group: &str) -> anyhow::Result<()> {
    let gods = load_deities(&cfg.deities_cache)?.data;
    let (label, names) = deities_in_group(&gods, group)?;
    println!("{label}");
    for name in names {
        println!("  {name}");
    }
    Ok(())
}

fn run_build(args: &Args, cfg: &ResolvedConfig, progress: &ConsoleProgress) -> anyhow::Result<()> {
    let spells_cache = load_spells(&cfg.spells_cache)?;
    if is_stale(&spells_cache, &cfg.spells_docx)? {
        progress.warn(format!(
            "{} changed since the last extraction; run --extract to refresh {}",
            cfg.spells_docx.display(),
            cfg.spells_cache.display()
        ));
    }
    let spells = spells_cache.data;

    let mut selection = match args.deity.as_deref() {
        Some(name) => {
            let gods_cache = load_deities(&cfg.deities_cache)?;
            if is_stale(&gods_cache, &cfg.deities_docx)? {
                progress.warn(format!(
                    "{} changed since the last extraction; run --extract to refresh {}",
                    cfg.deities_docx.display(),
                    cfg.deities_cache.display()
                ));
            }
            let deity = find_deity(&gods_cache.data, args.group.as_deref(), name)?;
            Selection::for_deity(deity, &spells)
        }
        None => Selection::default(),
    };
    for sphere in &args.major {
        selection.add_major(sphere, &spells)?;
    }
    for sphere in &args.minor {
        selection.add_minor(sphere, &spells)?;
    }
    if !selection.unmatched_major.is_empty() {
        progress.warn(format!(
            "sfere maggiori non specificate: {}",
            selection.unmatched_major.join(", ")
        ));
    }
    if !selection.unmatched_minor.is_empty() {
        progress.warn(format!(
            "sfere minori non specificate: {}",
            selection.unmatched_minor.join(", ")
        ));
    }

    let list = build_spell_list(&spells, &selection, &cfg.list, progress)?;
    let pkg = render_spell_list(&list, &cfg.render)?;
    if let Some(dir) = cfg.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create output dir: {}", dir.display()))?;
    }
    pkg.write(&cfg.output)?;
    progress.info(format!(
        "{}: {} spells -> {}",
        list.title,
        list.entry_count(),
        cfg.output.display()
    ));

    if let Some(html_path) = args.html_link.as_ref() {
        let html = download_link_html(&cfg.output, &list.title)?;
        std::fs::write(html_path, html)
            .with_context(|| format!("write html link: {}", html_path.display()))?;
        progress.info(format!("download link: {}", html_path.display()));
    }
    Ok(())
}
