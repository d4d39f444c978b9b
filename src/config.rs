use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::render::RenderOptions;
use crate::select::{ListOptions, DEFAULT_MINOR_MAX_LEVEL, DEFAULT_TITLE};

pub const CONFIG_FILE_NAME: &str = "grimorio.toml";
pub const CONFIG_ENV_VAR: &str = "GRIMORIO_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub render: RenderSection,
}

/// Relative paths are taken from the directory holding the config file.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct PathsSection {
    #[serde(default)]
    pub deities_docx: Option<PathBuf>,
    #[serde(default)]
    pub spells_docx: Option<PathBuf>,
    #[serde(default)]
    pub deities_cache: Option<PathBuf>,
    #[serde(default)]
    pub spells_cache: Option<PathBuf>,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct RenderSection {
    #[serde(default)]
    pub font_name: Option<String>,
    #[serde(default)]
    pub font_size_pt: Option<u32>,
    /// Highest level a minor sphere contributes.
    #[serde(default)]
    pub minor_max_level: Option<u8>,
    #[serde(default)]
    pub default_title: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    /// The file the values came from; `None` when running on defaults.
    pub config_path: Option<PathBuf>,
    pub deities_docx: PathBuf,
    pub spells_docx: PathBuf,
    pub deities_cache: PathBuf,
    pub spells_cache: PathBuf,
    pub output: PathBuf,
    pub render: RenderOptions,
    pub list: ListOptions,
}

impl ResolvedConfig {
    /// `--config`, then `$GRIMORIO_CONFIG`, then the nearest `grimorio.toml`
    /// above the working directory or the executable.
    pub fn resolve(explicit: Option<PathBuf>) -> anyhow::Result<Self> {
        let workdir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let cfg_file = explicit
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(|| find_default_config(&workdir, CONFIG_FILE_NAME));

        match cfg_file {
            Some(p) => {
                let cfg = load_config(&p)?;
                let base = p
                    .parent()
                    .map(|d| d.to_path_buf())
                    .unwrap_or_else(|| workdir.clone());
                let mut resolved = Self::from_config(&cfg, &base)?;
                resolved.config_path = Some(p);
                Ok(resolved)
            }
            None => Self::from_config(&AppConfig::default(), &workdir),
        }
    }

    pub fn from_config(cfg: &AppConfig, base: &Path) -> anyhow::Result<Self> {
        let path = |v: &Option<PathBuf>, default: &str| -> PathBuf {
            let p = v.clone().unwrap_or_else(|| PathBuf::from(default));
            if p.is_relative() {
                base.join(p)
            } else {
                p
            }
        };

        let font_name = cfg
            .render
            .font_name
            .as_deref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| RenderOptions::default().font_name);
        let font_size_pt = cfg
            .render
            .font_size_pt
            .unwrap_or_else(|| RenderOptions::default().font_size_pt);
        if !(4..=96).contains(&font_size_pt) {
            return Err(anyhow!(
                "render.font_size_pt must be between 4 and 96, got {font_size_pt}"
            ));
        }
        let minor_max_level = cfg.render.minor_max_level.unwrap_or(DEFAULT_MINOR_MAX_LEVEL);
        if !(1..=7).contains(&minor_max_level) {
            return Err(anyhow!(
                "render.minor_max_level must be between 1 and 7, got {minor_max_level}"
            ));
        }
        let default_title = cfg
            .render
            .default_title
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        Ok(Self {
            config_path: None,
            deities_docx: path(&cfg.paths.deities_docx, "divinita.docx"),
            spells_docx: path(&cfg.paths.spells_docx, "magie.docx"),
            deities_cache: path(&cfg.paths.deities_cache, "gods.json"),
            spells_cache: path(&cfg.paths.spells_cache, "spells.json"),
            output: path(&cfg.paths.output, "lista_incantesimi.docx"),
            render: RenderOptions {
                font_name,
                font_size_pt,
            },
            list: ListOptions {
                minor_max_level,
                default_title,
            },
        })
    }
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text)
        .with_context(|| format!("parse config toml: {}", path.display()))?;
    Ok(cfg)
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILE_NAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"[paths]
# Source documents read by --extract.
deities_docx = "divinita.docx"
spells_docx = "magie.docx"

# Extracted data, written by --extract and read when building a list.
deities_cache = "gods.json"
spells_cache = "spells.json"

# Generated spell list (override per run with -o).
output = "lista_incantesimi.docx"

[render]
font_name = "Arial"
font_size_pt = 11

# Minor spheres grant spells up to this level.
minor_max_level = 3

# Title used when no deity is selected.
default_title = "Lista Incantesimi"
"#;
