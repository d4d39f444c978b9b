use std::path::Path;

use anyhow::{anyhow, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use quick_xml::escape::escape;

use crate::docx::builder::{CellSpec, DocumentBuilder, RunSpec};
use crate::docx::package::DocxPackage;
use crate::model::{EFFECT_FIELD, LEVEL_FIELD, SPELL_NAME_FIELD};
use crate::select::{SpellEntry, SpellList};

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const DOWNLOAD_LABEL: &str = "Scarica Lista Incantesimi";

const GRID_COLUMNS: usize = 4;
const SEPARATOR_PT: u32 = 3;

const GRID_MIDDLE_ROWS: [[&str; GRID_COLUMNS]; 2] = [
    [LEVEL_FIELD, "Raggio d’azione", "Componenti", "Durata"],
    ["Tempo lancio", "Area d’effetto", "Tiro salvezza", "Reversibile"],
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    pub font_name: String,
    pub font_size_pt: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            font_name: "Arial".to_string(),
            font_size_pt: 11,
        }
    }
}

pub fn level_heading(level: u8) -> String {
    format!("Incantesimi di livello {level}")
}

fn labelled(label: &str, value: &str) -> Vec<RunSpec> {
    vec![RunSpec::bold(label), RunSpec::plain(format!(": {value}"))]
}

fn entry_grid(entry: &SpellEntry<'_>) -> anyhow::Result<Vec<Vec<CellSpec>>> {
    let spell = entry.spell;
    let field = |label: &str| -> anyhow::Result<String> {
        if label == LEVEL_FIELD {
            return Ok(spell.level.to_string());
        }
        spell.field(label).map(|v| v.to_string()).ok_or_else(|| {
            anyhow!(
                "spell {:?} has no {label:?} field",
                spell.name().unwrap_or_default()
            )
        })
    };

    let mut rows = Vec::with_capacity(4);
    rows.push(vec![
        CellSpec::new(labelled(SPELL_NAME_FIELD, &field(SPELL_NAME_FIELD)?)).spanning(2),
        CellSpec::new(labelled("#", &entry.count().to_string())),
        CellSpec::new(vec![RunSpec::plain(entry.spheres.join(", "))]),
    ]);
    for labels in GRID_MIDDLE_ROWS {
        let mut row = Vec::with_capacity(GRID_COLUMNS);
        for label in labels {
            row.push(CellSpec::new(labelled(label, &field(label)?)));
        }
        rows.push(row);
    }
    rows.push(vec![
        CellSpec::new(labelled(EFFECT_FIELD, &field(EFFECT_FIELD)?)).spanning(GRID_COLUMNS)
    ]);
    Ok(rows)
}

/// Lays the list out as a document: title, one heading per level, and a 4x4
/// grid per spell preceded by a small separator paragraph.
pub fn render_spell_list(list: &SpellList<'_>, opts: &RenderOptions) -> anyhow::Result<DocxPackage> {
    let mut doc = DocumentBuilder::new(&opts.font_name, opts.font_size_pt);
    doc.title(&list.title);
    for section in &list.levels {
        doc.heading(&level_heading(section.level));
        for entry in &section.entries {
            let grid = entry_grid(entry)
                .with_context(|| format!("render level {} spell list", section.level))?;
            doc.spacer(SEPARATOR_PT);
            doc.table(GRID_COLUMNS, &grid);
        }
    }
    doc.finish()
}

/// HTML anchor that embeds the file as a base64 `data:` URI.
pub fn download_link_html(path: &Path, title: &str) -> anyhow::Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read document: {}", path.display()))?;
    let payload = STANDARD.encode(bytes);
    let filename = escape(format!("{title}.docx").as_str()).into_owned();
    Ok(format!(
        "<a download='{filename}' href='data:{DOCX_MIME};charset=utf-8;base64,{payload}' target='_blank'>{DOWNLOAD_LABEL}</a>"
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    use super::{download_link_html, render_spell_list, RenderOptions, DOWNLOAD_LABEL};
    use crate::docx::document::Document;
    use crate::model::SpellRecord;
    use crate::select::{LevelSection, SpellEntry, SpellList};

    fn full_spell(name: &str, level: u8) -> SpellRecord {
        let fields: BTreeMap<String, String> = [
            ("Incantesimo", name),
            ("Raggio d’azione", "Tocco"),
            ("Componenti", "V, S"),
            ("Durata", "Permanente"),
            ("Tempo lancio", "1 round"),
            ("Area d’effetto", "1 creatura"),
            ("Tiro salvezza", "Nessuno"),
            ("Reversibile", "Sì"),
            ("Effetto", "Guarisce & protegge"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        SpellRecord {
            level,
            sphere: "GUARIGIONE".to_string(),
            fields,
        }
    }

    #[test]
    fn rendered_document_reads_back() {
        let cura = full_spell("Cura ferite leggere", 1);
        let scudo = full_spell("Scudo", 2);
        let list = SpellList {
            title: "Ilmater".to_string(),
            levels: vec![
                LevelSection {
                    level: 1,
                    entries: vec![SpellEntry {
                        spell: &cura,
                        spheres: vec!["GUARIGIONE".to_string(), "protezione".to_string()],
                    }],
                },
                LevelSection {
                    level: 2,
                    entries: vec![SpellEntry {
                        spell: &scudo,
                        spheres: vec!["PROTEZIONE".to_string()],
                    }],
                },
            ],
        };

        let pkg = render_spell_list(&list, &RenderOptions::default()).expect("render");
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("lista.docx");
        pkg.write(&out).expect("write");

        let doc = Document::read(&out).expect("read back");
        let texts: Vec<&str> = doc
            .paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .filter(|t| !t.is_empty())
            .collect();
        assert_eq!(
            texts,
            vec!["Ilmater", "Incantesimi di livello 1", "Incantesimi di livello 2"]
        );

        assert_eq!(doc.tables.len(), 2);
        let first = &doc.tables[0];
        assert_eq!(first.rows.len(), 4);
        assert_eq!(
            first.rows[0],
            vec![
                "Incantesimo: Cura ferite leggere",
                "#: 2",
                "GUARIGIONE, protezione"
            ]
        );
        assert_eq!(
            first.rows[1],
            vec![
                "Livello: 1",
                "Raggio d’azione: Tocco",
                "Componenti: V, S",
                "Durata: Permanente"
            ]
        );
        assert_eq!(first.rows[2][3], "Reversibile: Sì");
        assert_eq!(first.rows[3], vec!["Effetto: Guarisce & protegge"]);
        assert_eq!(doc.tables[1].rows[0][1], "#: 1");
    }

    #[test]
    fn missing_grid_field_is_an_error() {
        let mut spell = full_spell("Scudo", 2);
        spell.fields.remove("Durata");
        let list = SpellList {
            title: "Lista".to_string(),
            levels: vec![LevelSection {
                level: 2,
                entries: vec![SpellEntry {
                    spell: &spell,
                    spheres: vec!["PROTEZIONE".to_string()],
                }],
            }],
        };
        let err = render_spell_list(&list, &RenderOptions::default()).expect_err("no Durata");
        assert!(format!("{err:#}").contains("Durata"));
    }

    #[test]
    fn empty_list_still_has_title() {
        let list = SpellList {
            title: "Lista Incantesimi".to_string(),
            levels: Vec::new(),
        };
        let pkg = render_spell_list(&list, &RenderOptions::default()).expect("render");
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("vuota.docx");
        pkg.write(&out).expect("write");
        let doc = Document::read(&out).expect("read back");
        assert_eq!(doc.paragraphs[0].text, "Lista Incantesimi");
        assert!(doc.tables.is_empty());
    }

    #[test]
    fn download_link_embeds_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("lista.docx");
        std::fs::write(&out, b"PK fake").expect("write");
        let html = download_link_html(&out, "Tyr's list").expect("link");
        assert!(html.starts_with("<a download='Tyr&apos;s list.docx'"));
        assert!(html.contains(&STANDARD.encode(b"PK fake")));
        assert!(html.ends_with(&format!(">{DOWNLOAD_LABEL}</a>")));
    }
}
