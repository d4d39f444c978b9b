use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::docx::document::{Paragraph, Table};
use crate::error::{ExtractError, Result};
use crate::model::{
    empty_levels, SpellMap, SpellRecord, LEVEL_COUNT, LEVEL_FIELD, LEVEL_LABELS, SPHERE_FIELD,
};

static FIELD_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[:?]").expect("field split regex"));
static NON_DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]").expect("non-digit regex"));

/// Decides which discovered domain a spell table belongs to.
pub trait BucketAssigner {
    /// Index into the discovered domain list for a table of `level`.
    fn assign(&mut self, level: u8) -> usize;
}

/// Infers domain boundaries from the level sequence: a level lower than the
/// one currently open starts the next domain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelDropAssigner {
    domain_index: usize,
    current_level: u8,
}

impl LevelDropAssigner {
    pub fn domain_index(&self) -> usize {
        self.domain_index
    }

    pub fn current_level(&self) -> u8 {
        self.current_level
    }

    pub fn advance_domain(&mut self) {
        self.domain_index += 1;
        self.current_level = 0;
    }

    pub fn open_level(&mut self, level: u8) {
        self.current_level = level;
    }
}

impl BucketAssigner for LevelDropAssigner {
    fn assign(&mut self, level: u8) -> usize {
        if level < self.current_level {
            self.advance_domain();
        }
        if level > self.current_level {
            self.open_level(level);
        }
        self.domain_index
    }
}

/// Domain headings of the spell document, lower-cased, in document order:
/// short non-empty paragraphs that are not level numerals.
pub fn discover_domains(paragraphs: &[Paragraph]) -> Vec<String> {
    paragraphs
        .iter()
        .map(|p| p.text.trim())
        .filter(|t| !t.is_empty() && !LEVEL_LABELS.contains(t) && t.split_whitespace().count() < 3)
        .map(|t| t.to_lowercase())
        .collect()
}

/// `III` -> 3, `Livello 4°` -> 4. Anything outside 1..=7 is rejected.
pub fn parse_level(value: &str) -> Result<u8> {
    let upper = value.to_uppercase();
    if let Some(idx) = LEVEL_LABELS.iter().position(|l| *l == upper) {
        return Ok(idx as u8 + 1);
    }
    let digits = NON_DIGIT_RE.replace_all(value, "");
    let level: u8 = digits.parse().map_err(|_| {
        ExtractError::MalformedDocument(format!("unparsable level {value:?}"))
    })?;
    if level == 0 || usize::from(level) > LEVEL_COUNT {
        return Err(ExtractError::MalformedDocument(format!(
            "level {value:?} outside 1..={LEVEL_COUNT}"
        )));
    }
    Ok(level)
}

fn split_cell(text: &str) -> (String, String) {
    let mut pieces = FIELD_SPLIT_RE.split(text);
    let label = pieces.next().unwrap_or_default().trim().to_string();
    let value = pieces.collect::<Vec<_>>().join(":").trim().to_string();
    (label, value)
}

/// Reads one spell table. Every cell is a `label: value` (or `label? value`)
/// pair; a repeated label keeps its last value. The record's sphere is left
/// empty for the caller to fill in.
pub fn parse_spell_table(table: &Table) -> Result<SpellRecord> {
    let mut level: Option<u8> = None;
    let mut fields: BTreeMap<String, String> = BTreeMap::new();

    for cell in table.rows.iter().flatten() {
        let (label, value) = split_cell(cell);
        if label.to_lowercase() == LEVEL_FIELD.to_lowercase() {
            level = Some(parse_level(&value)?);
            continue;
        }
        if label == SPHERE_FIELD {
            continue;
        }
        fields.insert(label, value);
    }

    let level = level.ok_or_else(|| {
        ExtractError::MalformedDocument(format!("spell table has no {LEVEL_FIELD:?} cell"))
    })?;
    Ok(SpellRecord {
        level,
        sphere: String::new(),
        fields,
    })
}

/// Buckets every spell table by domain and level, domains inferred with
/// [`LevelDropAssigner`].
pub fn extract_spells(paragraphs: &[Paragraph], tables: &[Table]) -> Result<SpellMap> {
    extract_spells_with(paragraphs, tables, &mut LevelDropAssigner::default())
}

pub fn extract_spells_with<A: BucketAssigner>(
    paragraphs: &[Paragraph],
    tables: &[Table],
    assigner: &mut A,
) -> Result<SpellMap> {
    let domains = discover_domains(paragraphs);
    let mut spells = SpellMap::new();
    match domains.first() {
        Some(first) => {
            spells.insert(first.to_uppercase(), empty_levels());
        }
        None if !tables.is_empty() => {
            return Err(ExtractError::Consistency(
                "spell tables found but no domain headings".to_string(),
            ));
        }
        None => {}
    }

    let mut open_idx = 0;
    for (i, table) in tables.iter().enumerate() {
        let table_no = i + 1;
        let mut record = parse_spell_table(table).map_err(|e| e.in_table(table_no))?;
        let idx = assigner.assign(record.level);
        let domain = domains
            .get(idx)
            .ok_or_else(|| {
                ExtractError::Consistency(format!(
                    "domain #{} requested but only {} domain headings were found",
                    idx + 1,
                    domains.len()
                ))
                .in_table(table_no)
            })?
            .to_uppercase();

        // Entering another domain starts its buckets afresh, even when the
        // heading was already seen earlier in the document.
        if idx != open_idx {
            spells.insert(domain.clone(), empty_levels());
            open_idx = idx;
        }

        record.sphere = domain.clone();
        let slot = usize::from(record.level) - 1;
        spells.entry(domain).or_insert_with(empty_levels)[slot].push(record);
    }
    Ok(spells)
}
