pub mod deities;
pub mod spells;
pub mod spheres;

use std::path::Path;

use anyhow::Context;

use crate::config::ResolvedConfig;
use crate::docx::document::Document;
use crate::model::{DeityMap, SpellMap};
use crate::store::{file_fingerprint, save_deities, save_spells};

pub use deities::extract_deities;
pub use spells::{extract_spells, extract_spells_with, BucketAssigner, LevelDropAssigner};
pub use spheres::split_spheres;

pub fn extract_deities_file(path: &Path) -> anyhow::Result<DeityMap> {
    let doc = Document::read(path)?;
    extract_deities(&doc.paragraphs).with_context(|| format!("extract deities: {}", path.display()))
}

pub fn extract_spells_file(path: &Path) -> anyhow::Result<SpellMap> {
    let doc = Document::read(path)?;
    extract_spells(&doc.paragraphs, &doc.tables)
        .with_context(|| format!("extract spells: {}", path.display()))
}

/// Extracts both documents and only then rewrites both caches, so a failing
/// document leaves the previous caches untouched.
pub fn refresh_caches(cfg: &ResolvedConfig) -> anyhow::Result<(DeityMap, SpellMap)> {
    let gods = extract_deities_file(&cfg.deities_docx)?;
    let gods_sha = file_fingerprint(&cfg.deities_docx)?;
    let spells = extract_spells_file(&cfg.spells_docx)?;
    let spells_sha = file_fingerprint(&cfg.spells_docx)?;

    save_deities(&cfg.deities_cache, &gods, Some(&gods_sha))?;
    save_spells(&cfg.spells_cache, &spells, Some(&spells_sha))?;
    Ok((gods, spells))
}
