use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::{DeityMap, SpellMap};

pub const CACHE_FORMAT_VERSION: u32 = 1;

/// On-disk wrapper around an extracted mapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEnvelope<T> {
    pub version: u32,
    /// SHA-256 of the document the data was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_sha256: Option<String>,
    pub data: T,
}

pub fn file_fingerprint(path: &Path) -> anyhow::Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read file: {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

fn save_cache<T: Serialize>(path: &Path, data: &T, source_sha256: Option<&str>) -> anyhow::Result<()> {
    let envelope = CacheEnvelope {
        version: CACHE_FORMAT_VERSION,
        source_sha256: source_sha256.map(|s| s.to_string()),
        data,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create cache dir: {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(&envelope).context("serialize cache json")?;
    fs::write(path, json).with_context(|| format!("write cache: {}", path.display()))?;
    Ok(())
}

fn load_cache<T: DeserializeOwned>(path: &Path) -> anyhow::Result<CacheEnvelope<T>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read cache: {}", path.display()))?;
    let envelope: CacheEnvelope<T> = serde_json::from_str(&text)
        .with_context(|| format!("parse cache json: {}", path.display()))?;
    if envelope.version != CACHE_FORMAT_VERSION {
        return Err(anyhow!(
            "unsupported cache version {} in {} (expected {}); re-run --extract",
            envelope.version,
            path.display(),
            CACHE_FORMAT_VERSION
        ));
    }
    Ok(envelope)
}

pub fn save_deities(path: &Path, gods: &DeityMap, source_sha256: Option<&str>) -> anyhow::Result<()> {
    save_cache(path, gods, source_sha256)
}

pub fn load_deities(path: &Path) -> anyhow::Result<CacheEnvelope<DeityMap>> {
    load_cache(path)
}

pub fn save_spells(path: &Path, spells: &SpellMap, source_sha256: Option<&str>) -> anyhow::Result<()> {
    save_cache(path, spells, source_sha256)
}

pub fn load_spells(path: &Path) -> anyhow::Result<CacheEnvelope<SpellMap>> {
    load_cache(path)
}

/// True when `source` exists and no longer hashes to what the cache recorded.
pub fn is_stale<T>(envelope: &CacheEnvelope<T>, source: &Path) -> anyhow::Result<bool> {
    let Some(recorded) = envelope.source_sha256.as_deref() else {
        return Ok(false);
    };
    if !source.exists() {
        return Ok(false);
    }
    Ok(file_fingerprint(source)? != recorded)
}

#[cfg(test)]
mod tests {
    use super::{
        file_fingerprint, is_stale, load_deities, load_spells, save_deities, save_spells,
        CACHE_FORMAT_VERSION,
    };
    use crate::model::{empty_levels, DeityMap, DeityRecord, SpellMap, SpellRecord};

    fn sample_spells() -> SpellMap {
        let mut rec = SpellRecord {
            level: 3,
            sphere: "FUOCO".to_string(),
            ..Default::default()
        };
        rec.fields
            .insert("Incantesimo".to_string(), "Palla di fuoco".to_string());
        rec.fields
            .insert("Raggio d’azione".to_string(), "10 m + 1 m/livello".to_string());
        let mut levels = empty_levels();
        levels[2].push(rec);
        let mut map = SpellMap::new();
        map.insert("FUOCO".to_string(), levels);
        map.insert("ACQUA".to_string(), empty_levels());
        map
    }

    fn sample_gods() -> DeityMap {
        let mut zeus = DeityRecord::new("Zeus");
        zeus.major = Some(vec!["SOLE".to_string(), "TEMPO".to_string()]);
        zeus.minor = Some(vec![]);
        let mut map = DeityMap::new();
        map.entry("DIVINITÀ MAGGIORI".to_string())
            .or_default()
            .insert("Zeus".to_string(), zeus);
        map.entry("DIVINITÀ MINORI".to_string())
            .or_default()
            .insert("Eco".to_string(), DeityRecord::new("Eco"));
        map
    }

    #[test]
    fn spells_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache").join("spells.json");
        let spells = sample_spells();
        save_spells(&path, &spells, Some("abc")).expect("save");
        let loaded = load_spells(&path).expect("load");
        assert_eq!(loaded.version, CACHE_FORMAT_VERSION);
        assert_eq!(loaded.source_sha256.as_deref(), Some("abc"));
        assert_eq!(loaded.data, spells);
    }

    #[test]
    fn deities_round_trip_keeps_absent_and_empty_lists_apart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gods.json");
        let gods = sample_gods();
        save_deities(&path, &gods, None).expect("save");
        let loaded = load_deities(&path).expect("load");
        assert_eq!(loaded.data, gods);
        assert_eq!(loaded.data["DIVINITÀ MAGGIORI"]["Zeus"].minor, Some(vec![]));
        assert_eq!(loaded.data["DIVINITÀ MINORI"]["Eco"].major, None);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gods.json");
        std::fs::write(&path, r#"{"version": 9, "data": {}}"#).expect("write");
        let err = load_deities(&path).expect_err("version 9");
        assert!(err.to_string().contains("unsupported cache version 9"));
    }

    #[test]
    fn fingerprint_tracks_source_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("magie.docx");
        std::fs::write(&src, b"prima").expect("write");
        let fp = file_fingerprint(&src).expect("fingerprint");
        assert_eq!(fp.len(), 64);

        let cache = dir.path().join("spells.json");
        save_spells(&cache, &SpellMap::new(), Some(&fp)).expect("save");
        let env = load_spells(&cache).expect("load");
        assert!(!is_stale(&env, &src).expect("check"));

        std::fs::write(&src, b"dopo").expect("rewrite");
        assert!(is_stale(&env, &src).expect("check"));
    }
}
