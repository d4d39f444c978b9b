use std::collections::BTreeSet;

use anyhow::{anyhow, Context};

use crate::model::{
    DeityMap, DeityRecord, SpellMap, SpellRecord, EFFECT_FIELD, LEVEL_COUNT, SPELL_NAME_FIELD,
};
use crate::progress::ConsoleProgress;

pub const DEFAULT_TITLE: &str = "Lista Incantesimi";
/// Minor spheres grant spells up to this level.
pub const DEFAULT_MINOR_MAX_LEVEL: u8 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListOptions {
    pub minor_max_level: u8,
    pub default_title: String,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            minor_max_level: DEFAULT_MINOR_MAX_LEVEL,
            default_title: DEFAULT_TITLE.to_string(),
        }
    }
}

/// Which spheres feed the list. `unmatched_*` hold spheres a deity grants that
/// the spell document never defines; they are reported, not rendered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub title: Option<String>,
    pub major: BTreeSet<String>,
    pub minor: BTreeSet<String>,
    pub unmatched_major: Vec<String>,
    pub unmatched_minor: Vec<String>,
}

impl Selection {
    pub fn for_deity(deity: &DeityRecord, spells: &SpellMap) -> Self {
        let mut sel = Self {
            title: Some(deity.name.clone()),
            ..Default::default()
        };
        for sphere in deity.major.iter().flatten() {
            if spells.contains_key(sphere) {
                sel.major.insert(sphere.clone());
            } else {
                sel.unmatched_major.push(sphere.clone());
            }
        }
        for sphere in deity.minor.iter().flatten() {
            if spells.contains_key(sphere) {
                sel.minor.insert(sphere.clone());
            } else {
                sel.unmatched_minor.push(sphere.clone());
            }
        }
        sel
    }

    pub fn add_major(&mut self, sphere: &str, spells: &SpellMap) -> anyhow::Result<()> {
        let key = known_sphere(sphere, spells)?;
        self.major.insert(key);
        Ok(())
    }

    pub fn add_minor(&mut self, sphere: &str, spells: &SpellMap) -> anyhow::Result<()> {
        let key = known_sphere(sphere, spells)?;
        self.minor.insert(key);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.major.is_empty() && self.minor.is_empty()
    }
}

fn known_sphere(sphere: &str, spells: &SpellMap) -> anyhow::Result<String> {
    let key = sphere.trim().to_uppercase();
    if spells.contains_key(&key) {
        return Ok(key);
    }
    Err(anyhow!(
        "unknown sphere {:?} (known: {})",
        sphere,
        spells.keys().cloned().collect::<Vec<_>>().join(", ")
    ))
}

/// Looks a deity up by name, optionally restricted to one group heading.
pub fn find_deity<'a>(
    gods: &'a DeityMap,
    group: Option<&str>,
    name: &str,
) -> anyhow::Result<&'a DeityRecord> {
    let name = name.trim();
    if let Some(group) = group {
        let key = group.trim().to_uppercase();
        let deities = gods
            .get(&key)
            .ok_or_else(|| anyhow!("unknown deity group {group:?}"))?;
        return deities
            .get(name)
            .with_context(|| format!("deity {name:?} not found in group {key:?}"));
    }

    let hits: Vec<(&String, &DeityRecord)> = gods
        .iter()
        .filter_map(|(g, deities)| deities.get(name).map(|d| (g, d)))
        .collect();
    match hits.as_slice() {
        [] => Err(anyhow!("deity {name:?} not found")),
        [(_, deity)] => Ok(*deity),
        many => Err(anyhow!(
            "deity {name:?} appears in several groups ({}); pick one with --group",
            many.iter()
                .map(|(g, _)| g.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

/// The group heading (matched case-insensitively) and its deity names.
pub fn deities_in_group<'a>(
    gods: &'a DeityMap,
    group: &str,
) -> anyhow::Result<(&'a str, Vec<&'a str>)> {
    let key = group.trim().to_uppercase();
    let (label, deities) = gods.get_key_value(&key).ok_or_else(|| {
        anyhow!(
            "unknown deity group {group:?} (known: {})",
            gods.keys().cloned().collect::<Vec<_>>().join(", ")
        )
    })?;
    Ok((label.as_str(), deities.keys().map(|k| k.as_str()).collect()))
}

/// One rendered spell: the record that supplies the fields and every sphere
/// (display form) that grants it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpellEntry<'a> {
    pub spell: &'a SpellRecord,
    pub spheres: Vec<String>,
}

impl SpellEntry<'_> {
    pub fn count(&self) -> usize {
        self.spheres.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelSection<'a> {
    pub level: u8,
    pub entries: Vec<SpellEntry<'a>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpellList<'a> {
    pub title: String,
    pub levels: Vec<LevelSection<'a>>,
}

impl SpellList<'_> {
    pub fn entry_count(&self) -> usize {
        self.levels.iter().map(|l| l.entries.len()).sum()
    }
}

struct Candidate<'a> {
    name: &'a str,
    effect: &'a str,
    spell: &'a SpellRecord,
    sphere: String,
}

fn candidate(spell: &SpellRecord, sphere: String) -> anyhow::Result<Candidate<'_>> {
    let missing = |field: &str| {
        anyhow!(
            "spell in sphere {} level {} has no {field:?} field",
            spell.sphere,
            spell.level
        )
    };
    Ok(Candidate {
        name: spell.name().ok_or_else(|| missing(SPELL_NAME_FIELD))?,
        effect: spell.effect().ok_or_else(|| missing(EFFECT_FIELD))?,
        spell,
        sphere,
    })
}

/// Collects, sorts and merges the spells granted by `selection`, level by
/// level. Major spheres contribute every level and are shown upper-case; minor
/// spheres stop at `opts.minor_max_level` and are shown lower-case. Spells with
/// the same name and effect next to each other after sorting become one entry.
pub fn build_spell_list<'a>(
    spells: &'a SpellMap,
    selection: &Selection,
    opts: &ListOptions,
    progress: &ConsoleProgress,
) -> anyhow::Result<SpellList<'a>> {
    let title = selection
        .title
        .clone()
        .unwrap_or_else(|| opts.default_title.clone());
    if selection.is_empty() {
        progress.warn("no spheres selected; the list will only carry its title");
    }

    let mut levels = Vec::new();
    for slot in 0..LEVEL_COUNT {
        let level = slot as u8 + 1;
        let mut found: Vec<Candidate<'a>> = Vec::new();
        for (sphere, buckets) in spells {
            if selection.major.contains(sphere) {
                for spell in &buckets[slot] {
                    found.push(candidate(spell, sphere.to_uppercase())?);
                }
            }
        }
        if level <= opts.minor_max_level {
            for (sphere, buckets) in spells {
                if selection.minor.contains(sphere) {
                    for spell in &buckets[slot] {
                        found.push(candidate(spell, sphere.to_lowercase())?);
                    }
                }
            }
        }
        found.sort_by(|a, b| (a.name, a.effect).cmp(&(b.name, b.effect)));

        let mut entries: Vec<SpellEntry<'a>> = Vec::new();
        let mut last_key: Option<(&str, &str)> = None;
        for c in found {
            let key = (c.name, c.effect);
            if last_key == Some(key) {
                if let Some(prev) = entries.last_mut() {
                    prev.spheres.push(c.sphere);
                    prev.spell = c.spell;
                    continue;
                }
            }
            last_key = Some(key);
            entries.push(SpellEntry {
                spell: c.spell,
                spheres: vec![c.sphere],
            });
        }

        progress.progress("livelli", usize::from(level), LEVEL_COUNT);
        if !entries.is_empty() {
            levels.push(LevelSection { level, entries });
        }
    }

    Ok(SpellList { title, levels })
}

#[cfg(test)]
mod tests {
    use super::{
        build_spell_list, deities_in_group, find_deity, ListOptions, Selection, DEFAULT_TITLE,
    };
    use crate::model::{empty_levels, DeityMap, DeityRecord, SpellMap, SpellRecord};
    use crate::progress::ConsoleProgress;

    fn spell(sphere: &str, level: u8, name: &str, effect: &str) -> SpellRecord {
        let mut rec = SpellRecord {
            level,
            sphere: sphere.to_string(),
            ..Default::default()
        };
        rec.fields
            .insert("Incantesimo".to_string(), name.to_string());
        rec.fields.insert("Effetto".to_string(), effect.to_string());
        rec
    }

    fn sample() -> SpellMap {
        let mut map = SpellMap::new();
        let mut fuoco = empty_levels();
        fuoco[0].push(spell("FUOCO", 1, "Luce", "illumina"));
        fuoco[0].push(spell("FUOCO", 1, "Dardo", "ferisce"));
        fuoco[3].push(spell("FUOCO", 4, "Muro", "blocca"));
        map.insert("FUOCO".to_string(), fuoco);

        let mut sole = empty_levels();
        sole[0].push(spell("SOLE", 1, "Luce", "illumina"));
        sole[3].push(spell("SOLE", 4, "Raggio", "acceca"));
        map.insert("SOLE".to_string(), sole);
        map
    }

    fn quiet() -> ConsoleProgress {
        ConsoleProgress::new(false)
    }

    #[test]
    fn duplicates_merge_with_every_sphere() {
        let spells = sample();
        let mut sel = Selection::default();
        sel.add_major("fuoco", &spells).expect("fuoco");
        sel.add_major("Sole", &spells).expect("sole");
        let list = build_spell_list(&spells, &sel, &ListOptions::default(), &quiet())
            .expect("build");

        assert_eq!(list.title, DEFAULT_TITLE);
        let first = &list.levels[0];
        assert_eq!(first.level, 1);
        let names: Vec<_> = first.entries.iter().map(|e| e.spell.name()).collect();
        assert_eq!(names, vec![Some("Dardo"), Some("Luce")]);
        let luce = &first.entries[1];
        assert_eq!(luce.count(), 2);
        assert_eq!(luce.spheres, vec!["FUOCO", "SOLE"]);
        assert_eq!(luce.spell.sphere, "SOLE");
        assert_eq!(list.entry_count(), 4);
    }

    #[test]
    fn minor_spheres_stop_at_max_level_and_show_lower_case() {
        let spells = sample();
        let mut sel = Selection::default();
        sel.add_minor("SOLE", &spells).expect("sole");
        let list = build_spell_list(&spells, &sel, &ListOptions::default(), &quiet())
            .expect("build");
        assert_eq!(list.levels.len(), 1);
        assert_eq!(list.levels[0].entries[0].spheres, vec!["sole"]);

        let wide = ListOptions {
            minor_max_level: 7,
            ..Default::default()
        };
        let list = build_spell_list(&spells, &sel, &wide, &quiet()).expect("build");
        assert_eq!(
            list.levels.iter().map(|l| l.level).collect::<Vec<_>>(),
            vec![1, 4]
        );
    }

    #[test]
    fn deity_selection_splits_unmatched_spheres() {
        let spells = sample();
        let mut helios = DeityRecord::new("Helios");
        helios.major = Some(vec!["SOLE".to_string(), "TEMPO".to_string()]);
        helios.minor = Some(vec!["FUOCO".to_string()]);
        let sel = Selection::for_deity(&helios, &spells);

        assert_eq!(sel.title.as_deref(), Some("Helios"));
        assert!(sel.major.contains("SOLE"));
        assert_eq!(sel.unmatched_major, vec!["TEMPO"]);
        assert!(sel.minor.contains("FUOCO"));
        assert!(sel.unmatched_minor.is_empty());

        let list = build_spell_list(&spells, &sel, &ListOptions::default(), &quiet())
            .expect("build");
        assert_eq!(list.title, "Helios");
        let luce = &list.levels[0].entries[1];
        assert_eq!(luce.spheres, vec!["SOLE", "fuoco"]);
    }

    #[test]
    fn unknown_manual_sphere_is_rejected() {
        let spells = sample();
        let mut sel = Selection::default();
        let err = sel.add_major("Tempo", &spells).expect_err("unknown");
        assert!(err.to_string().contains("unknown sphere"));
        assert!(sel.is_empty());
    }

    #[test]
    fn empty_selection_yields_title_only() {
        let spells = sample();
        let sel = Selection::default();
        let list = build_spell_list(&spells, &sel, &ListOptions::default(), &quiet())
            .expect("build");
        assert!(list.levels.is_empty());
        assert_eq!(list.title, DEFAULT_TITLE);
    }

    #[test]
    fn spell_without_effect_is_an_error() {
        let mut spells = sample();
        let mut bare = SpellRecord {
            level: 1,
            sphere: "FUOCO".to_string(),
            ..Default::default()
        };
        bare.fields
            .insert("Incantesimo".to_string(), "Senza effetto".to_string());
        spells.get_mut("FUOCO").expect("fuoco")[0].push(bare);
        let mut sel = Selection::default();
        sel.add_major("FUOCO", &spells).expect("fuoco");
        let err = build_spell_list(&spells, &sel, &ListOptions::default(), &quiet())
            .expect_err("missing Effetto");
        assert!(err.to_string().contains("Effetto"));
    }

    #[test]
    fn deity_lookup_needs_group_when_ambiguous() {
        let mut gods = DeityMap::new();
        for group in ["DIVINITÀ ELFICHE", "DIVINITÀ NANICHE"] {
            gods.entry(group.to_string())
                .or_default()
                .insert("Lunare".to_string(), DeityRecord::new("Lunare"));
        }
        gods.entry("DIVINITÀ NANICHE".to_string())
            .or_default()
            .insert("Moradin".to_string(), DeityRecord::new("Moradin"));

        assert_eq!(
            find_deity(&gods, None, "Moradin").expect("unique").name,
            "Moradin"
        );
        let err = find_deity(&gods, None, "Lunare").expect_err("ambiguous");
        assert!(err.to_string().contains("--group"));
        assert!(find_deity(&gods, Some("divinità elfiche"), "Lunare").is_ok());
        assert!(find_deity(&gods, Some("divinità elfiche"), "Moradin").is_err());
        assert!(find_deity(&gods, None, "Nessuno").is_err());

        let (label, names) = deities_in_group(&gods, "divinità naniche").expect("group");
        assert_eq!(label, "DIVINITÀ NANICHE");
        assert_eq!(names, vec!["Lunare", "Moradin"]);
        let err = deities_in_group(&gods, "divinità marine").expect_err("unknown group");
        assert!(err.to_string().contains("DIVINITÀ ELFICHE"));
    }
}
