use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const LEVEL_COUNT: usize = 7;
pub const LEVEL_LABELS: [&str; LEVEL_COUNT] = ["I", "II", "III", "IV", "V", "VI", "VII"];

pub const SPELL_NAME_FIELD: &str = "Incantesimo";
pub const EFFECT_FIELD: &str = "Effetto";
pub const LEVEL_FIELD: &str = "Livello";
pub const SPHERE_FIELD: &str = "Sfera";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeityRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<Vec<String>>,
}

impl DeityRecord {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Deity name -> record, for one heading of the deity document.
pub type DeityGroup = BTreeMap<String, DeityRecord>;
/// Group heading -> deities.
pub type DeityMap = BTreeMap<String, DeityGroup>;

/// One spell table. `fields` holds every other `label: value` cell verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellRecord {
    #[serde(rename = "Livello")]
    pub level: u8,
    #[serde(rename = "Sfera")]
    pub sphere: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl SpellRecord {
    pub fn field(&self, label: &str) -> Option<&str> {
        self.fields.get(label).map(|s| s.as_str())
    }

    pub fn name(&self) -> Option<&str> {
        self.field(SPELL_NAME_FIELD)
    }

    pub fn effect(&self) -> Option<&str> {
        self.field(EFFECT_FIELD)
    }
}

/// Spells of one sphere, indexed by level - 1.
pub type SphereLevels = [Vec<SpellRecord>; LEVEL_COUNT];
/// Upper-cased sphere name -> spells by level.
pub type SpellMap = BTreeMap<String, SphereLevels>;

pub fn empty_levels() -> SphereLevels {
    Default::default()
}

#[cfg(test)]
mod tests {
    use super::{empty_levels, DeityRecord, SpellMap, SpellRecord};

    #[test]
    fn spell_record_serializes_flat() {
        let mut rec = SpellRecord {
            level: 2,
            sphere: "FUOCO".to_string(),
            ..Default::default()
        };
        rec.fields
            .insert("Incantesimo".to_string(), "Muro di fiamme".to_string());
        let v = serde_json::to_value(&rec).expect("to json");
        assert_eq!(
            v,
            serde_json::json!({"Livello": 2, "Sfera": "FUOCO", "Incantesimo": "Muro di fiamme"})
        );
        let back: SpellRecord = serde_json::from_value(v).expect("from json");
        assert_eq!(back, rec);
        assert_eq!(back.name(), Some("Muro di fiamme"));
        assert_eq!(back.effect(), None);
    }

    #[test]
    fn sphere_levels_keep_seven_slots() {
        let mut map = SpellMap::new();
        map.insert("ACQUA".to_string(), empty_levels());
        let json = serde_json::to_string(&map).expect("to json");
        assert_eq!(json, r#"{"ACQUA":[[],[],[],[],[],[],[]]}"#);
    }

    #[test]
    fn absent_sphere_lists_are_omitted() {
        let rec = DeityRecord::new("Ares");
        let json = serde_json::to_string(&rec).expect("to json");
        assert_eq!(json, r#"{"name":"Ares"}"#);
    }
}
