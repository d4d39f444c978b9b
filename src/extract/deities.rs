use crate::docx::document::Paragraph;
use crate::error::{ExtractError, Result};
use crate::model::{DeityMap, DeityRecord};

use super::spheres::split_spheres;

/// A paragraph with this word among its first two opens a deity group.
pub const GROUP_MARKER: &str = "DIVINITÀ";
const MAJOR_LABEL: &str = "sfere maggiori";
const MINOR_LABEL: &str = "sfere minori";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SphereRank {
    Major,
    Minor,
}

#[derive(Debug, PartialEq, Eq)]
enum ParagraphKind<'a> {
    GroupHeading(String),
    Spheres(SphereRank, &'a str),
    DeityName(&'a str),
    Other,
}

fn classify(p: &Paragraph) -> ParagraphKind<'_> {
    let upper = p.text.to_uppercase();
    if upper.split_whitespace().take(2).any(|w| w == GROUP_MARKER) {
        return ParagraphKind::GroupHeading(upper.trim().to_string());
    }

    let parts: Vec<&str> = p.text.split(':').collect();
    if parts.len() == 2 {
        return match parts[0].to_lowercase().as_str() {
            MAJOR_LABEL => ParagraphKind::Spheres(SphereRank::Major, parts[1]),
            MINOR_LABEL => ParagraphKind::Spheres(SphereRank::Minor, parts[1]),
            _ => ParagraphKind::Other,
        };
    }

    if p.runs.len() > 1 && p.runs[0].bold == Some(true) {
        return ParagraphKind::DeityName(p.runs[0].text.trim());
    }
    ParagraphKind::Other
}

/// Where the paragraph fold currently stands: the open group and the deity
/// that sphere lines attach to.
#[derive(Debug, Default)]
struct DeityCursor {
    group: Option<String>,
    deity: Option<String>,
}

impl DeityCursor {
    fn apply(&mut self, gods: &mut DeityMap, p: &Paragraph) -> Result<()> {
        match classify(p) {
            ParagraphKind::GroupHeading(label) => {
                gods.insert(label.clone(), Default::default());
                self.group = Some(label);
                self.deity = None;
            }
            ParagraphKind::DeityName(name) => {
                let group = self.group.as_ref().ok_or_else(|| {
                    ExtractError::Consistency(format!(
                        "deity {name:?} appears before any {GROUP_MARKER} heading"
                    ))
                })?;
                gods.entry(group.clone())
                    .or_default()
                    .insert(name.to_string(), DeityRecord::new(name));
                self.deity = Some(name.to_string());
            }
            ParagraphKind::Spheres(rank, raw) => {
                let record = self.current_record(gods, &p.text)?;
                let spheres = split_spheres(raw)?;
                match rank {
                    SphereRank::Major => record.major = Some(spheres),
                    SphereRank::Minor => record.minor = Some(spheres),
                }
            }
            ParagraphKind::Other => {}
        }
        Ok(())
    }

    fn current_record<'m>(&self, gods: &'m mut DeityMap, line: &str) -> Result<&'m mut DeityRecord> {
        let (Some(group), Some(deity)) = (self.group.as_ref(), self.deity.as_ref()) else {
            return Err(ExtractError::Consistency(format!(
                "sphere line {line:?} has no deity to attach to"
            )));
        };
        gods.get_mut(group)
            .and_then(|g| g.get_mut(deity))
            .ok_or_else(|| {
                ExtractError::Consistency(format!("deity {deity:?} missing from group {group:?}"))
            })
    }
}

/// Groups deities under their `DIVINITÀ` headings and records the sphere
/// lists that follow each bold deity name.
pub fn extract_deities(paragraphs: &[Paragraph]) -> Result<DeityMap> {
    let mut gods = DeityMap::new();
    let mut cursor = DeityCursor::default();
    for p in paragraphs {
        cursor.apply(&mut gods, p)?;
    }
    Ok(gods)
}
