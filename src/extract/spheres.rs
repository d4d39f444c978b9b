use std::collections::VecDeque;

use crate::error::{ExtractError, Result};

/// "and" in sphere lists such as `ELEMENTALE ARIA E FUOCO`.
const QUALIFIER: &str = "E";
const ELEMENTS: [&str; 4] = ["ARIA", "ACQUA", "FUOCO", "TERRA"];

/// Splits a comma separated sphere list into sorted, upper-cased names.
///
/// An entry containing the qualifier `E` is cut at the qualifier and the part
/// after it becomes a further entry. When that part starts with an element
/// (`ARIA`, `ACQUA`, `FUOCO`, `TERRA`) the first word of the entry is carried
/// over, so `ELEMENTALE ARIA E FUOCO` yields `ELEMENTALE ARIA` and
/// `ELEMENTALE FUOCO`. Derived entries are split again. Duplicates are kept.
pub fn split_spheres(raw: &str) -> Result<Vec<String>> {
    let mut pending: VecDeque<String> = raw
        .to_uppercase()
        .split(',')
        .map(|piece| piece.trim().to_string())
        .collect();
    let mut spheres = Vec::new();

    while let Some(piece) = pending.pop_front() {
        let words: Vec<&str> = piece.split_whitespace().collect();
        let Some(j) = words.iter().position(|w| *w == QUALIFIER) else {
            if !piece.is_empty() {
                spheres.push(piece);
            }
            continue;
        };
        let Some(next) = words.get(j + 1) else {
            return Err(ExtractError::MalformedDocument(format!(
                "sphere entry {piece:?} ends with the qualifier {QUALIFIER:?}"
            )));
        };

        if j > 0 {
            spheres.push(words[..j].join(" "));
        }
        let mut derived: Vec<&str> = Vec::with_capacity(words.len() - j);
        if j > 0 && ELEMENTS.contains(next) {
            derived.push(words[0]);
        }
        derived.extend_from_slice(&words[j + 1..]);
        pending.push_back(derived.join(" "));
    }

    spheres.sort();
    Ok(spheres)
}
