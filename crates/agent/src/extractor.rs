//! Adapter around the external text-to-JSON service.
//!
//! One fixed instruction template per call site; the raw output is parsed
//! defensively. Ideal answers are bare JSON objects, but the service also
//! produces fenced code blocks, leading prose, or garbage — everything that
//! is not a JSON object degrades to an empty mapping, never an error.

use std::sync::Arc;

use greenroom_core::collab::Extractor;
use greenroom_core::fields::ExtractionResult;
use serde_json::Value;

pub const LABELCOPY_INSTRUCTIONS: &str = "Du bekommst eine Chat-Nachricht mit Infos zu einem \
    Musik-Release. Gib NUR ein JSON-Objekt zurück, dessen Schlüssel Labelcopy-Felder sind \
    (z.B. artist, titel, version, genre, label, release, isrc, komponist, texter, produzent, \
    mixed by, mastered by, verlag). Nimm nur Felder auf, die in der Nachricht vorkommen.";

pub const CALENDAR_INSTRUCTIONS: &str = "Du bekommst eine Chat-Nachricht zu einem Kalender. \
    Gib NUR ein JSON-Objekt zurück mit: intent (\"lesen\" wenn nur nachgeschaut werden soll, \
    \"schreiben\" wenn ein Termin angelegt werden soll), titel, ort, info, gäste. \
    Lass Felder weg, die nicht in der Nachricht stehen.";

pub const CONTACT_INSTRUCTIONS: &str = "Du bekommst eine Chat-Nachricht mit Kontaktdaten. \
    Gib NUR ein JSON-Objekt zurück mit: name, email, telefon, firma, notiz. \
    Lass Felder weg, die nicht in der Nachricht stehen.";

pub const SESSION_INSTRUCTIONS: &str = "Du bekommst eine Chat-Nachricht, die eine Studio-Session \
    plant. Gib NUR ein JSON-Objekt zurück mit: teilnehmer (Liste von Namen), ort, kontakt. \
    Lass Felder weg, die nicht in der Nachricht stehen.";

/// Wraps the raw extractor collaborator with defensive parsing. A transport
/// failure is logged and degrades to an empty mapping too, so callers always
/// make forward progress with whatever they parsed deterministically.
#[derive(Clone)]
pub struct ExtractorAdapter {
    inner: Arc<dyn Extractor>,
}

impl ExtractorAdapter {
    pub fn new(inner: Arc<dyn Extractor>) -> Self {
        Self { inner }
    }

    pub async fn extract(&self, instructions: &str, text: &str) -> ExtractionResult {
        match self.inner.extract(instructions, text).await {
            Ok(raw) => parse_best_effort(&raw),
            Err(error) => {
                tracing::warn!(
                    event_name = "extractor.call_failed",
                    error = %error,
                    "extraction degraded to empty mapping"
                );
                ExtractionResult::new()
            }
        }
    }
}

/// Pulls the first JSON object out of the raw output. Handles code fences
/// and surrounding prose; anything else yields an empty mapping.
pub fn parse_best_effort(raw: &str) -> ExtractionResult {
    let Some(start) = raw.find('{') else {
        return ExtractionResult::new();
    };
    let Some(end) = raw.rfind('}') else {
        return ExtractionResult::new();
    };
    if end < start {
        return ExtractionResult::new();
    }

    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Object(entries)) => entries.into_iter().collect(),
        _ => ExtractionResult::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_best_effort;

    #[test]
    fn parses_bare_json_object() {
        let result = parse_best_effort(r#"{"artist": "Nova", "genre": "Pop"}"#);
        assert_eq!(result.get("artist"), Some(&json!("Nova")));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn strips_code_fences_and_prose() {
        let raw = "Klar, hier ist das JSON:\n```json\n{\"titel\": \"Skyline\"}\n```";
        let result = parse_best_effort(raw);
        assert_eq!(result.get("titel"), Some(&json!("Skyline")));
    }

    #[test]
    fn garbage_degrades_to_empty_mapping() {
        assert!(parse_best_effort("keine ahnung").is_empty());
        assert!(parse_best_effort("").is_empty());
        assert!(parse_best_effort("} nope {").is_empty());
        assert!(parse_best_effort("[1, 2, 3]").is_empty());
    }

    #[test]
    fn non_object_json_degrades_to_empty_mapping() {
        assert!(parse_best_effort("\"nur ein string\"").is_empty());
    }
}
