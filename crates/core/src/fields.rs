//! Canonical labelcopy fields and the merge boundary for extractor output.
//!
//! The extractor returns loosely-worded keys ("Mixer", "abmischung",
//! "mix von"). Everything funnels through the synonym table here before it
//! may touch a record; keys outside the allow-list are dropped on the floor.

use std::collections::BTreeMap;

use serde_json::Value;

/// An untyped best-effort mapping as returned by the structured extractor.
pub type ExtractionResult = BTreeMap<String, Value>;

/// Flat string field map as stored in records and rendered to the user.
pub type FieldMap = BTreeMap<String, String>;

/// Labelcopy fields in render order. This list is the allow-list: nothing
/// outside it is ever persisted to a record.
pub const LABELCOPY_FIELDS: [&str; 13] = [
    "Artist",
    "Titel",
    "Version",
    "Genre",
    "Label",
    "Release-Datum",
    "ISRC",
    "Komponist",
    "Texter",
    "Produzent",
    "Mixed by",
    "Mastered by",
    "Verlag",
];

/// Maps a loose extractor key to its canonical field name, or `None` when
/// the key is not allow-listed.
pub fn canonical_field(key: &str) -> Option<&'static str> {
    let normalized = normalize_key(key);
    let canonical = match normalized.as_str() {
        "artist" | "kuenstler" | "künstler" | "interpret" | "act" => "Artist",
        "titel" | "title" | "song" | "track" | "songtitel" => "Titel",
        "version" | "edit" | "remix" => "Version",
        "genre" | "stil" => "Genre",
        "label" | "plattenfirma" => "Label",
        "release-datum" | "releasedatum" | "release" | "release date" | "vö" | "voe"
        | "veröffentlichung" | "veroeffentlichung" => "Release-Datum",
        "isrc" => "ISRC",
        "komponist" | "composer" | "komposition" | "musik" | "musik von" => "Komponist",
        "texter" | "text" | "text von" | "lyrics" | "lyricist" => "Texter",
        "produzent" | "producer" | "produktion" | "produziert von" => "Produzent",
        "mixed by" | "mix" | "mix von" | "mixer" | "abmischung" | "gemischt von" => "Mixed by",
        "mastered by" | "master" | "master von" | "mastering" => "Mastered by",
        "verlag" | "publisher" | "publishing" => "Verlag",
        _ => return None,
    };
    Some(canonical)
}

fn normalize_key(key: &str) -> String {
    key.trim().trim_matches(':').trim().to_lowercase()
}

/// Flattens an extractor value to display text. Objects and arrays are
/// collapsed to one line instead of leaking JSON syntax into a record.
pub fn flatten_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => {
            let parts: Vec<String> =
                items.iter().map(flatten_value).filter(|part| !part.is_empty()).collect();
            parts.join(", ")
        }
        Value::Object(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(key, item)| {
                    let flat = flatten_value(item);
                    if flat.is_empty() { key.clone() } else { format!("{key}: {flat}") }
                })
                .collect();
            parts.join(", ")
        }
    }
}

/// Merges an extraction result into a field map. Additive-safe: only
/// allow-listed keys with non-empty values are written, and fields the
/// result does not mention keep their previous value. Returns the canonical
/// names that were written.
pub fn merge_extraction(fields: &mut FieldMap, result: &ExtractionResult) -> Vec<&'static str> {
    let mut written = Vec::new();
    for (key, value) in result {
        let Some(canonical) = canonical_field(key) else {
            continue;
        };
        let flat = flatten_value(value);
        if flat.is_empty() {
            continue;
        }
        fields.insert(canonical.to_string(), flat);
        written.push(canonical);
    }
    written
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{canonical_field, flatten_value, merge_extraction, ExtractionResult, FieldMap};

    #[test]
    fn synonyms_collapse_to_one_canonical_field() {
        assert_eq!(canonical_field("Mixer"), Some("Mixed by"));
        assert_eq!(canonical_field("abmischung"), Some("Mixed by"));
        assert_eq!(canonical_field("Mix von"), Some("Mixed by"));
        assert_eq!(canonical_field("Künstler"), Some("Artist"));
        assert_eq!(canonical_field("vö"), Some("Release-Datum"));
    }

    #[test]
    fn unknown_keys_are_not_allow_listed() {
        assert_eq!(canonical_field("budget"), None);
        assert_eq!(canonical_field(""), None);
        assert_eq!(canonical_field("honorar"), None);
    }

    #[test]
    fn merge_is_additive_safe() {
        let mut fields = FieldMap::new();
        fields.insert("Artist".to_string(), "Nova".to_string());
        fields.insert("Titel".to_string(), "Skyline".to_string());

        let mut result = ExtractionResult::new();
        result.insert("genre".to_string(), json!("Pop"));
        result.insert("artist".to_string(), json!(""));

        let written = merge_extraction(&mut fields, &result);

        assert_eq!(written, vec!["Genre"]);
        assert_eq!(fields.get("Artist").map(String::as_str), Some("Nova"));
        assert_eq!(fields.get("Titel").map(String::as_str), Some("Skyline"));
        assert_eq!(fields.get("Genre").map(String::as_str), Some("Pop"));
    }

    #[test]
    fn merge_drops_keys_outside_the_allow_list() {
        let mut fields = FieldMap::new();
        let mut result = ExtractionResult::new();
        result.insert("honorar".to_string(), json!("2000 EUR"));
        result.insert("mixer".to_string(), json!("Toni B."));

        merge_extraction(&mut fields, &result);

        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("Mixed by").map(String::as_str), Some("Toni B."));
    }

    #[test]
    fn object_values_are_flattened_to_text() {
        let value = json!({"name": "Toni B.", "studio": "Studio A"});
        assert_eq!(flatten_value(&value), "name: Toni B., studio: Studio A");

        let list = json!(["Nova", "Juno"]);
        assert_eq!(flatten_value(&list), "Nova, Juno");
    }
}
