//! Conversion between page properties and flat field maps.
//!
//! The API nests every value inside a typed property object; the rest of the
//! system only ever deals in `FieldMap` strings. `parse_properties` reads the
//! types we actually store (title, rich text, select, number, email, phone),
//! `build_properties` writes back the two we create (title and rich text).

use greenroom_core::fields::FieldMap;
use serde_json::{json, Map, Value};

/// The one property every database keys its pages by.
pub const TITLE_PROPERTY: &str = "Name";

/// Builds the `properties` object for a page create or update. `Name`
/// becomes the title property, everything else plain rich text.
pub fn build_properties(fields: &FieldMap) -> Value {
    let mut properties = Map::new();
    for (key, value) in fields {
        let property = if key == TITLE_PROPERTY {
            json!({ "title": [{ "text": { "content": value } }] })
        } else {
            json!({ "rich_text": [{ "text": { "content": value } }] })
        };
        properties.insert(key.clone(), property);
    }
    Value::Object(properties)
}

/// Derives a page title for records that carry none of their own: labelcopys
/// are keyed as `Artist – Titel`.
pub fn derive_title(fields: &FieldMap) -> Option<String> {
    if let Some(name) = fields.get(TITLE_PROPERTY) {
        return Some(name.clone());
    }
    match (fields.get("Artist"), fields.get("Titel")) {
        (Some(artist), Some(title)) => Some(format!("{artist} – {title}")),
        (Some(artist), None) => Some(artist.clone()),
        (None, Some(title)) => Some(title.clone()),
        (None, None) => fields.values().next().cloned(),
    }
}

/// Flattens a page's `properties` object into a field map, dropping
/// properties that are empty or of a type we do not read.
pub fn parse_properties(properties: &Value) -> FieldMap {
    let mut fields = FieldMap::new();
    let Some(properties) = properties.as_object() else {
        return fields;
    };

    for (key, property) in properties {
        if let Some(text) = property_text(property) {
            if !text.is_empty() {
                fields.insert(key.clone(), text);
            }
        }
    }
    fields
}

fn property_text(property: &Value) -> Option<String> {
    let kind = property.get("type").and_then(Value::as_str)?;
    match kind {
        "title" | "rich_text" => property.get(kind).and_then(Value::as_array).map(|spans| join_spans(spans)),
        "select" => property
            .pointer("/select/name")
            .and_then(Value::as_str)
            .map(str::to_string),
        "number" => property.get("number").and_then(Value::as_f64).map(|number| {
            if number.fract() == 0.0 {
                format!("{}", number as i64)
            } else {
                format!("{number}")
            }
        }),
        "email" => property.get("email").and_then(Value::as_str).map(str::to_string),
        "phone_number" => {
            property.get("phone_number").and_then(Value::as_str).map(str::to_string)
        }
        "url" => property.get("url").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn join_spans(spans: &[Value]) -> String {
    spans
        .iter()
        .filter_map(|span| span.get("plain_text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
    }

    #[test]
    fn name_becomes_the_title_property() {
        let properties = build_properties(&fields(&[("Name", "Nova"), ("Info", "Alt-Pop")]));
        assert!(properties["Name"]["title"].is_array());
        assert_eq!(properties["Name"]["title"][0]["text"]["content"], "Nova");
        assert_eq!(properties["Info"]["rich_text"][0]["text"]["content"], "Alt-Pop");
    }

    #[test]
    fn labelcopy_titles_are_derived_from_artist_and_song() {
        let derived = derive_title(&fields(&[("Artist", "Nova"), ("Titel", "Skyline")]));
        assert_eq!(derived.as_deref(), Some("Nova – Skyline"));

        let explicit = derive_title(&fields(&[("Name", "Maja Brandt"), ("Artist", "x")]));
        assert_eq!(explicit.as_deref(), Some("Maja Brandt"));
    }

    #[test]
    fn parse_reads_the_property_types_we_store() {
        let page = json!({
            "Name": { "type": "title", "title": [
                { "plain_text": "Studio " }, { "plain_text": "A" }
            ]},
            "Adresse": { "type": "rich_text", "rich_text": [{ "plain_text": "Kölnstr. 1" }] },
            "Räume": { "type": "number", "number": 3.0 },
            "Genre": { "type": "select", "select": { "name": "Pop" } },
            "Leer": { "type": "rich_text", "rich_text": [] },
            "Checkbox": { "type": "checkbox", "checkbox": true }
        });

        let parsed = parse_properties(&page);
        assert_eq!(parsed.get("Name").map(String::as_str), Some("Studio A"));
        assert_eq!(parsed.get("Adresse").map(String::as_str), Some("Kölnstr. 1"));
        assert_eq!(parsed.get("Räume").map(String::as_str), Some("3"));
        assert_eq!(parsed.get("Genre").map(String::as_str), Some("Pop"));
        assert!(!parsed.contains_key("Leer"));
        assert!(!parsed.contains_key("Checkbox"));
    }
}
