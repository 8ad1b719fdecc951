//! Prompt assembly for the knowledge-chat fallback.

use greenroom_core::fields::FieldMap;

/// System prompt in the voice the business expects, with whatever knowledge
/// context the lookups produced spliced in.
pub fn build_system_prompt(studio_info: &str, bio_info: &str) -> String {
    format!(
        "Du bist ein A&R-Assistent für eine Künstleragentur. Antworte locker im \
         Music-Business-Stil, kurz und auf Deutsch. Nutze diese Infos, falls relevant:\n\
         Studios: {studio_info}\nBios: {bio_info}"
    )
}

/// Flattens knowledge-store rows into prompt context, one row per line.
pub fn format_context(rows: &[FieldMap]) -> String {
    rows.iter()
        .map(|row| {
            row.iter()
                .filter(|(_, value)| !value.is_empty())
                .map(|(key, value)| format!("{key}: {value}"))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use greenroom_core::fields::FieldMap;

    use super::{build_system_prompt, format_context};

    #[test]
    fn context_rows_become_one_line_each() {
        let mut studio = FieldMap::new();
        studio.insert("Name".to_string(), "Studio A".to_string());
        studio.insert("Adresse".to_string(), "Hafenstraße 12".to_string());
        let mut empty = FieldMap::new();
        empty.insert("Name".to_string(), String::new());

        let context = format_context(&[studio, empty]);

        assert_eq!(context, "Adresse: Hafenstraße 12, Name: Studio A");
    }

    #[test]
    fn prompt_embeds_both_context_blocks() {
        let prompt = build_system_prompt("Studio A", "Nova: Synthpop aus Hamburg");
        assert!(prompt.contains("Studios: Studio A"));
        assert!(prompt.contains("Bios: Nova: Synthpop aus Hamburg"));
    }
}
