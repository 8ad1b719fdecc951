//! Full-state rendering for drafts and wizard status.
//!
//! The user always sees total state, never an incremental diff: every known
//! field is listed in fixed order, marked present or absent. Draft previews
//! and wizard status go through the same function so the two surfaces can
//! never disagree about what "complete" looks like.

use crate::domain::draft::{Draft, DraftTarget};
use crate::fields::FieldMap;

/// Display order for calendar/record draft previews.
pub const DRAFT_FIELDS: [&str; 6] = ["Titel", "Datum", "Zeit", "Ort", "Info", "Gäste"];

/// Renders a snapshot as one line per known field: `✓ Name: value` when
/// present, `✗ Name: —` when absent. Pure; rendering twice without edits
/// yields identical output.
pub fn render_fields(snapshot: &FieldMap, order: &[&str]) -> String {
    let mut lines = Vec::with_capacity(order.len());
    for name in order {
        match snapshot.get(*name).filter(|value| !value.is_empty()) {
            Some(value) => lines.push(format!("✓ {name}: {value}")),
            None => lines.push(format!("✗ {name}: —")),
        }
    }
    lines.join("\n")
}

/// Flattens a draft payload into the snapshot shape `render_fields` expects.
pub fn draft_snapshot(draft: &Draft) -> FieldMap {
    let mut snapshot = FieldMap::new();
    let payload = &draft.payload;
    if let Some(title) = &payload.title {
        snapshot.insert("Titel".to_string(), title.clone());
    }
    if let Some(start) = &payload.start {
        snapshot.insert("Datum".to_string(), start.display_date());
        let time = match &payload.end {
            Some(end) => format!("{}–{}", start.hhmm(), end.hhmm()),
            None => start.hhmm(),
        };
        snapshot.insert("Zeit".to_string(), time);
    }
    if let Some(location) = &payload.location {
        snapshot.insert("Ort".to_string(), location.clone());
    }
    if let Some(description) = &payload.description {
        snapshot.insert("Info".to_string(), description.clone());
    }
    if !payload.invitees.is_empty() {
        snapshot.insert("Gäste".to_string(), payload.invitees.join(", "));
    }
    snapshot
}

/// The full preview shown before any write: heading, field list, and the
/// confirmation question.
pub fn render_draft_preview(draft: &Draft) -> String {
    let heading = match &draft.target {
        DraftTarget::Calendar { .. } => "Termin-Entwurf:",
        DraftTarget::Records { .. } => "Eintrag-Entwurf:",
    };
    format!(
        "{heading}\n{}\n\nEintragen? (ja/nein, oder z.B. \"Zeit 14-16\")",
        render_fields(&draft_snapshot(draft), &DRAFT_FIELDS)
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::draft::{Draft, DraftPayload};
    use crate::fields::FieldMap;
    use crate::temporal::Instant;

    use super::{draft_snapshot, render_draft_preview, render_fields, DRAFT_FIELDS};

    #[test]
    fn lists_every_field_present_or_absent() {
        let mut snapshot = FieldMap::new();
        snapshot.insert("Titel".to_string(), "Session Nova".to_string());

        let rendered = render_fields(&snapshot, &DRAFT_FIELDS);

        assert!(rendered.contains("✓ Titel: Session Nova"));
        assert!(rendered.contains("✗ Ort: —"));
        assert_eq!(rendered.lines().count(), DRAFT_FIELDS.len());
    }

    #[test]
    fn rendering_is_idempotent() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 25).expect("date");
        let draft = Draft::calendar(
            "primary",
            DraftPayload {
                title: Some("Session Nova".to_string()),
                start: Some(Instant::new(date, 12 * 60)),
                end: Some(Instant::new(date, 18 * 60)),
                location: Some("Studio A".to_string()),
                ..DraftPayload::default()
            },
        );

        assert_eq!(render_draft_preview(&draft), render_draft_preview(&draft));
    }

    #[test]
    fn snapshot_formats_date_and_time_range() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 25).expect("date");
        let draft = Draft::calendar(
            "primary",
            DraftPayload {
                start: Some(Instant::new(date, 14 * 60)),
                end: Some(Instant::new(date, 16 * 60)),
                ..DraftPayload::default()
            },
        );

        let snapshot = draft_snapshot(&draft);
        assert_eq!(snapshot.get("Datum").map(String::as_str), Some("25.01.2026"));
        assert_eq!(snapshot.get("Zeit").map(String::as_str), Some("14:00–16:00"));
    }
}
