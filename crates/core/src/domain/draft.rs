//! A staged side-effecting action awaiting explicit confirmation.

use crate::temporal::Instant;

/// Where the draft commits once the user confirms it. Calendar inserts and
/// record-store writes go through the same gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DraftTarget {
    Calendar { calendar_id: String },
    Records { collection: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DraftPayload {
    pub title: Option<String>,
    pub start: Option<Instant>,
    pub end: Option<Instant>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub invitees: Vec<String>,
}

/// Invariant: a draft is fully rendered and shown to the user before any
/// write, and removed only on commit or cancel — never silently dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Draft {
    pub target: DraftTarget,
    pub payload: DraftPayload,
}

impl Draft {
    pub fn calendar(calendar_id: impl Into<String>, payload: DraftPayload) -> Self {
        Self { target: DraftTarget::Calendar { calendar_id: calendar_id.into() }, payload }
    }

    pub fn records(collection: impl Into<String>, payload: DraftPayload) -> Self {
        Self { target: DraftTarget::Records { collection: collection.into() }, payload }
    }
}
