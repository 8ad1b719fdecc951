//! Contracts for the external collaborators the dispatcher talks to.
//!
//! Every call is a blocking network operation from the caller's point of
//! view; the dispatcher awaits a result or an error and converts failures to
//! a short user-facing reply at the call site.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::conversation::HistoryTurn;
use crate::fields::FieldMap;

#[derive(Debug, Error)]
pub enum CollabError {
    #[error("{service} request failed: {reason}")]
    Transport { service: &'static str, reason: String },
    #[error("{service} returned an unexpected payload: {reason}")]
    Payload { service: &'static str, reason: String },
}

impl CollabError {
    pub fn transport(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Transport { service, reason: reason.into() }
    }

    pub fn payload(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Payload { service, reason: reason.into() }
    }

    /// Short, non-technical reply used whenever a collaborator call fails
    /// mid-turn. Matches the tone of the rest of the bot.
    pub fn user_reply(&self) -> &'static str {
        "Hatte kurz einen Hänger. Probier's nochmal!"
    }
}

/// Identifier of a persisted record in the page-database backend.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventSummary {
    pub title: String,
    pub start: String,
    pub end: String,
    pub location: Option<String>,
}

/// Event payload for the calendar provider. `start`/`end` are fixed-offset
/// timestamp strings produced by `temporal::format_instant`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarEvent {
    pub summary: String,
    pub start: String,
    pub end: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub attendees: Vec<String>,
}

/// Whether the calendar provider notifies attendees about an insert.
/// Inserts are irreversible either way; invites go out immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyPolicy {
    All,
    None,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Read-only lookups against the static business knowledge collections
/// (studios, bios).
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn query(
        &self,
        collection: &str,
        name_contains: &str,
    ) -> Result<Vec<FieldMap>, CollabError>;
}

/// Create/update/get access to persisted records (labelcopys, contacts).
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, collection: &str, fields: &FieldMap) -> Result<RecordId, CollabError>;
    async fn update(&self, id: &RecordId, fields: &FieldMap) -> Result<(), CollabError>;
    async fn get(&self, id: &RecordId) -> Result<FieldMap, CollabError>;
    async fn find_by_name(
        &self,
        collection: &str,
        name: &str,
    ) -> Result<Option<(RecordId, FieldMap)>, CollabError>;
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn list_events(
        &self,
        calendar_id: &str,
        range_start: &str,
        range_end: &str,
    ) -> Result<Vec<EventSummary>, CollabError>;

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
        notify: NotifyPolicy,
    ) -> Result<(), CollabError>;
}

/// External text-to-JSON service. Returns its raw best-effort output; the
/// adapter in the agent crate owns defensive parsing and canonicalization.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, instructions: &str, text: &str) -> Result<String, CollabError>;
}

/// Free-text completion for the knowledge-chat fallback.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[HistoryTurn],
        text: &str,
    ) -> Result<String, CollabError>;
}

/// Renders a finished record into a downloadable file.
pub trait DocumentExporter: Send + Sync {
    fn render(&self, title: &str, fields: &FieldMap) -> Result<ExportedDocument, CollabError>;
}
