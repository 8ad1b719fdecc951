pub mod collab;
pub mod config;
pub mod domain;
pub mod fields;
pub mod registry;
pub mod render;
pub mod temporal;

pub use collab::{
    CalendarEvent, CalendarProvider, CollabError, Completion, DocumentExporter, EventSummary,
    ExportedDocument, Extractor, KnowledgeStore, NotifyPolicy, RecordId, RecordStore,
};
pub use domain::{
    Conversation, Draft, DraftPayload, DraftTarget, History, HistoryTurn, Role, SessionMemory,
    Wizard, WizardStep,
};
pub use fields::{ExtractionResult, FieldMap};
pub use registry::ConversationRegistry;
