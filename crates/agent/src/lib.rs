//! Conversation orchestration for the Greenroom assistant.
//!
//! This crate owns the per-message decision of which workflow currently has
//! the conversation: a pending draft's confirmation gate, an active
//! labelcopy wizard, a recall proposal, one of the domain triggers, or the
//! knowledge-chat fallback. Exactly one pathway handles each message.
//!
//! Side effects (calendar inserts, record writes) happen only behind the
//! confirmation gate; everything else stages state and renders it back in
//! full so the user always sees where they stand.

pub mod chat;
pub mod dispatcher;
pub mod extractor;
pub mod llm;
pub mod testing;

pub use dispatcher::{Collaborators, DispatchSettings, Dispatcher, Reply};
pub use extractor::ExtractorAdapter;
pub use llm::OpenAiService;
