pub mod conversation;
pub mod draft;
pub mod memory;
pub mod wizard;

pub use conversation::{Conversation, History, HistoryTurn, Role};
pub use draft::{Draft, DraftPayload, DraftTarget};
pub use memory::SessionMemory;
pub use wizard::{Wizard, WizardStep};
