//! Multi-step labelcopy collection flow.

use crate::collab::RecordId;
use crate::fields::FieldMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WizardStep {
    /// Waiting for the artist name.
    CollectingArtist,
    /// Waiting for the title; entering `Active` creates the backing record.
    CollectingTitle,
    /// Record exists; further messages merge into it.
    Active,
    /// A recall match was proposed and awaits an explicit yes/no before it
    /// is attached. Avoids mis-attaching via fuzzy name match.
    PendingResume { name: String },
}

/// Invariant: the backing record is created as soon as artist and title are
/// known; from then on every update lands on that same record, so partial
/// work is never lost.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wizard {
    pub step: WizardStep,
    pub record_id: Option<RecordId>,
    pub fields: FieldMap,
}

impl Wizard {
    pub fn start() -> Self {
        Self { step: WizardStep::CollectingArtist, record_id: None, fields: FieldMap::new() }
    }

    pub fn pending_resume(name: impl Into<String>, record_id: RecordId, fields: FieldMap) -> Self {
        Self { step: WizardStep::PendingResume { name: name.into() }, record_id: Some(record_id), fields }
    }
}
