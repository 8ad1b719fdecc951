//! Ephemeral session summary bridging one command's output to a later one.

use chrono::NaiveDate;

/// Working set produced by the session-summary command. Overwritten by each
/// new summary and cleared once promoted into a calendar draft.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionMemory {
    pub participants: Vec<String>,
    pub date: Option<NaiveDate>,
    pub start_minutes: Option<u16>,
    pub location: Option<String>,
    pub contact: Option<String>,
}
