//! Per-chat aggregate: draft, wizard, session memory, and rolling history
//! live together so the independently-keyed tables of older designs cannot
//! drift apart for one chat id.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::domain::draft::Draft;
use crate::domain::memory::SessionMemory;
use crate::domain::wizard::Wizard;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
}

/// Bounded rolling window of chat turns used for fallback prompt context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct History {
    turns: VecDeque<HistoryTurn>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self { turns: VecDeque::with_capacity(capacity.max(1)), capacity: capacity.max(1) }
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(HistoryTurn { role, text: text.into() });
    }

    pub fn turns(&self) -> impl Iterator<Item = &HistoryTurn> {
        self.turns.iter()
    }

    pub fn as_slice(&self) -> Vec<HistoryTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Conversation {
    pub chat_id: String,
    pub draft: Option<Draft>,
    pub wizard: Option<Wizard>,
    pub memory: Option<SessionMemory>,
    pub history: History,
    pub last_activity: DateTime<Utc>,
}

impl Conversation {
    pub fn new(chat_id: impl Into<String>, history_capacity: usize) -> Self {
        Self {
            chat_id: chat_id.into(),
            draft: None,
            wizard: None,
            memory: None,
            history: History::new(history_capacity),
            last_activity: Utc::now(),
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }
}
