//! In-memory collaborator fakes used by unit tests and the CLI smoke run.
//!
//! The record store and calendar count their write calls so tests can assert
//! the confirmation gate: no affirmative token, no write.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use greenroom_core::collab::{
    CalendarEvent, CalendarProvider, CollabError, Completion, DocumentExporter, EventSummary,
    ExportedDocument, Extractor, KnowledgeStore, NotifyPolicy, RecordId, RecordStore,
};
use greenroom_core::domain::conversation::HistoryTurn;
use greenroom_core::fields::FieldMap;

#[derive(Default)]
pub struct InMemoryKnowledge {
    collections: HashMap<String, Vec<FieldMap>>,
}

impl InMemoryKnowledge {
    pub fn with_rows(collection: &str, rows: Vec<FieldMap>) -> Self {
        let mut collections = HashMap::new();
        collections.insert(collection.to_string(), rows);
        Self { collections }
    }

    pub fn insert(&mut self, collection: &str, row: FieldMap) {
        self.collections.entry(collection.to_string()).or_default().push(row);
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledge {
    async fn query(
        &self,
        collection: &str,
        name_contains: &str,
    ) -> Result<Vec<FieldMap>, CollabError> {
        let needle = name_contains.to_lowercase();
        let rows = self
            .collections
            .get(collection)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        row.get("Name")
                            .is_some_and(|name| needle.contains(&name.to_lowercase()))
                            || row
                                .get("Name")
                                .is_some_and(|name| name.to_lowercase().contains(&needle))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }
}

#[derive(Default)]
pub struct InMemoryRecords {
    records: Mutex<HashMap<String, (String, FieldMap)>>,
    next_id: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub fail_writes: AtomicBool,
}

impl InMemoryRecords {
    pub fn write_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst) + self.update_calls.load(Ordering::SeqCst)
    }

    pub fn record(&self, id: &RecordId) -> Option<FieldMap> {
        self.records.lock().expect("records lock").get(&id.0).map(|(_, fields)| fields.clone())
    }

    fn check_failure(&self) -> Result<(), CollabError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CollabError::transport("records", "simulated outage"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecords {
    async fn create(&self, collection: &str, fields: &FieldMap) -> Result<RecordId, CollabError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let id = format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.records
            .lock()
            .expect("records lock")
            .insert(id.clone(), (collection.to_string(), fields.clone()));
        Ok(RecordId(id))
    }

    async fn update(&self, id: &RecordId, fields: &FieldMap) -> Result<(), CollabError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let mut records = self.records.lock().expect("records lock");
        match records.get_mut(&id.0) {
            Some((_, stored)) => {
                *stored = fields.clone();
                Ok(())
            }
            None => Err(CollabError::payload("records", format!("unknown record `{}`", id.0))),
        }
    }

    async fn get(&self, id: &RecordId) -> Result<FieldMap, CollabError> {
        self.record(id)
            .ok_or_else(|| CollabError::payload("records", format!("unknown record `{}`", id.0)))
    }

    async fn find_by_name(
        &self,
        collection: &str,
        name: &str,
    ) -> Result<Option<(RecordId, FieldMap)>, CollabError> {
        let needle = name.to_lowercase();
        let records = self.records.lock().expect("records lock");
        let found = records.iter().find(|(_, (stored_collection, fields))| {
            stored_collection == collection
                && fields.values().any(|value| value.to_lowercase().contains(&needle))
        });
        Ok(found.map(|(id, (_, fields))| (RecordId(id.clone()), fields.clone())))
    }
}

#[derive(Default)]
pub struct RecordingCalendar {
    pub events: Mutex<Vec<EventSummary>>,
    pub inserted: Mutex<Vec<CalendarEvent>>,
    pub insert_calls: AtomicUsize,
    pub fail_inserts: AtomicBool,
}

impl RecordingCalendar {
    pub fn insert_count(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarProvider for RecordingCalendar {
    async fn list_events(
        &self,
        _calendar_id: &str,
        _range_start: &str,
        _range_end: &str,
    ) -> Result<Vec<EventSummary>, CollabError> {
        Ok(self.events.lock().expect("events lock").clone())
    }

    async fn insert_event(
        &self,
        _calendar_id: &str,
        event: &CalendarEvent,
        _notify: NotifyPolicy,
    ) -> Result<(), CollabError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(CollabError::transport("calendar", "simulated outage"));
        }
        self.inserted.lock().expect("inserted lock").push(event.clone());
        Ok(())
    }
}

/// Replays queued raw responses; empties out to `{}` once the queue is done.
#[derive(Default)]
pub struct ScriptedExtractor {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedExtractor {
    pub fn with_responses(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(str::to_string).collect()),
        }
    }

    pub fn push(&self, raw: &str) {
        self.responses.lock().expect("responses lock").push_back(raw.to_string());
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(&self, _instructions: &str, _text: &str) -> Result<String, CollabError> {
        let next = self.responses.lock().expect("responses lock").pop_front();
        Ok(next.unwrap_or_else(|| "{}".to_string()))
    }
}

pub struct CannedCompletion {
    pub reply: String,
    pub calls: AtomicUsize,
    pub last_prompt: Mutex<String>,
}

impl CannedCompletion {
    pub fn new(reply: &str) -> Self {
        Self { reply: reply.to_string(), calls: AtomicUsize::new(0), last_prompt: Mutex::new(String::new()) }
    }
}

#[async_trait]
impl Completion for CannedCompletion {
    async fn complete(
        &self,
        system_prompt: &str,
        _history: &[HistoryTurn],
        _text: &str,
    ) -> Result<String, CollabError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().expect("prompt lock") = system_prompt.to_string();
        Ok(self.reply.clone())
    }
}

/// Renders the field map as plain text; good enough to assert delivery.
#[derive(Default)]
pub struct PlainTextExporter;

impl DocumentExporter for PlainTextExporter {
    fn render(&self, title: &str, fields: &FieldMap) -> Result<ExportedDocument, CollabError> {
        let body: String =
            fields.iter().map(|(key, value)| format!("{key}: {value}\n")).collect();
        Ok(ExportedDocument {
            filename: format!("{}.txt", title.replace(' ', "_")),
            bytes: format!("{title}\n\n{body}").into_bytes(),
        })
    }
}
