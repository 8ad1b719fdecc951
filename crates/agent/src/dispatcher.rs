//! Priority-ordered conversation routing.
//!
//! Every inbound message resolves to exactly one pathway, first match wins:
//! confirmation gate for a pending draft, wizard continuation, recall
//! proposal, one of the domain triggers, then the knowledge-chat fallback.
//! The routing decision is a pure function of (conversation state, text) so
//! the priority order itself is unit-testable.

use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate, Utc};
use tracing::{info, warn};

use greenroom_core::collab::{
    CalendarEvent, CalendarProvider, Completion, DocumentExporter, Extractor, KnowledgeStore,
    NotifyPolicy, RecordStore,
};
use greenroom_core::config::AppConfig;
use greenroom_core::domain::conversation::{Conversation, Role};
use greenroom_core::domain::draft::{Draft, DraftPayload, DraftTarget};
use greenroom_core::domain::memory::SessionMemory;
use greenroom_core::domain::wizard::{Wizard, WizardStep};
use greenroom_core::fields::{self, FieldMap, LABELCOPY_FIELDS};
use greenroom_core::registry::ConversationRegistry;
use greenroom_core::render::{render_draft_preview, render_fields};
use greenroom_core::temporal::{self, Instant, PatchField, DEFAULT_START_MINUTES};

use crate::chat;
use crate::extractor::{
    ExtractorAdapter, CALENDAR_INSTRUCTIONS, CONTACT_INSTRUCTIONS, LABELCOPY_INSTRUCTIONS,
    SESSION_INSTRUCTIONS,
};

/// Render order for the session-memory summary.
const MEMORY_FIELDS: [&str; 5] = ["Teilnehmer", "Datum", "Zeit", "Ort", "Kontakt"];

/// What goes back to the transport: reply text, plus an optional exported
/// document to deliver alongside it.
#[derive(Clone, Debug)]
pub struct Reply {
    pub text: String,
    pub document: Option<greenroom_core::collab::ExportedDocument>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), document: None }
    }

    pub fn with_document(
        text: impl Into<String>,
        document: greenroom_core::collab::ExportedDocument,
    ) -> Self {
        Self { text: text.into(), document: Some(document) }
    }
}

/// External services the dispatcher talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub knowledge: Arc<dyn KnowledgeStore>,
    pub records: Arc<dyn RecordStore>,
    pub calendar: Arc<dyn CalendarProvider>,
    pub extractor: Arc<dyn Extractor>,
    pub completion: Arc<dyn Completion>,
    pub exporter: Arc<dyn DocumentExporter>,
}

#[derive(Clone, Debug)]
pub struct DispatchSettings {
    pub calendar_id: String,
    pub labelcopy_db: String,
    pub contacts_db: String,
    pub studios_db: String,
    pub bios_db: String,
    pub default_duration_minutes: u32,
    pub utc_offset: String,
    pub session_capacity: usize,
    pub session_ttl_secs: u64,
    pub history_turns: usize,
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            calendar_id: config.calendar.calendar_id.clone(),
            labelcopy_db: config.store.labelcopy_db.clone(),
            contacts_db: config.store.contacts_db.clone(),
            studios_db: config.store.studios_db.clone(),
            bios_db: config.store.bios_db.clone(),
            default_duration_minutes: config.session.default_duration_minutes,
            utc_offset: config.session.utc_offset.clone(),
            session_capacity: config.session.capacity,
            session_ttl_secs: config.session.ttl_secs,
            history_turns: config.session.history_turns,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            calendar_id: "primary".to_string(),
            labelcopy_db: "labelcopys".to_string(),
            contacts_db: "contacts".to_string(),
            studios_db: "studios".to_string(),
            bios_db: "bios".to_string(),
            default_duration_minutes: 6 * 60,
            utc_offset: "+01:00".to_string(),
            session_capacity: 256,
            session_ttl_secs: 12 * 60 * 60,
            history_turns: 12,
        }
    }
}

pub struct Dispatcher {
    settings: DispatchSettings,
    registry: ConversationRegistry,
    collab: Collaborators,
    extractor: ExtractorAdapter,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Route {
    Confirmation,
    WizardTurn,
    Recall { name: String },
    LabelcopyStart,
    SessionSummary,
    SessionPatch,
    Promote,
    CalendarIntent,
    RecordSave,
    Fallback,
}

impl Dispatcher {
    pub fn new(settings: DispatchSettings, collab: Collaborators) -> Self {
        let registry = ConversationRegistry::new(
            settings.session_capacity,
            settings.session_ttl_secs,
            settings.history_turns,
        );
        let extractor = ExtractorAdapter::new(Arc::clone(&collab.extractor));
        Self { settings, registry, collab, extractor }
    }

    /// Handles one inbound message to completion. The conversation's lock is
    /// held for the whole turn, so per-chat state updates never interleave.
    pub async fn handle(&self, chat_id: &str, text: &str) -> Reply {
        let handle = self.registry.checkout(chat_id).await;
        let mut convo = handle.lock().await;
        convo.touch(Utc::now());

        let route = route_for(&convo, text);
        info!(
            event_name = "dispatch.route_resolved",
            chat_id = %chat_id,
            route = ?route,
            "inbound message routed"
        );

        match route {
            Route::Confirmation => self.resolve_confirmation(&mut convo, text).await,
            Route::WizardTurn => self.continue_wizard(&mut convo, text).await,
            Route::Recall { name } => self.propose_recall(&mut convo, &name).await,
            Route::LabelcopyStart => {
                convo.wizard = Some(Wizard::start());
                Reply::text("Labelcopy, alles klar. Für welchen Artist?")
            }
            Route::SessionSummary => self.build_session_summary(&mut convo, text).await,
            Route::SessionPatch => self.patch_session(&mut convo, text),
            Route::Promote => self.promote_memory(&mut convo),
            Route::CalendarIntent => self.calendar_intent(&mut convo, text).await,
            Route::RecordSave => self.stage_contact(&mut convo, text).await,
            Route::Fallback => self.knowledge_chat(&mut convo, text).await,
        }
    }

    // --- confirmation gate -------------------------------------------------

    async fn resolve_confirmation(&self, convo: &mut Conversation, text: &str) -> Reply {
        let lower = normalize(text);
        if is_affirmative(&lower) {
            return self.commit_draft(convo).await;
        }
        if is_negative(&lower) {
            convo.draft = None;
            return Reply::text("Alles klar, verworfen.");
        }
        if let Some((field, value)) = temporal::parse_field_patch(text) {
            return self.edit_draft(convo, field, &value);
        }

        let preview = convo.draft.as_ref().map(render_draft_preview).unwrap_or_default();
        Reply::text(format!(
            "Da wartet noch ein Entwurf. Sag \"ja\" zum Eintragen, \"nein\" zum Verwerfen — \
             oder korrigier was, z.B. \"Zeit 14-16\".\n\n{preview}"
        ))
    }

    async fn commit_draft(&self, convo: &mut Conversation) -> Reply {
        let Some(draft) = convo.draft.clone() else {
            return Reply::text("Da liegt gerade kein Entwurf an.");
        };

        match &draft.target {
            DraftTarget::Calendar { calendar_id } => {
                let Some(start) = draft.payload.start else {
                    return Reply::text(
                        "Mir fehlt noch das Datum — sag z.B. \"datum 26.1.\".",
                    );
                };
                let end = draft.payload.end.unwrap_or_else(|| {
                    temporal::add_duration(&start, self.settings.default_duration_minutes)
                });
                let event = CalendarEvent {
                    summary: draft.payload.title.clone().unwrap_or_else(|| "Termin".to_string()),
                    start: temporal::format_instant(&start, &self.settings.utc_offset),
                    end: temporal::format_instant(&end, &self.settings.utc_offset),
                    location: draft.payload.location.clone(),
                    description: draft.payload.description.clone(),
                    attendees: draft.payload.invitees.clone(),
                };

                match self
                    .collab
                    .calendar
                    .insert_event(calendar_id, &event, NotifyPolicy::All)
                    .await
                {
                    Ok(()) => {
                        convo.draft = None;
                        Reply::text("Eingetragen! ✅ Die Einladungen sind raus.")
                    }
                    Err(error) => {
                        warn!(
                            event_name = "dispatch.commit_failed",
                            chat_id = %convo.chat_id,
                            error = %error,
                            "calendar insert failed, draft kept"
                        );
                        Reply::text(format!(
                            "{} Der Entwurf ist noch da — mit \"ja\" geht's weiter.",
                            error.user_reply()
                        ))
                    }
                }
            }
            DraftTarget::Records { collection } => {
                let mut record = FieldMap::new();
                if let Some(title) = &draft.payload.title {
                    record.insert("Name".to_string(), title.clone());
                }
                if let Some(description) = &draft.payload.description {
                    record.insert("Info".to_string(), description.clone());
                }
                if let Some(location) = &draft.payload.location {
                    record.insert("Ort".to_string(), location.clone());
                }

                match self.collab.records.create(collection, &record).await {
                    Ok(_) => {
                        convo.draft = None;
                        Reply::text("Gespeichert! ✅")
                    }
                    Err(error) => {
                        warn!(
                            event_name = "dispatch.commit_failed",
                            chat_id = %convo.chat_id,
                            error = %error,
                            "record create failed, draft kept"
                        );
                        Reply::text(format!(
                            "{} Der Entwurf ist noch da — mit \"ja\" geht's weiter.",
                            error.user_reply()
                        ))
                    }
                }
            }
        }
    }

    fn edit_draft(&self, convo: &mut Conversation, field: PatchField, value: &str) -> Reply {
        let today = Utc::now().date_naive();
        let default_duration = self.settings.default_duration_minutes;
        let Some(draft) = convo.draft.as_mut() else {
            return Reply::text("Da liegt gerade kein Entwurf an.");
        };

        match field {
            PatchField::Zeit => {
                let date = draft.payload.start.map(|instant| instant.date).unwrap_or(today);
                if let Some((from, to)) = temporal::parse_time_range(value) {
                    let start = Instant::new(date, from);
                    let span = (u32::from(to) + 24 * 60 - u32::from(from)) % (24 * 60);
                    let span = if span == 0 { default_duration } else { span };
                    draft.payload.start = Some(start);
                    draft.payload.end = Some(temporal::add_duration(&start, span));
                } else if let Some(minutes) = temporal::parse_time(value) {
                    let start = Instant::new(date, minutes);
                    draft.payload.start = Some(start);
                    draft.payload.end = Some(temporal::add_duration(&start, default_duration));
                } else {
                    return Reply::text(
                        "Die Zeit habe ich nicht verstanden — z.B. \"Zeit 14-16\".",
                    );
                }
            }
            PatchField::Datum => {
                let Some(date) = temporal::parse_date(value, today) else {
                    return Reply::text(
                        "Das Datum habe ich nicht verstanden — z.B. \"Datum 26.1.\".",
                    );
                };
                match draft.payload.start {
                    Some(start) => {
                        let span = draft
                            .payload
                            .end
                            .map(|end| temporal::duration_minutes(&start, &end))
                            .filter(|span| *span > 0)
                            .unwrap_or(default_duration);
                        let moved = Instant::new(date, start.minutes);
                        draft.payload.start = Some(moved);
                        draft.payload.end = Some(temporal::add_duration(&moved, span));
                    }
                    None => {
                        let start = Instant::new(date, DEFAULT_START_MINUTES);
                        draft.payload.start = Some(start);
                        draft.payload.end =
                            Some(temporal::add_duration(&start, default_duration));
                    }
                }
            }
            PatchField::Ort => draft.payload.location = Some(value.to_string()),
            PatchField::Titel => draft.payload.title = Some(value.to_string()),
            PatchField::Info => draft.payload.description = Some(value.to_string()),
            PatchField::Gaeste | PatchField::Teilnehmer => {
                draft.payload.invitees = split_names(value);
            }
            PatchField::Kontakt => {
                draft.payload.description = Some(format!("Kontakt: {value}"));
            }
        }

        Reply::text(render_draft_preview(draft))
    }

    // --- wizard ------------------------------------------------------------

    async fn continue_wizard(&self, convo: &mut Conversation, text: &str) -> Reply {
        let Some(step) = convo.wizard.as_ref().map(|wizard| wizard.step.clone()) else {
            return Reply::text("Da läuft gerade keine Labelcopy.");
        };

        match step {
            WizardStep::PendingResume { name } => self.resolve_resume(convo, text, &name),
            WizardStep::CollectingArtist => {
                let artist = text.trim();
                if artist.is_empty() {
                    return Reply::text("Für welchen Artist?");
                }
                if let Some(wizard) = convo.wizard.as_mut() {
                    wizard.fields.insert("Artist".to_string(), artist.to_string());
                    wizard.step = WizardStep::CollectingTitle;
                }
                Reply::text("Und wie heißt der Titel?")
            }
            WizardStep::CollectingTitle => self.create_wizard_record(convo, text).await,
            WizardStep::Active => self.active_wizard_turn(convo, text).await,
        }
    }

    fn resolve_resume(&self, convo: &mut Conversation, text: &str, name: &str) -> Reply {
        let lower = normalize(text);
        if is_affirmative(&lower) {
            if let Some(wizard) = convo.wizard.as_mut() {
                wizard.step = WizardStep::Active;
                let status = render_fields(&wizard.fields, &LABELCOPY_FIELDS);
                return Reply::text(format!("Weiter geht's mit \"{name}\":\n\n{status}"));
            }
            Reply::text("Da läuft gerade keine Labelcopy.")
        } else if is_negative(&lower) {
            convo.wizard = None;
            Reply::text("Ok, bleibt wie es ist.")
        } else {
            Reply::text(format!("Kurz ja oder nein: soll ich \"{name}\" wieder aufmachen?"))
        }
    }

    async fn create_wizard_record(&self, convo: &mut Conversation, text: &str) -> Reply {
        let title = text.trim();
        if title.is_empty() {
            return Reply::text("Und wie heißt der Titel?");
        }

        let Some(wizard) = convo.wizard.as_mut() else {
            return Reply::text("Da läuft gerade keine Labelcopy.");
        };
        wizard.fields.insert("Titel".to_string(), title.to_string());

        match self.collab.records.create(&self.settings.labelcopy_db, &wizard.fields).await {
            Ok(record_id) => {
                wizard.record_id = Some(record_id);
                wizard.step = WizardStep::Active;
                let artist = wizard.fields.get("Artist").cloned().unwrap_or_default();
                let status = render_fields(&wizard.fields, &LABELCOPY_FIELDS);
                Reply::text(format!(
                    "Labelcopy für {artist} – {title} ist angelegt. Schick mir Infos wie \
                     \"Mix von Toni\", ich sortiere sie ein.\n\n{status}"
                ))
            }
            Err(error) => {
                // Roll back to the pre-call state so the next message retries
                // the same step instead of drifting.
                wizard.fields.remove("Titel");
                warn!(
                    event_name = "dispatch.wizard_create_failed",
                    chat_id = %convo.chat_id,
                    error = %error,
                    "labelcopy record create failed"
                );
                Reply::text(format!("{} Wie heißt der Titel?", error.user_reply()))
            }
        }
    }

    async fn active_wizard_turn(&self, convo: &mut Conversation, text: &str) -> Reply {
        let lower = normalize(text);
        if is_wizard_done(&lower) {
            convo.wizard = None;
            return Reply::text("Labelcopy ist gespeichert. Bis später!");
        }
        if is_export_request(&lower) {
            return self.export_wizard(convo);
        }

        let extraction = self.extractor.extract(LABELCOPY_INSTRUCTIONS, text).await;

        let Some(wizard) = convo.wizard.as_mut() else {
            return Reply::text("Da läuft gerade keine Labelcopy.");
        };
        let before = wizard.fields.clone();
        let written = fields::merge_extraction(&mut wizard.fields, &extraction);
        if written.is_empty() {
            let status = render_fields(&wizard.fields, &LABELCOPY_FIELDS);
            return Reply::text(format!(
                "Da konnte ich nichts zuordnen. Aktueller Stand:\n\n{status}"
            ));
        }

        let Some(record_id) = wizard.record_id.clone() else {
            wizard.fields = before;
            return Reply::text("Da läuft gerade keine Labelcopy.");
        };

        match self.collab.records.update(&record_id, &wizard.fields).await {
            Ok(()) => {
                let status = render_fields(&wizard.fields, &LABELCOPY_FIELDS);
                Reply::text(format!("Aufgenommen. Aktueller Stand:\n\n{status}"))
            }
            Err(error) => {
                wizard.fields = before;
                warn!(
                    event_name = "dispatch.wizard_update_failed",
                    chat_id = %convo.chat_id,
                    error = %error,
                    "labelcopy record update failed, merge rolled back"
                );
                Reply::text(format!(
                    "{} Nichts verloren — probier's gleich nochmal.",
                    error.user_reply()
                ))
            }
        }
    }

    fn export_wizard(&self, convo: &mut Conversation) -> Reply {
        let Some(wizard) = convo.wizard.as_ref() else {
            return Reply::text("Da läuft gerade keine Labelcopy.");
        };
        let title = match (wizard.fields.get("Artist"), wizard.fields.get("Titel")) {
            (Some(artist), Some(song)) => format!("{artist} – {song}"),
            _ => "Labelcopy".to_string(),
        };

        match self.collab.exporter.render(&title, &wizard.fields) {
            Ok(document) => {
                convo.wizard = None;
                Reply::with_document(
                    "Hier ist die Labelcopy als Datei. Ich schließe das Thema damit ab.",
                    document,
                )
            }
            Err(error) => {
                warn!(
                    event_name = "dispatch.export_failed",
                    chat_id = %convo.chat_id,
                    error = %error,
                    "labelcopy export failed, wizard kept"
                );
                Reply::text(format!("{} Die Labelcopy bleibt offen.", error.user_reply()))
            }
        }
    }

    async fn propose_recall(&self, convo: &mut Conversation, name: &str) -> Reply {
        match self.collab.records.find_by_name(&self.settings.labelcopy_db, name).await {
            Ok(Some((record_id, record))) => {
                let display = record.get("Titel").cloned().unwrap_or_else(|| name.to_string());
                convo.wizard = Some(Wizard::pending_resume(display.clone(), record_id, record));
                Reply::text(format!(
                    "Ich habe \"{display}\" gefunden. Da weitermachen? (ja/nein)"
                ))
            }
            Ok(None) => Reply::text(format!("Ich finde keine Labelcopy zu \"{name}\".")),
            Err(error) => {
                warn!(
                    event_name = "dispatch.recall_failed",
                    chat_id = %convo.chat_id,
                    error = %error,
                    "recall lookup failed"
                );
                Reply::text(error.user_reply())
            }
        }
    }

    // --- session memory ----------------------------------------------------

    async fn build_session_summary(&self, convo: &mut Conversation, text: &str) -> Reply {
        let today = Utc::now().date_naive();
        let date = temporal::parse_date(text, today).unwrap_or(today);
        let minutes = temporal::parse_time(text).unwrap_or(DEFAULT_START_MINUTES);

        let extraction = self.extractor.extract(SESSION_INSTRUCTIONS, text).await;
        let participants = extraction
            .get("teilnehmer")
            .map(|value| split_names(&fields::flatten_value(value)))
            .unwrap_or_default();
        let location_hint = extraction
            .get("ort")
            .map(fields::flatten_value)
            .filter(|value| !value.is_empty());
        let contact = extraction
            .get("kontakt")
            .map(fields::flatten_value)
            .filter(|value| !value.is_empty());

        // Resolve the studio against the knowledge store; a lookup failure
        // degrades to the raw mention rather than losing the summary.
        let location = match &location_hint {
            Some(hint) => {
                match self.collab.knowledge.query(&self.settings.studios_db, hint).await {
                    Ok(rows) => rows
                        .first()
                        .and_then(|row| row.get("Name").cloned())
                        .or_else(|| location_hint.clone()),
                    Err(error) => {
                        warn!(
                            event_name = "dispatch.studio_lookup_failed",
                            chat_id = %convo.chat_id,
                            error = %error,
                            "studio lookup degraded"
                        );
                        location_hint.clone()
                    }
                }
            }
            None => None,
        };

        let memory = SessionMemory {
            participants,
            date: Some(date),
            start_minutes: Some(minutes),
            location,
            contact,
        };
        let summary = render_memory(&memory);
        convo.memory = Some(memory);

        Reply::text(format!(
            "Session-Übersicht:\n{summary}\n\nMit \"eintragen\" kommt das in den Kalender."
        ))
    }

    fn patch_session(&self, convo: &mut Conversation, text: &str) -> Reply {
        let Some((field, value)) = temporal::parse_field_patch(text) else {
            return Reply::text("Das habe ich nicht zuordnen können.");
        };
        let today = Utc::now().date_naive();
        let Some(memory) = convo.memory.as_mut() else {
            return Reply::text("Gerade liegt keine Session-Übersicht an.");
        };

        match field {
            PatchField::Datum => {
                let Some(date) = temporal::parse_date(&value, today) else {
                    return Reply::text(
                        "Das Datum habe ich nicht verstanden — z.B. \"Datum 26.1.\".",
                    );
                };
                memory.date = Some(date);
            }
            PatchField::Zeit => {
                let minutes = temporal::parse_time(&value)
                    .or_else(|| temporal::parse_time_range(&value).map(|(from, _)| from));
                let Some(minutes) = minutes else {
                    return Reply::text(
                        "Die Zeit habe ich nicht verstanden — z.B. \"Zeit 14:00\".",
                    );
                };
                memory.start_minutes = Some(minutes);
            }
            PatchField::Ort => memory.location = Some(value),
            PatchField::Kontakt => memory.contact = Some(value),
            PatchField::Teilnehmer | PatchField::Gaeste => {
                memory.participants = split_names(&value);
            }
            PatchField::Titel | PatchField::Info => {
                return Reply::text(
                    "Das gehört nicht in die Session-Übersicht. Datum, Zeit, Ort, Kontakt \
                     oder Teilnehmer kann ich ändern.",
                );
            }
        }

        let summary = render_memory(memory);
        Reply::text(format!(
            "Geändert.\n{summary}\n\nMit \"eintragen\" kommt das in den Kalender."
        ))
    }

    fn promote_memory(&self, convo: &mut Conversation) -> Reply {
        let Some(memory) = convo.memory.take() else {
            return Reply::text("Gerade liegt keine Session-Übersicht an.");
        };
        let today = Utc::now().date_naive();

        let date = memory.date.unwrap_or(today);
        let start = Instant::new(date, memory.start_minutes.unwrap_or(DEFAULT_START_MINUTES));
        let end = temporal::add_duration(&start, self.settings.default_duration_minutes);
        let title = if memory.participants.is_empty() {
            "Studio-Session".to_string()
        } else {
            format!("Session {}", memory.participants.join(" & "))
        };

        let payload = DraftPayload {
            title: Some(title),
            start: Some(start),
            end: Some(end),
            location: memory.location,
            description: memory.contact.map(|contact| format!("Kontakt: {contact}")),
            invitees: Vec::new(),
        };
        let draft = Draft::calendar(self.settings.calendar_id.clone(), payload);
        let preview = render_draft_preview(&draft);
        convo.draft = Some(draft);
        Reply::text(preview)
    }

    // --- calendar / record-save triggers ------------------------------------

    async fn calendar_intent(&self, convo: &mut Conversation, text: &str) -> Reply {
        let extraction = self.extractor.extract(CALENDAR_INSTRUCTIONS, text).await;
        let intent = extraction
            .get("intent")
            .map(|value| fields::flatten_value(value).to_lowercase());
        let wants_read = match intent.as_deref() {
            Some("lesen") => true,
            Some("schreiben") => false,
            _ => looks_like_read(text),
        };

        let today = Utc::now().date_naive();
        let date = temporal::parse_date(text, today).unwrap_or(today);

        if wants_read {
            return self.list_day(convo, date).await;
        }

        let (start, end) = match temporal::parse_time_range(text) {
            Some((from, to)) => {
                let start = Instant::new(date, from);
                let span = (u32::from(to) + 24 * 60 - u32::from(from)) % (24 * 60);
                let span =
                    if span == 0 { self.settings.default_duration_minutes } else { span };
                (start, temporal::add_duration(&start, span))
            }
            None => {
                let minutes = temporal::parse_time(text).unwrap_or(DEFAULT_START_MINUTES);
                let start = Instant::new(date, minutes);
                (start, temporal::add_duration(&start, self.settings.default_duration_minutes))
            }
        };

        let title = extraction
            .get("titel")
            .map(fields::flatten_value)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "Termin".to_string());
        let payload = DraftPayload {
            title: Some(title),
            start: Some(start),
            end: Some(end),
            location: extraction
                .get("ort")
                .map(fields::flatten_value)
                .filter(|value| !value.is_empty()),
            description: extraction
                .get("info")
                .map(fields::flatten_value)
                .filter(|value| !value.is_empty()),
            invitees: extraction
                .get("gäste")
                .map(|value| split_names(&fields::flatten_value(value)))
                .unwrap_or_default(),
        };

        let draft = Draft::calendar(self.settings.calendar_id.clone(), payload);
        let preview = render_draft_preview(&draft);
        convo.draft = Some(draft);
        Reply::text(preview)
    }

    async fn list_day(&self, convo: &Conversation, date: NaiveDate) -> Reply {
        let range_start = Instant::new(date, 0);
        let next_day = date.checked_add_days(Days::new(1)).unwrap_or(date);
        let range_end = Instant::new(next_day, 0);

        let events = self
            .collab
            .calendar
            .list_events(
                &self.settings.calendar_id,
                &temporal::format_instant(&range_start, &self.settings.utc_offset),
                &temporal::format_instant(&range_end, &self.settings.utc_offset),
            )
            .await;

        match events {
            Ok(events) if events.is_empty() => {
                Reply::text(format!("Am {} ist nichts eingetragen.", format_date(date)))
            }
            Ok(events) => {
                let lines: Vec<String> = events
                    .iter()
                    .map(|event| match &event.location {
                        Some(location) => format!("• {} @ {location}", event.title),
                        None => format!("• {}", event.title),
                    })
                    .collect();
                Reply::text(format!("Am {}:\n{}", format_date(date), lines.join("\n")))
            }
            Err(error) => {
                warn!(
                    event_name = "dispatch.list_events_failed",
                    chat_id = %convo.chat_id,
                    error = %error,
                    "calendar read failed"
                );
                Reply::text(error.user_reply())
            }
        }
    }

    async fn stage_contact(&self, convo: &mut Conversation, text: &str) -> Reply {
        let extraction = self.extractor.extract(CONTACT_INSTRUCTIONS, text).await;
        let name = extraction
            .get("name")
            .map(fields::flatten_value)
            .filter(|value| !value.is_empty());

        let mut details = Vec::new();
        for (key, label) in
            [("email", "Email"), ("telefon", "Telefon"), ("firma", "Firma"), ("notiz", "Notiz")]
        {
            if let Some(value) = extraction.get(key) {
                let flat = fields::flatten_value(value);
                if !flat.is_empty() {
                    details.push(format!("{label}: {flat}"));
                }
            }
        }
        let description = if details.is_empty() {
            Some(text.trim().to_string())
        } else {
            Some(details.join(", "))
        };

        let payload = DraftPayload { title: name, description, ..DraftPayload::default() };
        let draft = Draft::records(self.settings.contacts_db.clone(), payload);
        let preview = render_draft_preview(&draft);
        convo.draft = Some(draft);
        Reply::text(preview)
    }

    // --- fallback -----------------------------------------------------------

    async fn knowledge_chat(&self, convo: &mut Conversation, text: &str) -> Reply {
        let studio_rows = match self.collab.knowledge.query(&self.settings.studios_db, text).await
        {
            Ok(rows) => rows,
            Err(error) => {
                warn!(
                    event_name = "dispatch.knowledge_lookup_failed",
                    chat_id = %convo.chat_id,
                    error = %error,
                    "studio context degraded to empty"
                );
                Vec::new()
            }
        };
        let bio_rows = match self.collab.knowledge.query(&self.settings.bios_db, text).await {
            Ok(rows) => rows,
            Err(error) => {
                warn!(
                    event_name = "dispatch.knowledge_lookup_failed",
                    chat_id = %convo.chat_id,
                    error = %error,
                    "bio context degraded to empty"
                );
                Vec::new()
            }
        };

        let prompt = chat::build_system_prompt(
            &chat::format_context(&studio_rows),
            &chat::format_context(&bio_rows),
        );
        let history = convo.history.as_slice();

        match self.collab.completion.complete(&prompt, &history, text).await {
            Ok(reply) => {
                convo.history.push(Role::User, text);
                convo.history.push(Role::Assistant, reply.as_str());
                Reply::text(reply)
            }
            Err(error) => {
                warn!(
                    event_name = "dispatch.completion_failed",
                    chat_id = %convo.chat_id,
                    error = %error,
                    "fallback completion failed, history unchanged"
                );
                Reply::text(error.user_reply())
            }
        }
    }
}

// --- routing --------------------------------------------------------------

pub(crate) fn route_for(convo: &Conversation, text: &str) -> Route {
    let lower = normalize(text);

    if convo.draft.is_some() {
        return Route::Confirmation;
    }

    if convo.wizard.is_some() {
        // Only the competing domains break out of an active wizard.
        if is_calendar_trigger(&lower) {
            return Route::CalendarIntent;
        }
        if is_contact_save_trigger(&lower) {
            return Route::RecordSave;
        }
        return Route::WizardTurn;
    }

    if let Some(name) = recall_name(text) {
        return Route::Recall { name };
    }
    if is_labelcopy_start(&lower) {
        return Route::LabelcopyStart;
    }
    if is_session_trigger(&lower) {
        return Route::SessionSummary;
    }
    if convo.memory.is_some() {
        if is_promote_trigger(&lower) {
            return Route::Promote;
        }
        if temporal::parse_field_patch(text).is_some() {
            return Route::SessionPatch;
        }
    }
    if is_calendar_trigger(&lower) {
        return Route::CalendarIntent;
    }
    if is_contact_save_trigger(&lower) {
        return Route::RecordSave;
    }

    Route::Fallback
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn strip_punctuation(text: &str) -> &str {
    text.trim_matches(|c: char| !c.is_alphanumeric())
}

fn is_affirmative(lower: &str) -> bool {
    matches!(
        strip_punctuation(lower),
        "ja" | "yes" | "ok" | "okay" | "passt" | "jo" | "yep" | "bestätigen" | "bestaetigen"
            | "mach das"
    )
}

fn is_negative(lower: &str) -> bool {
    matches!(
        strip_punctuation(lower),
        "nein" | "no" | "abbrechen" | "cancel" | "stop" | "verwerfen" | "lass es"
            | "lieber nicht"
    )
}

fn is_wizard_done(lower: &str) -> bool {
    matches!(strip_punctuation(lower), "fertig" | "done" | "das wars" | "passt so")
}

fn is_export_request(lower: &str) -> bool {
    let stripped = strip_punctuation(lower);
    stripped == "export" || stripped == "exportieren" || stripped == "export bitte"
}

fn is_labelcopy_start(lower: &str) -> bool {
    lower.contains("labelcopy")
        && ["anlegen", "neu", "erstellen", "starten"]
            .iter()
            .any(|keyword| lower.contains(keyword))
}

fn is_session_trigger(lower: &str) -> bool {
    lower.starts_with("session")
}

fn is_promote_trigger(lower: &str) -> bool {
    lower.contains("eintragen") || lower.contains("in den kalender")
}

fn is_calendar_trigger(lower: &str) -> bool {
    lower.contains("termin") || lower.starts_with("kalender") || lower.contains("was steht")
}

fn is_contact_save_trigger(lower: &str) -> bool {
    let saving = ["speicher", "anleg", "notier"].iter().any(|stem| lower.contains(stem));
    (lower.contains("kontakt") && saving) || lower.starts_with("merke dir")
}

fn looks_like_read(text: &str) -> bool {
    let lower = normalize(text);
    lower.contains('?')
        || lower.starts_with("was ")
        || lower.starts_with("wann ")
        || lower.starts_with("welche ")
}

/// Pulls the record name out of a recall phrase like `labelcopy weiter
/// Skyline`. Requires both the recall keyword and a non-empty name.
fn recall_name(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let has_labelcopy = tokens
        .iter()
        .any(|token| strip_punctuation(&token.to_lowercase()) == "labelcopy");
    if !has_labelcopy {
        return None;
    }

    let keyword_index = tokens.iter().position(|token| {
        matches!(
            strip_punctuation(&token.to_lowercase()),
            "weiter" | "öffnen" | "oeffnen" | "fortsetzen" | "aufmachen"
        )
    })?;

    let name: Vec<&str> = tokens[keyword_index + 1..]
        .iter()
        .filter(|token| {
            let lowered = token.to_lowercase();
            let stripped = strip_punctuation(&lowered);
            !matches!(stripped, "mit" | "labelcopy" | "der" | "die" | "das" | "von")
        })
        .copied()
        .collect();

    let name = name.join(" ");
    (!name.is_empty()).then_some(name)
}

fn split_names(value: &str) -> Vec<String> {
    value
        .replace(" und ", ",")
        .replace(" & ", ",")
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn format_date(date: NaiveDate) -> String {
    format!("{:02}.{:02}.{:04}", date.day(), date.month(), date.year())
}

fn render_memory(memory: &SessionMemory) -> String {
    let mut snapshot = FieldMap::new();
    if !memory.participants.is_empty() {
        snapshot.insert("Teilnehmer".to_string(), memory.participants.join(", "));
    }
    if let Some(date) = memory.date {
        snapshot.insert("Datum".to_string(), format_date(date));
    }
    if let Some(minutes) = memory.start_minutes {
        snapshot.insert("Zeit".to_string(), format!("{:02}:{:02}", minutes / 60, minutes % 60));
    }
    if let Some(location) = &memory.location {
        snapshot.insert("Ort".to_string(), location.clone());
    }
    if let Some(contact) = &memory.contact {
        snapshot.insert("Kontakt".to_string(), contact.clone());
    }
    render_fields(&snapshot, &MEMORY_FIELDS)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::{
        CannedCompletion, InMemoryKnowledge, InMemoryRecords, PlainTextExporter,
        RecordingCalendar, ScriptedExtractor,
    };
    use greenroom_core::collab::{EventSummary, KnowledgeStore};

    struct Harness {
        dispatcher: Dispatcher,
        records: Arc<InMemoryRecords>,
        calendar: Arc<RecordingCalendar>,
        extractor: Arc<ScriptedExtractor>,
        completion: Arc<CannedCompletion>,
    }

    fn harness_with(knowledge: InMemoryKnowledge) -> Harness {
        let records = Arc::new(InMemoryRecords::default());
        let calendar = Arc::new(RecordingCalendar::default());
        let extractor = Arc::new(ScriptedExtractor::default());
        let completion = Arc::new(CannedCompletion::new("Klar, sag Bescheid."));

        let knowledge: Arc<dyn KnowledgeStore> = Arc::new(knowledge);
        let records_dyn: Arc<dyn RecordStore> = records.clone() as Arc<dyn RecordStore>;
        let calendar_dyn: Arc<dyn CalendarProvider> = calendar.clone() as Arc<dyn CalendarProvider>;
        let extractor_dyn: Arc<dyn Extractor> = extractor.clone() as Arc<dyn Extractor>;
        let completion_dyn: Arc<dyn Completion> = completion.clone() as Arc<dyn Completion>;

        let dispatcher = Dispatcher::new(
            DispatchSettings::default(),
            Collaborators {
                knowledge,
                records: records_dyn,
                calendar: calendar_dyn,
                extractor: extractor_dyn,
                completion: completion_dyn,
                exporter: Arc::new(PlainTextExporter),
            },
        );

        Harness { dispatcher, records, calendar, extractor, completion }
    }

    fn harness() -> Harness {
        harness_with(InMemoryKnowledge::default())
    }

    fn row(pairs: &[(&str, &str)]) -> FieldMap {
        pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
    }

    // --- routing priority ---------------------------------------------------

    #[test]
    fn pending_draft_claims_every_message() {
        let mut convo = Conversation::new("c1", 12);
        convo.draft = Some(Draft::calendar("primary", DraftPayload::default()));
        convo.wizard = Some(Wizard::start());

        assert_eq!(route_for(&convo, "Labelcopy anlegen"), Route::Confirmation);
        assert_eq!(route_for(&convo, "termin morgen"), Route::Confirmation);
        assert_eq!(route_for(&convo, "irgendwas"), Route::Confirmation);
    }

    #[test]
    fn competing_domain_triggers_break_out_of_wizard() {
        let mut convo = Conversation::new("c1", 12);
        convo.wizard = Some(Wizard::start());

        assert_eq!(route_for(&convo, "was steht morgen an?"), Route::CalendarIntent);
        assert_eq!(route_for(&convo, "kontakt speichern: Maja"), Route::RecordSave);
        assert_eq!(route_for(&convo, "Mix von Toni"), Route::WizardTurn);
    }

    #[test]
    fn memory_enables_promote_and_patch() {
        let mut convo = Conversation::new("c1", 12);
        assert_eq!(route_for(&convo, "ort Studio B"), Route::Fallback);
        assert_eq!(route_for(&convo, "eintragen"), Route::Fallback);

        convo.memory = Some(SessionMemory::default());
        assert_eq!(route_for(&convo, "eintragen"), Route::Promote);
        assert_eq!(route_for(&convo, "ort Studio B"), Route::SessionPatch);
    }

    #[test]
    fn recall_needs_keyword_and_name() {
        let convo = Conversation::new("c1", 12);
        assert_eq!(
            route_for(&convo, "labelcopy weiter Skyline"),
            Route::Recall { name: "Skyline".to_string() }
        );
        assert_eq!(
            route_for(&convo, "mach die Labelcopy von Skyline wieder auf, also weiter"),
            Route::Fallback
        );
        assert_eq!(route_for(&convo, "labelcopy weiter"), Route::Fallback);
        assert_eq!(route_for(&convo, "Labelcopy anlegen"), Route::LabelcopyStart);
    }

    // --- labelcopy wizard ---------------------------------------------------

    #[tokio::test]
    async fn wizard_collects_artist_and_title_then_creates_record() {
        let h = harness();

        let reply = h.dispatcher.handle("chat", "Labelcopy anlegen").await;
        assert!(reply.text.contains("Artist"));
        assert_eq!(h.records.write_count(), 0);

        let reply = h.dispatcher.handle("chat", "Nova").await;
        assert!(reply.text.contains("Titel"));
        assert_eq!(h.records.write_count(), 0);

        let reply = h.dispatcher.handle("chat", "Skyline").await;
        assert_eq!(h.records.create_calls.load(Ordering::SeqCst), 1);
        assert!(reply.text.contains("✓ Artist: Nova"));
        assert!(reply.text.contains("✓ Titel: Skyline"));
        assert!(reply.text.contains("✗ Genre: —"));
    }

    #[tokio::test]
    async fn wizard_merge_is_additive_and_canonicalizes_synonyms() {
        let h = harness();
        h.dispatcher.handle("chat", "Labelcopy anlegen").await;
        h.dispatcher.handle("chat", "Nova").await;
        h.dispatcher.handle("chat", "Skyline").await;

        h.extractor.push(r#"{"mixer": "Toni B."}"#);
        let reply = h.dispatcher.handle("chat", "Mix von Toni B.").await;
        assert!(reply.text.contains("✓ Mixed by: Toni B."));

        // An empty value in a later extraction never erases what is known.
        h.extractor.push(r#"{"genre": "Pop", "titel": ""}"#);
        let reply = h.dispatcher.handle("chat", "Genre ist Pop").await;
        assert!(reply.text.contains("✓ Genre: Pop"));
        assert!(reply.text.contains("✓ Titel: Skyline"));
    }

    #[tokio::test]
    async fn failed_wizard_update_rolls_back_the_merge() {
        let h = harness();
        h.dispatcher.handle("chat", "Labelcopy anlegen").await;
        h.dispatcher.handle("chat", "Nova").await;
        h.dispatcher.handle("chat", "Skyline").await;

        h.records.fail_writes.store(true, Ordering::SeqCst);
        h.extractor.push(r#"{"genre": "Pop"}"#);
        let reply = h.dispatcher.handle("chat", "Genre ist Pop").await;
        assert!(reply.text.contains("Nichts verloren"));

        h.records.fail_writes.store(false, Ordering::SeqCst);
        h.extractor.push(r#"{"label": "Luma Records"}"#);
        let reply = h.dispatcher.handle("chat", "Label ist Luma Records").await;
        assert!(reply.text.contains("✓ Label: Luma Records"));
        assert!(reply.text.contains("✗ Genre: —"));
    }

    #[tokio::test]
    async fn export_delivers_a_document_and_closes_the_wizard() {
        let h = harness();
        h.dispatcher.handle("chat", "Labelcopy anlegen").await;
        h.dispatcher.handle("chat", "Nova").await;
        h.dispatcher.handle("chat", "Skyline").await;

        let reply = h.dispatcher.handle("chat", "export").await;
        let document = reply.document.expect("export attaches a file");
        assert!(document.filename.ends_with(".txt"));

        // Wizard is gone, plain text lands in the fallback again.
        h.dispatcher.handle("chat", "hallo").await;
        assert_eq!(h.completion.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recall_reopens_only_after_confirmation() {
        let h = harness();
        let seed = row(&[("Artist", "Nova"), ("Titel", "Skyline")]);
        h.records.create("labelcopys", &seed).await.expect("seed record");

        let reply = h.dispatcher.handle("chat", "labelcopy weiter Skyline").await;
        assert!(reply.text.contains("Skyline"));
        assert!(reply.text.contains("weitermachen"));

        let reply = h.dispatcher.handle("chat", "nein").await;
        assert!(reply.text.contains("bleibt wie es ist"));

        h.dispatcher.handle("chat", "labelcopy weiter Skyline").await;
        let reply = h.dispatcher.handle("chat", "ja").await;
        assert!(reply.text.contains("✓ Artist: Nova"));
    }

    // --- confirmation gate --------------------------------------------------

    async fn stage_calendar_draft(h: &Harness) {
        h.extractor.push(r#"{"intent": "schreiben", "titel": "Videodreh"}"#);
        let reply = h.dispatcher.handle("chat", "Termin Videodreh am 25.01.26 um 12:00").await;
        assert!(reply.text.contains("Termin-Entwurf"));
        assert!(reply.text.contains("Videodreh"));
    }

    #[tokio::test]
    async fn nothing_is_written_without_an_affirmative_token() {
        let h = harness();
        stage_calendar_draft(&h).await;

        let reply = h.dispatcher.handle("chat", "vielleicht später").await;
        assert!(reply.text.contains("Entwurf"));
        let reply = h.dispatcher.handle("chat", "hm, weiß nicht").await;
        assert!(reply.text.contains("Entwurf"));

        assert_eq!(h.calendar.insert_count(), 0);
        assert_eq!(h.records.write_count(), 0);
    }

    #[tokio::test]
    async fn draft_edits_rerender_without_writing_then_commit_once() {
        let h = harness();
        stage_calendar_draft(&h).await;

        let reply = h.dispatcher.handle("chat", "Zeit 14-16").await;
        assert!(reply.text.contains("14:00–16:00"));
        assert_eq!(h.calendar.insert_count(), 0);

        h.dispatcher.handle("chat", "Ja.").await;
        assert_eq!(h.calendar.insert_count(), 1);

        let inserted = h.calendar.inserted.lock().expect("inserted lock");
        assert_eq!(inserted[0].start, "2026-01-25T14:00:00+01:00");
        assert_eq!(inserted[0].end, "2026-01-25T16:00:00+01:00");
        drop(inserted);

        // Committed draft is gone; another "ja" is ordinary chat.
        h.dispatcher.handle("chat", "ja").await;
        assert_eq!(h.completion.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.calendar.insert_count(), 1);
    }

    #[tokio::test]
    async fn negative_token_discards_the_draft() {
        let h = harness();
        stage_calendar_draft(&h).await;

        let reply = h.dispatcher.handle("chat", "nein").await;
        assert!(reply.text.contains("verworfen"));
        assert_eq!(h.calendar.insert_count(), 0);

        h.dispatcher.handle("chat", "ja").await;
        assert_eq!(h.completion.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.calendar.insert_count(), 0);
    }

    #[tokio::test]
    async fn failed_commit_keeps_the_draft_for_a_retry() {
        let h = harness();
        stage_calendar_draft(&h).await;

        h.calendar.fail_inserts.store(true, Ordering::SeqCst);
        let reply = h.dispatcher.handle("chat", "ja").await;
        assert!(reply.text.contains("noch da"));
        assert_eq!(h.calendar.insert_count(), 1);

        h.calendar.fail_inserts.store(false, Ordering::SeqCst);
        h.dispatcher.handle("chat", "ja").await;
        assert_eq!(h.calendar.insert_count(), 2);
        assert_eq!(h.calendar.inserted.lock().expect("inserted lock").len(), 1);
    }

    // --- session memory -----------------------------------------------------

    #[tokio::test]
    async fn session_summary_patch_and_promote_carry_past_midnight() {
        let knowledge =
            InMemoryKnowledge::with_rows("studios", vec![row(&[("Name", "Studio A")])]);
        let h = harness_with(knowledge);

        h.extractor.push(r#"{"teilnehmer": ["Nova"], "ort": "Studio A"}"#);
        let reply = h
            .dispatcher
            .handle("chat", "Session mit Nova am 25.01.26 um 23 uhr im Studio A")
            .await;
        assert!(reply.text.contains("Session-Übersicht"));
        assert!(reply.text.contains("23:00"));
        assert!(reply.text.contains("Studio A"));

        let reply = h.dispatcher.handle("chat", "ort Studio B").await;
        assert!(reply.text.contains("Geändert"));
        assert!(reply.text.contains("Studio B"));

        let reply = h.dispatcher.handle("chat", "eintragen").await;
        assert!(reply.text.contains("Termin-Entwurf"));
        assert_eq!(h.calendar.insert_count(), 0);

        h.dispatcher.handle("chat", "ja").await;
        let inserted = h.calendar.inserted.lock().expect("inserted lock");
        assert_eq!(inserted[0].start, "2026-01-25T23:00:00+01:00");
        assert_eq!(inserted[0].end, "2026-01-26T05:00:00+01:00");
        drop(inserted);

        // Memory was consumed by the promotion.
        h.dispatcher.handle("chat", "eintragen").await;
        assert_eq!(h.completion.calls.load(Ordering::SeqCst), 1);
    }

    // --- calendar reads and contact drafts -----------------------------------

    #[tokio::test]
    async fn read_intent_lists_the_day_without_staging_a_draft() {
        let h = harness();
        h.calendar.events.lock().expect("events lock").push(EventSummary {
            title: "Mix Session".to_string(),
            start: "2026-01-25T10:00:00+01:00".to_string(),
            end: "2026-01-25T14:00:00+01:00".to_string(),
            location: Some("Studio A".to_string()),
        });

        h.extractor.push(r#"{"intent": "lesen"}"#);
        let reply = h.dispatcher.handle("chat", "was steht am 25.01.26 an?").await;
        assert!(reply.text.contains("Mix Session"));
        assert_eq!(h.calendar.insert_count(), 0);

        h.dispatcher.handle("chat", "ja").await;
        assert_eq!(h.completion.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn contact_save_goes_through_the_gate() {
        let h = harness();
        h.extractor.push(r#"{"name": "Maja Brandt", "email": "maja@example.com"}"#);
        let reply =
            h.dispatcher.handle("chat", "Kontakt speichern: Maja Brandt, maja@example.com").await;
        assert!(reply.text.contains("Eintrag-Entwurf"));
        assert!(reply.text.contains("Maja Brandt"));
        assert_eq!(h.records.write_count(), 0);

        h.dispatcher.handle("chat", "ja").await;
        assert_eq!(h.records.create_calls.load(Ordering::SeqCst), 1);
        let stored = h
            .records
            .find_by_name("contacts", "Maja")
            .await
            .expect("lookup")
            .expect("contact stored");
        assert_eq!(stored.1.get("Name").map(String::as_str), Some("Maja Brandt"));
    }

    // --- fallback -----------------------------------------------------------

    #[tokio::test]
    async fn fallback_feeds_knowledge_context_into_the_prompt() {
        let knowledge = InMemoryKnowledge::with_rows(
            "bios",
            vec![row(&[("Name", "Nova"), ("Info", "Alt-Pop aus Köln")])],
        );
        let h = harness_with(knowledge);

        let reply = h.dispatcher.handle("chat", "Wer ist Nova?").await;
        assert_eq!(reply.text, "Klar, sag Bescheid.");
        assert_eq!(h.completion.calls.load(Ordering::SeqCst), 1);
        assert!(h.completion.last_prompt.lock().expect("prompt lock").contains("Alt-Pop"));
    }

    #[tokio::test]
    async fn separate_chats_use_separate_conversations() {
        let h = harness();
        h.dispatcher.handle("a", "hallo").await;
        h.dispatcher.handle("b", "hallo").await;
        assert_eq!(h.completion.calls.load(Ordering::SeqCst), 2);
    }
}
