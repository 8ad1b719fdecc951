//! REST calendar backend.
//!
//! Events travel as timezone-suffixed timestamp strings end to end; this
//! crate never parses or rebases them, it only moves them between the wire
//! format and the `CalendarProvider` contract.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use greenroom_core::collab::{
    CalendarEvent, CalendarProvider, CollabError, EventSummary, NotifyPolicy,
};
use greenroom_core::config::CalendarConfig;

pub struct RestCalendar {
    client: Client,
    base_url: String,
    api_token: Option<SecretString>,
}

#[derive(Serialize)]
struct WireEvent<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    start: WireInstant<'a>,
    end: WireInstant<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attendees: Vec<WireAttendee<'a>>,
}

#[derive(Serialize)]
struct WireInstant<'a> {
    #[serde(rename = "dateTime")]
    date_time: &'a str,
}

#[derive(Serialize)]
struct WireAttendee<'a> {
    email: &'a str,
}

#[derive(Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<Value>,
}

impl RestCalendar {
    pub fn new(config: &CalendarConfig) -> Result<Self, CollabError> {
        let client = Client::builder()
            .build()
            .map_err(|error| CollabError::transport("calendar", error.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, CollabError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| CollabError::transport("calendar", error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CollabError::transport(
                "calendar",
                format!("endpoint returned {status}: {detail}"),
            ));
        }

        response.json().await.map_err(|error| {
            CollabError::payload("calendar", format!("invalid response: {error}"))
        })
    }
}

fn summarize(item: &Value) -> EventSummary {
    EventSummary {
        title: item
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or("(ohne Titel)")
            .to_string(),
        start: item
            .pointer("/start/dateTime")
            .or_else(|| item.pointer("/start/date"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        end: item
            .pointer("/end/dateTime")
            .or_else(|| item.pointer("/end/date"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        location: item.get("location").and_then(Value::as_str).map(str::to_string),
    }
}

#[async_trait]
impl CalendarProvider for RestCalendar {
    async fn list_events(
        &self,
        calendar_id: &str,
        range_start: &str,
        range_end: &str,
    ) -> Result<Vec<EventSummary>, CollabError> {
        let url = format!("{}/calendars/{calendar_id}/events", self.base_url);
        let response = self
            .send(self.client.get(&url).query(&[
                ("timeMin", range_start),
                ("timeMax", range_end),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ]))
            .await?;

        let list: EventList = serde_json::from_value(response).map_err(|error| {
            CollabError::payload("calendar", format!("invalid event list: {error}"))
        })?;
        debug!(
            event_name = "calendar.events_listed",
            calendar_id,
            hits = list.items.len(),
            "calendar range query completed"
        );
        Ok(list.items.iter().map(summarize).collect())
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
        notify: NotifyPolicy,
    ) -> Result<(), CollabError> {
        let wire = WireEvent {
            summary: &event.summary,
            location: event.location.as_deref(),
            description: event.description.as_deref(),
            start: WireInstant { date_time: &event.start },
            end: WireInstant { date_time: &event.end },
            attendees: event
                .attendees
                .iter()
                .map(|email| WireAttendee { email })
                .collect(),
        };
        let send_updates = match notify {
            NotifyPolicy::All => "all",
            NotifyPolicy::None => "none",
        };

        let url = format!("{}/calendars/{calendar_id}/events", self.base_url);
        self.send(self.client.post(&url).query(&[("sendUpdates", send_updates)]).json(&wire))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summaries_fall_back_to_all_day_dates() {
        let timed = json!({
            "summary": "Mix Session",
            "start": { "dateTime": "2026-01-25T10:00:00+01:00" },
            "end": { "dateTime": "2026-01-25T14:00:00+01:00" },
            "location": "Studio A"
        });
        let all_day = json!({
            "start": { "date": "2026-01-25" },
            "end": { "date": "2026-01-26" }
        });

        let summary = summarize(&timed);
        assert_eq!(summary.title, "Mix Session");
        assert_eq!(summary.start, "2026-01-25T10:00:00+01:00");
        assert_eq!(summary.location.as_deref(), Some("Studio A"));

        let summary = summarize(&all_day);
        assert_eq!(summary.title, "(ohne Titel)");
        assert_eq!(summary.start, "2026-01-25");
    }

    #[test]
    fn wire_event_carries_timestamps_verbatim() {
        let event = CalendarEvent {
            summary: "Session Nova".to_string(),
            start: "2026-01-25T23:00:00+01:00".to_string(),
            end: "2026-01-26T05:00:00+01:00".to_string(),
            location: None,
            description: None,
            attendees: vec!["nova@example.com".to_string()],
        };

        let wire = WireEvent {
            summary: &event.summary,
            location: event.location.as_deref(),
            description: event.description.as_deref(),
            start: WireInstant { date_time: &event.start },
            end: WireInstant { date_time: &event.end },
            attendees: event.attendees.iter().map(|email| WireAttendee { email }).collect(),
        };
        let body = serde_json::to_value(&wire).expect("serializable event");

        assert_eq!(body["start"]["dateTime"], "2026-01-25T23:00:00+01:00");
        assert_eq!(body["end"]["dateTime"], "2026-01-26T05:00:00+01:00");
        assert_eq!(body["attendees"][0]["email"], "nova@example.com");
        assert!(body.get("location").is_none());
    }
}
