//! Inbound Telegram webhook.
//!
//! The Bot API expects a fast 200; dispatching and replying happen in a
//! spawned task so a slow collaborator never stalls the webhook delivery.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use greenroom_agent::Dispatcher;
use greenroom_telegram::{BotApi, Update};
use tracing::{error, info, warn};
use uuid::Uuid;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
pub struct WebhookState {
    pub dispatcher: Arc<Dispatcher>,
    pub bot: Arc<BotApi>,
    pub secret: String,
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/telegram/webhook", post(receive)).with_state(state)
}

pub async fn receive(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    let presented = headers.get(SECRET_HEADER).and_then(|value| value.to_str().ok());
    if presented != Some(state.secret.as_str()) {
        warn!(
            event_name = "webhook.secret_mismatch",
            update_id = update.update_id,
            "rejected update with missing or wrong secret token"
        );
        return StatusCode::UNAUTHORIZED;
    }

    let Some((chat_id, text)) = update.text_message() else {
        // Acknowledge anything that is not plain text so Telegram stops
        // redelivering it.
        return StatusCode::OK;
    };
    if text.starts_with('/') {
        // Slash commands are not part of the conversation surface.
        return StatusCode::OK;
    }

    let correlation_id = Uuid::new_v4();
    info!(
        event_name = "webhook.update_accepted",
        update_id = update.update_id,
        chat_id,
        correlation_id = %correlation_id,
        "text update accepted"
    );

    let dispatcher = state.dispatcher.clone();
    let bot = state.bot.clone();
    let text = text.to_string();
    tokio::spawn(async move {
        let reply = dispatcher.handle(&chat_id.to_string(), &text).await;
        if let Err(send_error) = bot.send_message(chat_id, &reply.text).await {
            error!(
                event_name = "webhook.reply_failed",
                chat_id,
                correlation_id = %correlation_id,
                error = %send_error,
                "failed to deliver reply"
            );
            return;
        }
        if let Some(document) = reply.document {
            if let Err(send_error) = bot.send_document(chat_id, &document).await {
                error!(
                    event_name = "webhook.document_failed",
                    chat_id,
                    correlation_id = %correlation_id,
                    error = %send_error,
                    "failed to deliver exported document"
                );
            }
        }
    });

    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use axum::Json;
    use greenroom_agent::testing::{
        CannedCompletion, InMemoryKnowledge, InMemoryRecords, PlainTextExporter,
        RecordingCalendar, ScriptedExtractor,
    };
    use greenroom_agent::{Collaborators, DispatchSettings, Dispatcher};
    use greenroom_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use greenroom_telegram::{BotApi, Update};

    use super::{receive, WebhookState};

    fn state() -> WebhookState {
        let collaborators = Collaborators {
            knowledge: Arc::new(InMemoryKnowledge::default()),
            records: Arc::new(InMemoryRecords::default()),
            calendar: Arc::new(RecordingCalendar::default()),
            extractor: Arc::new(ScriptedExtractor::default()),
            completion: Arc::new(CannedCompletion::new("ok")),
            exporter: Arc::new(PlainTextExporter),
        };
        let dispatcher =
            Arc::new(Dispatcher::new(DispatchSettings::default(), collaborators));

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                telegram_bot_token: Some("7100042:testtoken".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("test config");
        let bot = Arc::new(BotApi::new(&config.telegram).expect("bot api"));

        WebhookState { dispatcher, bot, secret: "7100042testtoken".to_string() }
    }

    fn update(raw: &str) -> Update {
        serde_json::from_str(raw).expect("valid update")
    }

    #[tokio::test]
    async fn wrong_secret_is_unauthorized() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-telegram-bot-api-secret-token",
            HeaderValue::from_static("not-the-secret"),
        );

        let status = receive(
            State(state()),
            headers,
            Json(update(r#"{ "update_id": 1 }"#)),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_text_updates_are_acknowledged() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-telegram-bot-api-secret-token",
            HeaderValue::from_static("7100042testtoken"),
        );

        let status = receive(
            State(state()),
            headers,
            Json(update(r#"{ "update_id": 2 }"#)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
