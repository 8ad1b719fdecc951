//! Outbound Bot API client.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use greenroom_core::collab::{CollabError, ExportedDocument};
use greenroom_core::config::TelegramConfig;

const API_BASE: &str = "https://api.telegram.org";

/// Derives the webhook secret token from the bot token. The Bot API only
/// accepts `[A-Za-z0-9_-]` in secret tokens, so everything else is dropped.
pub fn webhook_secret(token: &SecretString) -> String {
    token
        .expose_secret()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

pub struct BotApi {
    client: Client,
    token: SecretString,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl BotApi {
    pub fn new(config: &TelegramConfig) -> Result<Self, CollabError> {
        let client = Client::builder()
            .build()
            .map_err(|error| CollabError::transport("telegram", error.to_string()))?;
        Ok(Self { client, token: config.bot_token.clone() })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.token.expose_secret())
    }

    async fn check(&self, response: reqwest::Response) -> Result<(), CollabError> {
        let status = response.status();
        let body: ApiResponse = response.json().await.map_err(|error| {
            CollabError::payload("telegram", format!("invalid response: {error}"))
        })?;
        if !body.ok {
            let description = body.description.unwrap_or_else(|| status.to_string());
            return Err(CollabError::transport(
                "telegram",
                format!("bot api rejected the call: {description}"),
            ));
        }
        Ok(())
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), CollabError> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .map_err(|error| CollabError::transport("telegram", error.to_string()))?;
        self.check(response).await
    }

    pub async fn send_document(
        &self,
        chat_id: i64,
        document: &ExportedDocument,
    ) -> Result<(), CollabError> {
        let part = Part::bytes(document.bytes.clone()).file_name(document.filename.clone());
        let form = Form::new().text("chat_id", chat_id.to_string()).part("document", part);

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|error| CollabError::transport("telegram", error.to_string()))?;
        self.check(response).await
    }

    pub async fn set_webhook(&self, url: &str, secret: &str) -> Result<(), CollabError> {
        let response = self
            .client
            .post(self.method_url("setWebhook"))
            .json(&json!({
                "url": url,
                "secret_token": secret,
                "drop_pending_updates": true,
                "allowed_updates": ["message"]
            }))
            .send()
            .await
            .map_err(|error| CollabError::transport("telegram", error.to_string()))?;
        self.check(response).await?;
        debug!(event_name = "telegram.webhook_registered", url, "webhook registered");
        Ok(())
    }

    pub async fn delete_webhook(&self) -> Result<(), CollabError> {
        let response = self
            .client
            .post(self.method_url("deleteWebhook"))
            .send()
            .await
            .map_err(|error| CollabError::transport("telegram", error.to_string()))?;
        self.check(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_secret_strips_the_colon_from_bot_tokens() {
        let token = SecretString::from("7100042:AAfakeToken_with-dashes");
        assert_eq!(webhook_secret(&token), "7100042AAfakeToken_with-dashes");
    }
}
