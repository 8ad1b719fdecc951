//! OpenAI-backed extraction and completion services.
//!
//! Both collaborator traits go through the same chat endpoint; the only
//! difference is how the message list is assembled. Transient failures
//! (timeouts, 429, 5xx) are retried up to the configured limit before the
//! error reaches the dispatcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use greenroom_core::collab::{CollabError, Completion, Extractor};
use greenroom_core::config::LlmConfig;
use greenroom_core::domain::conversation::{HistoryTurn, Role};

pub struct OpenAiService {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    max_retries: u32,
}

impl OpenAiService {
    pub fn new(api_key: SecretString, config: &LlmConfig) -> Result<Self, CollabError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| CollabError::transport("llm", error.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn chat(&self, messages: Value) -> Result<String, CollabError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({ "model": self.model, "messages": messages });

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let response = self
                .client
                .post(&url)
                .bearer_auth(self.api_key.expose_secret())
                .json(&body)
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => {
                    let completion: ChatResponse = response.json().await.map_err(|error| {
                        CollabError::payload("llm", format!("failed to decode completion: {error}"))
                    })?;
                    let text = completion
                        .choices
                        .into_iter()
                        .next()
                        .map(|choice| choice.message.content)
                        .unwrap_or_default();
                    if text.is_empty() {
                        return Err(CollabError::payload("llm", "completion returned no content"));
                    }
                    return Ok(text);
                }
                Ok(response) => {
                    let status = response.status();
                    let retryable = status.is_server_error() || status.as_u16() == 429;
                    if retryable && attempt <= self.max_retries {
                        warn!(
                            event_name = "llm.request_retried",
                            attempt,
                            status = %status,
                            "completion endpoint returned a transient error"
                        );
                        continue;
                    }
                    return Err(CollabError::transport(
                        "llm",
                        format!("completion endpoint returned {status}"),
                    ));
                }
                Err(error) => {
                    if attempt <= self.max_retries {
                        warn!(
                            event_name = "llm.request_retried",
                            attempt,
                            error = %error,
                            "completion request failed in transit"
                        );
                        continue;
                    }
                    return Err(CollabError::transport("llm", error.to_string()));
                }
            }
        }
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn extraction_messages(instructions: &str, text: &str) -> Value {
    json!([
        { "role": "system", "content": instructions },
        { "role": "user", "content": text },
    ])
}

fn completion_messages(system_prompt: &str, history: &[HistoryTurn], text: &str) -> Value {
    let mut messages = vec![json!({ "role": "system", "content": system_prompt })];
    for turn in history {
        messages.push(json!({ "role": role_name(turn.role), "content": turn.text }));
    }
    messages.push(json!({ "role": "user", "content": text }));
    Value::Array(messages)
}

#[async_trait]
impl Extractor for OpenAiService {
    async fn extract(&self, instructions: &str, text: &str) -> Result<String, CollabError> {
        self.chat(extraction_messages(instructions, text)).await
    }
}

#[async_trait]
impl Completion for OpenAiService {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[HistoryTurn],
        text: &str,
    ) -> Result<String, CollabError> {
        self.chat(completion_messages(system_prompt, history, text)).await
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_messages_interleave_history_between_system_and_user() {
        let history = vec![
            HistoryTurn { role: Role::User, text: "wer ist nova?".to_string() },
            HistoryTurn { role: Role::Assistant, text: "Unsere Alt-Pop-Künstlerin.".to_string() },
        ];

        let messages = completion_messages("du bist greenroom", &history, "und wo sitzt sie?");
        let messages = messages.as_array().expect("array payload");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["role"], "user");
        assert_eq!(messages[3]["content"], "und wo sitzt sie?");
    }

    #[test]
    fn extraction_messages_carry_the_instructions_as_system_prompt() {
        let messages = extraction_messages("extrahiere felder", "Mix von Toni");
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "extrahiere felder");
        assert_eq!(messages[1]["content"], "Mix von Toni");
    }
}
