//! Inbound webhook payloads.
//!
//! Updates arrive as the Bot API ships them; everything the dispatcher does
//! not need (stickers, edits, channel posts) deserializes to `None` and is
//! dropped at the webhook.

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
}

impl Update {
    /// The chat id and trimmed text of a plain text message, if this update
    /// is one.
    pub fn text_message(&self) -> Option<(i64, &str)> {
        let message = self.message.as_ref()?;
        let text = message.text.as_deref()?.trim();
        (!text.is_empty()).then_some((message.chat.id, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_updates_yield_chat_and_text() {
        let raw = r#"{
            "update_id": 7100042,
            "message": {
                "message_id": 12,
                "chat": { "id": 4711, "type": "private" },
                "from": { "id": 99, "is_bot": false, "first_name": "Maja" },
                "text": "  Labelcopy anlegen  "
            }
        }"#;

        let update: Update = serde_json::from_str(raw).expect("valid update");
        assert_eq!(update.text_message(), Some((4711, "Labelcopy anlegen")));
    }

    #[test]
    fn non_text_updates_are_dropped() {
        let sticker = r#"{
            "update_id": 7100043,
            "message": {
                "message_id": 13,
                "chat": { "id": 4711, "type": "private" },
                "sticker": { "file_id": "abc" }
            }
        }"#;
        let edited = r#"{ "update_id": 7100044, "edited_message": { "message_id": 13 } }"#;

        let update: Update = serde_json::from_str(sticker).expect("valid update");
        assert_eq!(update.text_message(), None);

        let update: Update = serde_json::from_str(edited).expect("valid update");
        assert_eq!(update.text_message(), None);
    }
}
