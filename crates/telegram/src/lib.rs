//! Telegram transport: inbound update parsing and outbound Bot API calls.

pub mod api;
pub mod update;

pub use api::{webhook_secret, BotApi};
pub use update::Update;
