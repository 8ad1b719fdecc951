use std::sync::Arc;

use greenroom_agent::{Collaborators, DispatchSettings, Dispatcher, OpenAiService};
use greenroom_calendar::RestCalendar;
use greenroom_core::collab::CollabError;
use greenroom_core::config::{AppConfig, ConfigError};
use greenroom_store::PageStore;
use greenroom_telegram::{webhook_secret, BotApi};
use thiserror::Error;
use tracing::info;

use crate::export::TeraExporter;
use crate::webhook::WebhookState;

pub struct Application {
    pub config: AppConfig,
    pub bot: Arc<BotApi>,
    pub webhook_state: WebhookState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("llm api key is not configured")]
    MissingLlmKey,
    #[error("collaborator setup failed: {0}")]
    Collaborator(#[from] CollabError),
    #[error("document template failed to compile: {0}")]
    Template(#[from] tera::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let api_key = config.llm.api_key.clone().ok_or(BootstrapError::MissingLlmKey)?;
    let llm = Arc::new(OpenAiService::new(api_key, &config.llm)?);
    let store = Arc::new(PageStore::new(&config.store)?);
    let calendar = Arc::new(RestCalendar::new(&config.calendar)?);
    let bot = Arc::new(BotApi::new(&config.telegram)?);
    let exporter = Arc::new(TeraExporter::new()?);

    let collaborators = Collaborators {
        knowledge: store.clone(),
        records: store,
        calendar,
        extractor: llm.clone(),
        completion: llm,
        exporter,
    };
    let dispatcher =
        Arc::new(Dispatcher::new(DispatchSettings::from_config(&config), collaborators));
    info!(event_name = "system.bootstrap.dispatcher_ready", "collaborators wired");

    let webhook_state = WebhookState {
        dispatcher,
        bot: bot.clone(),
        secret: webhook_secret(&config.telegram.bot_token),
    };

    Ok(Application { config, bot, webhook_state })
}
