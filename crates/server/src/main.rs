mod bootstrap;
mod export;
mod health;
mod webhook;

use anyhow::Result;
use greenroom_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use greenroom_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let webhook_url =
        format!("{}/telegram/webhook", app.config.telegram.webhook_base_url.trim_end_matches('/'));
    // Clear any stale registration before pointing Telegram at this process.
    app.bot.delete_webhook().await?;
    app.bot.set_webhook(&webhook_url, &app.webhook_state.secret).await?;
    tracing::info!(
        event_name = "system.server.webhook_registered",
        url = %webhook_url,
        "telegram webhook registered"
    );

    let router = health::router().merge(webhook::router(app.webhook_state.clone()));
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "greenroom-server started"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(event_name = "system.server.stopping", "greenroom-server stopping");
    app.bot.delete_webhook().await?;

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
