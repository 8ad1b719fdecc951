use greenroom_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "telegram.bot_token",
        &redact_secret(config.telegram.bot_token.expose_secret()),
        "GREENROOM_TELEGRAM_BOT_TOKEN",
    ));
    lines.push(render_line(
        "telegram.webhook_base_url",
        &config.telegram.webhook_base_url,
        "GREENROOM_WEBHOOK_BASE_URL",
    ));
    lines.push(render_line(
        "store.token",
        &redact_secret(config.store.token.expose_secret()),
        "GREENROOM_STORE_TOKEN",
    ));
    lines.push(render_line("store.base_url", &config.store.base_url, "GREENROOM_STORE_BASE_URL"));
    lines.push(render_line(
        "store.studios_db",
        &config.store.studios_db,
        "GREENROOM_STORE_STUDIOS_DB",
    ));
    lines.push(render_line("store.bios_db", &config.store.bios_db, "GREENROOM_STORE_BIOS_DB"));
    lines.push(render_line(
        "store.labelcopy_db",
        &config.store.labelcopy_db,
        "GREENROOM_STORE_LABELCOPY_DB",
    ));
    lines.push(render_line(
        "store.contacts_db",
        &config.store.contacts_db,
        "GREENROOM_STORE_CONTACTS_DB",
    ));
    lines.push(render_line(
        "calendar.base_url",
        &config.calendar.base_url,
        "GREENROOM_CALENDAR_BASE_URL",
    ));
    lines.push(render_line(
        "calendar.calendar_id",
        &config.calendar.calendar_id,
        "GREENROOM_CALENDAR_ID",
    ));
    let llm_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_secret(key.expose_secret()))
        .unwrap_or_else(|| "(unset)".to_string());
    lines.push(render_line("llm.api_key", &llm_key, "GREENROOM_LLM_API_KEY"));
    lines.push(render_line("llm.model", &config.llm.model, "GREENROOM_LLM_MODEL"));
    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        "GREENROOM_SERVER_BIND_ADDRESS",
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        "GREENROOM_SERVER_PORT",
    ));
    lines.push(render_line(
        "session.capacity",
        &config.session.capacity.to_string(),
        "GREENROOM_SESSION_CAPACITY",
    ));
    lines.push(render_line(
        "session.utc_offset",
        &config.session.utc_offset,
        "GREENROOM_SESSION_UTC_OFFSET",
    ));
    lines.push(render_line("logging.level", &config.logging.level, "GREENROOM_LOG_LEVEL"));

    lines.join("\n")
}

fn render_line(key: &str, value: &str, env_var: &str) -> String {
    let shown = if value.is_empty() { "(unset)" } else { value };
    format!("{key} = {shown} (env: {env_var})")
}

fn redact_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "(unset)".to_string();
    }
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod tests {
    use super::redact_secret;

    #[test]
    fn short_secrets_are_fully_masked() {
        assert_eq!(redact_secret(""), "(unset)");
        assert_eq!(redact_secret("abc"), "***");
        assert_eq!(redact_secret("7100042:AAfakeToken"), "710…en");
    }
}
