//! Layered application configuration: built-in defaults, optional TOML
//! file, `GREENROOM_*` environment overrides, then programmatic overrides,
//! validated after merging. Secrets never leave `SecretString` except at
//! the HTTP client boundary.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub store: StoreConfig,
    pub calendar: CalendarConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub webhook_base_url: String,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub token: SecretString,
    pub base_url: String,
    pub studios_db: String,
    pub bios_db: String,
    pub labelcopy_db: String,
    pub contacts_db: String,
}

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub base_url: String,
    pub calendar_id: String,
    pub api_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Maximum retained conversations before LRU eviction.
    pub capacity: usize,
    /// Idle conversations older than this are dropped.
    pub ttl_secs: u64,
    /// Rolling history turns kept per conversation.
    pub history_turns: usize,
    /// Default studio-session length when no end time is given.
    pub default_duration_minutes: u32,
    /// Fixed UTC offset appended to calendar timestamps, e.g. `+01:00`.
    pub utc_offset: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub telegram_bot_token: Option<String>,
    pub webhook_base_url: Option<String>,
    pub store_token: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                webhook_base_url: String::new(),
            },
            store: StoreConfig {
                token: String::new().into(),
                base_url: "https://api.notion.com/v1".to_string(),
                studios_db: String::new(),
                bios_db: String::new(),
                labelcopy_db: String::new(),
                contacts_db: String::new(),
            },
            calendar: CalendarConfig {
                base_url: "https://www.googleapis.com/calendar/v3".to_string(),
                calendar_id: "primary".to_string(),
                api_token: None,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: 3000 },
            session: SessionConfig {
                capacity: 256,
                ttl_secs: 12 * 60 * 60,
                history_turns: 12,
                default_duration_minutes: 6 * 60,
                utc_offset: "+01:00".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("greenroom.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(telegram) = patch.telegram {
            if let Some(token) = telegram.bot_token {
                self.telegram.bot_token = token.into();
            }
            if let Some(url) = telegram.webhook_base_url {
                self.telegram.webhook_base_url = url;
            }
        }

        if let Some(store) = patch.store {
            if let Some(token) = store.token {
                self.store.token = token.into();
            }
            if let Some(base_url) = store.base_url {
                self.store.base_url = base_url;
            }
            if let Some(id) = store.studios_db {
                self.store.studios_db = id;
            }
            if let Some(id) = store.bios_db {
                self.store.bios_db = id;
            }
            if let Some(id) = store.labelcopy_db {
                self.store.labelcopy_db = id;
            }
            if let Some(id) = store.contacts_db {
                self.store.contacts_db = id;
            }
        }

        if let Some(calendar) = patch.calendar {
            if let Some(base_url) = calendar.base_url {
                self.calendar.base_url = base_url;
            }
            if let Some(id) = calendar.calendar_id {
                self.calendar.calendar_id = id;
            }
            if let Some(token) = calendar.api_token {
                self.calendar.api_token = Some(token.into());
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(session) = patch.session {
            if let Some(capacity) = session.capacity {
                self.session.capacity = capacity;
            }
            if let Some(ttl_secs) = session.ttl_secs {
                self.session.ttl_secs = ttl_secs;
            }
            if let Some(history_turns) = session.history_turns {
                self.session.history_turns = history_turns;
            }
            if let Some(minutes) = session.default_duration_minutes {
                self.session.default_duration_minutes = minutes;
            }
            if let Some(offset) = session.utc_offset {
                self.session.utc_offset = offset;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("GREENROOM_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = value.into();
        }
        if let Some(value) = read_env("GREENROOM_WEBHOOK_BASE_URL") {
            self.telegram.webhook_base_url = value;
        }

        if let Some(value) = read_env("GREENROOM_STORE_TOKEN") {
            self.store.token = value.into();
        }
        if let Some(value) = read_env("GREENROOM_STORE_BASE_URL") {
            self.store.base_url = value;
        }
        if let Some(value) = read_env("GREENROOM_STORE_STUDIOS_DB") {
            self.store.studios_db = value;
        }
        if let Some(value) = read_env("GREENROOM_STORE_BIOS_DB") {
            self.store.bios_db = value;
        }
        if let Some(value) = read_env("GREENROOM_STORE_LABELCOPY_DB") {
            self.store.labelcopy_db = value;
        }
        if let Some(value) = read_env("GREENROOM_STORE_CONTACTS_DB") {
            self.store.contacts_db = value;
        }

        if let Some(value) = read_env("GREENROOM_CALENDAR_BASE_URL") {
            self.calendar.base_url = value;
        }
        if let Some(value) = read_env("GREENROOM_CALENDAR_ID") {
            self.calendar.calendar_id = value;
        }
        if let Some(value) = read_env("GREENROOM_CALENDAR_API_TOKEN") {
            self.calendar.api_token = Some(value.into());
        }

        if let Some(value) = read_env("GREENROOM_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("GREENROOM_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("GREENROOM_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("GREENROOM_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("GREENROOM_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("GREENROOM_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("GREENROOM_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("GREENROOM_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("GREENROOM_SERVER_PORT") {
            self.server.port = parse_u16("GREENROOM_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("GREENROOM_SESSION_CAPACITY") {
            self.session.capacity = parse_u32("GREENROOM_SESSION_CAPACITY", &value)? as usize;
        }
        if let Some(value) = read_env("GREENROOM_SESSION_TTL_SECS") {
            self.session.ttl_secs = parse_u64("GREENROOM_SESSION_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("GREENROOM_SESSION_HISTORY_TURNS") {
            self.session.history_turns =
                parse_u32("GREENROOM_SESSION_HISTORY_TURNS", &value)? as usize;
        }
        if let Some(value) = read_env("GREENROOM_SESSION_DEFAULT_DURATION_MINUTES") {
            self.session.default_duration_minutes =
                parse_u32("GREENROOM_SESSION_DEFAULT_DURATION_MINUTES", &value)?;
        }
        if let Some(value) = read_env("GREENROOM_SESSION_UTC_OFFSET") {
            self.session.utc_offset = value;
        }

        let log_level =
            read_env("GREENROOM_LOGGING_LEVEL").or_else(|| read_env("GREENROOM_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GREENROOM_LOGGING_FORMAT").or_else(|| read_env("GREENROOM_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(token) = overrides.telegram_bot_token {
            self.telegram.bot_token = token.into();
        }
        if let Some(url) = overrides.webhook_base_url {
            self.telegram.webhook_base_url = url;
        }
        if let Some(token) = overrides.store_token {
            self.store.token = token.into();
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(api_key.into());
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_offset(&self.session.utc_offset) {
            return Err(ConfigError::Validation(format!(
                "session.utc_offset must look like `+01:00`, got `{}`",
                self.session.utc_offset
            )));
        }
        if self.session.capacity == 0 {
            return Err(ConfigError::Validation(
                "session.capacity must be at least 1".to_string(),
            ));
        }
        if self.session.default_duration_minutes == 0 {
            return Err(ConfigError::Validation(
                "session.default_duration_minutes must be positive".to_string(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn is_valid_offset(offset: &str) -> bool {
    let bytes = offset.as_bytes();
    bytes.len() == 6
        && (bytes[0] == b'+' || bytes[0] == b'-')
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_digit()
        && bytes[3] == b':'
        && bytes[4].is_ascii_digit()
        && bytes[5].is_ascii_digit()
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    if let Some(value) = read_env("GREENROOM_CONFIG") {
        let path = PathBuf::from(value);
        return path.exists().then_some(path);
    }
    let default = PathBuf::from("greenroom.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    telegram: Option<TelegramPatch>,
    store: Option<StorePatch>,
    calendar: Option<CalendarPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    session: Option<SessionPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    webhook_base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StorePatch {
    token: Option<String>,
    base_url: Option<String>,
    studios_db: Option<String>,
    bios_db: Option<String>,
    labelcopy_db: Option<String>,
    contacts_db: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarPatch {
    base_url: Option<String>,
    calendar_id: Option<String>,
    api_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct SessionPatch {
    capacity: Option<usize>,
    ttl_secs: Option<u64>,
    history_turns: Option<usize>,
    default_duration_minutes: Option<u32>,
    utc_offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

    #[test]
    fn defaults_validate() {
        let config = AppConfig::load(LoadOptions::default()).expect("defaults must load");
        assert_eq!(config.session.default_duration_minutes, 360);
        assert_eq!(config.session.utc_offset, "+01:00");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn file_patch_and_overrides_layer_in_order() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[session]\ncapacity = 32\nutc_offset = \"+02:00\"\n\n[logging]\nlevel = \"debug\""
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides {
                log_level: Some("warn".to_string()),
                ..ConfigOverrides::default()
            },
        })
        .expect("layered load");

        assert_eq!(config.session.capacity, 32);
        assert_eq!(config.session.utc_offset, "+02:00");
        // programmatic override wins over the file value
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn malformed_offset_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[session]\nutc_offset = \"UTC+1\"").expect("write config");

        let result = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        });

        let message = result.err().expect("validation failure").to_string();
        assert!(message.contains("utc_offset"));
    }
}
