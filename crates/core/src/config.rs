use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ids::{ChannelId, GuildId, RoleId, UserId};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub tickets: TicketConfig,
    pub health: HealthConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    /// Connection URL for the sqlite backend.
    pub url: String,
    /// State file location for the json backend.
    pub path: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub bot_token: SecretString,
    pub bot_user_id: UserId,
    pub guild_id: GuildId,
    pub intake_channel_id: ChannelId,
    pub log_channel_id: ChannelId,
    pub ticket_category_id: ChannelId,
    pub staff_role_id: RoleId,
    pub owner_id: UserId,
    pub transport: TransportMode,
    pub reconnect_attempts: u32,
    pub reconnect_delay_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TicketConfig {
    pub transcript_dir: String,
    pub command_prefix: String,
}

#[derive(Clone, Debug)]
pub struct HealthConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Sqlite,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// No wire connection; events are fed programmatically. The only mode
    /// until a platform transport lands.
    Noop,
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
    pub database_url: Option<String>,
    pub database_backend: Option<StorageBackend>,
    pub log_level: Option<String>,
    pub bot_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("config file not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("config interpolation references unset variable `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("config interpolation is missing a closing `}}`")]
    UnterminatedInterpolation,
    #[error("environment override `{key}` carries an unusable value `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                backend: StorageBackend::Sqlite,
                url: "sqlite://ticketry.db".to_string(),
                path: "ticketry-state.json".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            gateway: GatewayConfig {
                bot_token: String::new().into(),
                bot_user_id: UserId(0),
                guild_id: GuildId(0),
                intake_channel_id: ChannelId(0),
                log_channel_id: ChannelId(0),
                ticket_category_id: ChannelId(0),
                staff_role_id: RoleId(0),
                owner_id: UserId(0),
                transport: TransportMode::Noop,
                reconnect_attempts: 5,
                reconnect_delay_secs: 5,
            },
            tickets: TicketConfig {
                transcript_dir: "transcripts".to_string(),
                command_prefix: "..".to_string(),
            },
            health: HealthConfig {
                enabled: true,
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

fn merge<T>(slot: &mut T, patch: Option<T>) {
    if let Some(value) = patch {
        *slot = value;
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unknown storage backend `{other}`, expected sqlite or json"
            ))),
        }
    }
}

impl std::str::FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "noop" => Ok(Self::Noop),
            other => Err(ConfigError::Validation(format!(
                "unknown gateway transport `{other}`, expected noop"
            ))),
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
                "unknown log format `{other}`, expected compact, pretty, or json"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => config.apply_patch(read_patch(&path)?),
            None if options.require_file => {
                let expected =
                    options.config_path.unwrap_or_else(|| PathBuf::from("ticketry.toml"));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            merge(&mut self.database.backend, database.backend);
            merge(&mut self.database.url, database.url);
            merge(&mut self.database.path, database.path);
            merge(&mut self.database.max_connections, database.max_connections);
            merge(&mut self.database.timeout_secs, database.timeout_secs);
        }

        if let Some(gateway) = patch.gateway {
            merge(&mut self.gateway.bot_token, gateway.bot_token.map(secret_value));
            merge(&mut self.gateway.bot_user_id, gateway.bot_user_id);
            merge(&mut self.gateway.guild_id, gateway.guild_id);
            merge(&mut self.gateway.intake_channel_id, gateway.intake_channel_id);
            merge(&mut self.gateway.log_channel_id, gateway.log_channel_id);
            merge(&mut self.gateway.ticket_category_id, gateway.ticket_category_id);
            merge(&mut self.gateway.staff_role_id, gateway.staff_role_id);
            merge(&mut self.gateway.owner_id, gateway.owner_id);
            merge(&mut self.gateway.transport, gateway.transport);
            merge(&mut self.gateway.reconnect_attempts, gateway.reconnect_attempts);
            merge(&mut self.gateway.reconnect_delay_secs, gateway.reconnect_delay_secs);
        }

        if let Some(tickets) = patch.tickets {
            merge(&mut self.tickets.transcript_dir, tickets.transcript_dir);
            merge(&mut self.tickets.command_prefix, tickets.command_prefix);
        }

        if let Some(health) = patch.health {
            merge(&mut self.health.enabled, health.enabled);
            merge(&mut self.health.bind_address, health.bind_address);
            merge(&mut self.health.port, health.port);
        }

        if let Some(logging) = patch.logging {
            merge(&mut self.logging.level, logging.level);
            merge(&mut self.logging.format, logging.format);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TICKETRY_DATABASE_BACKEND") {
            self.database.backend = value.parse()?;
        }
        if let Some(value) = read_env("TICKETRY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TICKETRY_DATABASE_PATH") {
            self.database.path = value;
        }
        if let Some(value) = read_env("TICKETRY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("TICKETRY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TICKETRY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("TICKETRY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TICKETRY_GATEWAY_BOT_TOKEN") {
            self.gateway.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("TICKETRY_GATEWAY_BOT_USER_ID") {
            self.gateway.bot_user_id = UserId(parse_env("TICKETRY_GATEWAY_BOT_USER_ID", &value)?);
        }
        if let Some(value) = read_env("TICKETRY_GATEWAY_GUILD_ID") {
            self.gateway.guild_id = GuildId(parse_env("TICKETRY_GATEWAY_GUILD_ID", &value)?);
        }
        if let Some(value) = read_env("TICKETRY_GATEWAY_INTAKE_CHANNEL_ID") {
            self.gateway.intake_channel_id =
                ChannelId(parse_env("TICKETRY_GATEWAY_INTAKE_CHANNEL_ID", &value)?);
        }
        if let Some(value) = read_env("TICKETRY_GATEWAY_LOG_CHANNEL_ID") {
            self.gateway.log_channel_id =
                ChannelId(parse_env("TICKETRY_GATEWAY_LOG_CHANNEL_ID", &value)?);
        }
        if let Some(value) = read_env("TICKETRY_GATEWAY_TICKET_CATEGORY_ID") {
            self.gateway.ticket_category_id =
                ChannelId(parse_env("TICKETRY_GATEWAY_TICKET_CATEGORY_ID", &value)?);
        }
        if let Some(value) = read_env("TICKETRY_GATEWAY_STAFF_ROLE_ID") {
            self.gateway.staff_role_id =
                RoleId(parse_env("TICKETRY_GATEWAY_STAFF_ROLE_ID", &value)?);
        }
        if let Some(value) = read_env("TICKETRY_GATEWAY_OWNER_ID") {
            self.gateway.owner_id = UserId(parse_env("TICKETRY_GATEWAY_OWNER_ID", &value)?);
        }
        if let Some(value) = read_env("TICKETRY_GATEWAY_TRANSPORT") {
            self.gateway.transport = value.parse()?;
        }
        if let Some(value) = read_env("TICKETRY_GATEWAY_RECONNECT_ATTEMPTS") {
            self.gateway.reconnect_attempts =
                parse_env("TICKETRY_GATEWAY_RECONNECT_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("TICKETRY_GATEWAY_RECONNECT_DELAY_SECS") {
            self.gateway.reconnect_delay_secs =
                parse_env("TICKETRY_GATEWAY_RECONNECT_DELAY_SECS", &value)?;
        }

        if let Some(value) = read_env("TICKETRY_TICKETS_TRANSCRIPT_DIR") {
            self.tickets.transcript_dir = value;
        }
        if let Some(value) = read_env("TICKETRY_TICKETS_COMMAND_PREFIX") {
            self.tickets.command_prefix = value;
        }

        if let Some(value) = read_env("TICKETRY_HEALTH_ENABLED") {
            self.health.enabled = parse_env("TICKETRY_HEALTH_ENABLED", &value)?;
        }
        if let Some(value) = read_env("TICKETRY_HEALTH_BIND_ADDRESS") {
            self.health.bind_address = value;
        }
        if let Some(value) = read_env("TICKETRY_HEALTH_PORT") {
            self.health.port = parse_env("TICKETRY_HEALTH_PORT", &value)?;
        }

        let log_level =
            read_env("TICKETRY_LOGGING_LEVEL").or_else(|| read_env("TICKETRY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TICKETRY_LOGGING_FORMAT").or_else(|| read_env("TICKETRY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        merge(&mut self.database.url, overrides.database_url);
        merge(&mut self.database.backend, overrides.database_backend);
        merge(&mut self.logging.level, overrides.log_level);
        merge(&mut self.gateway.bot_token, overrides.bot_token.map(secret_value));
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_gateway(&self.gateway)?;
        validate_tickets(&self.tickets)?;
        validate_health(&self.health)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    ["ticketry.toml", "config/ticketry.toml"]
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let interpolated = interpolate_env_vars(&raw)?;
    let patch = toml::from_str(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })?;
    Ok(patch)
}

/// Replaces every `${VAR}` in the raw file body with the value of `VAR`.
/// A reference to an unset variable is an error, never an empty substitution.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let expression = &rest[start + 2..];
        let end = expression.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let key = &expression[..end];
        let value = env::var(key)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.to_string() })?;
        output.push_str(&value);
        rest = &expression[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    match database.backend {
        StorageBackend::Sqlite => {
            let url = database.url.trim();
            let sqlite_url =
                url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
            if !sqlite_url {
                return Err(ConfigError::Validation(
                    "database.url must point at sqlite (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                        .to_string(),
                ));
            }
        }
        StorageBackend::Json => {
            if database.path.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "database.path is required for the json backend".to_string(),
                ));
            }
        }
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be at least 1".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be between 1 and 300".to_string(),
        ));
    }

    Ok(())
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    if gateway.bot_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "gateway.bot_token is required. Use the token issued for the bot account".to_string(),
        ));
    }

    let required_ids = [
        ("gateway.bot_user_id", gateway.bot_user_id.0),
        ("gateway.guild_id", gateway.guild_id.0),
        ("gateway.intake_channel_id", gateway.intake_channel_id.0),
        ("gateway.log_channel_id", gateway.log_channel_id.0),
        ("gateway.ticket_category_id", gateway.ticket_category_id.0),
        ("gateway.staff_role_id", gateway.staff_role_id.0),
        ("gateway.owner_id", gateway.owner_id.0),
    ];
    for (key, value) in required_ids {
        if value <= 0 {
            return Err(ConfigError::Validation(format!(
                "{key} is required and must be a positive id"
            )));
        }
    }

    if gateway.reconnect_attempts == 0 {
        return Err(ConfigError::Validation(
            "gateway.reconnect_attempts must be at least 1".to_string(),
        ));
    }

    if gateway.reconnect_delay_secs == 0 || gateway.reconnect_delay_secs > 300 {
        return Err(ConfigError::Validation(
            "gateway.reconnect_delay_secs must be between 1 and 300".to_string(),
        ));
    }

    Ok(())
}

fn validate_tickets(tickets: &TicketConfig) -> Result<(), ConfigError> {
    if tickets.transcript_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "tickets.transcript_dir must not be empty".to_string(),
        ));
    }

    if tickets.command_prefix.trim().is_empty() {
        return Err(ConfigError::Validation(
            "tickets.command_prefix must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_health(health: &HealthConfig) -> Result<(), ConfigError> {
    if health.enabled && health.port == 0 {
        return Err(ConfigError::Validation(
            "health.port must be nonzero when the endpoint is enabled".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be trace, debug, info, warn, or error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    gateway: Option<GatewayPatch>,
    tickets: Option<TicketPatch>,
    health: Option<HealthPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    backend: Option<StorageBackend>,
    url: Option<String>,
    path: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    bot_token: Option<String>,
    bot_user_id: Option<UserId>,
    guild_id: Option<GuildId>,
    intake_channel_id: Option<ChannelId>,
    log_channel_id: Option<ChannelId>,
    ticket_category_id: Option<ChannelId>,
    staff_role_id: Option<RoleId>,
    owner_id: Option<UserId>,
    transport: Option<TransportMode>,
    reconnect_attempts: Option<u32>,
    reconnect_delay_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TicketPatch {
    transcript_dir: Option<String>,
    command_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HealthPatch {
    enabled: Option<bool>,
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
