use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use ticketry_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

/// Renders the effective configuration with per-field source attribution.
/// The bot token is redacted; everything else is operator-visible.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration did not load: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let rows: Vec<(&str, String)> = vec![
        ("database.backend", format!("{:?}", config.database.backend).to_lowercase()),
        ("database.url", config.database.url.clone()),
        ("database.path", config.database.path.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("gateway.bot_token", redact_token(config.gateway.bot_token.expose_secret())),
        ("gateway.bot_user_id", config.gateway.bot_user_id.0.to_string()),
        ("gateway.guild_id", config.gateway.guild_id.0.to_string()),
        ("gateway.intake_channel_id", config.gateway.intake_channel_id.0.to_string()),
        ("gateway.log_channel_id", config.gateway.log_channel_id.0.to_string()),
        ("gateway.ticket_category_id", config.gateway.ticket_category_id.0.to_string()),
        ("gateway.staff_role_id", config.gateway.staff_role_id.0.to_string()),
        ("gateway.owner_id", config.gateway.owner_id.0.to_string()),
        ("gateway.transport", format!("{:?}", config.gateway.transport).to_lowercase()),
        ("tickets.transcript_dir", config.tickets.transcript_dir.clone()),
        ("tickets.command_prefix", config.tickets.command_prefix.clone()),
        ("health.enabled", config.health.enabled.to_string()),
        ("health.bind_address", config.health.bind_address.clone()),
        ("health.port", config.health.port.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format).to_lowercase()),
    ];

    let mut lines =
        vec!["effective config, highest source wins (env > file > default):".to_string()];
    for (key, value) in rows {
        let source = field_source(
            key,
            &override_var(key),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(key, &value, source));
    }

    CommandResult::success("config", lines.join("\n"))
}

/// `database.max_connections` reads its override from
/// `TICKETRY_DATABASE_MAX_CONNECTIONS`, and so on for every key.
fn override_var(key: &str) -> String {
    format!("TICKETRY_{}", key.replace('.', "_").to_uppercase())
}

fn detect_config_path() -> Option<PathBuf> {
    ["ticketry.toml", "config/ticketry.toml"]
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    fs::read_to_string(path?).ok()?.parse().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    file_doc: Option<&Value>,
    file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    match (file_doc, file_path) {
        (Some(doc), Some(path)) if contains_path(doc, key_path) => {
            format!("file ({})", path.display())
        }
        _ => "default".to_string(),
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |node, key| node.get(key)).is_some()
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("{key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once('-') {
        Some((prefix, _)) => format!("{prefix}-***"),
        None => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::redact_token;

    #[test]
    fn tokens_never_render_beyond_their_prefix() {
        assert_eq!(redact_token("token-abc123"), "token-***");
        assert_eq!(redact_token("plainsecret"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }
}
