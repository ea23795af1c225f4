use std::env;
use std::path::Path;

use noteit_core::config::{
    resolve_config_path, AppConfig, Settings, DATABASE_SECTION, DISCORD_SECTION, LOGGING_SECTION,
    SERVER_SECTION,
};
use secrecy::ExposeSecret;
use serde_json::{json, Map, Value};

use crate::commands::{load_config, CommandResult};

struct Field {
    section: &'static str,
    key: &'static str,
    value: String,
    env_key: &'static str,
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_path = resolve_config_path(None);
    let settings = config_path.as_deref().and_then(|path| Settings::load(path).ok());

    let mut sections = Map::new();
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(&field, settings.as_ref(), config_path.as_deref());
        lines.push(format!(
            "- {}.{} = {} (source: {source})",
            field.section, field.key, field.value
        ));

        let section = sections
            .entry(field.section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(entries) = section {
            entries.insert(field.key.to_string(), json!({ "value": field.value, "source": source }));
        }
    }

    CommandResult::success_with_data("config", lines.join("\n"), Some(Value::Object(sections)))
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field {
            section: DISCORD_SECTION,
            key: "token",
            value: redact_token(config.discord.token.expose_secret()),
            env_key: "NOTEIT_DISCORD_TOKEN",
        },
        Field {
            section: DISCORD_SECTION,
            key: "api_base_url",
            value: config.discord.api_base_url.clone(),
            env_key: "NOTEIT_DISCORD_API_BASE_URL",
        },
        Field {
            section: DISCORD_SECTION,
            key: "gateway_url",
            value: config.discord.gateway_url.clone(),
            env_key: "NOTEIT_DISCORD_GATEWAY_URL",
        },
        Field {
            section: DISCORD_SECTION,
            key: "transport",
            value: config.discord.transport.as_str().to_string(),
            env_key: "NOTEIT_DISCORD_TRANSPORT",
        },
        Field {
            section: DATABASE_SECTION,
            key: "url",
            value: config.database.url.clone(),
            env_key: "NOTEIT_DATABASE_URL",
        },
        Field {
            section: DATABASE_SECTION,
            key: "max_connections",
            value: config.database.max_connections.to_string(),
            env_key: "NOTEIT_DATABASE_MAX_CONNECTIONS",
        },
        Field {
            section: DATABASE_SECTION,
            key: "timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_key: "NOTEIT_DATABASE_TIMEOUT_SECS",
        },
        Field {
            section: SERVER_SECTION,
            key: "bind_address",
            value: config.server.bind_address.clone(),
            env_key: "NOTEIT_SERVER_BIND_ADDRESS",
        },
        Field {
            section: SERVER_SECTION,
            key: "health_check_port",
            value: config.server.health_check_port.to_string(),
            env_key: "NOTEIT_SERVER_HEALTH_CHECK_PORT",
        },
        Field {
            section: LOGGING_SECTION,
            key: "level",
            value: config.logging.level.clone(),
            env_key: "NOTEIT_LOG_LEVEL",
        },
        Field {
            section: LOGGING_SECTION,
            key: "format",
            value: format!("{:?}", config.logging.format).to_lowercase(),
            env_key: "NOTEIT_LOG_FORMAT",
        },
    ]
}

fn field_source(field: &Field, settings: Option<&Settings>, config_path: Option<&Path>) -> String {
    if env::var_os(field.env_key).is_some() {
        return format!("env ({})", field.env_key);
    }

    let in_file = settings.is_some_and(|settings| {
        settings.get(field.section, field.key).is_some()
            || (field.section == DATABASE_SECTION
                && field.key == "url"
                && settings.get(DATABASE_SECTION, "name").is_some())
    });
    if in_file {
        let file_path = config_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

/// Keeps only enough of the token to tell two tokens apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let visible: String = trimmed.chars().take(4).collect();
    if trimmed.chars().count() <= 8 {
        return "<redacted>".to_string();
    }
    format!("{visible}***")
}

#[cfg(test)]
mod tests {
    use super::redact_token;

    #[test]
    fn tokens_are_never_printed_whole() {
        assert_eq!(redact_token(""), "<empty>");
        assert_eq!(redact_token("short"), "<redacted>");
        assert_eq!(redact_token("MTA0NzY.abcdef.secret"), "MTA0***");
    }
}
