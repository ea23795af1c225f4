use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SECTION: &str = "default";
pub const DISCORD_SECTION: &str = "extensions.discord";
pub const DATABASE_SECTION: &str = "database";
pub const SERVER_SECTION: &str = "server";
pub const LOGGING_SECTION: &str = "logging";

/// Read-only view of a sectioned config file.
///
/// Nested tables flatten into dotted section names, so `[extensions.discord]`
/// is looked up as section `extensions.discord`. Top-level keys live in the
/// `default` section. Every value is kept in its textual form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

        let interpolated = interpolate_env_vars(&raw)?;
        Self::parse(&interpolated)
            .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        let table = toml::from_str::<toml::Table>(raw)?;
        let mut settings = Self::default();
        settings.absorb(None, table);
        Ok(settings)
    }

    pub fn resolve(&self, section: &str, key: &str) -> Result<&str, ConfigError> {
        self.get(section, key).ok_or_else(|| ConfigError::NotFound {
            section: section.to_owned(),
            key: key.to_owned(),
        })
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(String::as_str)
    }

    pub fn section(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    fn absorb(&mut self, prefix: Option<&str>, table: toml::Table) {
        for (key, value) in table {
            match value {
                toml::Value::Table(inner) => {
                    let name = match prefix {
                        Some(prefix) => format!("{prefix}.{key}"),
                        None => key,
                    };
                    self.sections.entry(name.clone()).or_default();
                    self.absorb(Some(&name), inner);
                }
                scalar => {
                    let section = prefix.unwrap_or(DEFAULT_SECTION).to_owned();
                    self.sections.entry(section).or_default().insert(key, scalar_text(scalar));
                }
            }
        }
    }
}

fn scalar_text(value: toml::Value) -> String {
    match value {
        toml::Value::String(text) => text,
        other => other.to_string(),
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub discord: DiscordConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub token: SecretString,
    pub api_base_url: String,
    pub gateway_url: String,
    pub transport: TransportMode,
}

/// Where gateway events come from. `Noop` runs the process without a live
/// connection and never receives a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Gateway,
    Noop,
}

impl TransportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::Noop => "noop",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub discord_token: Option<String>,
    pub discord_transport: Option<TransportMode>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config key `{key}` was not found in section `{section}`")]
    NotFound { section: String, key: String },
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid value for `{section}.{key}`: `{value}`")]
    InvalidValue { section: String, key: String, value: String },
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: database_url_for_name("noteit"),
                max_connections: 5,
                timeout_secs: 30,
            },
            discord: DiscordConfig {
                token: String::new().into(),
                api_base_url: "https://discord.com/api/v10".to_string(),
                gateway_url: "wss://gateway.discord.gg/?v=10&encoding=json".to_string(),
                transport: TransportMode::Gateway,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
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

impl std::str::FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gateway" => Ok(Self::Gateway),
            "noop" => Ok(Self::Noop),
            other => Err(ConfigError::Validation(format!(
                "unsupported discord transport `{other}` (expected gateway|noop)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let settings = match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => Settings::load(&path)?,
            None if options.require_file => {
                let expected = options.config_path.unwrap_or_else(|| PathBuf::from("noteit.toml"));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => Settings::default(),
        };

        Self::from_settings(&settings, options.overrides)
    }

    /// Builds the process configuration: defaults, then file, then `NOTEIT_*`
    /// environment variables, then explicit overrides.
    pub fn from_settings(
        settings: &Settings,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_settings(settings)?;
        config.apply_env_overrides()?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_settings(&mut self, settings: &Settings) -> Result<(), ConfigError> {
        // A missing token is reported by `validate`, after env and overrides apply.
        match settings.resolve(DISCORD_SECTION, "token") {
            Ok(token) => self.discord.token = token.to_owned().into(),
            Err(ConfigError::NotFound { .. }) => {}
            Err(error) => return Err(error),
        }
        if let Some(api_base_url) = settings.get(DISCORD_SECTION, "api_base_url") {
            self.discord.api_base_url = api_base_url.to_owned();
        }
        if let Some(gateway_url) = settings.get(DISCORD_SECTION, "gateway_url") {
            self.discord.gateway_url = gateway_url.to_owned();
        }
        if let Some(transport) = settings.get(DISCORD_SECTION, "transport") {
            self.discord.transport = transport.parse()?;
        }

        if let Some(url) = settings.get(DATABASE_SECTION, "url") {
            self.database.url = url.to_owned();
        } else if let Some(name) = settings.get(DATABASE_SECTION, "name") {
            self.database.url = database_url_for_name(name);
        }
        if let Some(value) = settings.get(DATABASE_SECTION, "max_connections") {
            self.database.max_connections =
                parse_setting(DATABASE_SECTION, "max_connections", value)?;
        }
        if let Some(value) = settings.get(DATABASE_SECTION, "timeout_secs") {
            self.database.timeout_secs = parse_setting(DATABASE_SECTION, "timeout_secs", value)?;
        }

        if let Some(bind_address) = settings.get(SERVER_SECTION, "bind_address") {
            self.server.bind_address = bind_address.to_owned();
        }
        if let Some(value) = settings.get(SERVER_SECTION, "health_check_port") {
            self.server.health_check_port =
                parse_setting(SERVER_SECTION, "health_check_port", value)?;
        }

        if let Some(level) = settings.get(LOGGING_SECTION, "level") {
            self.logging.level = level.to_owned();
        }
        if let Some(format) = settings.get(LOGGING_SECTION, "format") {
            self.logging.format = format.parse()?;
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("NOTEIT_DISCORD_TOKEN") {
            self.discord.token = value.into();
        }
        if let Some(value) = read_env("NOTEIT_DISCORD_API_BASE_URL") {
            self.discord.api_base_url = value;
        }
        if let Some(value) = read_env("NOTEIT_DISCORD_GATEWAY_URL") {
            self.discord.gateway_url = value;
        }
        if let Some(value) = read_env("NOTEIT_DISCORD_TRANSPORT") {
            self.discord.transport = value.parse()?;
        }

        if let Some(value) = read_env("NOTEIT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("NOTEIT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("NOTEIT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("NOTEIT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("NOTEIT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("NOTEIT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("NOTEIT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_env("NOTEIT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        if let Some(value) = read_env("NOTEIT_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("NOTEIT_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(discord_token) = overrides.discord_token {
            self.discord.token = discord_token.into();
        }
        if let Some(transport) = overrides.discord_transport {
            self.discord.transport = transport;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Discovers the config file: the explicit path if it exists, otherwise
/// `noteit.toml` or `config/config.toml` in the working directory.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("noteit.toml"), PathBuf::from("config/config.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn database_url_for_name(name: &str) -> String {
    format!("sqlite://{name}.db?mode=rwc")
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    if discord.token.expose_secret().trim().is_empty() {
        return Err(ConfigError::NotFound {
            section: DISCORD_SECTION.to_string(),
            key: "token".to_string(),
        });
    }

    let base_url = discord.api_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "extensions.discord.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    let gateway_url = discord.gateway_url.trim();
    if !gateway_url.starts_with("ws://") && !gateway_url.starts_with("wss://") {
        return Err(ConfigError::Validation(
            "extensions.discord.gateway_url must start with ws:// or wss://".to_string(),
        ));
    }

    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_setting<T: std::str::FromStr>(
    section: &str,
    key: &str,
    value: &str,
) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}
