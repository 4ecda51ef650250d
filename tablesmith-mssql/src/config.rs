//! Connection configuration.
//!
//! Loaded from a TOML file or from `TABLESMITH_DB_*` environment variables.
//! Either way the result is validated before use.

use serde::Deserialize;
use std::fmt;
use std::path::Path;

pub const ENV_HOST: &str = "TABLESMITH_DB_HOST";
pub const ENV_PORT: &str = "TABLESMITH_DB_PORT";
pub const ENV_NAME: &str = "TABLESMITH_DB_NAME";
pub const ENV_USER: &str = "TABLESMITH_DB_USER";
pub const ENV_PASSWORD: &str = "TABLESMITH_DB_PASSWORD";
pub const ENV_ENCRYPTION: &str = "TABLESMITH_DB_ENCRYPTION";
pub const ENV_TRUST_CERT: &str = "TABLESMITH_DB_TRUST_CERT";

const DEFAULT_PORT: u16 = 1433;
const DEFAULT_APPLICATION_NAME: &str = "tablesmith";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingEnv(&'static str),
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// How to reach and log in to the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub auth: AuthConfig,
    #[serde(default)]
    pub encryption: EncryptionMode,
    #[serde(default)]
    pub trust_server_certificate: bool,
    #[serde(default = "default_application_name")]
    pub application_name: String,
}

#[derive(Clone, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case", deny_unknown_fields)]
pub enum AuthConfig {
    SqlServer { user: String, password: String },
    AadToken { token: String },
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::SqlServer { user, .. } => f
                .debug_struct("SqlServer")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
            AuthConfig::AadToken { .. } => f
                .debug_struct("AadToken")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// TLS negotiation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionMode {
    Off,
    On,
    #[default]
    Required,
    NotSupported,
}

impl EncryptionMode {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Some(EncryptionMode::Off),
            "on" => Some(EncryptionMode::On),
            "required" => Some(EncryptionMode::Required),
            "not_supported" => Some(EncryptionMode::NotSupported),
            _ => None,
        }
    }
}

impl From<EncryptionMode> for tiberius::EncryptionLevel {
    fn from(mode: EncryptionMode) -> Self {
        match mode {
            EncryptionMode::Off => tiberius::EncryptionLevel::Off,
            EncryptionMode::On => tiberius::EncryptionLevel::On,
            EncryptionMode::Required => tiberius::EncryptionLevel::Required,
            EncryptionMode::NotSupported => tiberius::EncryptionLevel::NotSupported,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_application_name() -> String {
    DEFAULT_APPLICATION_NAME.to_string()
}

impl ConnectionConfig {
    /// Load and validate a TOML file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ConnectionConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate from `TABLESMITH_DB_*` variables. SQL Server
    /// authentication only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::MissingEnv(key));

        let port = match lookup(ENV_PORT) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "port",
                reason: format!("'{raw}' is not a port number"),
            })?,
            None => DEFAULT_PORT,
        };
        let encryption = match lookup(ENV_ENCRYPTION) {
            Some(raw) => EncryptionMode::from_db_str(&raw).ok_or_else(|| {
                ConfigError::InvalidValue {
                    field: "encryption",
                    reason: format!("'{raw}' is not one of off, on, required, not_supported"),
                }
            })?,
            None => EncryptionMode::default(),
        };
        let trust_server_certificate = match lookup(ENV_TRUST_CERT) {
            Some(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::InvalidValue {
                field: "trust_server_certificate",
                reason: format!("'{raw}' is not a boolean"),
            })?,
            None => false,
        };

        let config = ConnectionConfig {
            host: required(ENV_HOST)?,
            port,
            database: required(ENV_NAME)?,
            auth: AuthConfig::SqlServer {
                user: required(ENV_USER)?,
                password: required(ENV_PASSWORD)?,
            },
            encryption,
            trust_server_certificate,
            application_name: default_application_name(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "host",
                reason: "must not be empty".to_string(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port",
                reason: "must be > 0".to_string(),
            });
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database",
                reason: "must not be empty".to_string(),
            });
        }
        match &self.auth {
            AuthConfig::SqlServer { user, .. } if user.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    field: "auth.user",
                    reason: "must not be empty".to_string(),
                });
            }
            AuthConfig::AadToken { token } if token.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    field: "auth.token",
                    reason: "must not be empty".to_string(),
                });
            }
            _ => {}
        }
        Ok(())
    }

    /// `host:port/database`, for logs and errors.
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    pub(crate) fn to_tiberius(&self) -> tiberius::Config {
        let mut config = tiberius::Config::new();
        config.host(&self.host);
        config.port(self.port);
        config.database(&self.database);
        config.encryption(self.encryption.into());
        if self.trust_server_certificate {
            config.trust_cert();
        }
        config.application_name(&self.application_name);
        config.authentication(match &self.auth {
            AuthConfig::SqlServer { user, password } => {
                tiberius::AuthMethod::sql_server(user, password)
            }
            AuthConfig::AadToken { token } => tiberius::AuthMethod::aad_token(token),
        });
        config
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
