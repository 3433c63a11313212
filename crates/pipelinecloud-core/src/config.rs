//! Configuration surface.
//!
//! | Environment Variable | Required | Description |
//! |----------------------|----------|-------------|
//! | `TENANT_ID` | yes | Azure AD tenant id |
//! | `APPLICATION_ID` | yes | Application (client) id of the service principal |
//! | `CLIENT_CERT_THUMBPRINT` | yes | Hex SHA-1 thumbprint of the registered certificate |
//! | `CLIENT_CERT_PATH` | yes | PEM file, private key first |
//! | `DATABASE_SERVER` | yes | SQL Server host |
//! | `DATABASE_NAME` | yes | Database name |
//! | `AUTHORITY_HOST` | no | Identity provider host (default: `https://login.microsoftonline.com`) |
//! | `DATABASE_SCOPE` | no | Token scope (default: `https://database.windows.net/.default`) |
//! | `ODBC_DRIVER` | no | Driver name (default: `ODBC Driver 18 for SQL Server`) |
//! | `PIPELINECLOUD_HTTP_TIMEOUT` | no | Token request timeout in seconds, at least 1 (default: 30) |
//! | `CLIENT_CERT_SEND_X5C` | no | Send the public certificate chain in the assertion |

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

use crate::error::ConfigError;

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const DEFAULT_DATABASE_SCOPE: &str = "https://database.windows.net/.default";
pub const DEFAULT_ODBC_DRIVER: &str = "ODBC Driver 18 for SQL Server";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Required configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigKey {
    DatabaseServer,
    DatabaseName,
    TenantId,
    ApplicationId,
    ClientCertPath,
    ClientCertThumbprint,
}

impl ConfigKey {
    /// All required keys, in check order.
    pub const REQUIRED: [ConfigKey; 6] = [
        ConfigKey::DatabaseServer,
        ConfigKey::DatabaseName,
        ConfigKey::TenantId,
        ConfigKey::ApplicationId,
        ConfigKey::ClientCertPath,
        ConfigKey::ClientCertThumbprint,
    ];

    /// Environment variable name.
    pub fn env_name(self) -> &'static str {
        match self {
            Self::DatabaseServer => "DATABASE_SERVER",
            Self::DatabaseName => "DATABASE_NAME",
            Self::TenantId => "TENANT_ID",
            Self::ApplicationId => "APPLICATION_ID",
            Self::ClientCertPath => "CLIENT_CERT_PATH",
            Self::ClientCertThumbprint => "CLIENT_CERT_THUMBPRINT",
        }
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.env_name())
    }
}

/// Read-only source of named configuration values.
pub trait ConfigSource {
    /// Raw value for `name`, if any.
    fn get(&self, name: &str) -> Option<String>;

    /// Value for `name` with surrounding whitespace removed; empty counts as absent.
    fn get_non_empty(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// In-memory source.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: HashMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Remove a value.
    pub fn without(mut self, name: &str) -> Self {
        self.values.remove(name);
        self
    }
}

impl ConfigSource for MapSource {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

impl<S: ConfigSource + ?Sized> ConfigSource for &S {
    fn get(&self, name: &str) -> Option<String> {
        (**self).get(name)
    }
}

/// Required keys that are absent or empty, in check order.
pub fn missing_keys(source: &dyn ConfigSource) -> Vec<ConfigKey> {
    ConfigKey::REQUIRED
        .into_iter()
        .filter(|key| source.get_non_empty(key.env_name()).is_none())
        .collect()
}

/// Validated configuration, built once at process start.
#[derive(Debug, Clone)]
pub struct Settings {
    pub tenant_id: String,
    pub application_id: String,
    pub cert_thumbprint: String,
    pub cert_path: PathBuf,
    pub server: String,
    pub database: String,
    pub authority_host: String,
    pub scope: String,
    pub driver: String,
    pub timeout_secs: u64,
    pub send_x5c: bool,
}

impl Settings {
    /// Build settings, failing with every missing key at once.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let missing = missing_keys(source);
        if !missing.is_empty() {
            return Err(ConfigError {
                missing: missing.iter().map(|k| k.env_name().to_string()).collect(),
            });
        }

        let required = |key: ConfigKey| source.get_non_empty(key.env_name()).unwrap_or_default();

        Ok(Self {
            tenant_id: required(ConfigKey::TenantId),
            application_id: required(ConfigKey::ApplicationId),
            cert_thumbprint: required(ConfigKey::ClientCertThumbprint),
            cert_path: PathBuf::from(required(ConfigKey::ClientCertPath)),
            server: required(ConfigKey::DatabaseServer),
            database: required(ConfigKey::DatabaseName),
            authority_host: source
                .get_non_empty("AUTHORITY_HOST")
                .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
            scope: source
                .get_non_empty("DATABASE_SCOPE")
                .unwrap_or_else(|| DEFAULT_DATABASE_SCOPE.to_string()),
            driver: source
                .get_non_empty("ODBC_DRIVER")
                .unwrap_or_else(|| DEFAULT_ODBC_DRIVER.to_string()),
            timeout_secs: http_timeout_secs(source),
            send_x5c: source
                .get_non_empty("CLIENT_CERT_SEND_X5C")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    /// Build settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&EnvSource)
    }

    /// Authority URI for the configured tenant.
    pub fn authority(&self) -> String {
        format!("{}/{}", self.authority_host.trim_end_matches('/'), self.tenant_id)
    }

    /// Override the identity provider host.
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }
}

/// Token request timeout. Zero or unparseable values fall back to the default.
fn http_timeout_secs(source: &dyn ConfigSource) -> u64 {
    let Some(raw) = source.get_non_empty("PIPELINECLOUD_HTTP_TIMEOUT") else {
        return DEFAULT_HTTP_TIMEOUT_SECS;
    };

    match raw.parse::<u64>() {
        Ok(0) => {
            warn!(
                default = DEFAULT_HTTP_TIMEOUT_SECS,
                "PIPELINECLOUD_HTTP_TIMEOUT must be at least 1 second, using default"
            );
            DEFAULT_HTTP_TIMEOUT_SECS
        }
        Ok(secs) => secs,
        Err(e) => {
            warn!(
                value = %raw,
                error = %e,
                default = DEFAULT_HTTP_TIMEOUT_SECS,
                "invalid PIPELINECLOUD_HTTP_TIMEOUT, using default"
            );
            DEFAULT_HTTP_TIMEOUT_SECS
        }
    }
}
