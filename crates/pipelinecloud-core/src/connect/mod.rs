//! Connection establishment.
//!
//! Two mutually exclusive ways to hand the token to the driver:
//!
//! - [`AttributeStrategy`]: plain connection string, token packed into
//!   pre-connection attribute [`SQL_COPT_SS_ACCESS_TOKEN`].
//! - [`EmbeddedStrategy`]: `Authentication=ActiveDirectoryAccessToken` and
//!   `AccessToken=<token>` in the connection string, URL-encoded as a whole.
//!
//! A [`ConnectionRequest`] is built by exactly one strategy and can only carry
//! one of the two forms. One call opens one connection; there is no pooling,
//! reconnection or fallback between strategies.

mod conn_str;
#[cfg(feature = "odbc")]
pub mod odbc;

use std::collections::BTreeMap;
use std::str::FromStr;

use tracing::{debug, error, info};

use crate::config::Settings;
use crate::error::ConnectError;
use crate::token_attr::{encode_token_str, SQL_COPT_SS_ACCESS_TOKEN};

pub use conn_str::{redact_connection_string, ConnectionStringBuilder, DriverConnectString};

/// Binary attributes applied before the driver handshake.
pub type PreConnectAttributes = BTreeMap<i32, Vec<u8>>;

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub driver: String,
    pub server: String,
    pub database: String,
}

impl DatabaseTarget {
    pub fn new(
        driver: impl Into<String>,
        server: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            driver: driver.into(),
            server: server.into(),
            database: database.into(),
        }
    }

    /// Connection string without any authentication field.
    pub fn base_connection_string(&self) -> ConnectionStringBuilder {
        ConnectionStringBuilder::new()
            .driver(&self.driver)
            .field("Server", &self.server)
            .field("Database", &self.database)
    }
}

impl From<&Settings> for DatabaseTarget {
    fn from(settings: &Settings) -> Self {
        Self::new(&settings.driver, &settings.server, &settings.database)
    }
}

/// Everything the driver needs for one connection attempt.
#[derive(Clone)]
pub struct ConnectionRequest {
    connection_string: DriverConnectString,
    attributes: PreConnectAttributes,
}

impl ConnectionRequest {
    /// Plain connection string plus pre-connection attributes.
    pub fn with_attributes(connection_string: String, attributes: PreConnectAttributes) -> Self {
        Self {
            connection_string: DriverConnectString::Plain(connection_string),
            attributes,
        }
    }

    /// URL-encoded connection string that carries its own credentials.
    pub fn embedded(encoded_connection_string: String) -> Self {
        Self {
            connection_string: DriverConnectString::UrlEncoded(encoded_connection_string),
            attributes: PreConnectAttributes::new(),
        }
    }

    pub fn connection_string(&self) -> &DriverConnectString {
        &self.connection_string
    }

    pub fn attributes(&self) -> &PreConnectAttributes {
        &self.attributes
    }

    /// Log-safe rendering.
    pub fn redacted(&self) -> String {
        let keys: Vec<String> = self.attributes.keys().map(i32::to_string).collect();
        if keys.is_empty() {
            self.connection_string.redacted()
        } else {
            format!(
                "{} [attrs_before: {}]",
                self.connection_string.redacted(),
                keys.join(",")
            )
        }
    }
}

impl std::fmt::Debug for ConnectionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lens: BTreeMap<i32, usize> = self.attributes.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("ConnectionRequest")
            .field("connection_string", &self.connection_string)
            .field("attribute_lengths", &lens)
            .finish()
    }
}

/// How the token reaches the driver.
pub trait ConnectionStrategy {
    fn kind(&self) -> StrategyKind;

    fn build_request(
        &self,
        target: &DatabaseTarget,
        access_token: &str,
    ) -> Result<ConnectionRequest, ConnectError>;
}

/// Token packed into pre-connection attribute 1256.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeStrategy;

impl ConnectionStrategy for AttributeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Attribute
    }

    fn build_request(
        &self,
        target: &DatabaseTarget,
        access_token: &str,
    ) -> Result<ConnectionRequest, ConnectError> {
        let connection_string = target.base_connection_string().build();
        let token_struct = encode_token_str(access_token)?;

        let mut attributes = PreConnectAttributes::new();
        attributes.insert(SQL_COPT_SS_ACCESS_TOKEN, token_struct);

        Ok(ConnectionRequest::with_attributes(
            connection_string,
            attributes,
        ))
    }
}

/// Token embedded as a connection-string field.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedStrategy;

/// `Authentication` value for access-token login.
pub const ACCESS_TOKEN_AUTHENTICATION: &str = "ActiveDirectoryAccessToken";

impl ConnectionStrategy for EmbeddedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Embedded
    }

    fn build_request(
        &self,
        target: &DatabaseTarget,
        access_token: &str,
    ) -> Result<ConnectionRequest, ConnectError> {
        let connection_string = target
            .base_connection_string()
            .field("Authentication", ACCESS_TOKEN_AUTHENTICATION)
            .field("AccessToken", access_token)
            .build();

        Ok(ConnectionRequest::embedded(
            urlencoding::encode(&connection_string).into_owned(),
        ))
    }
}

/// Strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    Attribute,
    Embedded,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attribute => "attribute",
            Self::Embedded => "embedded",
        }
    }

    pub fn strategy(self) -> Box<dyn ConnectionStrategy + Send + Sync> {
        match self {
            Self::Attribute => Box::new(AttributeStrategy),
            Self::Embedded => Box::new(EmbeddedStrategy),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "attribute" | "attrs" => Ok(Self::Attribute),
            "embedded" | "connection-string" => Ok(Self::Embedded),
            other => Err(format!("unknown connection strategy: {other}")),
        }
    }
}

/// An open database connection (the query executor seam).
pub trait DatabaseConnection {
    /// Run `sql` and return the first column of every row as text.
    fn query_column(&mut self, sql: &str) -> Result<Vec<String>, ConnectError>;

    /// Release the connection.
    fn close(self) -> Result<(), ConnectError>
    where
        Self: Sized;
}

/// Native database driver.
pub trait DatabaseDriver {
    type Connection<'d>: DatabaseConnection
    where
        Self: 'd;

    /// Open one connection. `attrs_before` is applied before the handshake.
    fn connect<'d>(
        &'d self,
        connection_string: &DriverConnectString,
        attrs_before: &PreConnectAttributes,
    ) -> Result<Self::Connection<'d>, ConnectError>;
}

/// Build the request with `strategy` and open one connection through `driver`.
pub fn connect<'d, D: DatabaseDriver>(
    driver: &'d D,
    strategy: &dyn ConnectionStrategy,
    target: &DatabaseTarget,
    access_token: &str,
) -> Result<D::Connection<'d>, ConnectError> {
    let request = strategy.build_request(target, access_token)?;
    debug!(
        strategy = %strategy.kind(),
        request = %request.redacted(),
        "opening database connection"
    );

    match driver.connect(request.connection_string(), request.attributes()) {
        Ok(conn) => {
            info!(server = %target.server, database = %target.database, "Connected to SQL Server successfully.");
            Ok(conn)
        }
        Err(e) => {
            error!(error = %e, strategy = %strategy.kind(), "Error connecting to SQL Server");
            Err(e)
        }
    }
}

/// Query used to list user tables.
pub const LIST_TABLES_SQL: &str =
    "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE';";
