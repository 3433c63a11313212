//! ODBC connection strings.

use std::borrow::Cow;

use crate::error::ConnectError;

/// Keys whose values are secrets.
const SECRET_KEYS: &[&str] = &["accesstoken", "pwd", "password"];

/// Builds `Key=Value;` connection strings.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStringBuilder {
    out: String,
}

impl ConnectionStringBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Driver={name};` (always braced).
    pub fn driver(mut self, name: &str) -> Self {
        self.out.push_str("Driver=");
        self.out.push_str(&brace(name));
        self.out.push(';');
        self
    }

    /// `Key=Value;`, bracing the value when ODBC would misread it.
    pub fn field(mut self, key: &str, value: &str) -> Self {
        self.out.push_str(key);
        self.out.push('=');
        if needs_braces(value) {
            self.out.push_str(&brace(value));
        } else {
            self.out.push_str(value);
        }
        self.out.push(';');
        self
    }

    pub fn build(self) -> String {
        self.out
    }
}

fn needs_braces(value: &str) -> bool {
    value.contains([';', '{', '}']) || value.starts_with(' ') || value.ends_with(' ')
}

fn brace(value: &str) -> String {
    format!("{{{}}}", value.replace('}', "}}"))
}

/// Replace secret values with `***`.
pub fn redact_connection_string(conn_str: &str) -> String {
    let mut out = String::with_capacity(conn_str.len());
    for segment in conn_str.split_inclusive(';') {
        match segment.split_once('=') {
            Some((key, _)) if SECRET_KEYS.contains(&key.trim().to_ascii_lowercase().as_str()) => {
                out.push_str(key);
                out.push_str("=***");
                if segment.ends_with(';') {
                    out.push(';');
                }
            }
            _ => out.push_str(segment),
        }
    }
    out
}

/// Connection string as handed to the driver.
#[derive(Clone, PartialEq, Eq)]
pub enum DriverConnectString {
    /// Plain `Key=Value;` text.
    Plain(String),

    /// Percent-encoded `Key=Value;` text (`odbc_connect` style).
    UrlEncoded(String),
}

impl DriverConnectString {
    /// Text exactly as passed to the driver.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain(s) | Self::UrlEncoded(s) => s,
        }
    }

    pub fn is_url_encoded(&self) -> bool {
        matches!(self, Self::UrlEncoded(_))
    }

    /// Plain text, decoding if needed.
    pub fn decoded(&self) -> Result<Cow<'_, str>, ConnectError> {
        match self {
            Self::Plain(s) => Ok(Cow::Borrowed(s)),
            Self::UrlEncoded(s) => urlencoding::decode(s).map_err(|e| {
                ConnectError::InvalidConnectionString {
                    message: e.to_string(),
                }
            }),
        }
    }

    /// Log-safe rendering.
    pub fn redacted(&self) -> String {
        match self.decoded() {
            Ok(plain) => redact_connection_string(&plain),
            Err(_) => "<undecodable connection string>".to_string(),
        }
    }
}

impl std::fmt::Debug for DriverConnectString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = if self.is_url_encoded() {
            "UrlEncoded"
        } else {
            "Plain"
        };
        f.debug_tuple(variant).field(&self.redacted()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_basic() {
        let s = ConnectionStringBuilder::new()
            .driver("ODBC Driver 18 for SQL Server")
            .field("Server", "example.database.windows.net")
            .field("Database", "analytics")
            .build();
        assert_eq!(
            s,
            "Driver={ODBC Driver 18 for SQL Server};Server=example.database.windows.net;Database=analytics;"
        );
    }

    #[test]
    fn test_builder_braces_special_values() {
        let s = ConnectionStringBuilder::new()
            .field("Database", "a;b")
            .field("Server", "x}y")
            .build();
        assert_eq!(s, "Database={a;b};Server={x}}y};");
    }

    #[test]
    fn test_redact_access_token() {
        let s = "Driver={D};Server=s;Authentication=ActiveDirectoryAccessToken;AccessToken=abc.def;";
        assert_eq!(
            redact_connection_string(s),
            "Driver={D};Server=s;Authentication=ActiveDirectoryAccessToken;AccessToken=***;"
        );
    }

    #[test]
    fn test_redact_without_trailing_semicolon() {
        assert_eq!(redact_connection_string("PWD=hunter2"), "PWD=***");
    }

    #[test]
    fn test_url_encoded_round_trip_for_logging() {
        let raw = "Server=s;AccessToken=secret;";
        let encoded = DriverConnectString::UrlEncoded(urlencoding::encode(raw).into_owned());
        assert_eq!(encoded.decoded().unwrap(), raw);
        assert_eq!(encoded.redacted(), "Server=s;AccessToken=***;");
        assert!(!format!("{encoded:?}").contains("secret"));
    }
}
