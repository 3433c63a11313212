#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Write;
use std::sync::OnceLock;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use pipelinecloud_core::{
    ConnectError, DatabaseConnection, DatabaseDriver, DriverConnectString, MapSource,
    PreConnectAttributes, Settings,
};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::RsaPrivateKey;

pub const TENANT: &str = "contoso-tenant";
pub const CLIENT_ID: &str = "11111111-2222-3333-4444-555555555555";
pub const THUMBPRINT: &str = "000102030405060708090A0B0C0D0E0F10111213";

pub struct TestKey {
    pub private_pem: String,
    pub public_pem: String,
}

/// One RSA key per test binary; generation is slow.
pub fn test_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        TestKey {
            private_pem: key.to_pkcs1_pem(LineEnding::LF).unwrap().as_str().to_owned(),
            public_pem: key.to_public_key().to_pkcs1_pem(LineEnding::LF).unwrap(),
        }
    })
}

/// PEM bundle on disk: private key first, then a dummy certificate block.
pub fn write_bundle(key: &TestKey) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(key.private_pem.as_bytes()).unwrap();
    file.write_all(b"-----BEGIN CERTIFICATE-----\nBAUG\n-----END CERTIFICATE-----\n")
        .unwrap();
    file
}

pub fn source(authority_host: &str, cert_path: &std::path::Path) -> MapSource {
    MapSource::new()
        .with("DATABASE_SERVER", "srv.database.windows.net")
        .with("DATABASE_NAME", "analytics")
        .with("TENANT_ID", TENANT)
        .with("APPLICATION_ID", CLIENT_ID)
        .with("CLIENT_CERT_PATH", cert_path.display().to_string())
        .with("CLIENT_CERT_THUMBPRINT", THUMBPRINT)
        .with("AUTHORITY_HOST", authority_host)
}

pub fn settings(authority_host: &str, cert_path: &std::path::Path) -> Settings {
    Settings::from_source(&source(authority_host, cert_path)).unwrap()
}

/// Unsigned JWT-shaped token with the given payload.
pub fn fake_access_token(payload: serde_json::Value) -> String {
    format!(
        "{}.{}.c2ln",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

pub fn token_path() -> String {
    format!("/{TENANT}/oauth2/v2.0/token")
}

/// Driver that records every call and hands out inert connections.
#[derive(Default)]
pub struct RecordingDriver {
    pub calls: RefCell<Vec<(DriverConnectString, PreConnectAttributes)>>,
    pub rows: Vec<String>,
}

pub struct RecordedConnection {
    rows: Vec<String>,
}

impl DatabaseConnection for RecordedConnection {
    fn query_column(&mut self, _sql: &str) -> Result<Vec<String>, ConnectError> {
        Ok(self.rows.clone())
    }

    fn close(self) -> Result<(), ConnectError> {
        Ok(())
    }
}

impl DatabaseDriver for RecordingDriver {
    type Connection<'d> = RecordedConnection where Self: 'd;

    fn connect<'d>(
        &'d self,
        connection_string: &DriverConnectString,
        attrs_before: &PreConnectAttributes,
    ) -> Result<Self::Connection<'d>, ConnectError> {
        self.calls
            .borrow_mut()
            .push((connection_string.clone(), attrs_before.clone()));
        Ok(RecordedConnection {
            rows: self.rows.clone(),
        })
    }
}
