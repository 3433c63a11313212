//! Certificate-based client-credential token acquisition.
//!
//! The authenticator signs a client assertion with the first block of the
//! configured PEM bundle and exchanges it at the tenant's v2.0 token endpoint
//! for a token scoped to the database resource. One request per call: no
//! cache, no refresh token, no retry.

mod assertion;
mod claims;

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::cert::{load_signing_bundle, CertificateCredential};
use crate::config::Settings;
use crate::error::AuthError;

pub use assertion::{sign_client_assertion, AssertionClaims, CLIENT_ASSERTION_TYPE};
pub use claims::{decode_claims_unverified, loggable_claims};

/// User agent for token requests.
const USER_AGENT_VALUE: &str = concat!("pipelinecloud/", env!("CARGO_PKG_VERSION"));

/// A freshly issued access token and its metadata.
pub struct AccessTokenResult {
    /// The bearer token. Never logged.
    pub access_token: SecretString,

    /// Usually `Bearer`.
    pub token_type: String,

    /// Lifetime reported by the provider.
    pub expires_in: Duration,

    /// Extended lifetime, when the provider reports one.
    pub ext_expires_in: Option<Duration>,

    /// Absolute expiry computed at receipt.
    pub expires_at: DateTime<Utc>,

    /// Unverified payload, for inspection only.
    pub claims: Option<Map<String, Value>>,
}

impl AccessTokenResult {
    pub fn token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

impl std::fmt::Debug for AccessTokenResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenResult")
            .field("access_token", &"***")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("ext_expires_in", &self.ext_expires_in)
            .field("expires_at", &self.expires_at)
            .field("claims", &self.claims.as_ref().map(loggable_claims))
            .finish()
    }
}

/// Token endpoint response. Success and error bodies share one shape.
#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    ext_expires_in: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    correlation_id: Option<String>,
}

/// v1 endpoints send lifetimes as strings, v2 as numbers.
fn seconds(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Client-credential authenticator for one application and tenant.
#[derive(Debug, Clone)]
pub struct ClientCertificateAuthenticator {
    client: reqwest::Client,
    authority: String,
    token_endpoint: String,
    client_id: String,
    scope: String,
    credential: CertificateCredential,
}

impl ClientCertificateAuthenticator {
    /// Load the signing credential named by `settings` and build the client.
    pub fn new(settings: &Settings) -> Result<Self, AuthError> {
        let bundle = load_signing_bundle(&settings.cert_path)?;
        let mut credential =
            CertificateCredential::from_bundle(&bundle, &settings.cert_path, &settings.cert_thumbprint)?;
        if settings.send_x5c {
            credential = credential.with_chain(bundle.certificate_chain());
        }
        Self::with_credential(settings, credential)
    }

    /// Build with an explicit credential.
    pub fn with_credential(
        settings: &Settings,
        credential: CertificateCredential,
    ) -> Result<Self, AuthError> {
        let authority = settings.authority();
        let token_endpoint = url::Url::parse(&format!("{authority}/oauth2/v2.0/token"))
            .map_err(|e| AuthError::InvalidAuthority {
                authority: authority.clone(),
                message: e.to_string(),
            })?
            .to_string();

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| AuthError::Network {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            authority,
            token_endpoint,
            client_id: settings.application_id.clone(),
            scope: settings.scope.clone(),
            credential,
        })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Acquire a token for the database scope.
    pub async fn authenticate(&self) -> Result<AccessTokenResult, AuthError> {
        let assertion =
            sign_client_assertion(&self.credential, &self.client_id, &self.token_endpoint)?;

        debug!(
            token_endpoint = %self.token_endpoint,
            client_id = %self.client_id,
            scope = %self.scope,
            "requesting token for client"
        );

        let response = self
            .client
            .post(&self.token_endpoint)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", self.scope.as_str()),
                ("grant_type", "client_credentials"),
                ("client_assertion_type", CLIENT_ASSERTION_TYPE),
                ("client_assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Network {
                message: format!("failed to reach token endpoint: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| AuthError::Network {
            message: format!("failed to read token response: {e}"),
        })?;

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::InvalidResponse {
                message: format!("HTTP {status}: {e}"),
            })?;

        let Some(token) = parsed.access_token.filter(|t| !t.is_empty()) else {
            let error_code = parsed.error.unwrap_or_else(|| "no_access_token".to_string());
            let description = parsed
                .error_description
                .unwrap_or_else(|| format!("HTTP {status} without access_token"));
            error!(
                error = %error_code,
                correlation_id = ?parsed.correlation_id,
                "Failed to acquire token: {}",
                description
            );
            return Err(AuthError::Rejected {
                error: error_code,
                description,
            });
        };

        let expires_in = Duration::from_secs(seconds(parsed.expires_in.as_ref()).unwrap_or(0));
        let ext_expires_in = seconds(parsed.ext_expires_in.as_ref()).map(Duration::from_secs);
        let expires_at = Utc::now()
            + chrono::Duration::from_std(expires_in).unwrap_or_else(|_| chrono::Duration::zero());

        let claims = match decode_claims_unverified(&token) {
            Ok(claims) => {
                claims::log_claims(&claims);
                Some(claims)
            }
            Err(e) => {
                warn!(error = %e, "Error decoding token");
                None
            }
        };

        let token_type = parsed.token_type.unwrap_or_else(|| "Bearer".to_string());
        info!(
            token_type = %token_type,
            expires_in_secs = expires_in.as_secs(),
            expires_at = %expires_at.to_rfc3339(),
            "token acquired"
        );

        Ok(AccessTokenResult {
            access_token: SecretString::from(token),
            token_type,
            expires_in,
            ext_expires_in,
            expires_at,
            claims,
        })
    }
}
