//! Signed client assertion (RFC 7523) for the certificate credential.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::cert::CertificateCredential;
use crate::error::AuthError;

/// `client_assertion_type` form value.
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Assertion lifetime in seconds.
pub const ASSERTION_LIFETIME_SECS: i64 = 600;

/// Claims of the client assertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub aud: String,
    pub iss: String,
    pub sub: String,
    pub jti: String,
    pub nbf: i64,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(client_id: &str, token_endpoint: &str) -> Self {
        let now = Utc::now().timestamp();
        Self {
            aud: token_endpoint.to_string(),
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            nbf: now,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        }
    }
}

/// Sign a fresh assertion for `client_id` addressed to `token_endpoint`.
pub fn sign_client_assertion(
    credential: &CertificateCredential,
    client_id: &str,
    token_endpoint: &str,
) -> Result<String, AuthError> {
    let key = EncodingKey::from_rsa_pem(credential.key_pem().as_bytes()).map_err(|e| {
        AuthError::Signing {
            message: format!("unsupported private key: {e}"),
        }
    })?;

    let mut header = Header::new(Algorithm::RS256);
    header.x5t = Some(credential.thumbprint().x5t());
    header.x5c = credential.chain().map(<[String]>::to_vec);

    let claims = AssertionClaims::new(client_id, token_endpoint);

    encode(&header, &claims, &key).map_err(|e| AuthError::Signing {
        message: e.to_string(),
    })
}
