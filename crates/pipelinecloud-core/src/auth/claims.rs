//! Unverified claim inspection for diagnostics.
//!
//! The database verifies the token; this only reads the payload so operators
//! can see audience, tenant and expiry in debug logs.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::TokenDecodeError;

/// Claims that are safe to print.
const LOGGABLE_CLAIMS: &[&str] = &[
    "aud", "iss", "iat", "nbf", "exp", "appid", "azp", "tid", "oid", "sub", "idtyp", "ver",
];

/// Decode the JWT payload without checking the signature.
pub fn decode_claims_unverified(token: &str) -> Result<Map<String, Value>, TokenDecodeError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenDecodeError {
            reason: format!("expected 3 segments, got {}", parts.len()),
        });
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| TokenDecodeError {
            reason: format!("payload is not base64url: {e}"),
        })?;

    match serde_json::from_slice::<Value>(&payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(TokenDecodeError {
            reason: "payload is not a JSON object".into(),
        }),
        Err(e) => Err(TokenDecodeError {
            reason: format!("payload is not JSON: {e}"),
        }),
    }
}

/// Subset of `claims` that may be logged.
pub fn loggable_claims(claims: &Map<String, Value>) -> Map<String, Value> {
    claims
        .iter()
        .filter(|(k, _)| LOGGABLE_CLAIMS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub(crate) fn log_claims(claims: &Map<String, Value>) {
    let names: Vec<&str> = claims.keys().map(String::as_str).collect();
    let shown = Value::Object(loggable_claims(claims));
    debug!(claim_names = ?names, claims = %shown, "decoded token claims");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_decode_payload() {
        let token = token_with_payload(r#"{"aud":"https://database.windows.net/","tid":"t1","exp":1700000000}"#);
        let claims = decode_claims_unverified(&token).unwrap();
        assert_eq!(claims["aud"], "https://database.windows.net/");
        assert_eq!(claims["exp"], 1_700_000_000);
    }

    #[test]
    fn test_opaque_token_fails() {
        let err = decode_claims_unverified("not-a-jwt").unwrap_err();
        assert!(err.reason.contains("3 segments"));
    }

    #[test]
    fn test_non_object_payload_fails() {
        let token = token_with_payload("[1,2,3]");
        assert!(decode_claims_unverified(&token).is_err());
    }

    #[test]
    fn test_loggable_subset() {
        let token = token_with_payload(r#"{"aud":"db","tid":"t1","xms_secret":"x","roles":["a"]}"#);
        let claims = decode_claims_unverified(&token).unwrap();
        let safe = loggable_claims(&claims);
        assert!(safe.contains_key("aud"));
        assert!(safe.contains_key("tid"));
        assert!(!safe.contains_key("xms_secret"));
        assert!(!safe.contains_key("roles"));
    }

    #[test]
    fn test_log_claims_accepts_decoded_payload() {
        let token = token_with_payload(r#"{"aud":"db","exp":1700000000,"roles":["a"]}"#);
        let claims = decode_claims_unverified(&token).unwrap();
        log_claims(&claims);
        log_claims(&Map::new());
    }
}
