//! Access-token packing for the SQL Server ODBC driver.
//!
//! The driver reads `SQL_COPT_SS_ACCESS_TOKEN` as an `ACCESSTOKEN` struct: a
//! 4-byte little-endian length followed by the token laid out as a wide
//! string, i.e. every token byte followed by a zero byte.

use crate::error::EncodeError;

/// Pre-connection attribute key for access-token authentication.
pub const SQL_COPT_SS_ACCESS_TOKEN: i32 = 1256;

/// Width of the length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Pack `token` into the driver's access-token attribute layout.
///
/// Output is `4 + 2 * token.len()` bytes; the prefix equals `2 * token.len()`.
pub fn encode_token_attribute(token: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let body_len = token
        .len()
        .checked_mul(2)
        .ok_or(EncodeError::TooLong { len: token.len() })?;
    let prefix = i32::try_from(body_len).map_err(|_| EncodeError::TooLong { len: token.len() })?;

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_LEN + body_len);
    buf.extend_from_slice(&prefix.to_le_bytes());
    for &byte in token {
        buf.push(byte);
        buf.push(0);
    }
    Ok(buf)
}

/// Convenience wrapper for string tokens.
pub fn encode_token_str(token: &str) -> Result<Vec<u8>, EncodeError> {
    encode_token_attribute(token.as_bytes())
}
