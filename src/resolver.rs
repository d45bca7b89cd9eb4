//! Identifier resolution for `/users/{id}` path parameters.

use thiserror::Error;

use crate::models::UserId;

/// Raised when a path identifier is not a plain base-10 integer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid id: {raw:?}")]
pub struct ParseError {
    pub raw: String,
}

/// resolve
///
/// Converts a raw path segment into a `UserId`. The whole string must be ASCII digits:
/// `"42abc"`, `"-1"`, `"+7"`, `" 7"` and `""` are all rejected, as is anything that overflows
/// the key type.
pub fn resolve(raw: &str) -> Result<UserId, ParseError> {
    let invalid = || ParseError { raw: raw.to_string() };

    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    raw.parse::<UserId>().map_err(|_| invalid())
}
