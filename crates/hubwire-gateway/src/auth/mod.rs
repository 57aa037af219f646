//! Authentication for hubs (device tokens) and users (JWT access tokens).

pub mod claims;
pub mod device;
pub mod jwt;

pub use claims::Claims;
pub use device::{DEVICE_TOKEN_HEADER, authenticate_hub, hash_device_token};
pub use jwt::JwtManager;

use crate::storage::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token is not an access token")]
    WrongTokenType,

    #[error("Unknown device token")]
    UnknownDevice,

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Pick a bearer token from an `Authorization` header value or a `token`
/// query parameter. The header wins when both are present.
pub fn extract_bearer<'a>(authorization: Option<&'a str>, query: Option<&'a str>) -> Option<&'a str> {
    if let Some(value) = authorization
        && let Some(token) = value.strip_prefix("Bearer ")
        && !token.trim().is_empty()
    {
        return Some(token.trim());
    }
    query.map(str::trim).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_wins_over_query() {
        assert_eq!(extract_bearer(Some("Bearer abc"), Some("xyz")), Some("abc"));
        assert_eq!(extract_bearer(None, Some("xyz")), Some("xyz"));
        assert_eq!(extract_bearer(Some("Basic abc"), Some("xyz")), Some("xyz"));
        assert_eq!(extract_bearer(Some("Bearer  "), None), None);
        assert_eq!(extract_bearer(None, Some("")), None);
    }
}
