//! Wire schema of the two credential exchanges.

use serde::{Deserialize, Serialize};

/// Username/password exchange.
pub const LOGIN_PATH: &str = "/token/";

/// Refresh-token exchange.
pub const REFRESH_PATH: &str = "/token/refresh/";

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenPairResponse {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// `refresh` is only present when the server rotates refresh tokens.
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_refresh_without_rotation() {
        let resp: RefreshResponse = serde_json::from_str(r#"{"access":"A2"}"#)
            .expect("Failed to parse refresh response");
        assert_eq!(resp.access, "A2");
        assert_eq!(resp.refresh, None);
    }

    #[test]
    fn test_parse_refresh_with_rotation() {
        let resp: RefreshResponse = serde_json::from_str(r#"{"access":"A2","refresh":"R2"}"#)
            .expect("Failed to parse refresh response");
        assert_eq!(resp.refresh.as_deref(), Some("R2"));
    }

    #[test]
    fn test_token_pair_requires_both() {
        assert!(serde_json::from_str::<TokenPairResponse>(r#"{"access":"A1"}"#).is_err());
        let pair: TokenPairResponse = serde_json::from_str(r#"{"access":"A1","refresh":"R1"}"#)
            .expect("Failed to parse token pair");
        assert_eq!((pair.access.as_str(), pair.refresh.as_str()), ("A1", "R1"));
    }

    #[test]
    fn test_login_request_shape() {
        let body = serde_json::to_value(LoginRequest { username: "alice", password: "secret" })
            .expect("serializes");
        assert_eq!(body, serde_json::json!({"username": "alice", "password": "secret"}));
    }
}
