//! Account models kept on the client.
//!
//! These are display/UX snapshots only. The backend stays authoritative
//! for permissions.

use serde::{Deserialize, Serialize};

/// Role string the admin console checks for.
const ADMIN_ROLE: &str = "admin";

/// Denormalized user information stored next to the tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserSnapshot {
    pub full_name: String,
    pub email: String,
    pub role: String,
}

impl UserSnapshot {
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case(ADMIN_ROLE)
    }
}

/// Everything a signed-in client persists. Always written and cleared as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CredentialRecord {
    pub access_token: String,
    /// Empty for sessions established through OAuth.
    #[serde(default)]
    pub refresh_token: String,
    pub user: UserSnapshot,
}

impl CredentialRecord {
    /// The access token, unless it is blank.
    pub fn access_token(&self) -> Option<&str> {
        Some(self.access_token.as_str()).filter(|t| !t.is_empty())
    }

    /// The refresh token, unless it is blank.
    pub fn refresh_token(&self) -> Option<&str> {
        Some(self.refresh_token.as_str()).filter(|t| !t.is_empty())
    }
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Registration {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_tokens_read_as_absent() {
        let record = CredentialRecord {
            access_token: String::new(),
            refresh_token: String::new(),
            user: UserSnapshot::default(),
        };
        assert_eq!(record.access_token(), None);
        assert_eq!(record.refresh_token(), None);
    }

    #[test]
    fn test_is_admin_ignores_case() {
        let mut user = UserSnapshot {
            full_name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            role: "ADMIN".to_string(),
        };
        assert!(user.is_admin());
        user.role = "user".to_string();
        assert!(!user.is_admin());
    }

    #[test]
    fn test_registration_serializes_camel_case() {
        let reg = Registration {
            full_name: "Ada Lovelace".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let json = serde_json::to_value(&reg).expect("serialize registration");
        assert_eq!(json["fullName"], "Ada Lovelace");
        assert_eq!(json["username"], "ada");
    }
}
