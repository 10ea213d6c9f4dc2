//! Response shapes returned by the backend's auth endpoints.
//!
//! Every auth endpoint answers with `{ success, message, data }`. The
//! envelope is validated once here so the session layer only ever sees a
//! complete `CredentialRecord` or a failure message.

use serde::Deserialize;

use super::{CredentialRecord, UserSnapshot};

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// The server's message, if it sent a non-blank one.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}

/// `data` of a successful login, register or refresh response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl AuthPayload {
    /// Convert into a full credential record. `None` if the access token is blank.
    pub fn into_record(self) -> Option<CredentialRecord> {
        if self.access_token.trim().is_empty() {
            return None;
        }
        Some(CredentialRecord {
            access_token: self.access_token,
            refresh_token: self.refresh_token.unwrap_or_default(),
            user: UserSnapshot {
                full_name: self.full_name.unwrap_or_default(),
                email: self.email.unwrap_or_default(),
                role: self.role.unwrap_or_default(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success_envelope() {
        let json = r#"{"success":true,"message":"ok","data":{"accessToken":"a.b.c","refreshToken":"r-1","fullName":"Alice Doe","email":"alice@example.com","role":"admin"}}"#;
        let env: Envelope<AuthPayload> = serde_json::from_str(json).expect("parse envelope");
        assert!(env.success);
        let record = env.data.and_then(AuthPayload::into_record).expect("record");
        assert_eq!(record.access_token, "a.b.c");
        assert_eq!(record.refresh_token, "r-1");
        assert_eq!(record.user.full_name, "Alice Doe");
        assert_eq!(record.user.role, "admin");
    }

    #[test]
    fn test_parse_failure_envelope_without_data() {
        let json = r#"{"success":false,"message":"Invalid username or password"}"#;
        let env: Envelope<AuthPayload> = serde_json::from_str(json).expect("parse envelope");
        assert!(!env.success);
        assert!(env.data.is_none());
        assert_eq!(env.message(), Some("Invalid username or password"));
    }

    #[test]
    fn test_blank_access_token_is_not_a_record() {
        let payload = AuthPayload {
            access_token: "  ".to_string(),
            refresh_token: None,
            full_name: None,
            email: None,
            role: None,
        };
        assert!(payload.into_record().is_none());
    }
}
