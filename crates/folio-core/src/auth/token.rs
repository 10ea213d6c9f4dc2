//! Bearer token inspection.
//!
//! Reads the claims out of a JWT-shaped token without verifying its
//! signature. Claims are only used for local UX decisions (expiry, display
//! name); the backend verifies every token it receives.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// Role assumed when a token carries no `role` claim.
pub const DEFAULT_ROLE: &str = "user";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token must have 3 segments, found {0}")]
    SegmentCount(usize),

    #[error("Token payload is not valid base64url")]
    Encoding,

    #[error("Token payload is not a JSON claims object: {0}")]
    Payload(String),

    #[error("Token is expired or has no expiry")]
    Expired,
}

/// Claims read from a token payload. Unknown claims are ignored, and a
/// known claim of an unexpected type reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Claims {
    /// Expiry, seconds since the Unix epoch. May be fractional.
    #[serde(default, deserialize_with = "lenient_number")]
    pub exp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sub: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub role: Option<String>,
}

/// Strings as-is, numbers in their decimal form, anything else as `None`.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        _ => None,
    })
}

impl Claims {
    /// `name`, else the local part of `email`, else `sub`.
    pub fn display_name(&self) -> Option<String> {
        non_blank(&self.name)
            .map(str::to_string)
            .or_else(|| {
                non_blank(&self.email)
                    .and_then(|email| email.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .or_else(|| non_blank(&self.sub).map(str::to_string))
    }

    /// `sub`, else `email`.
    pub fn identity(&self) -> Option<&str> {
        non_blank(&self.sub).or_else(|| non_blank(&self.email))
    }

    pub fn role_or_default(&self) -> &str {
        non_blank(&self.role).unwrap_or(DEFAULT_ROLE)
    }

    /// Whether the token is expired at `now_ms` (milliseconds since epoch).
    /// Tokens without an `exp` claim never count as valid.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        match self.exp {
            Some(exp) => now_ms as f64 >= exp * 1000.0,
            None => true,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Decode the payload segment of `token`.
pub fn decode(token: &str) -> Result<Claims, TokenError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::SegmentCount(segments.len()));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|_| TokenError::Encoding)?;

    serde_json::from_slice(&payload).map_err(|e| TokenError::Payload(e.to_string()))
}

/// Whether `token` is expired right now. Undecodable tokens are expired.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now().timestamp_millis())
}

pub fn is_expired_at(token: &str, now_ms: i64) -> bool {
    decode(token)
        .map(|claims| claims.is_expired_at(now_ms))
        .unwrap_or(true)
}

#[cfg(test)]
pub(crate) fn encode_for_test(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.signature", header, body)
}
