//! Data models shared between the session layer and the HTTP boundary.
//!
//! - `UserSnapshot`, `CredentialRecord`: what a signed-in client keeps locally
//! - `Registration`: payload for creating an account
//! - `Envelope`, `AuthPayload`: backend response shapes for the auth endpoints

pub mod account;
pub mod envelope;

pub use account::{CredentialRecord, Registration, UserSnapshot};
pub use envelope::{AuthPayload, Envelope};
