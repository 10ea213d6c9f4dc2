//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `SessionManager`: login, registration, Google OAuth, logout, refresh
//! - `CredentialStore`: persistence of the token pair and user snapshot
//! - `token`: claim decoding and expiry checks for bearer tokens
//! - `Navigator`: navigation side effects the session layer triggers
//!
//! A session is authenticated while the stored access token's `exp` claim
//! is in the future.

pub mod credentials;
pub mod navigator;
pub mod session;
pub mod token;

pub use credentials::{CredentialStore, FileStore, KeyringStore, MemoryStore};
pub use navigator::{Navigator, TracingNavigator};
pub use session::{AuthError, SessionManager};
pub use token::{Claims, TokenError};
