//! Session lifecycle core for the folio portfolio and profile platform.
//!
//! - `auth`: credential storage, token inspection, session transitions
//! - `api`: authenticated request pipeline with silent token refresh
//! - `config`: backend URL and credential backend selection
//! - `models`: shapes shared with the backend and the web frontend

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthError, SessionManager};
pub use config::{Config, StoreKind};
