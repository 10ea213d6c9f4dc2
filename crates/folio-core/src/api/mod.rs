//! REST API client module for the folio backend.
//!
//! This module provides the `ApiClient` every part of the application uses
//! to talk to its own backend. Requests carry the session's JWT bearer
//! token; a 401 triggers one silent token refresh and retry.

pub mod client;
pub mod error;
pub mod transport;

pub use client::ApiClient;
pub use error::ApiError;
pub use transport::{join_url, ApiRequest, ApiResponse, ReqwestTransport, Transport};
