//! Where the session layer sends the user when it has to leave the app.

use tracing::{info, warn};

/// Navigation side effects triggered by the session layer.
pub trait Navigator: Send + Sync {
    /// The session is gone; show the login screen.
    fn redirect_to_login(&self);

    /// Leave the app for an external page (OAuth provider).
    fn open_external(&self, url: &str);
}

/// Navigator that only records the navigation in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn redirect_to_login(&self) {
        warn!("Session ended, login required");
    }

    fn open_external(&self, url: &str) {
        info!(url = url, "Opening external page");
    }
}
