//! Host-level user notices.

use tracing::warn;
use viewhost_types::AppId;

/// Shows a host-level alert to the user.
pub trait Notifier: Send + Sync {
    /// `source` is the application that raised the alert, `None` for the host itself.
    fn alert(&self, source: Option<&AppId>, message: &str);
}

/// Notifier that writes alerts to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, source: Option<&AppId>, message: &str) {
        match source {
            Some(app_id) => warn!(app_id = %app_id, "ALERT: {}", message),
            None => warn!("ALERT: {}", message),
        }
    }
}
