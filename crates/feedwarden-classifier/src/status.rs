//! Process-wide classification error status.
//!
//! [`ErrorStatusBoard`] is the single shared cell for [`ErrorStatus`]. Writes
//! are total overwrites, so concurrent call sites race benignly: last write
//! wins. Callers record an outcome only once they know it still matters; a
//! reply for a discarded context leaves the status alone.

use std::sync::Arc;

use chrono::Utc;
use feedwarden_store::{ErrorKind, ErrorStatus, SettingsStore};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{ClassifyError, ClassifyResult};

/// Badge text for a status: `"!"` while auth or rate-limit failures stand.
pub fn badge_text(status: &ErrorStatus) -> &'static str {
    match status.kind {
        ErrorKind::Auth | ErrorKind::RateLimit => "!",
        ErrorKind::None => "",
    }
}

/// Shared holder of the current [`ErrorStatus`], mirrored into settings.
pub struct ErrorStatusBoard {
    tx: watch::Sender<ErrorStatus>,
    settings: Option<Arc<dyn SettingsStore>>,
}

impl ErrorStatusBoard {
    /// Board that only lives in memory.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ErrorStatus::none());
        Self { tx, settings: None }
    }

    /// Board seeded from and mirrored into a settings store.
    pub async fn with_settings(settings: Arc<dyn SettingsStore>) -> Self {
        let initial = match settings.get().await {
            Ok(s) => s.error_status,
            Err(e) => {
                warn!(error = %e, "failed to read stored error status");
                ErrorStatus::none()
            }
        };
        let (tx, _) = watch::channel(initial);
        Self {
            tx,
            settings: Some(settings),
        }
    }

    pub fn current(&self) -> ErrorStatus {
        self.tx.borrow().clone()
    }

    /// Observe status changes (drives the badge).
    pub fn subscribe(&self) -> watch::Receiver<ErrorStatus> {
        self.tx.subscribe()
    }

    /// A successful call clears any standing status.
    pub async fn record_success(&self) {
        if self.tx.borrow().is_none() {
            return;
        }
        info!(event = "error_status.cleared", "classification succeeded");
        self.publish(ErrorStatus::none()).await;
    }

    /// Auth and rate-limit failures overwrite the status; others leave it.
    pub async fn record_failure(&self, err: &ClassifyError) {
        let Some(kind) = err.status_kind() else {
            return;
        };
        warn!(event = "error_status.set", kind = %kind, error = %err);
        self.publish(ErrorStatus::failed(kind, Utc::now())).await;
    }

    /// Record the outcome of any classification call.
    pub async fn record<T>(&self, result: &ClassifyResult<T>) {
        match result {
            Ok(_) => self.record_success().await,
            Err(e) => self.record_failure(e).await,
        }
    }

    async fn publish(&self, status: ErrorStatus) {
        self.tx.send_replace(status.clone());
        if let Some(settings) = &self.settings {
            if let Err(e) = settings.set_error_status(status).await {
                warn!(error = %e, "failed to persist error status");
            }
        }
    }
}

impl Default for ErrorStatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
