//! A client that writes notifications to the log instead of a remote backend.
//!
//! Useful for dry runs and local development: every notification that would
//! have gone upstream shows up as a structured `warn` event.

use super::{Instrumentation, NotifierClient, NotifyMetadata, RequestContext};
use crate::config::RegistrationOptions;
use crate::error::Result;
use crate::message::{ErrorValue, Payload};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, OnceLock,
};
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
pub struct LogNotifier {
    options: OnceLock<RegistrationOptions>,
    delivered: AtomicUsize,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of notifications written so far.
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

impl NotifierClient for LogNotifier {
    fn register(&self, _token: &str, options: &RegistrationOptions) -> Result<()> {
        if self.options.set(options.clone()).is_ok() {
            info!(release_stage = %options.release_stage, "Log notifier registered");
        }
        Ok(())
    }

    fn notify(&self, payload: &Payload, metadata: &NotifyMetadata) -> Result<()> {
        if let Some(options) = self.options.get() {
            if !options.allows_release_stage() {
                debug!(release_stage = %options.release_stage, "Release stage is not notified");
                return Ok(());
            }
        }

        let user = serde_json::to_string(&metadata.user).unwrap_or_default();
        match payload {
            Payload::Text(text) => warn!(%user, "notification: {}", text),
            Payload::Error(error) => warn!(
                %user,
                stack = error.stack.as_deref().unwrap_or(""),
                "notification: {}",
                error
            ),
        }
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn instrumentation(self: Arc<Self>) -> Option<Instrumentation> {
        let notifier = self;
        Some(Instrumentation {
            request_handler: Arc::new(|ctx: &RequestContext| {
                debug!(method = %ctx.method, path = %ctx.path, "Request started");
            }),
            error_handler: Arc::new(move |ctx: &RequestContext, err: &ErrorValue| {
                let metadata = NotifyMetadata { user: ctx.to_meta() };
                if let Err(e) = notifier.notify(&Payload::Error(err.clone()), &metadata) {
                    error!(error = %e, path = %ctx.path, "Failed to report request error");
                }
            }),
        })
    }
}
