//! Backend notifier clients.
//!
//! The notification link never talks to a reporting backend directly. It
//! holds an injected [`NotifierClient`], registers it once at construction
//! and calls [`NotifierClient::notify`] for every message that passes its
//! filters. Implementations here cover a JSON webhook and a log-only client;
//! tests substitute a recording fake.
pub mod logging;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod webhook;

use crate::config::RegistrationOptions;
use crate::error::Result;
use crate::message::{ErrorValue, Meta, Payload};
use serde::Serialize;
use std::sync::Arc;

pub use logging::LogNotifier;
pub use webhook::WebhookNotifier;

/// Metadata sent alongside every notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotifyMetadata {
    /// The metadata of the message that triggered the notification.
    pub user: Meta,
}

/// Describes one request/response cycle observed by an instrumentation hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub(crate) fn to_meta(&self) -> Meta {
        let mut meta = Meta::new()
            .with("method", self.method.clone())
            .with("path", self.path.clone());
        if let Some(request_id) = &self.request_id {
            meta.insert(crate::message::REQUEST_ID_KEY, request_id.clone());
        }
        meta
    }
}

/// Called when a request starts.
pub type RequestHandler = Arc<dyn Fn(&RequestContext) + Send + Sync>;
/// Called when a request fails with an error.
pub type ErrorHandler = Arc<dyn Fn(&RequestContext, &ErrorValue) + Send + Sync>;

/// Request-cycle hooks a backend client may offer.
#[derive(Clone)]
pub struct Instrumentation {
    pub request_handler: RequestHandler,
    pub error_handler: ErrorHandler,
}

impl std::fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentation").finish_non_exhaustive()
    }
}

/// A client for an error-reporting backend.
pub trait NotifierClient: Send + Sync {
    /// Registers the client with a credential. Called at most once per link.
    fn register(&self, token: &str, options: &RegistrationOptions) -> Result<()>;

    /// Sends one notification.
    fn notify(&self, payload: &Payload, metadata: &NotifyMetadata) -> Result<()>;

    /// Request-cycle hooks, if the client offers any.
    fn instrumentation(self: Arc<Self>) -> Option<Instrumentation> {
        None
    }
}
