//! A recording notifier for tests.

use super::{Instrumentation, NotifierClient, NotifyMetadata, RequestContext};
use crate::config::RegistrationOptions;
use crate::error::{LinkError, Result};
use crate::message::{ErrorValue, Payload};
use std::sync::{Arc, Mutex};

/// Records registrations, notifications and hook calls instead of sending
/// anything.
#[derive(Clone, Debug, Default)]
pub struct FakeNotifier {
    registrations: Arc<Mutex<Vec<(String, RegistrationOptions)>>>,
    notifications: Arc<Mutex<Vec<(Payload, NotifyMetadata)>>>,
    hook_calls: Arc<Mutex<Vec<String>>>,
    fail_notify: Option<String>,
    refuse_registration: bool,
    instrumented: bool,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `notify` call fails with a transport error.
    pub fn failing(message: &str) -> Self {
        Self {
            fail_notify: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Every `register` call is refused.
    pub fn refusing() -> Self {
        Self {
            refuse_registration: true,
            ..Self::default()
        }
    }

    /// Offers request-cycle hooks that record their calls.
    pub fn instrumented() -> Self {
        Self {
            instrumented: true,
            ..Self::default()
        }
    }

    pub fn registrations(&self) -> Vec<(String, RegistrationOptions)> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<(Payload, NotifyMetadata)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn notify_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    pub fn hook_calls(&self) -> Vec<String> {
        self.hook_calls.lock().unwrap().clone()
    }
}

impl NotifierClient for FakeNotifier {
    fn register(&self, token: &str, options: &RegistrationOptions) -> Result<()> {
        if self.refuse_registration {
            return Err(LinkError::Registration("token rejected".to_string()));
        }
        self.registrations
            .lock()
            .unwrap()
            .push((token.to_string(), options.clone()));
        Ok(())
    }

    fn notify(&self, payload: &Payload, metadata: &NotifyMetadata) -> Result<()> {
        if let Some(message) = &self.fail_notify {
            return Err(LinkError::Transport(message.clone()));
        }
        self.notifications
            .lock()
            .unwrap()
            .push((payload.clone(), metadata.clone()));
        Ok(())
    }

    fn instrumentation(self: Arc<Self>) -> Option<Instrumentation> {
        if !self.instrumented {
            return None;
        }
        let requests = self.hook_calls.clone();
        let errors = self.hook_calls.clone();
        Some(Instrumentation {
            request_handler: Arc::new(move |ctx: &RequestContext| {
                requests.lock().unwrap().push(format!("request {}", ctx.path));
            }),
            error_handler: Arc::new(move |ctx: &RequestContext, err: &ErrorValue| {
                errors
                    .lock()
                    .unwrap()
                    .push(format!("error {} {}", ctx.path, err.message));
            }),
        })
    }
}
