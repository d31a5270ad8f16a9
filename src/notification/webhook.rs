//! A client that posts notifications as JSON to a webhook endpoint.
//!
//! The body is a plain JSON document carrying the registration options, the
//! payload and the metadata. It does not speak any vendor's wire protocol;
//! point it at a relay that does.

use super::{Instrumentation, NotifierClient, NotifyMetadata, RequestContext};
use crate::config::RegistrationOptions;
use crate::error::{LinkError, Result};
use crate::message::{ErrorValue, Payload};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

#[derive(Debug)]
struct Registration {
    token: String,
    options: RegistrationOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationBody<'a> {
    api_key: &'a str,
    #[serde(flatten)]
    options: &'a RegistrationOptions,
    payload: &'a Payload,
    meta_data: &'a NotifyMetadata,
}

/// Posts notifications to a webhook with a blocking HTTP client.
#[derive(Debug)]
pub struct WebhookNotifier {
    endpoint: String,
    client: reqwest::blocking::Client,
    registration: OnceLock<Registration>,
}

impl WebhookNotifier {
    /// Creates a new `WebhookNotifier`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
            registration: OnceLock::new(),
        })
    }

    pub fn is_registered(&self) -> bool {
        self.registration.get().is_some()
    }

    fn send_request(&self, body: &NotificationBody<'_>) -> Result<()> {
        let response = self.client.post(&self.endpoint).json(body).send();

        match response {
            Ok(res) => {
                if res.status().is_success() {
                    Ok(())
                } else {
                    let status = res.status();
                    let text = res.text().unwrap_or_default();
                    error!(
                        status = %status,
                        body = %text,
                        "Failed to deliver notification"
                    );
                    Err(LinkError::Transport(format!(
                        "status {}, body: {}",
                        status, text
                    )))
                }
            }
            Err(e) => {
                error!(error = %e, "HTTP request to notification endpoint failed");
                Err(e.into())
            }
        }
    }
}

impl NotifierClient for WebhookNotifier {
    fn register(&self, token: &str, options: &RegistrationOptions) -> Result<()> {
        let registration = Registration {
            token: token.to_string(),
            options: options.clone(),
        };
        if self.registration.set(registration).is_err() {
            debug!("Webhook notifier already registered, keeping the first registration");
        } else {
            info!(
                endpoint = %self.endpoint,
                release_stage = %options.release_stage,
                "Webhook notifier registered"
            );
        }
        Ok(())
    }

    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    fn notify(&self, payload: &Payload, metadata: &NotifyMetadata) -> Result<()> {
        let registration = self
            .registration
            .get()
            .ok_or_else(|| LinkError::Transport("webhook notifier is not registered".into()))?;

        if !registration.options.allows_release_stage() {
            debug!(
                release_stage = %registration.options.release_stage,
                "Release stage is not notified, dropping notification"
            );
            return Ok(());
        }

        let body = NotificationBody {
            api_key: &registration.token,
            options: &registration.options,
            payload,
            meta_data: metadata,
        };
        self.send_request(&body)
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
