//! The notification link.
//!
//! A pipeline stage that forwards error-level messages to an error-reporting
//! backend. For every message it:
//!
//! 1. checks readiness (a registered backend) and enablement,
//! 2. applies the per-message `notify` override,
//! 3. notifies only `error` messages,
//! 4. builds the payload according to its [`ExtractionStrategy`],
//! 5. forwards the untouched message to its successor, exactly once, whether
//!    or not a notification was sent or failed.

use crate::config::{env_flag, EnvSource, LinkSettings, SendFailure, LOGGING_ENV};
use crate::error::Result;
use crate::message::{ErrorValue, Level, Message, Payload};
use crate::notification::{NotifierClient, NotifyMetadata};
use crate::pipeline::Stage;
use std::sync::Arc;
use tracing::{debug, error, instrument, trace, warn};

/// How the notify payload is derived from a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Use `meta.error`, else the first error-typed metadata value, else the
    /// text. The error is cloned and the outgoing text gets the formatted
    /// prefix.
    EmbeddedError,
    /// Synthesize an error from the text and `meta.stack` when a stack is
    /// present, else send the text. No prefix, no embedded-error lookup.
    StackSynthesis,
}

/// Default enablement plus payload extraction.
///
/// Two policies exist because the stream and chain flavours of this stage
/// disagree: the stream flavour notifies unless switched off, the chain
/// flavour stays silent unless switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPolicy {
    /// Enablement when neither `BUGSNAG_LOGGING` nor the settings decide.
    pub default_enabled: bool,
    pub extraction: ExtractionStrategy,
}

impl LinkPolicy {
    /// Fail-open with embedded-error extraction.
    pub const fn stream() -> Self {
        Self {
            default_enabled: true,
            extraction: ExtractionStrategy::EmbeddedError,
        }
    }

    /// Fail-closed with stack synthesis.
    pub const fn chain() -> Self {
        Self {
            default_enabled: false,
            extraction: ExtractionStrategy::StackSynthesis,
        }
    }
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self::stream()
    }
}

/// A pipeline stage that notifies an error-reporting backend.
pub struct NotificationLink {
    settings: LinkSettings,
    policy: LinkPolicy,
    env: Arc<dyn EnvSource>,
    /// Present only when registration succeeded.
    notifier: Option<Arc<dyn NotifierClient>>,
    release_stage: String,
    next: Option<Arc<dyn Stage>>,
}

impl NotificationLink {
    /// Creates a link with the default (stream) policy.
    pub fn new(
        settings: LinkSettings,
        client: Arc<dyn NotifierClient>,
        env: Arc<dyn EnvSource>,
    ) -> Self {
        Self::with_policy(settings, client, env, LinkPolicy::default())
    }

    /// Creates a link, registering `client` once if a token is configured.
    ///
    /// A missing token or a refused registration leaves the link permanently
    /// not ready. Neither is fatal.
    pub fn with_policy(
        settings: LinkSettings,
        client: Arc<dyn NotifierClient>,
        env: Arc<dyn EnvSource>,
        policy: LinkPolicy,
    ) -> Self {
        let options = settings.registration_options(env.as_ref());
        let notifier = match settings.token() {
            Some(token) => match client.register(token, &options) {
                Ok(()) => {
                    debug!(
                        release_stage = %options.release_stage,
                        stages = ?options.notify_release_stages,
                        "Bugsnag link registered"
                    );
                    Some(client)
                }
                Err(e) => {
                    error!(error = %e, "Bugsnag registration failed, link disabled");
                    None
                }
            },
            None => {
                warn!("Bugsnag logging was not initialized due to a missing token");
                None
            }
        };

        Self {
            settings,
            policy,
            env,
            notifier,
            release_stage: options.release_stage,
            next: None,
        }
    }

    /// Whether a backend client was registered.
    pub fn is_ready(&self) -> bool {
        self.notifier.is_some()
    }

    /// Resolves enablement: `BUGSNAG_LOGGING` when it is literally `"true"`
    /// or `"false"`, then the settings flag, then the policy default.
    pub fn is_enabled(&self) -> bool {
        env_flag(self.env.as_ref(), LOGGING_ENV)
            .or(self.settings.logging)
            .unwrap_or(self.policy.default_enabled)
    }

    pub fn notifier(&self) -> Option<&Arc<dyn NotifierClient>> {
        self.notifier.as_ref()
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    pub fn policy(&self) -> LinkPolicy {
        self.policy
    }

    /// The release stage resolved at construction.
    pub fn release_stage(&self) -> &str {
        &self.release_stage
    }

    /// Attaches a successor stage.
    pub fn link(&mut self, next: Arc<dyn Stage>) {
        self.next = Some(next);
    }

    /// Passes a message to the successor stage, if any.
    pub fn next(&self, message: Option<&Message>) -> Result<()> {
        match &self.next {
            Some(next) => next.handle(message),
            None => Ok(()),
        }
    }

    /// Notifies if the message qualifies, then forwards it.
    ///
    /// Forwarding always happens exactly once. A notification failure is
    /// returned after forwarding unless the settings ask to log it instead.
    pub fn handle(&self, message: Option<&Message>) -> Result<()> {
        let notified = self.dispatch(message);
        let forwarded = self.next(message);
        notified.and(forwarded)
    }

    fn dispatch(&self, message: Option<&Message>) -> Result<()> {
        let enabled = self.is_enabled();
        let (Some(notifier), Some(message)) = (&self.notifier, message) else {
            trace!(ready = self.is_ready(), "Nothing to notify");
            metrics::counter!("notifications_skipped_total").increment(1);
            return Ok(());
        };

        let notify = enabled && message.meta.notify_override().unwrap_or(true);
        if message.level != Level::Error || !notify {
            trace!(level = %message.level, enabled, notify, "Message not notified");
            metrics::counter!("notifications_skipped_total").increment(1);
            return Ok(());
        }

        self.send(notifier.as_ref(), message)
    }

    #[instrument(skip_all, fields(release_stage = %self.release_stage))]
    fn send(&self, notifier: &dyn NotifierClient, message: &Message) -> Result<()> {
        let payload = self.payload(message);
        let metadata = NotifyMetadata {
            user: message.meta.clone(),
        };

        match notifier.notify(&payload, &metadata) {
            Ok(()) => {
                metrics::counter!("notifications_sent_total").increment(1);
                debug!("Notification sent");
                Ok(())
            }
            Err(e) => {
                metrics::counter!("notifications_failed_total").increment(1);
                match self.settings.on_send_failure {
                    SendFailure::Propagate => Err(e),
                    SendFailure::Log => {
                        error!(error = %e, "Failed to send notification");
                        Ok(())
                    }
                }
            }
        }
    }

    /// Builds the outgoing payload. The message itself is only read; an
    /// embedded error is cloned before its text is prefixed.
    pub fn payload(&self, message: &Message) -> Payload {
        match self.policy.extraction {
            ExtractionStrategy::EmbeddedError => {
                let settings = self.settings.prefix.resolve(self.env.as_ref());
                match message.meta.resolve_error() {
                    Some(error) => {
                        let mut clone = error.clone();
                        clone.message = message.prefixed(&error.message, &settings, &self.release_stage);
                        Payload::Error(clone)
                    }
                    None => Payload::Text(message.prefixed(
                        &message.text,
                        &settings,
                        &self.release_stage,
                    )),
                }
            }
            ExtractionStrategy::StackSynthesis => match message.meta.stack() {
                Some(stack) => Payload::Error(ErrorValue::new(message.text.clone()).with_stack(stack)),
                None => Payload::Text(message.text.clone()),
            },
        }
    }
}

impl Stage for NotificationLink {
    fn name(&self) -> &str {
        "bugsnag"
    }

    fn handle(&self, message: Option<&Message>) -> Result<()> {
        NotificationLink::handle(self, message)
    }

    fn min_level(&self) -> Level {
        self.settings.min_level(self.env.as_ref())
    }
}
