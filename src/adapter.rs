//! Direct access to the notifier from outside the pipeline flow.
//!
//! Calling [`NotifierAdapter::notify`] builds an error-level message with the
//! pipeline's message factory and hands it to a private [`NotificationLink`].
//! The private link is not registered with the pipeline, so pipeline-level
//! subscription filters (such as a stage's minimum level) never apply to
//! direct calls, while readiness and enablement still do.

use crate::config::{EnvSource, LinkSettings};
use crate::error::Result;
use crate::link::{LinkPolicy, NotificationLink};
use crate::message::{Level, MessageFactory, Meta, Payload};
use crate::notification::{ErrorHandler, NotifierClient, RequestHandler};
use crate::pipeline::Pipeline;
use std::sync::Arc;

/// Exposes `notify` as if the backend client were used directly.
pub struct NotifierAdapter {
    settings: LinkSettings,
    factory: MessageFactory,
    link: NotificationLink,
    request_handler: Option<RequestHandler>,
    error_handler: Option<ErrorHandler>,
}

impl NotifierAdapter {
    /// The name the adapter is exposed under.
    pub const NAME: &'static str = "notifier";

    pub fn new(
        pipeline: &Pipeline,
        settings: LinkSettings,
        client: Arc<dyn NotifierClient>,
        env: Arc<dyn EnvSource>,
    ) -> Self {
        Self::with_policy(pipeline, settings, client, env, LinkPolicy::default())
    }

    pub fn with_policy(
        pipeline: &Pipeline,
        settings: LinkSettings,
        client: Arc<dyn NotifierClient>,
        env: Arc<dyn EnvSource>,
        policy: LinkPolicy,
    ) -> Self {
        let link = NotificationLink::with_policy(settings.clone(), client, env, policy);
        let instrumentation = link
            .notifier()
            .and_then(|notifier| notifier.clone().instrumentation());
        let (request_handler, error_handler) = match instrumentation {
            Some(hooks) => (Some(hooks.request_handler), Some(hooks.error_handler)),
            None => (None, None),
        };

        Self {
            settings,
            factory: pipeline.factory().clone(),
            link,
            request_handler,
            error_handler,
        }
    }

    /// Notifies `message` with the given metadata bundle.
    ///
    /// `None` is accepted and results in no notification.
    pub fn notify(
        &self,
        message: impl Into<Option<Payload>>,
        metadata: impl IntoIterator<Item = Meta>,
    ) -> Result<()> {
        let message = message
            .into()
            .map(|payload| self.factory.create(Level::Error, payload, metadata));
        self.link.handle(message.as_ref())
    }

    /// Request-start hook of the backend client, when the link is ready and
    /// the client offers one.
    pub fn request_handler(&self) -> Option<&RequestHandler> {
        self.request_handler.as_ref()
    }

    /// Request-error hook of the backend client, when the link is ready and
    /// the client offers one.
    pub fn error_handler(&self) -> Option<&ErrorHandler> {
        self.error_handler.as_ref()
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    pub fn link(&self) -> &NotificationLink {
        &self.link
    }
}
