//! Entry point used to plug the link into a host pipeline.

use crate::adapter::NotifierAdapter;
use crate::config::{EnvSource, LinkSettings, TOKEN_ENV, TOKEN_FALLBACK_ENV};
use crate::link::NotificationLink;
use crate::notification::NotifierClient;
use crate::pipeline::Pipeline;
use std::sync::Arc;

/// Everything a host needs to install the link and its adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSetup {
    /// Settings for both the pipeline link and the adapter's private link.
    pub settings: LinkSettings,
    /// The name the adapter should be exposed under.
    pub adapter_name: &'static str,
}

/// Prepares the link settings, taking the token from `BUGS_TOKEN` (or
/// `BUGSNAG_TOKEN`) when the settings carry none.
pub fn setup(mut settings: LinkSettings, env: &dyn EnvSource) -> LinkSetup {
    if settings.token.is_none() {
        settings.token = env.var(TOKEN_ENV).or_else(|| env.var(TOKEN_FALLBACK_ENV));
    }
    LinkSetup {
        settings,
        adapter_name: NotifierAdapter::NAME,
    }
}

impl LinkSetup {
    pub fn link(&self, client: Arc<dyn NotifierClient>, env: Arc<dyn EnvSource>) -> NotificationLink {
        NotificationLink::new(self.settings.clone(), client, env)
    }

    pub fn adapter(
        &self,
        pipeline: &Pipeline,
        client: Arc<dyn NotifierClient>,
        env: Arc<dyn EnvSource>,
    ) -> NotifierAdapter {
        NotifierAdapter::new(pipeline, self.settings.clone(), client, env)
    }
}
