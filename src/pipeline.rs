//! A minimal message pipeline.
//!
//! Stages receive every published message in registration order. A stage may
//! declare a minimum level, in which case the pipeline skips it for quieter
//! messages; that skip is pipeline state and does not affect other stages.
//!
//! ```text
//! publish(msg) ──► stage 1 ──► stage 2 ──► ... ──► stage N
//!                    │
//!                    └─► side effects only, the message is never modified
//! ```
//!
//! Stages can also be wired explicitly, chain style, with
//! [`NotificationLink::link`](crate::link::NotificationLink::link).

use crate::config::EnvSource;
use crate::error::{LinkError, Result};
use crate::formatting::PrefixSettings;
use crate::message::{Level, Message, MessageFactory, Meta, Payload};
use std::sync::Arc;
use tracing::{error, trace};

/// A unit in an ordered pipeline of message processors.
pub trait Stage: Send + Sync {
    /// Stage name for identification and logging.
    fn name(&self) -> &str;

    /// Processes a message. `None` stands for an absent message and must be
    /// tolerated.
    fn handle(&self, message: Option<&Message>) -> Result<()>;

    /// The least severe level this stage wants to receive.
    fn min_level(&self) -> Level {
        Level::Silly
    }
}

/// Dispatches messages to stages in registration order.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    factory: MessageFactory,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factory(factory: MessageFactory) -> Self {
        Self {
            stages: Vec::new(),
            factory,
        }
    }

    pub fn add<S: Stage + 'static>(&mut self, stage: S) {
        self.stages.push(Arc::new(stage));
    }

    pub fn add_shared(&mut self, stage: Arc<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The message constructor used for messages built on behalf of callers.
    pub fn factory(&self) -> &MessageFactory {
        &self.factory
    }

    /// Builds a message with the pipeline's factory and publishes it.
    pub fn log(
        &self,
        level: Level,
        payload: impl Into<Payload>,
        metadata: impl IntoIterator<Item = Meta>,
    ) -> Result<()> {
        let message = self.factory.create(level, payload.into(), metadata);
        self.publish(&message)
    }

    /// Hands a message to every subscribed stage.
    ///
    /// A failing stage does not stop the others; the first error is returned
    /// once all stages ran.
    pub fn publish(&self, message: &Message) -> Result<()> {
        let mut first_error: Option<LinkError> = None;

        for stage in &self.stages {
            if message.level < stage.min_level() {
                trace!(stage = stage.name(), level = %message.level, "Stage not subscribed to level");
                continue;
            }
            if let Err(e) = stage.handle(Some(message)) {
                error!(stage = stage.name(), error = %e, "Stage failed to handle message");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

/// Prints messages to stdout as `prefix + location + text`.
pub struct ConsoleStage {
    prefix: PrefixSettings,
    environment: String,
    env: Arc<dyn EnvSource>,
}

impl ConsoleStage {
    pub fn new(prefix: PrefixSettings, environment: impl Into<String>, env: Arc<dyn EnvSource>) -> Self {
        Self {
            prefix,
            environment: environment.into(),
            env,
        }
    }

    pub fn render(&self, message: &Message) -> String {
        let settings = self.prefix.resolve(self.env.as_ref());
        message.prefixed(&message.text, &settings, &self.environment)
    }
}

impl Stage for ConsoleStage {
    fn name(&self) -> &str {
        "console"
    }

    fn handle(&self, message: Option<&Message>) -> Result<()> {
        if let Some(message) = message {
            println!("{}", self.render(message));
        }
        Ok(())
    }
}
