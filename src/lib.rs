//! bugsnag-link - A pipeline stage that reports error-level messages
//!
//! This library provides a notification link that sits in a logging
//! pipeline, forwards error-level messages to an error-reporting backend and
//! always lets the message continue, untouched, to the next stage.

pub mod adapter;
pub mod cli;
pub mod config;
pub mod error;
pub mod formatting;
pub mod link;
pub mod message;
pub mod notification;
pub mod pipeline;
pub mod setup;

// Re-export the main types for convenience
pub use adapter::NotifierAdapter;
pub use error::{LinkError, Result};
pub use link::{ExtractionStrategy, LinkPolicy, NotificationLink};
pub use message::{ErrorValue, Level, Message, Meta, MetaValue, Payload};
pub use notification::NotifierClient;
pub use pipeline::{Pipeline, Stage};
pub use setup::{setup, LinkSetup};
