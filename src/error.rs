//! Error types shared across the notification link.

use thiserror::Error;

/// Errors surfaced by the link, its backend clients and configuration loading.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The backend client failed to deliver a notification.
    #[error("notification transport failed: {0}")]
    Transport(String),

    /// The backend client refused the registration request.
    #[error("backend registration failed: {0}")]
    Registration(String),

    /// The layered configuration could not be extracted.
    #[error("invalid configuration: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for LinkError {
    fn from(err: figment::Error) -> Self {
        LinkError::Config(Box::new(err))
    }
}

impl From<reqwest::Error> for LinkError {
    fn from(err: reqwest::Error) -> Self {
        LinkError::Transport(err.to_string())
    }
}

pub type Result<T, E = LinkError> = std::result::Result<T, E>;
