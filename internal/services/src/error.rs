use std::fmt::{Debug, Display};

use thiserror::Error;
use tokio::sync::mpsc;

/// Possible errors from a collaborator.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{service} did not find {what}")]
    NotFound { service: &'static str, what: String },

    #[error("channel send error: {0}")]
    Send(String),

    #[error("{service} is unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },
}

impl Error {
    pub fn not_found<W: Display>(service: &'static str, what: W) -> Self {
        Self::NotFound {
            service,
            what: what.to_string(),
        }
    }

    pub fn unavailable<M: Display>(service: &'static str, message: M) -> Self {
        Self::Unavailable {
            service,
            message: message.to_string(),
        }
    }
}

impl<T: Debug> From<mpsc::error::SendError<T>> for Error {
    fn from(err: mpsc::error::SendError<T>) -> Self {
        Self::Send(format!("{:?}", err))
    }
}
