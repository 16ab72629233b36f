//! # Remote API Error Types
//!
//! What can go wrong talking to the map API. Whether a given error ends the
//! batch or the run is decided by the caller.

use crate::geo::Area;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("{operation}: transport error: {message}")]
    Transport { operation: String, message: String },

    #[error("{operation}: HTTP {status}: {body}")]
    Rejected {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("{operation}: invalid response: {message}")]
    InvalidResponse { operation: String, message: String },

    #[error("too much throttling on {area}: giving up after {attempts} attempts")]
    ThrottleExhausted { area: Area, attempts: u32 },

    #[error("could not render payload: {message}")]
    Payload { message: String },

    #[error("client configuration error: {message}")]
    Configuration { message: String },
}

impl RemoteError {
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn rejected(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }

    pub fn invalid_response(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// HTTP status if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
