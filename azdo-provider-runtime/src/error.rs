//! Error types for the runtime crate.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use azdo_provider_core::{CredentialError, ErrorKind};

use crate::operations::OperationStatus;

/// Error type for REST calls, operation waits, and resource callbacks.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Network I/O failure reaching Azure DevOps.
    #[error("network error: {message}")]
    Transport { message: String },

    /// Non-2xx response other than 404.
    #[error("Azure DevOps returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    /// A response parsed but violated the expected shape.
    #[error("response malformed: {message}")]
    Protocol { message: String },

    /// The addressed entity does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// A tracked operation ended in a terminal failure state.
    #[error("operation {id} ended as {status}: {message}")]
    OperationFailed {
        id: Uuid,
        status: OperationStatus,
        message: String,
    },

    /// A deadline elapsed.
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// The caller cancelled the call.
    #[error("operation cancelled")]
    Cancelled,

    /// Producing an authorization header failed.
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl RuntimeError {
    /// Classify the error for the host runtime.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Remote { .. } | Self::OperationFailed { .. } => ErrorKind::Remote,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Credential(e) => e.kind(),
        }
    }
}
