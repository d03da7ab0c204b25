//! Top-level error types for the provider core.

use thiserror::Error;

use crate::assertion::AssertionError;
use crate::config::ConfigError;
use crate::credential::CredentialError;
use crate::memo::MemoError;

/// Classification attached to every error the core surfaces.
///
/// The host runtime translates `{kind, detail}` pairs into user-facing
/// diagnostics; the core never terminates the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing required input, conflicting values, or malformed material.
    Config,
    /// Network I/O failure, DNS, TLS handshake.
    Transport,
    /// Non-2xx response from a remote service.
    Remote,
    /// Response parsed but violates the expected schema.
    Protocol,
    /// A deadline elapsed.
    Timeout,
    /// Caller-initiated cancellation observed.
    Cancelled,
    /// Resource identity did not resolve.
    NotFound,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Transport => "transport",
            Self::Remote => "remote",
            Self::Protocol => "protocol",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::NotFound => "not found",
        };
        write!(f, "{}", s)
    }
}

/// Top-level error type encompassing all provider core errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Error from configuration validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error fetching a federated identity assertion.
    #[error("assertion error: {0}")]
    Assertion(#[from] AssertionError),

    /// Error from credential construction or token acquisition.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Error from the secret-change memo.
    #[error("memo error: {0}")]
    Memo(#[from] MemoError),
}

impl CoreError {
    /// Classify the error for the host runtime.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Assertion(e) => e.kind(),
            Self::Credential(e) => e.kind(),
            Self::Memo(_) => ErrorKind::Config,
        }
    }
}
