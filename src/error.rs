//! Error handling types for utsushi
//!
//! Absence (untracked document, no projection, non-user code) is never an
//! error here; those outcomes are `Option`s. The types below cover the cases
//! that callers must be able to tell apart.

use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Crate-wide error for configuration and tooling paths.
#[derive(Debug, Error)]
pub enum UtsushiError {
    /// Configuration error
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for crate-wide operations
pub type UtsushiResult<T> = Result<T, UtsushiError>;

impl UtsushiError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        UtsushiError::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        UtsushiError::Internal(message.into())
    }
}

/// Why a virtual document could not be brought in line with its host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The caller's cancellation token fired while waiting.
    #[error("synchronization cancelled")]
    Cancelled,

    /// The generator did not catch up within the configured bound.
    #[error("synchronization timed out after {timeout:?}")]
    TimedOut { timeout: Duration },

    /// The host document was added or removed while the wait was pending.
    #[error("synchronization aborted: {uri} was added or removed")]
    Aborted { uri: Url },

    /// The host document is not tracked by the manager.
    #[error("document not tracked: {uri}")]
    NotTracked { uri: Url },
}

/// Faults raised by an external per-language provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider failed: {0}")]
    Failed(String),

    #[error("provider returned malformed data: {0}")]
    Malformed(String),

    #[error("provider request cancelled")]
    Cancelled,
}

/// A change event whose old/new pairing does not match its kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("{kind} event must not carry a virtual document")]
    UnexpectedVirtual { kind: &'static str },

    #[error("{kind} event is missing its {side} host snapshot")]
    MissingHost {
        kind: &'static str,
        side: &'static str,
    },

    #[error("{kind} event must not carry an {side} host snapshot")]
    UnexpectedHost {
        kind: &'static str,
        side: &'static str,
    },

    #[error("virtual document change is missing its {side} virtual snapshot")]
    MissingVirtual { side: &'static str },

    #[error("event snapshots disagree on host uri ({old} vs {new})")]
    UriMismatch { old: Url, new: Url },

    #[error("virtual snapshots disagree on language")]
    LanguageMismatch,
}

/// Helper trait to recover from a poisoned `std::sync` lock.
pub trait LockResultExt<T> {
    /// Recover the guard from a poisoned lock, logging which operation hit it.
    ///
    /// The snapshots behind our locks are immutable values, so a panic while a
    /// writer held the lock cannot leave them half-updated.
    fn recover_poison(self, context: &str) -> T;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> T {
        match self {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    target: "utsushi::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                poisoned.into_inner()
            }
        }
    }
}
