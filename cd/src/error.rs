//! Core error taxonomy
//!
//! Every rejected operation carries a specific reason so callers and the
//! notification layer can branch on it instead of string-matching a
//! generic failure.

use thiserror::Error;

/// Errors surfaced by core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or missing input, rejected before any lock is taken
    #[error("validation: {0}")]
    Validation(String),

    /// Occurrence / session / person / template absent
    #[error("not found: {0}")]
    NotFound(String),

    /// State no longer matches the operation's precondition
    ///
    /// Expected under concurrency; reported, never retried at this layer.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation disallowed by household policy
    #[error("policy: {0}")]
    Policy(String),

    /// Storage-level failure (lock timeout, deadlock); retried internally
    /// a bounded number of times before surfacing
    #[error("storage: {0}")]
    Transient(String),
}

impl CoreError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }

    pub fn policy(reason: impl Into<String>) -> Self {
        Self::Policy(reason.into())
    }

    /// Wrap a store error
    pub fn storage(err: eyre::Report) -> Self {
        Self::Transient(err.to_string())
    }

    /// Stable code for UIs and the notification collaborator
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Policy(_) => "policy",
            Self::Transient(_) => "transient",
        }
    }
}

/// Result alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
