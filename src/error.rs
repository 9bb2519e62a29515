//! Unified error handling for planforge
//!
//! Every fallible operation in the crate returns [`PlanError`]. Errors are
//! grouped into categories so callers can decide how to react:
//! - User errors (bad sizes, bad frees, bad configuration, bad traces)
//! - Backend errors (the memory runtime could not reserve the arena)
//! - Internal errors (I/O while reading plan inputs)

use std::fmt;

use crate::backend::RuntimeError;

/// Unified error type for planforge
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    // ========== Allocation Errors ==========
    /// Requested allocation size is zero or overflows when aligned
    #[error("Invalid allocation size: {0} bytes")]
    InvalidSize(usize),

    /// Freed range does not match a live allocation
    #[error("Invalid free of {size} bytes at offset {offset}: {reason}")]
    InvalidFree {
        offset: usize,
        size: usize,
        reason: String,
    },

    // ========== Backend Errors ==========
    /// The memory runtime failed to reserve the backing block
    #[error("Out of memory while binding arena: {0}")]
    OutOfMemory(#[from] RuntimeError),

    // ========== Configuration Errors ==========
    /// Alignment must be a non-zero power of two
    #[error("Invalid alignment: {0}. Must be a non-zero power of two")]
    InvalidAlignment(usize),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ========== Trace Errors ==========
    /// Malformed or inconsistent trace script
    #[error("Invalid trace at line {line}: {reason}")]
    InvalidTrace { line: usize, reason: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlanError {
    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            PlanError::InvalidSize(_)
            | PlanError::InvalidFree { .. }
            | PlanError::InvalidAlignment(_)
            | PlanError::InvalidConfiguration(_)
            | PlanError::InvalidTrace { .. } => ErrorCategory::User,

            PlanError::OutOfMemory(_) => ErrorCategory::Backend,

            PlanError::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Only backend failures qualify: the runtime may have memory again
    /// later. Retrying is left to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Backend)
    }

    /// Check if this is a user-facing error (caller broke the contract)
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    pub(crate) fn invalid_free(offset: usize, size: usize, reason: impl Into<String>) -> Self {
        PlanError::InvalidFree {
            offset,
            size,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_trace(line: usize, reason: impl Into<String>) -> Self {
        PlanError::InvalidTrace {
            line,
            reason: reason.into(),
        }
    }
}

/// Error category for handling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid input or contract violation by the caller
    User,
    /// Memory runtime failure
    Backend,
    /// Environment or system failure
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::User => write!(f, "User"),
            ErrorCategory::Backend => write!(f, "Backend"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

/// Result alias using [`PlanError`]
pub type PlanResult<T> = std::result::Result<T, PlanError>;
