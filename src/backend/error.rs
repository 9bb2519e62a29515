//! Memory runtime error types

use thiserror::Error;

/// Errors raised by a [`MemoryRuntime`](super::MemoryRuntime)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("cannot reserve {requested} bytes, {available} bytes available")]
    OutOfMemory { requested: usize, available: usize },
    #[error("invalid reservation layout: {0}")]
    InvalidLayout(String),
}

/// Runtime result type
pub type RuntimeResult<T> = Result<T, RuntimeError>;
