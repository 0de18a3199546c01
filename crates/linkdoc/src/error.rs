//! Error types.
//!
//! [`ObservableError`] covers the synchronous tree operations; every one of
//! them is raised before any storage write or dispatch, so a failed call
//! leaves the tree as it was. [`DocumentError`] adds the failures of the
//! asynchronous document boundary.

use thiserror::Error;

use crate::oml::OmlError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObservableError {
    /// The assignment would make a container its own ancestor.
    #[error("cyclic reference")]
    CyclicReference,
    /// A read-only document vetoed the mutation.
    #[error("no write permission for {url}")]
    WritePermission { url: String },
    /// A change no longer applies cleanly, or is malformed for its target.
    #[error("invalid change: {0}")]
    Value(String),
    /// A value or handle of the wrong shape.
    #[error("type error: {0}")]
    Type(String),
    #[error("index {index} out of range for length {len}")]
    Range { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Observable(#[from] ObservableError),
    #[error("oml: {0}")]
    Oml(#[from] OmlError),
    /// Non-success response; `message` is the server's body verbatim.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("transport: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
}
