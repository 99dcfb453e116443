/// Error types for mesh import and camera setup
use std::io;

use thiserror::Error;

/// Raised by a triangle consumer to make the producer stop streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Errors raised while producing a triangle stream
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("file too small to be a valid STL ({0} bytes)")]
    TooSmall(usize),

    #[error("unexpected end of file: expected {expected} triangles, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The consumer aborted the stream. Only the ingestion job sees this.
    #[error("import cancelled")]
    Cancelled,
}

impl From<Cancelled> for StreamError {
    fn from(_: Cancelled) -> Self {
        StreamError::Cancelled
    }
}

/// Errors surfaced at the ingestion job boundary
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("error reading mesh: {0}")]
    Stream(#[source] StreamError),

    #[error("failed to spawn import thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("import job was never started")]
    NotStarted,

    #[error("import thread panicked")]
    WorkerPanicked,
}

/// Errors from camera construction
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraError {
    #[error("eye, target and up vector do not span a basis")]
    DegenerateBasis,
}

pub type Result<T> = std::result::Result<T, StreamError>;
