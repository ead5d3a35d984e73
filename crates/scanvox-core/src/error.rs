//! Error types for the engine.

use thiserror::Error;

/// Engine-wide error type.
///
/// Malformed data is recovered from where it is read and never reaches
/// callers; only real I/O failures do.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
