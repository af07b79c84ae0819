//! Error types for the entire crate.
//!
//! We use `thiserror` for library-style errors with custom types.
//! Every failure is a returned value; the core never terminates the
//! process and never panics on malformed input.

use thiserror::Error;

/// Errors that can occur while producing chunks from a byte source
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("log source unavailable: {0}")]
    SourceUnavailable(#[from] std::io::Error),

    /// A single logical record grew past the memory ceiling. Records
    /// that merely exceed the chunk size are handled softly by relaxing
    /// the boundary rule; this fires only when even the relaxed buffer
    /// cannot hold the record.
    #[error("single record exceeds memory ceiling of {ceiling_bytes} bytes")]
    SizeExceeded { ceiling_bytes: usize },
}

/// Errors that can occur while parsing a log into GC events
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("log source unavailable: {0}")]
    SourceUnavailable(std::io::Error),

    #[error("input matches neither supported log format")]
    UnsupportedFormat,

    #[error("single record exceeds memory ceiling of {ceiling_bytes} bytes")]
    SizeExceeded { ceiling_bytes: usize },

    #[error("parse cancelled by caller")]
    Cancelled,
}

impl From<std::io::Error> for ParseError {
    fn from(err: std::io::Error) -> Self {
        ParseError::SourceUnavailable(err)
    }
}

impl From<ReadError> for ParseError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::SourceUnavailable(io) => ParseError::SourceUnavailable(io),
            ReadError::SizeExceeded { ceiling_bytes } => ParseError::SizeExceeded { ceiling_bytes },
        }
    }
}

/// Errors that can occur loading a threshold configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read threshold file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("threshold TOML parse error: {0}")]
    ParseFailed(#[from] toml::de::Error),
}
