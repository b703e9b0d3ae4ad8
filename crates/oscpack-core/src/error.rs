//! Error types for oscpack

use thiserror::Error;

/// Result type alias for oscpack operations
pub type Result<T> = std::result::Result<T, Error>;

/// oscpack error types
#[derive(Error, Debug)]
pub enum Error {
    /// Address failed validation
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Address pattern could not be compiled
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// Input ended before a complete value could be read
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    /// Malformed wire bytes
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Value could not be written
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Type code with no known reader (strict decoding only)
    #[error("unknown type tag: '{0}'")]
    UnknownTypeTag(char),

    /// Argument has no wire representation
    #[error("unsupported argument: {0}")]
    UnsupportedArgument(String),

    /// Caller supplied a typetag that disagrees with the arguments
    #[error("typetag mismatch: expected {expected:?}, arguments give {actual:?}")]
    TypeTagMismatch { expected: String, actual: String },

    /// Typed blob payload length disagrees with its element count
    #[error("typed blob length: {count} x {width} bytes expected, got {len}")]
    TypedBlobLength { count: u32, width: usize, len: usize },

    /// No shortcut registered under this id
    #[error("unknown shortcut id: {0}")]
    UnknownShortcut(i32),

    /// Id or symbol already registered
    #[error("shortcut conflict: {0}")]
    ShortcutConflict(String),

    /// I/O error (shortcut definition files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::EncodeError(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::DecodeError(e.to_string())
    }
}
