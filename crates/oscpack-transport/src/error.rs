//! Transport error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid socket address: {0}")]
    InvalidAddress(String),

    #[error("receiver already running")]
    AlreadyRunning,

    #[error("packet too large: {0} bytes")]
    PacketTooLarge(usize),

    #[error("short send: {sent} of {len} bytes")]
    ShortSend { sent: usize, len: usize },

    #[error("codec error: {0}")]
    Codec(#[from] oscpack_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
