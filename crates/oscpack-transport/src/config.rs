//! Socket configuration

use std::net::{SocketAddr, ToSocketAddrs};

use oscpack_core::{Charset, DecodeOptions, Encoding, UnknownTypePolicy, DEFAULT_SC_LANG_PORT};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// Largest UDP payload over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65507;

/// Receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Local address to bind (e.g., "0.0.0.0:57120")
    #[serde(default = "default_receiver_bind")]
    pub bind_addr: String,
    /// Receive buffer size; longer datagrams are truncated by the OS
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Allow other sockets to bind the same address
    #[serde(default)]
    pub reuse_address: bool,
    #[serde(default)]
    pub charset: Charset,
    #[serde(default)]
    pub unknown_types: UnknownTypePolicy,
}

fn default_receiver_bind() -> String {
    format!("0.0.0.0:{}", DEFAULT_SC_LANG_PORT)
}

fn default_buffer_size() -> usize {
    MAX_DATAGRAM_SIZE
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_receiver_bind(),
            buffer_size: default_buffer_size(),
            reuse_address: false,
            charset: Charset::default(),
            unknown_types: UnknownTypePolicy::default(),
        }
    }
}

impl ReceiverConfig {
    /// Config bound to an explicit address
    pub fn bind(addr: impl Into<String>) -> Self {
        Self {
            bind_addr: addr.into(),
            ..Default::default()
        }
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            unknown_types: self.unknown_types,
            charset: self.charset,
            ..DecodeOptions::default()
        }
    }
}

/// Sender configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Local address to send from; port 0 picks an ephemeral port
    #[serde(default = "default_sender_bind")]
    pub bind_addr: String,
    /// Default destination
    pub target: String,
    /// Force every top-level packet into this encoding
    #[serde(default)]
    pub encoding: Option<Encoding>,
    /// Force every string into this charset
    #[serde(default)]
    pub charset: Option<Charset>,
    /// Enable SO_BROADCAST
    #[serde(default)]
    pub broadcast: bool,
}

fn default_sender_bind() -> String {
    "0.0.0.0:0".to_string()
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_sender_bind(),
            target: format!("127.0.0.1:{}", DEFAULT_SC_LANG_PORT),
            encoding: None,
            charset: None,
            broadcast: false,
        }
    }
}

impl SenderConfig {
    /// Config sending to `target` from an ephemeral port
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }
}

/// Resolve a host:port string to its first socket address
pub(crate) fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()?
        .next()
        .ok_or_else(|| TransportError::InvalidAddress(addr.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReceiverConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:57120");
        assert_eq!(config.buffer_size, 65507);
        assert_eq!(config.decode_options(), DecodeOptions::default());

        let sender = SenderConfig::to("10.0.0.1:57110");
        assert_eq!(sender.bind_addr, "0.0.0.0:0");
        assert!(sender.encoding.is_none());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ReceiverConfig = serde_json::from_str(
            r#"{"bind_addr": "127.0.0.1:9000", "charset": "latin1", "unknown_types": "reject"}"#,
        )
        .unwrap();
        assert_eq!(config.buffer_size, MAX_DATAGRAM_SIZE);
        assert_eq!(config.charset, Charset::Latin1);
        assert_eq!(config.unknown_types, UnknownTypePolicy::Reject);

        let sender: SenderConfig =
            serde_json::from_str(r#"{"target": "10.0.0.2:57110", "encoding": "pack"}"#).unwrap();
        assert_eq!(sender.bind_addr, "0.0.0.0:0");
        assert_eq!(sender.encoding, Some(Encoding::Pack));
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("127.0.0.1:9000").unwrap().port(), 9000);
        assert!(resolve("not an address").is_err());
    }
}
