//! oscpack core
//!
//! Open Sound Control packets and their wire encodings.
//!
//! This crate provides:
//! - The packet model ([`Message`], [`Bundle`], [`Packet`], [`Argument`])
//! - Plain OSC 1.0 and Pack (MessagePack) encodings ([`codec`])
//! - NTP time tags ([`TimeTag`])
//! - Typed blobs for homogeneous numeric arrays ([`TypedBlob`])
//! - Address validation and pattern matching ([`address`])
//! - Id-based message compression ([`ShortcutTable`])
//! - Fan-out dispatch to pattern listeners ([`Dispatcher`])
//!
//! ```
//! use oscpack_core::{codec, Message};
//!
//! let msg = Message::new("/ping").unwrap().arg(0.123f32).arg(4).arg("five six seven");
//! let bytes = codec::encode(&msg.into()).unwrap();
//! assert_eq!(bytes.len() % 4, 0);
//!
//! let decoded = codec::decode(&bytes).unwrap();
//! assert_eq!(decoded.as_message().unwrap().typetags(), "fis");
//! ```

pub mod address;
pub mod blob;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod packet;
pub mod shortcut;
pub mod tagger;
pub mod time;
pub mod types;

mod pack;
mod plain;

pub use address::Pattern;
pub use blob::{BlobKind, BlobValues, TypedBlob};
pub use codec::{decode, decode_from, decode_with, encode, encode_with};
pub use codec::{DecodeOptions, EncodeOptions, Encoding, UnknownTypePolicy, DEFAULT_MAX_DEPTH};
pub use dispatch::{Dispatcher, Listener, ListenerId, ShortcutMiss};
pub use error::{Error, Result};
pub use packet::{Bundle, Message, Packet};
pub use shortcut::{Shortcut, ShortcutTable};
pub use time::TimeTag;
pub use types::{Argument, Charset, MidiMessage};

/// Leading token of a plain bundle (followed by a NUL)
pub const BUNDLE_TOKEN: &[u8] = b"#bundle";

/// First byte of every Pack datagram and Pack shortcut payload
pub const PACK_SENTINEL: u8 = b'!';

/// Address of a shortcut-compressed message
pub const SHORTCUT_ADDRESS: &str = "/@";

/// Typetags of a shortcut-compressed message
pub const SHORTCUT_TYPETAGS: &str = "ib";

/// Default SuperCollider server port
pub const DEFAULT_SC_SERVER_PORT: u16 = 57110;

/// Default SuperCollider language port
pub const DEFAULT_SC_LANG_PORT: u16 = 57120;
