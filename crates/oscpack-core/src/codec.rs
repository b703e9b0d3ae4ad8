//! Encoding selection and the public encode/decode entry points
//!
//! Every datagram is sniffed on its first byte:
//! - `!` Pack (message or bundle)
//! - `#` plain bundle
//! - anything else, plain message
//!
//! Bundle elements are sniffed the same way, so a bundle in one encoding
//! may hold children in the other.

use std::net::SocketAddr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::packet::{Bundle, Message, Packet};
use crate::shortcut::ShortcutTable;
use crate::types::Charset;
use crate::{pack, plain, Error, Result};

/// Wire encoding of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// OSC 1.0, 4-byte aligned
    #[default]
    Plain,
    /// MessagePack, prefixed with `!`
    Pack,
}

/// What to do with a type code no reader knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownTypePolicy {
    /// Yield `Nil` in that position and consume no payload
    #[default]
    Tolerate,
    /// Fail the datagram with [`Error::UnknownTypeTag`]
    Reject,
}

/// Deepest bundle nesting accepted by default
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Decoder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    pub unknown_types: UnknownTypePolicy,
    /// Applied to plain strings
    pub charset: Charset,
    /// Bundles nested deeper than this fail to decode
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            unknown_types: UnknownTypePolicy::default(),
            charset: Charset::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Per-call encoder overrides
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions<'a> {
    /// Encoding of the top-level packet; nested packets keep their own
    pub encoding: Option<Encoding>,
    /// Compress messages whose signature is registered here
    pub shortcuts: Option<&'a ShortcutTable>,
    /// Charset for all strings, overriding each packet's own
    pub charset: Option<Charset>,
}

impl<'a> EncodeOptions<'a> {
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn shortcuts(mut self, table: &'a ShortcutTable) -> Self {
        self.shortcuts = Some(table);
        self
    }

    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = Some(charset);
        self
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Encode a packet in its own encoding (cached)
#[inline]
pub fn encode(packet: &Packet) -> Result<Bytes> {
    packet.to_bytes()
}

/// Encode a packet with per-call overrides
pub fn encode_with(packet: &Packet, opts: &EncodeOptions<'_>) -> Result<Bytes> {
    match packet {
        Packet::Message(msg) => {
            let encoding = opts.encoding.unwrap_or(msg.encoding());
            let charset = opts.charset.unwrap_or(msg.charset());

            if let Some(table) = opts.shortcuts {
                if let Some(short) = table.compress(msg, encoding, charset)? {
                    return encode_message(&short, encoding, charset);
                }
            }
            encode_message(msg, encoding, charset)
        }
        Packet::Bundle(bundle) => {
            let encoding = opts.encoding.unwrap_or(bundle.encoding());
            encode_bundle(bundle, encoding, Some(opts))
        }
    }
}

/// Decode a datagram with default options
#[inline]
pub fn decode(bytes: &[u8]) -> Result<Packet> {
    decode_with(bytes, &DecodeOptions::default())
}

/// Decode a datagram, sniffing its encoding and shape
pub fn decode_with(bytes: &[u8], opts: &DecodeOptions) -> Result<Packet> {
    decode_nested(bytes, opts, 0)
}

/// Decode a datagram received from `source`, recording it on every packet
pub fn decode_from(bytes: &[u8], source: SocketAddr, opts: &DecodeOptions) -> Result<Packet> {
    let mut packet = decode_with(bytes, opts)?;
    packet.set_source(Some(source));
    Ok(packet)
}

// ============================================================================
// INTERNAL
// ============================================================================

/// Decode a packet found `depth` bundles below the top level
pub(crate) fn decode_nested(bytes: &[u8], opts: &DecodeOptions, depth: usize) -> Result<Packet> {
    if depth > opts.max_depth {
        return Err(Error::DecodeError(format!(
            "bundle nesting too deep (limit {})",
            opts.max_depth
        )));
    }
    if bytes.is_empty() {
        return Err(Error::BufferTooSmall { needed: 1, have: 0 });
    }

    if pack::is_pack(bytes) {
        pack::decode(bytes, opts, depth)
    } else if plain::is_bundle(bytes) {
        plain::decode_bundle(bytes, opts, depth).map(Packet::Bundle)
    } else {
        plain::decode_message(bytes, opts).map(Packet::Message)
    }
}

pub(crate) fn encode_message(msg: &Message, encoding: Encoding, charset: Charset) -> Result<Bytes> {
    match encoding {
        Encoding::Plain => {
            Ok(plain::encode_message(msg.address(), msg.arguments(), charset)?.freeze())
        }
        Encoding::Pack => Ok(Bytes::from(pack::encode_message(
            msg.address(),
            msg.arguments(),
        )?)),
    }
}

/// Encode a bundle frame. Without overrides, children reuse their cached
/// bytes.
pub(crate) fn encode_bundle(
    bundle: &Bundle,
    encoding: Encoding,
    opts: Option<&EncodeOptions<'_>>,
) -> Result<Bytes> {
    let child_opts = opts
        .filter(|o| o.shortcuts.is_some() || o.charset.is_some())
        .map(|o| EncodeOptions {
            encoding: None,
            ..*o
        });

    let children = bundle
        .packets()
        .iter()
        .map(|child| match &child_opts {
            Some(o) => encode_with(child, o),
            None => child.to_bytes(),
        })
        .collect::<Result<Vec<Bytes>>>()?;
    let slices: Vec<&[u8]> = children.iter().map(|c| c.as_ref()).collect();

    match encoding {
        Encoding::Plain => Ok(plain::encode_bundle(bundle.timetag(), &slices)?.freeze()),
        Encoding::Pack => Ok(Bytes::from(pack::encode_bundle(bundle.timetag(), &slices)?)),
    }
}
