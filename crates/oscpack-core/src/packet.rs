//! Packet model
//!
//! A [`Packet`] is either a [`Message`] or a [`Bundle`] of further packets.
//! Both carry provenance (the sender, set on decode), the charset used for
//! strings and the encoding they are written with by default.
//!
//! Encoded bytes are cached on first use. Every mutator clears the cache, so
//! the next [`Packet::to_bytes`] re-encodes.

use std::net::SocketAddr;
use std::sync::OnceLock;

use bytes::Bytes;

use crate::address;
use crate::codec::{self, DecodeOptions, Encoding};
use crate::tagger;
use crate::time::TimeTag;
use crate::types::{Argument, Charset};
use crate::{pack, plain, Error, Result};

/// An OSC message: address plus ordered arguments
#[derive(Debug, Clone)]
pub struct Message {
    address: String,
    arguments: Vec<Argument>,
    source: Option<SocketAddr>,
    charset: Charset,
    encoding: Encoding,
    cache: OnceLock<Bytes>,
}

impl Message {
    /// Create a message with no arguments, validating the address
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Self::with_args(address, Vec::new())
    }

    pub fn with_args(address: impl Into<String>, arguments: Vec<Argument>) -> Result<Self> {
        let address = address.into();
        address::validate(&address)?;
        Ok(Self {
            address,
            arguments,
            source: None,
            charset: Charset::default(),
            encoding: Encoding::default(),
            cache: OnceLock::new(),
        })
    }

    /// Create a message and check the caller's typetag against the
    /// arguments before anything is encoded
    pub fn with_typetags(
        address: impl Into<String>,
        typetags: &str,
        arguments: Vec<Argument>,
    ) -> Result<Self> {
        let expected = typetags.strip_prefix(',').unwrap_or(typetags);
        let actual = tagger::typetags(&arguments);
        if expected != actual {
            return Err(Error::TypeTagMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
        Self::with_args(address, arguments)
    }

    /// Decode `payload` (argument bytes only) using `typetags`.
    ///
    /// A payload starting with `!` that reads cleanly as Pack arguments is
    /// taken as Pack; anything else is read as plain OSC.
    pub fn from_payload(
        address: impl Into<String>,
        typetags: &str,
        payload: &[u8],
        opts: &DecodeOptions,
    ) -> Result<Self> {
        let tree = tagger::parse(typetags)?;

        let mut encoding = Encoding::Plain;
        let mut arguments = None;
        if pack::is_pack(payload) {
            let mut buf = &payload[1..];
            if let Ok(args) = pack::decode_arguments(&mut buf, &tree, opts) {
                if buf.is_empty() {
                    encoding = Encoding::Pack;
                    arguments = Some(args);
                }
            }
        }
        let arguments = match arguments {
            Some(args) => args,
            None => {
                let mut buf = payload;
                plain::decode_arguments(&mut buf, &tree, opts)?
            }
        };

        let mut msg = Self::with_args(address, arguments)?;
        msg.charset = opts.charset;
        msg.encoding = encoding;
        Ok(msg)
    }

    /// Builder-style argument append
    pub fn arg(mut self, arg: impl Into<Argument>) -> Self {
        self.add_argument(arg);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn set_address(&mut self, address: impl Into<String>) -> Result<()> {
        let address = address.into();
        address::validate(&address)?;
        self.address = address;
        self.invalidate();
        Ok(())
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn add_argument(&mut self, arg: impl Into<Argument>) {
        self.arguments.push(arg.into());
        self.invalidate();
    }

    pub fn add_arguments(&mut self, args: impl IntoIterator<Item = Argument>) {
        self.arguments.extend(args);
        self.invalidate();
    }

    pub fn clear_arguments(&mut self) {
        self.arguments.clear();
        self.invalidate();
    }

    pub fn into_arguments(self) -> Vec<Argument> {
        self.arguments
    }

    /// Typetag derived from the current arguments (no leading comma)
    pub fn typetags(&self) -> String {
        tagger::typetags(&self.arguments)
    }

    pub fn source(&self) -> Option<SocketAddr> {
        self.source
    }

    /// Provenance only; does not affect the encoding
    pub fn set_source(&mut self, source: Option<SocketAddr>) {
        self.source = source;
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn set_charset(&mut self, charset: Charset) {
        self.charset = charset;
        self.invalidate();
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
        self.invalidate();
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.set_encoding(encoding);
        self
    }

    /// Encoded bytes in this message's own encoding
    pub fn to_bytes(&self) -> Result<Bytes> {
        if let Some(bytes) = self.cache.get() {
            return Ok(bytes.clone());
        }
        let bytes = codec::encode_message(self, self.encoding, self.charset)?;
        let _ = self.cache.set(bytes.clone());
        Ok(bytes)
    }

    fn invalidate(&mut self) {
        self.cache.take();
    }
}

/// A timetagged group of packets
#[derive(Debug, Clone)]
pub struct Bundle {
    timetag: TimeTag,
    packets: Vec<Packet>,
    source: Option<SocketAddr>,
    charset: Charset,
    encoding: Encoding,
    cache: OnceLock<Bytes>,
}

impl Bundle {
    /// An empty bundle for immediate execution
    pub fn new() -> Self {
        Self::with_timetag(TimeTag::IMMEDIATE)
    }

    pub fn with_timetag(timetag: TimeTag) -> Self {
        Self {
            timetag,
            packets: Vec::new(),
            source: None,
            charset: Charset::default(),
            encoding: Encoding::default(),
            cache: OnceLock::new(),
        }
    }

    /// Builder-style packet append
    pub fn packet(mut self, packet: impl Into<Packet>) -> Self {
        self.add(packet);
        self
    }

    pub fn timetag(&self) -> TimeTag {
        self.timetag
    }

    pub fn set_timetag(&mut self, timetag: TimeTag) {
        self.timetag = timetag;
        self.invalidate();
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn add(&mut self, packet: impl Into<Packet>) {
        self.packets.push(packet.into());
        self.invalidate();
    }

    pub fn clear(&mut self) {
        self.packets.clear();
        self.invalidate();
    }

    pub fn into_packets(self) -> Vec<Packet> {
        self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn source(&self) -> Option<SocketAddr> {
        self.source
    }

    pub fn set_source(&mut self, source: Option<SocketAddr>) {
        self.source = source;
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn set_charset(&mut self, charset: Charset) {
        self.charset = charset;
        self.invalidate();
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Encoding of the bundle frame itself; children keep their own
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
        self.invalidate();
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.set_encoding(encoding);
        self
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        if let Some(bytes) = self.cache.get() {
            return Ok(bytes.clone());
        }
        let bytes = codec::encode_bundle(self, self.encoding, None)?;
        let _ = self.cache.set(bytes.clone());
        Ok(bytes)
    }

    fn invalidate(&mut self) {
        self.cache.take();
    }
}

impl Default for Bundle {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything that can travel in one datagram
#[derive(Debug, Clone)]
pub enum Packet {
    Message(Message),
    Bundle(Bundle),
}

impl Packet {
    pub fn to_bytes(&self) -> Result<Bytes> {
        match self {
            Packet::Message(m) => m.to_bytes(),
            Packet::Bundle(b) => b.to_bytes(),
        }
    }

    pub fn source(&self) -> Option<SocketAddr> {
        match self {
            Packet::Message(m) => m.source(),
            Packet::Bundle(b) => b.source(),
        }
    }

    /// Set provenance on this packet and everything nested in it
    pub fn set_source(&mut self, source: Option<SocketAddr>) {
        match self {
            Packet::Message(m) => m.set_source(source),
            Packet::Bundle(b) => {
                b.set_source(source);
                for child in &mut b.packets {
                    child.set_source(source);
                }
            }
        }
    }

    pub fn charset(&self) -> Charset {
        match self {
            Packet::Message(m) => m.charset(),
            Packet::Bundle(b) => b.charset(),
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Packet::Message(m) => m.encoding(),
            Packet::Bundle(b) => b.encoding(),
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self, Packet::Message(_))
    }

    pub fn is_bundle(&self) -> bool {
        matches!(self, Packet::Bundle(_))
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Packet::Message(m) => Some(m),
            Packet::Bundle(_) => None,
        }
    }

    pub fn as_bundle(&self) -> Option<&Bundle> {
        match self {
            Packet::Bundle(b) => Some(b),
            Packet::Message(_) => None,
        }
    }
}

impl From<Message> for Packet {
    fn from(m: Message) -> Self {
        Packet::Message(m)
    }
}

impl From<Bundle> for Packet {
    fn from(b: Bundle) -> Self {
        Packet::Bundle(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_address_rejected() {
        assert!(Message::new("").is_err());
        assert!(Message::new("nope").is_err());
        assert!(Message::new("/a//b").is_err());
        assert!(Message::new("/a b").is_err());

        let mut msg = Message::new("/ok").unwrap();
        assert!(msg.set_address("/bad*").is_err());
        assert_eq!(msg.address(), "/ok");
    }

    #[test]
    fn test_with_typetags_checks_arguments() {
        let ok = Message::with_typetags("/x", ",if", vec![Argument::Int(1), Argument::Float(2.0)]);
        assert!(ok.is_ok());

        let err = Message::with_typetags("/x", "ii", vec![Argument::Int(1)]).unwrap_err();
        assert!(matches!(err, Error::TypeTagMismatch { .. }));
    }

    #[test]
    fn test_mutation_invalidates_cache() {
        let mut msg = Message::new("/cache").unwrap();
        let before = msg.to_bytes().unwrap();
        assert_eq!(msg.to_bytes().unwrap(), before);

        msg.add_argument(7);
        let after = msg.to_bytes().unwrap();
        assert_ne!(before, after);
        assert_eq!(after.len(), 16);

        msg.clear_arguments();
        assert_eq!(msg.to_bytes().unwrap(), before);

        msg.set_address("/cachf").unwrap();
        assert_ne!(msg.to_bytes().unwrap(), before);
    }

    #[test]
    fn test_bundle_mutation_invalidates_cache() {
        let mut bundle = Bundle::new();
        let empty = bundle.to_bytes().unwrap();
        assert_eq!(empty.len(), 16);

        bundle.add(Message::new("/a").unwrap());
        assert_eq!(bundle.to_bytes().unwrap().len(), 16 + 4 + 8);

        bundle.set_timetag(TimeTag::from_parts(5, 0));
        assert_eq!(&bundle.to_bytes().unwrap()[8..16], &[0, 0, 0, 5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_set_source_reaches_children() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let mut packet = Packet::from(
            Bundle::new().packet(Bundle::new().packet(Message::new("/deep").unwrap())),
        );
        packet.set_source(Some(addr));

        let inner = packet.as_bundle().unwrap().packets()[0].as_bundle().unwrap();
        assert_eq!(inner.packets()[0].source(), Some(addr));
    }

    #[test]
    fn test_from_payload_plain_and_pack() {
        let opts = DecodeOptions::default();

        let plain = Message::from_payload("/p", "is", &[0, 0, 0, 3, b'h', b'i', 0, 0], &opts).unwrap();
        assert_eq!(plain.arguments(), &[Argument::Int(3), Argument::from("hi")]);
        assert_eq!(plain.encoding(), Encoding::Plain);

        let payload = [b'!', 0x03, 0xa2, b'h', b'i'];
        let packed = Message::from_payload("/p", "is", &payload, &opts).unwrap();
        assert_eq!(packed.arguments(), plain.arguments());
        assert_eq!(packed.encoding(), Encoding::Pack);
    }

    #[test]
    fn test_from_payload_plain_starting_with_sentinel() {
        // 0x21 = '!' as the first byte of a plain int
        let payload = [0x21, 0, 0, 0];
        let msg = Message::from_payload("/p", "i", &payload, &DecodeOptions::default()).unwrap();
        assert_eq!(msg.arguments(), &[Argument::Int(0x2100_0000)]);
    }
}
