//! Pack encoding
//!
//! A compact alternative to plain OSC built on MessagePack. A datagram
//! starts with the sentinel `!`, followed by MessagePack values with no
//! alignment padding:
//!
//! ```text
//! message: ! str(address) str(typetags) arg*
//! bundle:  ! # uint(timetag) bin(packet)*
//! ```
//!
//! The bundle marker is a raw `#` byte, never the first byte of a
//! MessagePack string, so the second byte tells a bundle from a message.
//!
//! Typetags carry no leading comma. Arrays are flattened into the argument
//! stream; the brackets in the typetag restore the nesting. Bundle elements
//! are complete datagrams, each sniffed on its own, so a bundle may mix
//! plain and pack children.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_bytes::{ByteBuf, Bytes as SerdeBytes};

use crate::blob::{BlobKind, TypedBlob};
use crate::codec::{self, DecodeOptions, Encoding, UnknownTypePolicy};
use crate::packet::{Bundle, Message, Packet};
use crate::tagger::{self, TypeTag};
use crate::time::TimeTag;
use crate::types::{char_byte, Argument, MidiMessage};
use crate::{Error, Result, PACK_SENTINEL};

/// Second byte of a pack bundle
const PACK_BUNDLE_MARKER: u8 = b'#';

#[inline]
fn write<T: Serialize + ?Sized>(buf: &mut Vec<u8>, value: &T) -> Result<()> {
    rmp_serde::encode::write(buf, value)?;
    Ok(())
}

#[inline]
fn read<T: DeserializeOwned>(buf: &mut &[u8]) -> Result<T> {
    Ok(rmp_serde::from_read(&mut *buf)?)
}

// ============================================================================
// ENCODING
// ============================================================================

pub(crate) fn encode_message(address: &str, args: &[Argument]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(address.len() + args.len() * 6 + 4);
    buf.push(PACK_SENTINEL);
    write(&mut buf, address)?;
    write(&mut buf, tagger::typetags(args).as_str())?;
    encode_arguments(&mut buf, args)?;
    Ok(buf)
}

pub(crate) fn encode_bundle(timetag: TimeTag, children: &[&[u8]]) -> Result<Vec<u8>> {
    let capacity = 11 + children.iter().map(|c| c.len() + 5).sum::<usize>();
    let mut buf = Vec::with_capacity(capacity);
    buf.push(PACK_SENTINEL);
    buf.push(PACK_BUNDLE_MARKER);
    write(&mut buf, &timetag.as_raw())?;

    for child in children {
        write(&mut buf, SerdeBytes::new(child))?;
    }
    Ok(buf)
}

/// Write argument payloads only, no sentinel, address or typetag
pub(crate) fn encode_arguments(buf: &mut Vec<u8>, args: &[Argument]) -> Result<()> {
    for arg in args {
        encode_argument(buf, arg)?;
    }
    Ok(())
}

fn encode_argument(buf: &mut Vec<u8>, arg: &Argument) -> Result<()> {
    match arg {
        Argument::Int(i) => write(buf, i)?,
        Argument::Long(l) => write(buf, l)?,
        Argument::Float(f) => write(buf, f)?,
        Argument::Double(d) => write(buf, d)?,
        Argument::String(s) => write(buf, s.as_str())?,
        Argument::Blob(b) => write(buf, SerdeBytes::new(b))?,
        Argument::Char(c) => write(buf, &char_byte(*c)?)?,
        Argument::Bool(_) | Argument::Nil | Argument::Impulse => {}
        Argument::Time(t) => write(buf, &t.as_raw())?,
        Argument::TypedBlob(tb) => {
            write(buf, &(tb.kind().type_char() as u8))?;
            write(buf, &tb.count())?;
            write(buf, SerdeBytes::new(tb.raw_bytes()))?;
        }
        Argument::Midi(m) => write(buf, SerdeBytes::new(&m.as_bytes()))?,
        Argument::Array(inner) => encode_arguments(buf, inner)?,
    }
    Ok(())
}

// ============================================================================
// DECODING
// ============================================================================

/// Decode a pack datagram found `depth` bundles below the top level
pub(crate) fn decode(bytes: &[u8], opts: &DecodeOptions, depth: usize) -> Result<Packet> {
    let mut buf = match bytes.split_first() {
        Some((&PACK_SENTINEL, rest)) => rest,
        _ => return Err(Error::DecodeError("missing pack sentinel".to_string())),
    };

    if let Some((&PACK_BUNDLE_MARKER, rest)) = buf.split_first() {
        let mut rest = rest;
        return decode_bundle(&mut rest, opts, depth).map(Packet::Bundle);
    }

    // Strings are always UTF-8 in MessagePack, whatever the charset
    let address: String = read(&mut buf)?;
    let tags: String = read(&mut buf)?;
    let tree = tagger::parse(&tags)?;
    let args = decode_arguments(&mut buf, &tree, opts)?;

    let mut msg = Message::with_args(address, args)?;
    msg.set_charset(opts.charset);
    msg.set_encoding(Encoding::Pack);
    Ok(Packet::Message(msg))
}

fn decode_bundle(buf: &mut &[u8], opts: &DecodeOptions, depth: usize) -> Result<Bundle> {
    let raw: u64 = read(buf)?;
    let mut bundle = Bundle::with_timetag(TimeTag::from_raw(raw));
    bundle.set_charset(opts.charset);
    bundle.set_encoding(Encoding::Pack);

    while !buf.is_empty() {
        let child: ByteBuf = read(buf)?;
        if child.is_empty() {
            break;
        }
        bundle.add(codec::decode_nested(&child, opts, depth + 1)?);
    }

    Ok(bundle)
}

/// Read arguments driven by a parsed typetag tree
pub(crate) fn decode_arguments(
    buf: &mut &[u8],
    tags: &[TypeTag],
    opts: &DecodeOptions,
) -> Result<Vec<Argument>> {
    let mut args = Vec::with_capacity(tags.len());
    for tag in tags {
        let arg = match tag {
            TypeTag::Array(inner) => Argument::Array(decode_arguments(buf, inner, opts)?),
            TypeTag::Code(c) => decode_argument(buf, *c, opts)?,
        };
        args.push(arg);
    }
    Ok(args)
}

fn decode_argument(buf: &mut &[u8], code: char, opts: &DecodeOptions) -> Result<Argument> {
    let arg = match code {
        'i' => Argument::Int(read(buf)?),
        'u' => Argument::Long(read::<u32>(buf)? as i64),
        'h' => Argument::Long(read(buf)?),
        'f' => Argument::Float(read(buf)?),
        'd' => Argument::Double(read(buf)?),
        's' => Argument::String(read(buf)?),
        'b' => Argument::Blob(read::<ByteBuf>(buf)?.into_vec()),
        'c' => Argument::Char(read::<u8>(buf)? as char),
        'T' => Argument::Bool(true),
        'F' => Argument::Bool(false),
        'N' => Argument::Nil,
        'I' => Argument::Impulse,
        't' => Argument::Time(TimeTag::from_raw(read(buf)?)),
        'B' => {
            let kind_char = read::<u8>(buf)? as char;
            let count: u32 = read(buf)?;
            let data = read::<ByteBuf>(buf)?.into_vec();
            let kind = BlobKind::from_char(kind_char).ok_or_else(|| {
                Error::DecodeError(format!("unknown typed blob element type: {:?}", kind_char))
            })?;
            Argument::TypedBlob(TypedBlob::from_parts(kind, count, data)?)
        }
        'm' => Argument::Midi(MidiMessage::from_bytes(&read::<ByteBuf>(buf)?)?),
        other => match opts.unknown_types {
            UnknownTypePolicy::Tolerate => Argument::Nil,
            UnknownTypePolicy::Reject => return Err(Error::UnknownTypeTag(other)),
        },
    };
    Ok(arg)
}

pub(crate) fn is_pack(bytes: &[u8]) -> bool {
    bytes.first() == Some(&PACK_SENTINEL)
}
