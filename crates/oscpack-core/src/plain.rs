//! Plain OSC 1.0 encoding
//!
//! ```text
//! message: address\0[pad] ,typetags\0[pad] arg*
//! bundle:  #bundle\0 timetag:u64 (length:i32 packet[pad])*
//! ```
//!
//! Every string and blob is padded with NULs to a 4-byte boundary and all
//! numbers are big-endian.

use bytes::{Buf, BufMut, BytesMut};

use crate::blob::{BlobKind, TypedBlob};
use crate::codec::{self, DecodeOptions, Encoding, UnknownTypePolicy};
use crate::packet::{Bundle, Message};
use crate::tagger::{self, TypeTag};
use crate::time::TimeTag;
use crate::types::{char_byte, Argument, Charset, MidiMessage};
use crate::{Error, Result, BUNDLE_TOKEN};

/// Number of NUL bytes needed to bring `len` to a multiple of 4
#[inline(always)]
pub(crate) fn pad_len(len: usize) -> usize {
    (4 - len % 4) % 4
}

// ============================================================================
// ENCODING
// ============================================================================

pub(crate) fn encode_message(address: &str, args: &[Argument], charset: Charset) -> Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(address.len() + args.len() * 8 + 8);
    encode_string(&mut buf, address, charset)?;

    let mut tags = String::with_capacity(args.len() + 1);
    tags.push(',');
    tags.push_str(&tagger::typetags(args));
    encode_string(&mut buf, &tags, Charset::Utf8)?;

    encode_arguments(&mut buf, args, charset)?;
    Ok(buf)
}

pub(crate) fn encode_bundle(timetag: TimeTag, children: &[&[u8]]) -> Result<BytesMut> {
    let capacity = 16 + children.iter().map(|c| c.len() + 7).sum::<usize>();
    let mut buf = BytesMut::with_capacity(capacity);

    buf.extend_from_slice(BUNDLE_TOKEN);
    buf.put_u8(0);
    buf.put_u64(timetag.as_raw());

    for child in children {
        let len = i32::try_from(child.len())
            .map_err(|_| Error::EncodeError(format!("bundle element too large: {}", child.len())))?;
        buf.put_i32(len);
        buf.extend_from_slice(child);
        buf.put_bytes(0, pad_len(child.len()));
    }

    Ok(buf)
}

/// Write argument payloads only, no address or typetag
pub(crate) fn encode_arguments(buf: &mut BytesMut, args: &[Argument], charset: Charset) -> Result<()> {
    for arg in args {
        encode_argument(buf, arg, charset)?;
    }
    Ok(())
}

fn encode_argument(buf: &mut BytesMut, arg: &Argument, charset: Charset) -> Result<()> {
    match arg {
        Argument::Int(i) => buf.put_i32(*i),
        Argument::Long(l) => buf.put_i64(*l),
        Argument::Float(f) => buf.put_f32(*f),
        Argument::Double(d) => buf.put_f64(*d),
        Argument::String(s) => encode_string(buf, s, charset)?,
        Argument::Blob(b) => encode_blob(buf, b)?,
        Argument::Char(c) => {
            buf.put_bytes(0, 3);
            buf.put_u8(char_byte(*c)?);
        }
        Argument::Bool(_) | Argument::Nil | Argument::Impulse => {} // Type tag is enough
        Argument::Time(t) => buf.put_u64(t.as_raw()),
        Argument::TypedBlob(tb) => {
            buf.put_u8(tb.kind().type_char() as u8);
            buf.put_bytes(0, 3);
            buf.put_u32(tb.count());
            encode_blob(buf, tb.raw_bytes())?;
        }
        Argument::Midi(m) => {
            let bytes = m.as_bytes();
            buf.extend_from_slice(&bytes);
            buf.put_bytes(0, pad_len(bytes.len()));
        }
        Argument::Array(inner) => encode_arguments(buf, inner, charset)?,
    }
    Ok(())
}

#[inline]
fn encode_string(buf: &mut BytesMut, s: &str, charset: Charset) -> Result<()> {
    let bytes = charset.encode(s)?;
    if bytes.contains(&0) {
        return Err(Error::EncodeError(format!("string contains NUL: {:?}", s)));
    }
    buf.extend_from_slice(&bytes);
    buf.put_u8(0);
    buf.put_bytes(0, pad_len(bytes.len() + 1));
    Ok(())
}

#[inline]
fn encode_blob(buf: &mut BytesMut, bytes: &[u8]) -> Result<()> {
    let len = i32::try_from(bytes.len())
        .map_err(|_| Error::EncodeError(format!("blob too large: {}", bytes.len())))?;
    buf.put_i32(len);
    buf.extend_from_slice(bytes);
    buf.put_bytes(0, pad_len(bytes.len()));
    Ok(())
}

// ============================================================================
// DECODING
// ============================================================================

pub(crate) fn decode_message(bytes: &[u8], opts: &DecodeOptions) -> Result<Message> {
    let mut buf = bytes;
    let address = decode_string(&mut buf, opts.charset)?;

    let tags = if buf.first() == Some(&b',') {
        decode_string(&mut buf, Charset::Utf8)?
    } else {
        // Pre-1.0 senders may omit the typetag
        String::new()
    };

    let tree = tagger::parse(&tags)?;
    let args = decode_arguments(&mut buf, &tree, opts)?;

    let mut msg = Message::with_args(address, args)?;
    msg.set_charset(opts.charset);
    msg.set_encoding(Encoding::Plain);
    Ok(msg)
}

/// Decode a plain bundle found `depth` bundles below the top level
pub(crate) fn decode_bundle(bytes: &[u8], opts: &DecodeOptions, depth: usize) -> Result<Bundle> {
    let mut buf = bytes;

    let header_len = BUNDLE_TOKEN.len() + 1;
    need(buf, header_len + 8)?;
    if &buf[..BUNDLE_TOKEN.len()] != BUNDLE_TOKEN || buf[BUNDLE_TOKEN.len()] != 0 {
        return Err(Error::DecodeError("missing #bundle token".to_string()));
    }
    buf.advance(header_len);

    let mut bundle = Bundle::with_timetag(TimeTag::from_raw(buf.get_u64()));
    bundle.set_charset(opts.charset);
    bundle.set_encoding(Encoding::Plain);

    // Anything shorter than a length word is trailing padding
    while buf.remaining() >= 4 {
        let len = buf.get_i32();
        if len == 0 {
            break;
        }
        let len = usize::try_from(len)
            .map_err(|_| Error::DecodeError(format!("negative bundle element length: {}", len)))?;
        need(buf, len)?;

        let child = codec::decode_nested(&buf[..len], opts, depth + 1)?;
        bundle.add(child);

        buf.advance(len);
        buf.advance(pad_len(len).min(buf.remaining()));
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
        'i' => {
            need(buf, 4)?;
            Argument::Int(buf.get_i32())
        }
        'u' => {
            need(buf, 4)?;
            Argument::Long(buf.get_u32() as i64)
        }
        'h' => {
            need(buf, 8)?;
            Argument::Long(buf.get_i64())
        }
        'f' => {
            need(buf, 4)?;
            Argument::Float(buf.get_f32())
        }
        'd' => {
            need(buf, 8)?;
            Argument::Double(buf.get_f64())
        }
        's' => Argument::String(decode_string(buf, opts.charset)?),
        'b' => Argument::Blob(decode_blob(buf)?),
        'c' => {
            need(buf, 4)?;
            let word = buf.get_u32();
            Argument::Char((word & 0xFF) as u8 as char)
        }
        'T' => Argument::Bool(true),
        'F' => Argument::Bool(false),
        'N' => Argument::Nil,
        'I' => Argument::Impulse,
        't' => {
            need(buf, 8)?;
            Argument::Time(TimeTag::from_raw(buf.get_u64()))
        }
        'B' => {
            need(buf, 8)?;
            let kind_char = buf.get_u8() as char;
            buf.advance(3);
            let count = buf.get_u32();
            let kind = BlobKind::from_char(kind_char).ok_or_else(|| {
                Error::DecodeError(format!("unknown typed blob element type: {:?}", kind_char))
            })?;
            Argument::TypedBlob(TypedBlob::from_parts(kind, count, decode_blob(buf)?)?)
        }
        'm' => {
            need(buf, 4)?;
            let status = buf.get_u8();
            let data1 = buf.get_u8();
            let data2 = buf.get_u8();
            buf.advance(1);
            Argument::Midi(MidiMessage::new(status, data1, data2))
        }
        other => match opts.unknown_types {
            UnknownTypePolicy::Tolerate => Argument::Nil,
            UnknownTypePolicy::Reject => return Err(Error::UnknownTypeTag(other)),
        },
    };
    Ok(arg)
}

#[inline(always)]
fn need(buf: &[u8], needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            have: buf.remaining(),
        });
    }
    Ok(())
}

fn decode_string(buf: &mut &[u8], charset: Charset) -> Result<String> {
    let nul = buf
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| Error::DecodeError("unterminated string".to_string()))?;
    let total = nul + 1 + pad_len(nul + 1);
    need(buf, total)?;

    let s = charset.decode(&buf[..nul])?;
    buf.advance(total);
    Ok(s)
}

fn decode_blob(buf: &mut &[u8]) -> Result<Vec<u8>> {
    need(buf, 4)?;
    let len = buf.get_i32();
    let len = usize::try_from(len)
        .map_err(|_| Error::DecodeError(format!("negative blob length: {}", len)))?;
    let total = len + pad_len(len);
    need(buf, total)?;

    let bytes = buf[..len].to_vec();
    buf.advance(total);
    Ok(bytes)
}

pub(crate) fn is_bundle(bytes: &[u8]) -> bool {
    bytes.first() == Some(&b'#')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(address: &str, args: &[Argument]) -> Vec<u8> {
        encode_message(address, args, Charset::Utf8).unwrap().to_vec()
    }

    #[test]
    fn test_pad_len() {
        assert_eq!(pad_len(0), 0);
        assert_eq!(pad_len(1), 3);
        assert_eq!(pad_len(4), 0);
        assert_eq!(pad_len(7), 1);
    }

    #[test]
    fn test_message_layout() {
        let bytes = encode("/a", &[Argument::Int(1), Argument::Bool(true)]);
        assert_eq!(
            bytes,
            vec![
                b'/', b'a', 0, 0, //
                b',', b'i', b'T', 0, //
                0, 0, 0, 1,
            ]
        );
    }

    #[test]
    fn test_no_argument_message() {
        let bytes = encode("/abc", &[]);
        assert_eq!(bytes, b"/abc\0\0\0\0,\0\0\0".to_vec());
    }

    #[test]
    fn test_char_and_midi_layout() {
        let bytes = encode(
            "/x",
            &[Argument::Char('A'), Argument::Midi(MidiMessage::new(0xC0, 7, 0))],
        );
        assert_eq!(&bytes[8..], &[0, 0, 0, b'A', 0xC0, 7, 0, 0]);
    }

    #[test]
    fn test_blob_padding() {
        let bytes = encode("/b", &[Argument::Blob(vec![1, 2, 3, 4, 5])]);
        assert_eq!(&bytes[8..], &[0, 0, 0, 5, 1, 2, 3, 4, 5, 0, 0, 0]);
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn test_missing_typetag_is_tolerated() {
        let msg = decode_message(b"/old\0\0\0\0", &DecodeOptions::default()).unwrap();
        assert_eq!(msg.address(), "/old");
        assert!(msg.arguments().is_empty());
    }

    #[test]
    fn test_unsigned_legacy_type() {
        let mut bytes = b"/u\0\0,u\0\0".to_vec();
        bytes.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
        let msg = decode_message(&bytes, &DecodeOptions::default()).unwrap();
        assert_eq!(msg.arguments(), &[Argument::Long(u32::MAX as i64)]);
    }

    #[test]
    fn test_unknown_type_policy() {
        let mut bytes = b"/q\0\0,xi\0".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 9]);

        let msg = decode_message(&bytes, &DecodeOptions::default()).unwrap();
        assert_eq!(msg.arguments(), &[Argument::Nil, Argument::Int(9)]);

        let strict = DecodeOptions {
            unknown_types: UnknownTypePolicy::Reject,
            ..Default::default()
        };
        assert!(matches!(
            decode_message(&bytes, &strict),
            Err(Error::UnknownTypeTag('x'))
        ));
    }

    #[test]
    fn test_truncated_input() {
        let bytes = encode("/t", &[Argument::Double(1.5)]);
        let err = decode_message(&bytes[..bytes.len() - 2], &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { needed: 8, have: 6 }));

        assert!(decode_message(b"/abc", &DecodeOptions::default()).is_err());
    }

    #[test]
    fn test_negative_blob_length() {
        let mut bytes = b"/b\0\0,b\0\0".to_vec();
        bytes.extend_from_slice(&(-4i32).to_be_bytes());
        assert!(matches!(
            decode_message(&bytes, &DecodeOptions::default()),
            Err(Error::DecodeError(_))
        ));
    }

    #[test]
    fn test_nul_in_string_rejected() {
        assert!(encode_message("/s", &[Argument::from("a\0b")], Charset::Utf8).is_err());
    }

    #[test]
    fn test_bundle_zero_length_terminates() {
        let child = encode("/c", &[]);
        let mut bytes = encode_bundle(TimeTag::IMMEDIATE, &[&child]).unwrap().to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        let bundle = decode_bundle(&bytes, &DecodeOptions::default(), 0).unwrap();
        assert_eq!(bundle.len(), 1);
        assert!(bundle.timetag().is_immediate());
    }
}
