//! Argument values and small wire types

use serde::{Deserialize, Serialize};

use crate::blob::TypedBlob;
use crate::time::TimeTag;
use crate::{Error, Result};

/// A single message argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// `i`
    Int(i32),
    /// `h`
    Long(i64),
    /// `f`
    Float(f32),
    /// `d`
    Double(f64),
    /// `s`
    String(String),
    /// `b`
    Blob(Vec<u8>),
    /// `c`, one 8-bit character
    Char(char),
    /// `T` / `F`
    Bool(bool),
    /// `N`
    Nil,
    /// `I`, a bang with no value
    Impulse,
    /// `t`
    Time(TimeTag),
    /// `B`
    TypedBlob(TypedBlob),
    /// `m`
    Midi(MidiMessage),
    /// `[` ... `]`, may nest
    Array(Vec<Argument>),
}

impl Argument {
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Argument::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Argument::Int(i) => Some(*i as i64),
            Argument::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Argument::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Argument::Float(f) => Some(*f as f64),
            Argument::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Argument::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Argument::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Argument::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Argument]> {
        match self {
            Argument::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Argument::Nil)
    }
}

impl From<i32> for Argument {
    fn from(v: i32) -> Self {
        Argument::Int(v)
    }
}

impl From<i64> for Argument {
    fn from(v: i64) -> Self {
        Argument::Long(v)
    }
}

impl From<f32> for Argument {
    fn from(v: f32) -> Self {
        Argument::Float(v)
    }
}

impl From<f64> for Argument {
    fn from(v: f64) -> Self {
        Argument::Double(v)
    }
}

impl From<&str> for Argument {
    fn from(v: &str) -> Self {
        Argument::String(v.to_string())
    }
}

impl From<String> for Argument {
    fn from(v: String) -> Self {
        Argument::String(v)
    }
}

impl From<Vec<u8>> for Argument {
    fn from(v: Vec<u8>) -> Self {
        Argument::Blob(v)
    }
}

impl From<&[u8]> for Argument {
    fn from(v: &[u8]) -> Self {
        Argument::Blob(v.to_vec())
    }
}

impl From<char> for Argument {
    fn from(v: char) -> Self {
        Argument::Char(v)
    }
}

impl From<bool> for Argument {
    fn from(v: bool) -> Self {
        Argument::Bool(v)
    }
}

impl From<TimeTag> for Argument {
    fn from(v: TimeTag) -> Self {
        Argument::Time(v)
    }
}

impl From<TypedBlob> for Argument {
    fn from(v: TypedBlob) -> Self {
        Argument::TypedBlob(v)
    }
}

impl From<MidiMessage> for Argument {
    fn from(v: MidiMessage) -> Self {
        Argument::Midi(v)
    }
}

impl From<Vec<Argument>> for Argument {
    fn from(v: Vec<Argument>) -> Self {
        Argument::Array(v)
    }
}

impl<T: Into<Argument>> From<Option<T>> for Argument {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Argument::Nil)
    }
}

/// A short MIDI message of one to three bytes.
///
/// The length is implied by the status byte, so only the three bytes are
/// stored; unused data bytes are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MidiMessage {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiMessage {
    pub fn new(status: u8, data1: u8, data2: u8) -> Self {
        let mut msg = Self { status, data1, data2 };
        // Bytes past the implied length are never transmitted.
        match msg.len() {
            1 => {
                msg.data1 = 0;
                msg.data2 = 0;
            }
            2 => msg.data2 = 0,
            _ => {}
        }
        msg
    }

    /// Build from 1-3 raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [s] => Ok(Self::new(*s, 0, 0)),
            [s, d1] => Ok(Self::new(*s, *d1, 0)),
            [s, d1, d2] => Ok(Self::new(*s, *d1, *d2)),
            _ => Err(Error::UnsupportedArgument(format!(
                "MIDI message must be 1-3 bytes, got {}",
                bytes.len()
            ))),
        }
    }

    /// Number of meaningful bytes implied by the status byte
    pub fn len(&self) -> usize {
        match self.status {
            0xC0..=0xDF | 0xF1 | 0xF3 => 2,
            0xF6..=0xFF | 0xF4 | 0xF5 => 1,
            _ => 3,
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// The meaningful bytes
    pub fn as_bytes(&self) -> Vec<u8> {
        [self.status, self.data1, self.data2][..self.len()].to_vec()
    }
}

/// Character encoding applied to OSC strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    #[default]
    Utf8,
    /// ISO-8859-1, one byte per character
    Latin1,
}

impl Charset {
    pub fn encode(&self, s: &str) -> Result<Vec<u8>> {
        match self {
            Charset::Utf8 => Ok(s.as_bytes().to_vec()),
            Charset::Latin1 => s
                .chars()
                .map(|c| {
                    u8::try_from(c as u32).map_err(|_| {
                        Error::EncodeError(format!("{:?} is not representable in Latin-1", c))
                    })
                })
                .collect(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            Charset::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| Error::DecodeError(e.to_string())),
            Charset::Latin1 => Ok(bytes.iter().map(|b| *b as char).collect()),
        }
    }
}

/// Convert a `c` argument to its single wire byte
pub(crate) fn char_byte(c: char) -> Result<u8> {
    u8::try_from(c as u32).map_err(|_| {
        Error::UnsupportedArgument(format!("char {:?} does not fit in one byte", c))
    })
}
