//! Typed blobs
//!
//! A typed blob carries a homogeneous numeric array as
//! `(element type, count, raw big-endian bytes)`. The type and count live
//! outside the payload so a reader can check the length before touching
//! the content.

use bytes::{Buf, BufMut};

use crate::{Error, Result};

/// Element type of a typed blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobKind {
    Int32,
    Int64,
    Float32,
    Float64,
}

impl BlobKind {
    /// Type character written on the wire
    pub fn type_char(&self) -> char {
        match self {
            BlobKind::Int32 => 'i',
            BlobKind::Int64 => 'h',
            BlobKind::Float32 => 'f',
            BlobKind::Float64 => 'd',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'i' => Some(BlobKind::Int32),
            'h' => Some(BlobKind::Int64),
            'f' => Some(BlobKind::Float32),
            'd' => Some(BlobKind::Float64),
            _ => None,
        }
    }

    /// Width of one element in bytes
    pub fn width(&self) -> usize {
        match self {
            BlobKind::Int32 | BlobKind::Float32 => 4,
            BlobKind::Int64 | BlobKind::Float64 => 8,
        }
    }
}

/// Unpacked contents of a typed blob
#[derive(Debug, Clone, PartialEq)]
pub enum BlobValues {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl BlobValues {
    pub fn kind(&self) -> BlobKind {
        match self {
            BlobValues::Int32(_) => BlobKind::Int32,
            BlobValues::Int64(_) => BlobKind::Int64,
            BlobValues::Float32(_) => BlobKind::Float32,
            BlobValues::Float64(_) => BlobKind::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BlobValues::Int32(v) => v.len(),
            BlobValues::Int64(v) => v.len(),
            BlobValues::Float32(v) => v.len(),
            BlobValues::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A homogeneous numeric array in packed form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypedBlob {
    kind: BlobKind,
    count: u32,
    data: Vec<u8>,
}

impl TypedBlob {
    /// Pack a typed sequence
    pub fn pack(values: &BlobValues) -> Self {
        let kind = values.kind();
        let mut data = Vec::with_capacity(values.len() * kind.width());

        match values {
            BlobValues::Int32(v) => v.iter().for_each(|x| data.put_i32(*x)),
            BlobValues::Int64(v) => v.iter().for_each(|x| data.put_i64(*x)),
            BlobValues::Float32(v) => v.iter().for_each(|x| data.put_f32(*x)),
            BlobValues::Float64(v) => v.iter().for_each(|x| data.put_f64(*x)),
        }

        Self {
            kind,
            count: values.len() as u32,
            data,
        }
    }

    pub fn from_i32s(values: &[i32]) -> Self {
        Self::pack(&BlobValues::Int32(values.to_vec()))
    }

    pub fn from_i64s(values: &[i64]) -> Self {
        Self::pack(&BlobValues::Int64(values.to_vec()))
    }

    pub fn from_f32s(values: &[f32]) -> Self {
        Self::pack(&BlobValues::Float32(values.to_vec()))
    }

    pub fn from_f64s(values: &[f64]) -> Self {
        Self::pack(&BlobValues::Float64(values.to_vec()))
    }

    /// Assemble from wire parts, checking `data.len() == count * width`
    pub fn from_parts(kind: BlobKind, count: u32, data: Vec<u8>) -> Result<Self> {
        let expected = count as usize * kind.width();
        if data.len() != expected {
            return Err(Error::TypedBlobLength {
                count,
                width: kind.width(),
                len: data.len(),
            });
        }
        Ok(Self { kind, count, data })
    }

    pub fn kind(&self) -> BlobKind {
        self.kind
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Raw big-endian element bytes
    pub fn raw_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Re-derive the typed sequence from the raw bytes
    pub fn unpack(&self) -> BlobValues {
        let mut buf = self.data.as_slice();
        let n = self.count as usize;

        match self.kind {
            BlobKind::Int32 => BlobValues::Int32((0..n).map(|_| buf.get_i32()).collect()),
            BlobKind::Int64 => BlobValues::Int64((0..n).map(|_| buf.get_i64()).collect()),
            BlobKind::Float32 => BlobValues::Float32((0..n).map(|_| buf.get_f32()).collect()),
            BlobKind::Float64 => BlobValues::Float64((0..n).map(|_| buf.get_f64()).collect()),
        }
    }
}
