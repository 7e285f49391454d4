//! Labels: the signed integer atom of the Cedar format.
//!
//! A label is written as a zigzag-mapped, base-128 varint (least significant
//! group first, continuation bit on every byte but the last). One value space
//! carries three meanings:
//!
//! - `label >= 0`: a length (string bytes, array elements, block size)
//! - `-6..=-1`: one of six reserved sentinels
//! - `label < -6`: a backreference into a value pool
//!
//! Backreference ids are handed out downwards from `-7`, so the n-th value
//! added to a pool (zero based) is referenced by `-7 - n`.

use cedar_buffers::{Reader, Writer};

use crate::error::DecodeErrorKind;

/// Longest varint a 64-bit value can need.
pub const MAX_VARINT_LEN: usize = 10;

/// A decoded label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(i64);

/// What a label means, see [`Label::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Length,
    Null,
    Absent,
    Error,
    NonNull,
    True,
    False,
    Backreference,
}

impl Label {
    pub const NULL: Label = Label(-1);
    pub const ABSENT: Label = Label(-2);
    pub const ERROR: Label = Label(-3);
    pub const NON_NULL: Label = Label(-4);
    pub const TRUE: Label = Label(-5);
    pub const FALSE: Label = Label(-6);

    /// The most negative sentinel.
    pub const LOWEST_RESERVED: i64 = -6;

    /// Id of the first value added to any pool.
    pub const FIRST_BACKREFERENCE: Label = Label(Self::LOWEST_RESERVED - 1);

    #[inline]
    pub const fn new(n: i64) -> Self {
        Label(n)
    }

    /// A length label.
    #[inline]
    pub fn length(len: usize) -> Self {
        Label(i64::try_from(len).unwrap_or(i64::MAX))
    }

    #[inline]
    pub const fn get(self) -> i64 {
        self.0
    }

    pub const fn kind(self) -> LabelKind {
        match self.0 {
            n if n >= 0 => LabelKind::Length,
            -1 => LabelKind::Null,
            -2 => LabelKind::Absent,
            -3 => LabelKind::Error,
            -4 => LabelKind::NonNull,
            -5 => LabelKind::True,
            -6 => LabelKind::False,
            _ => LabelKind::Backreference,
        }
    }

    /// The length carried by a `Length` label.
    #[inline]
    pub const fn as_length(self) -> Option<u64> {
        if self.0 >= 0 {
            Some(self.0 as u64)
        } else {
            None
        }
    }

    /// Pool index a backreference label points at.
    ///
    /// `(LOWEST_RESERVED - 1) - label`; `None` for non-backreference labels.
    #[inline]
    pub const fn backreference_index(self) -> Option<u64> {
        if self.0 < Self::LOWEST_RESERVED {
            // cannot overflow: the result lies in 0..=i64::MAX - 6
            Some(((Self::LOWEST_RESERVED - 1) - self.0) as u64)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------- zigzag

#[inline]
pub const fn zigzag(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

#[inline]
pub const fn unzigzag(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

// ---------------------------------------------------------------- encode

/// Number of bytes [`encode`] produces for `label`.
pub fn encoded_len(label: Label) -> usize {
    let bits = 64 - zigzag(label.0).leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Encodes a label into a fresh byte vector.
pub fn encode(label: Label) -> Vec<u8> {
    let mut writer = Writer::with_alloc_size(MAX_VARINT_LEN);
    write(&mut writer, label);
    writer.into_vec()
}

pub fn write(writer: &mut Writer, label: Label) {
    write_i64(writer, label.0);
}

/// Writes a signed integer with the label encoding.
pub fn write_i64(writer: &mut Writer, n: i64) {
    let mut n = zigzag(n);
    loop {
        let low7 = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            writer.u8(low7);
            return;
        }
        writer.u8(low7 | 0x80);
    }
}

// ---------------------------------------------------------------- decode

/// Decodes a label from a standalone byte slice, which must hold exactly one
/// label.
pub fn decode(bytes: &[u8]) -> Result<Label, DecodeErrorKind> {
    let mut reader = Reader::new(bytes);
    let label = read(&mut reader)?;
    if !reader.is_exhausted() {
        return Err(DecodeErrorKind::TrailingBytes {
            remaining: reader.remaining(),
        });
    }
    Ok(label)
}

pub fn read(reader: &mut Reader<'_>) -> Result<Label, DecodeErrorKind> {
    read_i64(reader).map(Label)
}

/// Reads a signed integer written by [`write_i64`].
///
/// Only the canonical (shortest) form is accepted: a multi-byte encoding may
/// not end in a zero group, and the tenth byte may only carry the single bit
/// left over from the first nine.
pub fn read_i64(reader: &mut Reader<'_>) -> Result<i64, DecodeErrorKind> {
    let mut result: u64 = 0;
    for i in 0..MAX_VARINT_LEN {
        let byte = reader
            .try_u8()
            .map_err(|_| DecodeErrorKind::MalformedVarint)?;
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(DecodeErrorKind::MalformedVarint);
        }
        result |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            if byte == 0 && i > 0 {
                return Err(DecodeErrorKind::MalformedVarint);
            }
            return Ok(unzigzag(result));
        }
    }
    Err(DecodeErrorKind::MalformedVarint)
}
