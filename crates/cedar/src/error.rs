//! Cedar error types.

use std::fmt;

use cedar_buffers::BufferError;
use thiserror::Error;

/// Location of a failure inside the value tree, e.g. `$.user.tags[2]`.
///
/// `[]` marks "any element" and only shows up in schema errors, which are
/// found before any value is visited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
    Items,
}

impl FieldPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(i) => write!(f, "[{}]", i)?,
                PathSegment::Items => f.write_str("[]")?,
            }
        }
        Ok(())
    }
}

/// Borrowed path stack maintained during a walk. Only turned into an owned
/// [`FieldPath`] when an error escapes.
#[derive(Debug, Default)]
pub(crate) struct PathStack<'t> {
    segments: Vec<Segment<'t>>,
}

#[derive(Debug, Clone, Copy)]
enum Segment<'t> {
    Field(&'t str),
    Index(usize),
    Items,
}

impl<'t> PathStack<'t> {
    #[inline]
    pub(crate) fn push_field(&mut self, name: &'t str) {
        self.segments.push(Segment::Field(name));
    }

    #[inline]
    pub(crate) fn push_index(&mut self, index: usize) {
        self.segments.push(Segment::Index(index));
    }

    #[inline]
    pub(crate) fn push_items(&mut self) {
        self.segments.push(Segment::Items);
    }

    #[inline]
    pub(crate) fn pop(&mut self) {
        self.segments.pop();
    }

    pub(crate) fn to_field_path(&self) -> FieldPath {
        FieldPath {
            segments: self
                .segments
                .iter()
                .map(|s| match *s {
                    Segment::Field(name) => PathSegment::Field(name.to_string()),
                    Segment::Index(i) => PathSegment::Index(i),
                    Segment::Items => PathSegment::Items,
                })
                .collect(),
        }
    }
}

/// Problems with a type descriptor itself, detected before any byte is
/// written or read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("dedupe key `{inner}` nested inside dedupe key `{outer}`")]
    NestedDedupe { outer: String, inner: String },
    #[error("{type_name} cannot be deduplicated (dedupe key `{key}`)")]
    UnhandledTypeVariant { type_name: &'static str, key: String },
    #[error("duplicate record field `{0}`")]
    DuplicateField(String),
    #[error("type nesting exceeds depth limit of {0}")]
    DepthLimitExceeded(usize),
}

/// A [`SchemaError`] with the position in the type tree where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} (path {path})")]
pub struct SchemaViolation {
    pub reason: SchemaError,
    pub path: FieldPath,
}

/// Why an encode call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeErrorKind {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("required field is missing")]
    MissingField,
    #[error("field `{0}` is not declared by the record type")]
    UnknownField(String),
    #[error("fixed value has {found} bytes, type requires {expected}")]
    FixedLengthMismatch { expected: usize, found: usize },
    #[error("`{0}` is not a case of the variant type")]
    UnknownVariantCase(String),
    #[error("array of {len} elements exceeds the limit of {max}")]
    ArrayTooLong { len: usize, max: usize },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Encode failure: the reason plus the value path being written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cedar encode failed: {reason} (path {path})")]
pub struct EncodeError {
    pub reason: EncodeErrorKind,
    pub path: FieldPath,
}

impl From<SchemaViolation> for EncodeError {
    fn from(v: SchemaViolation) -> Self {
        Self {
            reason: v.reason.into(),
            path: v.path,
        }
    }
}

/// Why a decode call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeErrorKind {
    #[error("malformed or non-canonical varint")]
    MalformedVarint,
    #[error("backreference to index {index} but pool holds {pool_size} values")]
    InvalidBackreference { index: u64, pool_size: usize },
    #[error("unsupported header flags 0x{0:02x}")]
    UnsupportedFlags(u8),
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("invalid block length label {0}")]
    InvalidBlockLength(i64),
    #[error("block of {length} bytes runs past the end of input ({available} available)")]
    TruncatedBlock { length: u64, available: usize },
    #[error("message has no main block")]
    MissingMainBlock,
    #[error("type requires another value pool but all pool blocks are claimed")]
    MissingPoolBlock,
    #[error("{remaining} unread bytes left in a block")]
    TrailingBytes { remaining: usize },
    #[error("{0} pool blocks were never claimed by the type")]
    UnclaimedPoolBlocks(usize),
    #[error("unexpected label {label}, expected {expected}")]
    UnexpectedLabel { label: i64, expected: &'static str },
    #[error("length {0} is out of range")]
    LengthOutOfRange(u64),
    #[error("integer {0} does not fit in INT32")]
    IntOutOfRange(i64),
    #[error("invalid UTF-8 in string payload")]
    InvalidUtf8,
    #[error("`{0}` is not a case of the variant type")]
    UnknownVariantCase(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl From<BufferError> for DecodeErrorKind {
    fn from(_: BufferError) -> Self {
        DecodeErrorKind::UnexpectedEnd
    }
}

/// Decode failure: the reason, the absolute byte offset in the message where
/// the failing read started, and the value path being read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cedar decode failed: {reason} at byte {offset} (path {path})")]
pub struct DecodeError {
    pub reason: DecodeErrorKind,
    pub offset: usize,
    pub path: FieldPath,
}

impl DecodeError {
    pub(crate) fn at(reason: DecodeErrorKind, offset: usize) -> Self {
        Self {
            reason,
            offset,
            path: FieldPath::default(),
        }
    }
}

impl From<SchemaViolation> for DecodeError {
    fn from(v: SchemaViolation) -> Self {
        Self {
            reason: v.reason.into(),
            offset: 0,
            path: v.path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_display() {
        let mut stack = PathStack::default();
        assert_eq!(stack.to_field_path().to_string(), "$");
        assert!(stack.to_field_path().is_root());
        stack.push_field("user");
        stack.push_field("tags");
        stack.push_index(2);
        assert_eq!(stack.to_field_path().to_string(), "$.user.tags[2]");
        assert!(!stack.to_field_path().is_root());
        stack.pop();
        stack.push_items();
        assert_eq!(stack.to_field_path().to_string(), "$.user.tags[]");
    }

    #[test]
    fn decode_error_message_carries_offset_and_path() {
        let err = DecodeError {
            reason: DecodeErrorKind::InvalidBackreference {
                index: 3,
                pool_size: 1,
            },
            offset: 17,
            path: FieldPath {
                segments: vec![PathSegment::Field("name".into())],
            },
        };
        assert_eq!(
            err.to_string(),
            "cedar decode failed: backreference to index 3 but pool holds 1 values at byte 17 (path $.name)"
        );
    }
}
