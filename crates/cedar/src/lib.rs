//! Cedar: a schema-driven, deduplicating binary format for typed response
//! trees.
//!
//! A message is a one-byte header followed by length-prefixed blocks: zero or
//! more value pools, then the main block. The main block is a stream of
//! zigzag varint [`Label`]s and raw fixed-width bytes, walked in the order the
//! [`TypeDescriptor`] dictates. String, bytes, int and variant payloads live in
//! pools; a repeated payload costs only a backreference label.
//!
//! ```
//! use cedar_codec::{decode, encode, Field, TypeDescriptor as T, Value};
//!
//! let ty = T::record([
//!     Field::new("name", T::String),
//!     Field::new("tags", T::array(T::dedupe("tags", T::String))),
//! ]);
//! let value = Value::record([
//!     ("name", Value::from("a")),
//!     ("tags", Value::Array(vec!["x".into(), "x".into(), "y".into()])),
//! ]);
//!
//! let bytes = encode(&value, &ty).unwrap();
//! assert_eq!(decode(&bytes, &ty).unwrap(), value);
//! ```

pub mod block;
pub mod dedup;
pub mod label;

mod decoder;
mod encoder;
mod error;
mod options;
mod types;
mod value;

pub use decoder::CedarDecoder;
pub use encoder::CedarEncoder;
pub use error::{
    DecodeError, DecodeErrorKind, EncodeError, EncodeErrorKind, FieldPath, PathSegment, SchemaError,
    SchemaViolation,
};
pub use label::{Label, LabelKind};
pub use options::CodecOptions;
pub use types::{Field, TypeDescriptor};
pub use value::Value;

/// Encodes `value` with default [`CodecOptions`].
pub fn encode(value: &Value, ty: &TypeDescriptor) -> Result<Vec<u8>, EncodeError> {
    CedarEncoder::new().encode(value, ty)
}

/// Decodes a message with default [`CodecOptions`].
pub fn decode(data: &[u8], ty: &TypeDescriptor) -> Result<Value, DecodeError> {
    CedarDecoder::new().decode(data, ty)
}

pub fn encode_with(value: &Value, ty: &TypeDescriptor, options: &CodecOptions) -> Result<Vec<u8>, EncodeError> {
    CedarEncoder::with_options(options.clone()).encode(value, ty)
}

pub fn decode_with(data: &[u8], ty: &TypeDescriptor, options: &CodecOptions) -> Result<Value, DecodeError> {
    CedarDecoder::with_options(options.clone()).decode(data, ty)
}
