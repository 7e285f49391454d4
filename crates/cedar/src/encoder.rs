//! Schema-driven Cedar encoder.
//!
//! What each type writes:
//!
//! - `NULLABLE`: `Null`/`Error` sentinel, or `NonNull` before a type that is
//!   not self-framing, then the inner value
//! - `DEDUPE`: nothing; selects the pool used by the scalars below it
//! - `RECORD`: each declared field in order; omittable fields get `Absent`,
//!   or a `NonNull` presence marker before a type that is not self-framing
//! - `ARRAY`: element count, then each element
//! - `STRING`/`BYTES`/`VARIANT`: length (new) or backreference label; new
//!   payloads go to the pool
//! - `INT32`: label `0`; zigzag varint to the pool
//! - `BOOLEAN`: `True`/`False` sentinel
//! - `FLOAT64`/`FIXED`: raw bytes, no label
//! - `NULL`: nothing

use crate::block::{BlockWriter, PoolKey, PoolKind};
use crate::error::{EncodeError, EncodeErrorKind, PathStack};
use crate::label::Label;
use crate::options::CodecOptions;
use crate::types::{Field, TypeDescriptor};
use crate::value::Value;

/// Cedar encoder.
///
/// Holds only configuration; every [`CedarEncoder::encode`] call builds its
/// own buffers and dedup state, so one encoder can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct CedarEncoder {
    options: CodecOptions,
}

impl CedarEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Encodes `value` as described by `ty` into a complete message.
    pub fn encode(&self, value: &Value, ty: &TypeDescriptor) -> Result<Vec<u8>, EncodeError> {
        let _span = tracing::debug_span!("cedar_encode").entered();
        ty.validate(self.options.max_depth)?;
        let mut ctx = EncodeContext {
            blocks: BlockWriter::new(&self.options),
            path: PathStack::default(),
            max_array_len: self.options.max_array_len,
        };
        if let Err(reason) = ctx.write(value, ty, None) {
            let err = EncodeError {
                reason,
                path: ctx.path.to_field_path(),
            };
            tracing::debug!(error = %err, "cedar encode failed");
            return Err(err);
        }
        Ok(ctx.blocks.finish())
    }
}

/// Per-call traversal state.
struct EncodeContext<'t> {
    blocks: BlockWriter<'t>,
    path: PathStack<'t>,
    max_array_len: usize,
}

fn mismatch(ty: &TypeDescriptor, value: &Value) -> EncodeErrorKind {
    EncodeErrorKind::TypeMismatch {
        expected: ty.name(),
        found: value.kind_name(),
    }
}

impl<'t> EncodeContext<'t> {
    fn write(
        &mut self,
        value: &Value,
        ty: &'t TypeDescriptor,
        dedupe: Option<&'t str>,
    ) -> Result<(), EncodeErrorKind> {
        match ty {
            TypeDescriptor::Nullable { of } => match value {
                Value::Null => {
                    self.blocks.label(Label::NULL);
                    Ok(())
                }
                Value::Errored => {
                    self.blocks.label(Label::ERROR);
                    Ok(())
                }
                _ => {
                    if !of.is_self_framing() {
                        self.blocks.label(Label::NON_NULL);
                    }
                    self.write(value, of, dedupe)
                }
            },
            TypeDescriptor::Dedupe { key, of } => self.write(value, of, Some(key.as_str())),
            TypeDescriptor::Record { fields } => {
                let Value::Record(entries) = value else {
                    return Err(mismatch(ty, value));
                };
                if let Some(name) = entries
                    .keys()
                    .find(|name| !fields.iter().any(|f| &f.name == *name))
                {
                    return Err(EncodeErrorKind::UnknownField(name.clone()));
                }
                for field in fields {
                    self.path.push_field(&field.name);
                    self.write_field(entries.get(&field.name), field)?;
                    self.path.pop();
                }
                Ok(())
            }
            TypeDescriptor::Array { of } => match value {
                Value::Array(items) if items.len() > self.max_array_len => Err(EncodeErrorKind::ArrayTooLong {
                    len: items.len(),
                    max: self.max_array_len,
                }),
                Value::Array(items) => {
                    self.blocks.label(Label::length(items.len()));
                    for (i, item) in items.iter().enumerate() {
                        self.path.push_index(i);
                        self.write(item, of, dedupe)?;
                        self.path.pop();
                    }
                    Ok(())
                }
                Value::Errored => self.errored(),
                _ => Err(mismatch(ty, value)),
            },
            TypeDescriptor::String => match value {
                Value::Str(s) => self.pooled(PoolKind::String, dedupe, s.as_bytes()),
                Value::Errored => self.errored(),
                _ => Err(mismatch(ty, value)),
            },
            TypeDescriptor::Bytes => match value {
                Value::Bytes(b) => self.pooled(PoolKind::Bytes, dedupe, b),
                Value::Errored => self.errored(),
                _ => Err(mismatch(ty, value)),
            },
            TypeDescriptor::Variant { cases } => match value {
                Value::Str(s) if cases.iter().any(|c| c == s) => {
                    self.pooled(PoolKind::Variant, dedupe, s.as_bytes())
                }
                Value::Str(s) => Err(EncodeErrorKind::UnknownVariantCase(s.clone())),
                Value::Errored => self.errored(),
                _ => Err(mismatch(ty, value)),
            },
            TypeDescriptor::Int32 => match value {
                Value::Int(n) => {
                    self.blocks.label(Label::length(0));
                    self.blocks
                        .pool(PoolKey {
                            kind: PoolKind::Int32,
                            dedupe,
                        })
                        .push_i64(i64::from(*n));
                    Ok(())
                }
                Value::Errored => self.errored(),
                _ => Err(mismatch(ty, value)),
            },
            TypeDescriptor::Boolean => match value {
                Value::Bool(b) => {
                    self.blocks.label(if *b { Label::TRUE } else { Label::FALSE });
                    Ok(())
                }
                Value::Errored => self.errored(),
                _ => Err(mismatch(ty, value)),
            },
            TypeDescriptor::Null => match value {
                Value::Null => Ok(()),
                _ => Err(mismatch(ty, value)),
            },
            TypeDescriptor::Float64 => match value {
                Value::Float(f) => {
                    self.blocks.main().f64(*f);
                    Ok(())
                }
                _ => Err(mismatch(ty, value)),
            },
            TypeDescriptor::Fixed { length } => match value {
                Value::Bytes(b) if b.len() == *length => {
                    self.blocks.main().buf(b);
                    Ok(())
                }
                Value::Bytes(b) => Err(EncodeErrorKind::FixedLengthMismatch {
                    expected: *length,
                    found: b.len(),
                }),
                _ => Err(mismatch(ty, value)),
            },
        }
    }

    fn write_field(&mut self, value: Option<&Value>, field: &'t Field) -> Result<(), EncodeErrorKind> {
        let ty = &field.ty;
        let marked = field.omittable && !ty.is_self_framing();
        match value.unwrap_or(&Value::Absent) {
            Value::Absent if field.omittable => {
                self.blocks.label(Label::ABSENT);
                Ok(())
            }
            Value::Absent | Value::Null if ty.is_nullable() => self.write(&Value::Null, ty, None),
            Value::Absent => Err(EncodeErrorKind::MissingField),
            Value::Errored if marked => {
                self.blocks.label(Label::ERROR);
                Ok(())
            }
            present => {
                if marked {
                    self.blocks.label(Label::NON_NULL);
                }
                self.write(present, ty, None)
            }
        }
    }

    fn pooled(&mut self, kind: PoolKind, dedupe: Option<&'t str>, payload: &[u8]) -> Result<(), EncodeErrorKind> {
        let label = self.blocks.pool(PoolKey { kind, dedupe }).dedup(payload);
        self.blocks.label(label);
        Ok(())
    }

    fn errored(&mut self) -> Result<(), EncodeErrorKind> {
        self.blocks.label(Label::ERROR);
        Ok(())
    }
}
