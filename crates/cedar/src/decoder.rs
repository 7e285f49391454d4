//! Schema-driven Cedar decoder.
//!
//! Mirrors [`crate::encoder`] case by case. The type descriptor alone drives
//! the walk; bytes are never inspected to guess a shape.

use indexmap::IndexMap;

use crate::block::{BlockReader, PoolKey, PoolKind, PoolReader};
use crate::dedup::Lookup;
use crate::error::{DecodeError, DecodeErrorKind, PathStack};
use crate::label::{self, Label, LabelKind};
use crate::options::CodecOptions;
use crate::types::{Field, TypeDescriptor};
use crate::value::Value;

/// Cedar decoder.
///
/// Like [`CedarEncoder`](crate::CedarEncoder) it holds only configuration;
/// each call owns its block readers and dedup tables.
#[derive(Debug, Clone, Default)]
pub struct CedarDecoder {
    options: CodecOptions,
}

impl CedarDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Decodes a complete message. `ty` must be the descriptor the message
    /// was encoded with.
    pub fn decode(&self, data: &[u8], ty: &TypeDescriptor) -> Result<Value, DecodeError> {
        let _span = tracing::debug_span!("cedar_decode", len = data.len()).entered();
        ty.validate(self.options.max_depth)?;
        let mut ctx = DecodeContext {
            blocks: BlockReader::parse(data)?,
            path: PathStack::default(),
            at: 0,
            max_array_len: self.options.max_array_len,
            budget: self.options.max_output,
        };
        let result = ctx.read(ty, None);
        let value = match result {
            Ok(value) => value,
            Err(reason) => {
                let err = DecodeError {
                    reason,
                    offset: ctx.at,
                    path: ctx.path.to_field_path(),
                };
                tracing::debug!(error = %err, "cedar decode failed");
                return Err(err);
            }
        };
        ctx.blocks.finish()?;
        Ok(value)
    }
}

/// Per-call traversal state.
struct DecodeContext<'a, 't> {
    blocks: BlockReader<'a, 't>,
    path: PathStack<'t>,
    /// Absolute offset of the read in progress, reported on failure.
    at: usize,
    max_array_len: usize,
    /// Output units left, see [`CodecOptions::max_output`].
    budget: u64,
}

fn unexpected(label: Label, expected: &'static str) -> DecodeErrorKind {
    DecodeErrorKind::UnexpectedLabel {
        label: label.get(),
        expected,
    }
}

fn utf8(bytes: &[u8]) -> Result<String, DecodeErrorKind> {
    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeErrorKind::InvalidUtf8)
}

impl<'a, 't> DecodeContext<'a, 't> {
    fn read(&mut self, ty: &'t TypeDescriptor, dedupe: Option<&'t str>) -> Result<Value, DecodeErrorKind> {
        match ty {
            TypeDescriptor::Nullable { of } => {
                let mark = self.blocks.main().position();
                let label = self.read_label()?;
                match label.kind() {
                    LabelKind::Null => Ok(Value::Null),
                    LabelKind::Error => Ok(Value::Errored),
                    _ if of.is_self_framing() => {
                        self.blocks.main().rewind(mark);
                        self.read(of, dedupe)
                    }
                    LabelKind::NonNull => self.read(of, dedupe),
                    _ => Err(unexpected(label, "null or non-null marker")),
                }
            }
            TypeDescriptor::Dedupe { key, of } => self.read(of, Some(key.as_str())),
            TypeDescriptor::Record { fields } => {
                let mut entries = IndexMap::with_capacity(fields.len());
                for field in fields {
                    self.path.push_field(&field.name);
                    let value = self.read_field(field)?;
                    self.path.pop();
                    entries.insert(field.name.clone(), value);
                }
                Ok(Value::Record(entries))
            }
            TypeDescriptor::Array { of } => {
                let label = self.read_label()?;
                match label.kind() {
                    LabelKind::Length => self.read_items(label, of, dedupe),
                    LabelKind::Error => Ok(Value::Errored),
                    _ => Err(unexpected(label, "array length")),
                }
            }
            TypeDescriptor::String => self.pooled(PoolKind::String, dedupe, |b| utf8(b).map(Value::Str)),
            TypeDescriptor::Bytes => self.pooled(PoolKind::Bytes, dedupe, |b| Ok(Value::Bytes(b.to_vec()))),
            TypeDescriptor::Variant { cases } => self.pooled(PoolKind::Variant, dedupe, |b| {
                let case = utf8(b)?;
                if cases.contains(&case) {
                    Ok(Value::Str(case))
                } else {
                    Err(DecodeErrorKind::UnknownVariantCase(case))
                }
            }),
            TypeDescriptor::Int32 => {
                let label = self.read_label()?;
                match label.kind() {
                    LabelKind::Length if label.get() == 0 => {
                        let pool = self.blocks.pool(PoolKey {
                            kind: PoolKind::Int32,
                            dedupe,
                        })?;
                        self.at = pool.block.offset();
                        let n = label::read_i64(&mut pool.block)?;
                        let n = i32::try_from(n).map_err(|_| DecodeErrorKind::IntOutOfRange(n))?;
                        self.charge(1)?;
                        Ok(Value::Int(n))
                    }
                    LabelKind::Error => Ok(Value::Errored),
                    _ => Err(unexpected(label, "int marker")),
                }
            }
            TypeDescriptor::Boolean => {
                let label = self.read_label()?;
                match label.kind() {
                    LabelKind::True => Ok(Value::Bool(true)),
                    LabelKind::False => Ok(Value::Bool(false)),
                    LabelKind::Error => Ok(Value::Errored),
                    _ => Err(unexpected(label, "boolean")),
                }
            }
            TypeDescriptor::Null => Ok(Value::Null),
            TypeDescriptor::Float64 => {
                let main = self.blocks.main();
                self.at = main.offset();
                Ok(Value::Float(main.try_f64()?))
            }
            TypeDescriptor::Fixed { length } => {
                let main = self.blocks.main();
                self.at = main.offset();
                Ok(Value::Bytes(main.try_buf(*length)?.to_vec()))
            }
        }
    }

    fn read_field(&mut self, field: &'t Field) -> Result<Value, DecodeErrorKind> {
        let ty = &field.ty;
        if field.omittable {
            let mark = self.blocks.main().position();
            let label = self.read_label()?;
            match label.kind() {
                LabelKind::Absent => return Ok(Value::Absent),
                _ if ty.is_self_framing() => self.blocks.main().rewind(mark),
                LabelKind::Error => return Ok(Value::Errored),
                LabelKind::NonNull => {}
                _ => return Err(unexpected(label, "presence marker")),
            }
        }
        self.read(ty, None)
    }

    fn read_items(
        &mut self,
        label: Label,
        of: &'t TypeDescriptor,
        dedupe: Option<&'t str>,
    ) -> Result<Value, DecodeErrorKind> {
        let count = label.get() as u64;
        let remaining = self.blocks.main().remaining();
        let too_long = match of.min_main_len() {
            0 => false,
            min => count > (remaining / min) as u64,
        };
        let count = usize::try_from(count)
            .ok()
            .filter(|&n| n <= self.max_array_len && !too_long)
            .ok_or(DecodeErrorKind::LengthOutOfRange(count))?;
        self.charge(count as u64)?;
        let mut items = Vec::with_capacity(count.min(remaining));
        for i in 0..count {
            self.path.push_index(i);
            items.push(self.read(of, dedupe)?);
            self.path.pop();
        }
        Ok(Value::Array(items))
    }

    /// Reads a label for a pooled scalar and resolves it through the pool.
    fn pooled<F>(&mut self, kind: PoolKind, dedupe: Option<&'t str>, materialize: F) -> Result<Value, DecodeErrorKind>
    where
        F: FnOnce(&[u8]) -> Result<Value, DecodeErrorKind>,
    {
        let label = self.read_label()?;
        match label.kind() {
            LabelKind::Length | LabelKind::Backreference => {}
            LabelKind::Error => return Ok(Value::Errored),
            _ => return Err(unexpected(label, "length or backreference")),
        }
        let PoolReader { block, tracker } = self.blocks.pool(PoolKey { kind, dedupe })?;
        self.at = block.offset();
        let lookup = tracker.value_for_label(label, |len| materialize(block.try_buf(len)?))?;
        let value = match lookup {
            Lookup::Value(value) => value,
            Lookup::Sentinel(_) => return Err(unexpected(label, "length or backreference")),
        };
        let payload = match &value {
            Value::Str(s) => s.len(),
            Value::Bytes(b) => b.len(),
            _ => 0,
        };
        self.charge(1 + payload as u64)?;
        Ok(value)
    }

    /// Takes `units` from the output budget.
    fn charge(&mut self, units: u64) -> Result<(), DecodeErrorKind> {
        self.budget = self
            .budget
            .checked_sub(units)
            .ok_or(DecodeErrorKind::LengthOutOfRange(units))?;
        Ok(())
    }

    fn read_label(&mut self) -> Result<Label, DecodeErrorKind> {
        let main = self.blocks.main();
        self.at = main.offset();
        label::read(main)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type T = TypeDescriptor;

    fn decode(data: &[u8], ty: &T) -> Result<Value, DecodeError> {
        CedarDecoder::new().decode(data, ty)
    }

    #[test]
    fn booleans_decode_distinctly() {
        assert_eq!(decode(&[0x00, 0x02, 0x09], &T::Boolean), Ok(Value::Bool(true)));
        assert_eq!(decode(&[0x00, 0x02, 0x0b], &T::Boolean), Ok(Value::Bool(false)));
    }

    #[test]
    fn boolean_rejects_other_labels() {
        let err = decode(&[0x00, 0x02, 0x01], &T::Boolean).unwrap_err();
        assert_eq!(
            err.reason,
            DecodeErrorKind::UnexpectedLabel {
                label: -1,
                expected: "boolean"
            }
        );
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn nullable_non_self_framing_requires_marker() {
        let ty = T::nullable(T::Float64);
        assert_eq!(decode(&[0x00, 0x02, 0x01], &ty), Ok(Value::Null));
        assert_eq!(decode(&[0x00, 0x02, 0x05], &ty), Ok(Value::Errored));
        let mut data = vec![0x00, 0x12, 0x07];
        data.extend_from_slice(&0.5f64.to_be_bytes());
        assert_eq!(decode(&data, &ty), Ok(Value::Float(0.5)));
        // a TRUE label where the non-null marker belongs
        data[2] = 0x09;
        assert!(matches!(
            decode(&data, &ty).unwrap_err().reason,
            DecodeErrorKind::UnexpectedLabel { label: -5, .. }
        ));
    }

    #[test]
    fn backreference_past_pool_end_fails() {
        // pool "a"; main: new(1), backref -8 (index 1, only index 0 exists)
        let data = [0x00, 0x02, b'a', 0x06, 0x04, 0x02, 0x0f];
        let err = decode(&data, &T::array(T::String)).unwrap_err();
        assert_eq!(
            err.reason,
            DecodeErrorKind::InvalidBackreference {
                index: 1,
                pool_size: 1
            }
        );
        assert_eq!(err.path.to_string(), "$[1]");
    }

    #[test]
    fn string_payload_past_pool_end_fails() {
        // pool holds one byte but the label claims two
        let data = [0x00, 0x02, b'a', 0x02, 0x04];
        let err = decode(&data, &T::String).unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::UnexpectedEnd);
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn invalid_utf8_in_pool() {
        let data = [0x00, 0x02, 0xff, 0x02, 0x02];
        assert_eq!(
            decode(&data, &T::String).unwrap_err().reason,
            DecodeErrorKind::InvalidUtf8
        );
    }

    #[test]
    fn int32_out_of_range() {
        let big = label::encode(Label::new(i64::from(i32::MAX) + 1));
        let mut data = vec![0x00];
        data.extend(label::encode(Label::length(big.len())));
        data.extend(&big);
        data.extend([0x02, 0x00]);
        assert_eq!(
            decode(&data, &T::Int32).unwrap_err().reason,
            DecodeErrorKind::IntOutOfRange(i64::from(i32::MAX) + 1)
        );
    }

    #[test]
    fn array_count_bounded_by_remaining_bytes() {
        // claims 100 booleans with a single byte left
        let data = [0x00, 0x06, 0xc8, 0x01, 0x09];
        assert_eq!(
            decode(&data, &T::array(T::Boolean)).unwrap_err().reason,
            DecodeErrorKind::LengthOutOfRange(100)
        );
    }

    #[test]
    fn array_count_bounded_by_options() {
        let data = [0x00, 0x02, 0x06];
        let decoder = CedarDecoder::with_options(CodecOptions {
            max_array_len: 2,
            ..CodecOptions::default()
        });
        assert_eq!(
            decoder.decode(&data, &T::array(T::Null)).unwrap_err().reason,
            DecodeErrorKind::LengthOutOfRange(3)
        );
        assert_eq!(
            decode(&data, &T::array(T::Null)),
            Ok(Value::Array(vec![Value::Null; 3]))
        );
    }

    #[test]
    fn nested_zero_width_arrays_share_one_budget() {
        let ty = T::array(T::array(T::Null));
        // outer count 4, then four inner counts of 20
        let data = [0x00, 0x0a, 0x08, 0x28, 0x28, 0x28, 0x28];
        let decoder = CedarDecoder::with_options(CodecOptions {
            max_output: 64,
            ..CodecOptions::default()
        });
        let err = decoder.decode(&data, &ty).unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::LengthOutOfRange(20));
        assert_eq!(err.path.to_string(), "$[3]");
        let inner = Value::Array(vec![Value::Null; 20]);
        assert_eq!(decode(&data, &ty), Ok(Value::Array(vec![inner; 4])));
    }

    #[test]
    fn huge_counts_of_nulls_are_rejected() {
        // 19 bytes claiming four arrays of 2^22 nulls each
        let mut data = vec![0x00, 0x22, 0x08];
        for _ in 0..4 {
            data.extend([0x80, 0x80, 0x80, 0x04]);
        }
        let err = decode(&data, &T::array(T::array(T::Null))).unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::LengthOutOfRange(1 << 22));
        assert_eq!(err.path.to_string(), "$[0]");

        // within the per-array limit the shared budget still applies
        let decoder = CedarDecoder::with_options(CodecOptions {
            max_array_len: 1 << 22,
            max_output: 1 << 10,
            ..CodecOptions::default()
        });
        let err = decoder.decode(&data, &T::array(T::array(T::Null))).unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::LengthOutOfRange(1 << 22));
    }

    #[test]
    fn backreferences_are_charged_their_payload() {
        // pool "abcdefgh"; main: 10 items, one new and nine backreferences
        let mut data = vec![0x00, 0x10];
        data.extend_from_slice(b"abcdefgh");
        data.extend([0x16, 0x14, 0x10]);
        data.extend([0x0d; 9]);
        let ty = T::array(T::String);
        let decoder = CedarDecoder::with_options(CodecOptions {
            max_output: 40,
            ..CodecOptions::default()
        });
        let err = decoder.decode(&data, &ty).unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::LengthOutOfRange(9));
        assert_eq!(err.path.to_string(), "$[3]");
        assert_eq!(
            decode(&data, &ty),
            Ok(Value::Array(vec![Value::from("abcdefgh"); 10]))
        );
    }

    #[test]
    fn omittable_field_markers() {
        let ty = T::record([Field::new("f", T::Float64).omittable()]);
        assert_eq!(
            decode(&[0x00, 0x02, 0x03], &ty),
            Ok(Value::record([("f", Value::Absent)]))
        );
        assert_eq!(
            decode(&[0x00, 0x02, 0x05], &ty),
            Ok(Value::record([("f", Value::Errored)]))
        );
        let err = decode(&[0x00, 0x02, 0x01], &ty).unwrap_err();
        assert_eq!(err.path.to_string(), "$.f");
    }

    #[test]
    fn unread_main_bytes_are_rejected() {
        let err = decode(&[0x00, 0x04, 0x09, 0x09], &T::Boolean).unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::TrailingBytes { remaining: 1 });
        assert_eq!(err.offset, 3);
    }
}
