//! Type descriptors: the schema that drives both the encoder and the decoder.
//!
//! Descriptors (de)serialize to the tagged JSON shape produced by the
//! execution layer:
//!
//! ```json
//! {"type": "RECORD", "fields": [
//!   {"name": "name", "type": {"type": "STRING"}},
//!   {"name": "tags", "type": {"type": "ARRAY", "of": {"type": "DEDUPE", "key": "tag", "of": {"type": "STRING"}}}, "omittable": true}
//! ]}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PathStack, SchemaError, SchemaViolation};

/// Schema node describing the shape and encoding of one piece of data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeDescriptor {
    Nullable { of: Box<TypeDescriptor> },
    Dedupe { key: String, of: Box<TypeDescriptor> },
    Record { fields: Vec<Field> },
    Array { of: Box<TypeDescriptor> },
    String,
    Bytes,
    Int32,
    Boolean,
    Null,
    Float64,
    Fixed { length: usize },
    /// A string restricted to a closed set of cases (GraphQL enums).
    Variant { cases: Vec<String> },
}

/// A declared record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    /// The field may be left out entirely (written as an `Absent` marker).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub omittable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            omittable: false,
        }
    }

    pub fn omittable(mut self) -> Self {
        self.omittable = true;
        self
    }
}

impl TypeDescriptor {
    pub fn nullable(of: TypeDescriptor) -> Self {
        TypeDescriptor::Nullable { of: Box::new(of) }
    }

    pub fn dedupe(key: impl Into<String>, of: TypeDescriptor) -> Self {
        TypeDescriptor::Dedupe {
            key: key.into(),
            of: Box::new(of),
        }
    }

    pub fn array(of: TypeDescriptor) -> Self {
        TypeDescriptor::Array { of: Box::new(of) }
    }

    pub fn record(fields: impl IntoIterator<Item = Field>) -> Self {
        TypeDescriptor::Record {
            fields: fields.into_iter().collect(),
        }
    }

    pub fn fixed(length: usize) -> Self {
        TypeDescriptor::Fixed { length }
    }

    pub fn variant<I, S>(cases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeDescriptor::Variant {
            cases: cases.into_iter().map(Into::into).collect(),
        }
    }

    /// Upper-case tag name, as used on the wire schema and in errors.
    pub fn name(&self) -> &'static str {
        match self {
            TypeDescriptor::Nullable { .. } => "NULLABLE",
            TypeDescriptor::Dedupe { .. } => "DEDUPE",
            TypeDescriptor::Record { .. } => "RECORD",
            TypeDescriptor::Array { .. } => "ARRAY",
            TypeDescriptor::String => "STRING",
            TypeDescriptor::Bytes => "BYTES",
            TypeDescriptor::Int32 => "INT32",
            TypeDescriptor::Boolean => "BOOLEAN",
            TypeDescriptor::Null => "NULL",
            TypeDescriptor::Float64 => "FLOAT64",
            TypeDescriptor::Fixed { .. } => "FIXED",
            TypeDescriptor::Variant { .. } => "VARIANT",
        }
    }

    /// Whether the encoding of this type starts with its own label.
    ///
    /// Types that do not need a separate non-null or presence marker in
    /// front of them. `RECORD` has no label of its own: its first byte
    /// belongs to its first field, which may itself be a null marker.
    pub fn is_self_framing(&self) -> bool {
        match self {
            TypeDescriptor::Dedupe { of, .. } => of.is_self_framing(),
            TypeDescriptor::Nullable { .. }
            | TypeDescriptor::Array { .. }
            | TypeDescriptor::String
            | TypeDescriptor::Bytes
            | TypeDescriptor::Variant { .. }
            | TypeDescriptor::Int32
            | TypeDescriptor::Boolean => true,
            TypeDescriptor::Record { .. }
            | TypeDescriptor::Null
            | TypeDescriptor::Float64
            | TypeDescriptor::Fixed { .. } => false,
        }
    }

    /// `NULLABLE`, possibly under a `DEDUPE`.
    pub fn is_nullable(&self) -> bool {
        match self {
            TypeDescriptor::Nullable { .. } => true,
            TypeDescriptor::Dedupe { of, .. } => of.is_nullable(),
            _ => false,
        }
    }

    /// Fewest bytes one value of this type occupies in the main block.
    pub fn min_main_len(&self) -> usize {
        match self {
            TypeDescriptor::Dedupe { of, .. } => of.min_main_len(),
            TypeDescriptor::Record { fields } => fields
                .iter()
                .map(|f| if f.omittable { 1 } else { f.ty.min_main_len() })
                .fold(0usize, usize::saturating_add),
            TypeDescriptor::Nullable { .. }
            | TypeDescriptor::Array { .. }
            | TypeDescriptor::String
            | TypeDescriptor::Bytes
            | TypeDescriptor::Variant { .. }
            | TypeDescriptor::Int32
            | TypeDescriptor::Boolean => 1,
            TypeDescriptor::Null => 0,
            TypeDescriptor::Float64 => 8,
            TypeDescriptor::Fixed { length } => *length,
        }
    }

    /// Checks the descriptor before a walk: no nested dedupe scopes, dedupe
    /// keys only over poolable types, unique field names, bounded depth.
    pub fn validate(&self, max_depth: usize) -> Result<(), SchemaViolation> {
        let mut path = PathStack::default();
        self.check(0, max_depth, None, &mut path)
            .map_err(|reason| SchemaViolation {
                reason,
                path: path.to_field_path(),
            })
    }

    fn check<'t>(
        &'t self,
        depth: usize,
        max_depth: usize,
        dedupe: Option<&'t str>,
        path: &mut PathStack<'t>,
    ) -> Result<(), SchemaError> {
        if depth > max_depth {
            return Err(SchemaError::DepthLimitExceeded(max_depth));
        }
        let unpoolable = |ty: &TypeDescriptor| match dedupe {
            Some(key) => Err(SchemaError::UnhandledTypeVariant {
                type_name: ty.name(),
                key: key.to_string(),
            }),
            None => Ok(()),
        };
        match self {
            TypeDescriptor::Nullable { of } => of.check(depth + 1, max_depth, dedupe, path),
            TypeDescriptor::Dedupe { key, of } => {
                if let Some(outer) = dedupe {
                    return Err(SchemaError::NestedDedupe {
                        outer: outer.to_string(),
                        inner: key.clone(),
                    });
                }
                of.check(depth + 1, max_depth, Some(key.as_str()), path)
            }
            TypeDescriptor::Record { fields } => {
                unpoolable(self)?;
                for (i, field) in fields.iter().enumerate() {
                    path.push_field(&field.name);
                    if fields[..i].iter().any(|f| f.name == field.name) {
                        return Err(SchemaError::DuplicateField(field.name.clone()));
                    }
                    field.ty.check(depth + 1, max_depth, None, path)?;
                    path.pop();
                }
                Ok(())
            }
            TypeDescriptor::Array { of } => {
                path.push_items();
                of.check(depth + 1, max_depth, dedupe, path)?;
                path.pop();
                Ok(())
            }
            TypeDescriptor::String
            | TypeDescriptor::Bytes
            | TypeDescriptor::Int32
            | TypeDescriptor::Variant { .. } => Ok(()),
            TypeDescriptor::Boolean
            | TypeDescriptor::Null
            | TypeDescriptor::Float64
            | TypeDescriptor::Fixed { .. } => unpoolable(self),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Nullable { of } => write!(f, "{}?", of),
            TypeDescriptor::Dedupe { key, of } => write!(f, "{}#{}", of, key),
            TypeDescriptor::Record { fields } => {
                f.write_str("{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    let marker = if field.omittable { "?" } else { "" };
                    write!(f, "{}{}: {}", field.name, marker, field.ty)?;
                }
                f.write_str("}")
            }
            TypeDescriptor::Array { of } => write!(f, "[{}]", of),
            TypeDescriptor::String => f.write_str("String"),
            TypeDescriptor::Bytes => f.write_str("Bytes"),
            TypeDescriptor::Int32 => f.write_str("Int32"),
            TypeDescriptor::Boolean => f.write_str("Boolean"),
            TypeDescriptor::Null => f.write_str("Null"),
            TypeDescriptor::Float64 => f.write_str("Float64"),
            TypeDescriptor::Fixed { length } => write!(f, "Fixed({})", length),
            TypeDescriptor::Variant { cases } => write!(f, "Variant({})", cases.join(" | ")),
        }
    }
}
