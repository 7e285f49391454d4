//! Codec configuration.

use serde::{Deserialize, Serialize};

/// Tuning and safety limits shared by [`CedarEncoder`](crate::CedarEncoder)
/// and [`CedarDecoder`](crate::CedarDecoder).
///
/// Missing keys take their defaults when deserializing:
///
/// ```
/// use cedar_codec::CodecOptions;
///
/// let options = CodecOptions::from_json(r#"{"max_depth": 32}"#).unwrap();
/// assert_eq!(options.max_depth, 32);
/// assert_eq!(options.initial_capacity, CodecOptions::default().initial_capacity);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Bytes allocated up front for the main block.
    pub initial_capacity: usize,
    /// Bytes allocated up front for each value pool.
    pub pool_capacity: usize,
    /// Deepest type nesting accepted by either direction.
    pub max_depth: usize,
    /// Largest array element count either direction accepts.
    pub max_array_len: usize,
    /// Output budget for one decode call. Every array element and every
    /// pooled value costs one unit, and pooled payloads also cost their byte
    /// length, so backreferences cannot multiply a small input.
    pub max_output: u64,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            initial_capacity: 4 * 1024,
            pool_capacity: 256,
            max_depth: 128,
            max_array_len: 1 << 20,
            max_output: 1 << 22,
        }
    }
}

impl CodecOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
