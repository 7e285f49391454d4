//! Byte buffer primitives for the Cedar codec.
//!
//! - [`Writer`]: growable output buffer with a write cursor.
//! - [`Reader`]: borrowed input slice with a read cursor and bounds-checked
//!   reads that report [`BufferError`] instead of panicking.

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;

use thiserror::Error;

/// Error type for buffer reads.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    #[error("unexpected end of buffer")]
    EndOfBuffer,
}
