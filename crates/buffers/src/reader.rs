//! Bounds-checked byte reader with cursor tracking.

use crate::BufferError;

/// A byte reader over a borrowed slice.
///
/// Every read is bounds-checked and fails with [`BufferError::EndOfBuffer`]
/// rather than panicking. A reader may stand for a sub-range of a larger
/// message; `base` is the absolute position of its first byte, so
/// [`Reader::offset`] reports positions relative to the whole message.
///
/// # Example
///
/// ```
/// use cedar_buffers::{BufferError, Reader};
///
/// let data = [0x01, 0x02, 0x03];
/// let mut reader = Reader::new(&data);
///
/// assert_eq!(reader.try_u8(), Ok(0x01));
/// assert_eq!(reader.try_buf(2), Ok(&[0x02, 0x03][..]));
/// assert_eq!(reader.try_u8(), Err(BufferError::EndOfBuffer));
/// ```
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    uint8: &'a [u8],
    /// Current cursor position within `uint8`.
    x: usize,
    /// Absolute position of `uint8[0]`.
    base: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader for the given byte slice.
    pub fn new(uint8: &'a [u8]) -> Self {
        Self::with_base(uint8, 0)
    }

    /// Creates a reader whose first byte sits at absolute position `base`.
    pub fn with_base(uint8: &'a [u8], base: usize) -> Self {
        Self { uint8, x: 0, base }
    }

    /// Cursor position relative to this reader's slice.
    #[inline]
    pub fn position(&self) -> usize {
        self.x
    }

    /// Absolute cursor position.
    #[inline]
    pub fn offset(&self) -> usize {
        self.base + self.x
    }

    /// Moves the cursor back to a position previously returned by
    /// [`Reader::position`].
    #[inline]
    pub fn rewind(&mut self, position: usize) {
        debug_assert!(position <= self.x);
        self.x = position;
    }

    /// Returns the number of remaining bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.uint8.len() - self.x
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.x >= self.uint8.len()
    }

    #[inline]
    fn check(&self, n: usize) -> Result<(), BufferError> {
        if n > self.remaining() {
            Err(BufferError::EndOfBuffer)
        } else {
            Ok(())
        }
    }

    /// Peeks at the current byte without advancing.
    pub fn try_peek(&self) -> Result<u8, BufferError> {
        self.check(1)?;
        Ok(self.uint8[self.x])
    }

    /// Reads an unsigned 8-bit integer.
    #[inline]
    pub fn try_u8(&mut self) -> Result<u8, BufferError> {
        self.check(1)?;
        let val = self.uint8[self.x];
        self.x += 1;
        Ok(val)
    }

    /// Reads a 64-bit big-endian float.
    pub fn try_f64(&mut self) -> Result<f64, BufferError> {
        let bytes = self.try_buf(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_be_bytes(raw))
    }

    /// Returns the next `size` bytes and advances the cursor.
    pub fn try_buf(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        self.check(size)?;
        let start = self.x;
        self.x += size;
        Ok(&self.uint8[start..self.x])
    }

    /// Splits off the next `size` bytes as an independent reader that keeps
    /// absolute offsets, and advances past them.
    pub fn cut(&mut self, size: usize) -> Result<Reader<'a>, BufferError> {
        let base = self.offset();
        let bytes = self.try_buf(size)?;
        Ok(Reader::with_base(bytes, base))
    }
}
