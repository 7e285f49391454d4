//! Growable byte writer with a cursor.

/// A byte buffer writer that grows automatically as needed.
///
/// Bytes between the flush position and the cursor are the pending output.
/// [`Writer::flush`] hands them out and starts a new segment, so one writer
/// can produce several independent byte runs.
///
/// # Example
///
/// ```
/// use cedar_buffers::Writer;
///
/// let mut writer = Writer::new();
/// writer.u8(0x01);
/// writer.buf(&[0x02, 0x03]);
/// assert_eq!(writer.len(), 3);
/// assert_eq!(writer.flush(), [0x01, 0x02, 0x03]);
/// assert!(writer.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Writer {
    uint8: Vec<u8>,
    /// Position where last flush happened.
    x0: usize,
    /// Current cursor position.
    x: usize,
    /// Allocation size when buffer needs to grow.
    alloc_size: usize,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    /// Creates a new writer with the default allocation size (4KB).
    pub fn new() -> Self {
        Self::with_alloc_size(4 * 1024)
    }

    /// Creates a new writer that allocates `alloc_size` bytes up front and
    /// uses the same figure as its growth step.
    pub fn with_alloc_size(alloc_size: usize) -> Self {
        Self {
            uint8: vec![0u8; alloc_size],
            x0: 0,
            x: 0,
            alloc_size: alloc_size.max(1),
        }
    }

    /// Creates a writer sized for exactly `size` bytes.
    ///
    /// Writing no more than `size` bytes never reallocates.
    pub fn exact(size: usize) -> Self {
        Self {
            uint8: vec![0u8; size],
            x0: 0,
            x: 0,
            alloc_size: size.max(1),
        }
    }

    /// Number of pending (unflushed) bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.x - self.x0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x == self.x0
    }

    /// Total bytes currently allocated.
    pub fn capacity(&self) -> usize {
        self.uint8.len()
    }

    /// Pending bytes as a slice, without flushing.
    pub fn as_slice(&self) -> &[u8] {
        &self.uint8[self.x0..self.x]
    }

    /// Ensures the buffer has at least `capacity` bytes available.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        let remaining = self.uint8.len() - self.x;
        if remaining < capacity {
            let total = self.uint8.len() - self.x0;
            let required = capacity - remaining;
            let total_required = total + required;
            let new_size = if total_required <= self.alloc_size {
                self.alloc_size
            } else {
                total_required * 2
            };
            self.grow(new_size);
        }
    }

    fn grow(&mut self, new_size: usize) {
        let pending = self.x - self.x0;
        let mut new_buf = vec![0u8; new_size];
        new_buf[..pending].copy_from_slice(&self.uint8[self.x0..self.x]);
        self.uint8 = new_buf;
        self.x = pending;
        self.x0 = 0;
    }

    /// Returns the pending bytes and advances the flush position.
    pub fn flush(&mut self) -> Vec<u8> {
        let result = self.uint8[self.x0..self.x].to_vec();
        self.x0 = self.x;
        result
    }

    /// Consumes the writer, returning the pending bytes without copying when
    /// nothing has been flushed yet.
    pub fn into_vec(mut self) -> Vec<u8> {
        if self.x0 == 0 {
            self.uint8.truncate(self.x);
            self.uint8
        } else {
            self.flush()
        }
    }

    /// Writes an unsigned 8-bit integer.
    #[inline]
    pub fn u8(&mut self, val: u8) {
        self.ensure_capacity(1);
        self.uint8[self.x] = val;
        self.x += 1;
    }

    /// Writes a 64-bit floating point number (big-endian).
    #[inline]
    pub fn f64(&mut self, val: f64) {
        self.ensure_capacity(8);
        self.uint8[self.x..self.x + 8].copy_from_slice(&val.to_be_bytes());
        self.x += 8;
    }

    /// Writes a byte slice.
    pub fn buf(&mut self, buf: &[u8]) {
        let length = buf.len();
        self.ensure_capacity(length);
        self.uint8[self.x..self.x + length].copy_from_slice(buf);
        self.x += length;
    }
}
