//! Message framing: header, value-pool blocks, main block.
//!
//! ```text
//! header:      1 byte (flags, always 0x00)
//! pool_block*: (label: length)(payload)
//! main_block:  (label: length)(payload)
//! ```
//!
//! Pools are written in the order the encoder first touched them. The
//! decoder has no table of contents: the first time its walk touches a pool
//! it claims the next unread block, so both sides must walk identically.

use cedar_buffers::{Reader, Writer};
use indexmap::IndexMap;

use crate::dedup::{ReaderTracker, Tracked, WriterTracker};
use crate::error::{DecodeError, DecodeErrorKind};
use crate::label::{self, Label, LabelKind};
use crate::options::CodecOptions;
use crate::value::Value;

/// The only header value this version writes or accepts.
pub const FLAGS: u8 = 0x00;

/// The scalar family a pool holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    String,
    Bytes,
    Int32,
    Variant,
}

/// Identifies one pool within a message: scalar kind plus the active dedupe
/// key, `None` for the kind's default pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolKey<'t> {
    pub kind: PoolKind,
    pub dedupe: Option<&'t str>,
}

// ---------------------------------------------------------------- writing

/// Pending bytes of one pool plus its dedup state.
#[derive(Debug)]
pub struct PoolWriter {
    bytes: Writer,
    tracker: WriterTracker<Vec<u8>>,
}

impl PoolWriter {
    fn new(capacity: usize) -> Self {
        Self {
            bytes: Writer::with_alloc_size(capacity),
            tracker: WriterTracker::new(),
        }
    }

    /// Adds `payload` to the pool unless an equal payload is already there.
    /// Returns the label for the main block: the payload length when new,
    /// its backreference otherwise.
    pub fn dedup(&mut self, payload: &[u8]) -> Label {
        match self.tracker.track(payload) {
            Tracked::New => {
                self.bytes.buf(payload);
                Label::length(payload.len())
            }
            Tracked::Backreference(label) => label,
        }
    }

    /// Appends a signed integer to the pool, never deduplicated.
    pub fn push_i64(&mut self, n: i64) {
        label::write_i64(&mut self.bytes, n);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode-side framer: the main block plus every pool opened so far.
#[derive(Debug)]
pub struct BlockWriter<'t> {
    main: Writer,
    pools: IndexMap<PoolKey<'t>, PoolWriter>,
    pool_capacity: usize,
}

impl<'t> BlockWriter<'t> {
    pub fn new(options: &CodecOptions) -> Self {
        Self {
            main: Writer::with_alloc_size(options.initial_capacity),
            pools: IndexMap::new(),
            pool_capacity: options.pool_capacity,
        }
    }

    #[inline]
    pub fn main(&mut self) -> &mut Writer {
        &mut self.main
    }

    #[inline]
    pub fn label(&mut self, label: Label) {
        label::write(&mut self.main, label);
    }

    /// The pool for `key`, opened on first use.
    pub fn pool(&mut self, key: PoolKey<'t>) -> &mut PoolWriter {
        let capacity = self.pool_capacity;
        let next = self.pools.len();
        self.pools.entry(key).or_insert_with(|| {
            tracing::trace!(kind = ?key.kind, dedupe = ?key.dedupe, block = next, "opening value pool");
            PoolWriter::new(capacity)
        })
    }

    /// Total message size: header, each pool and the main block with their
    /// length labels.
    pub fn message_len(&self) -> usize {
        let framed = |len: usize| label::encoded_len(Label::length(len)) + len;
        1 + self.pools.values().map(|p| framed(p.len())).sum::<usize>() + framed(self.main.len())
    }

    /// Assembles the message in a single allocation of exactly
    /// [`BlockWriter::message_len`] bytes.
    pub fn finish(self) -> Vec<u8> {
        let total = self.message_len();
        let mut out = Writer::exact(total);
        out.u8(FLAGS);
        for pool in self.pools.values() {
            label::write(&mut out, Label::length(pool.len()));
            out.buf(pool.bytes.as_slice());
        }
        label::write(&mut out, Label::length(self.main.len()));
        out.buf(self.main.as_slice());
        debug_assert_eq!(out.capacity(), total, "message buffer was resized");
        tracing::debug!(
            pools = self.pools.len(),
            main_len = self.main.len(),
            total,
            "assembled cedar message"
        );
        out.into_vec()
    }
}

// ---------------------------------------------------------------- reading

/// One claimed pool block and the values materialized from it so far.
#[derive(Debug)]
pub struct PoolReader<'a> {
    pub block: Reader<'a>,
    pub tracker: ReaderTracker<Value>,
}

/// Decode-side framer.
#[derive(Debug)]
pub struct BlockReader<'a, 't> {
    main: Reader<'a>,
    unclaimed: std::vec::IntoIter<Reader<'a>>,
    pools: IndexMap<PoolKey<'t>, PoolReader<'a>>,
}

impl<'a, 't> BlockReader<'a, 't> {
    /// Splits `data` into blocks. The last block is the main block.
    pub fn parse(data: &'a [u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(data);
        let flags = reader
            .try_u8()
            .map_err(|_| DecodeError::at(DecodeErrorKind::UnexpectedEnd, 0))?;
        if flags != FLAGS {
            return Err(DecodeError::at(DecodeErrorKind::UnsupportedFlags(flags), 0));
        }

        let mut blocks = Vec::new();
        while !reader.is_exhausted() {
            let at = reader.offset();
            let fail = |reason| DecodeError::at(reason, at);
            let label = label::read(&mut reader).map_err(fail)?;
            if label.kind() != LabelKind::Length {
                return Err(fail(DecodeErrorKind::InvalidBlockLength(label.get())));
            }
            let length = label.get() as u64;
            let available = reader.remaining();
            let block = usize::try_from(length)
                .ok()
                .and_then(|len| reader.cut(len).ok())
                .ok_or_else(|| fail(DecodeErrorKind::TruncatedBlock { length, available }))?;
            tracing::trace!(block = blocks.len(), offset = block.offset(), length, "split block");
            blocks.push(block);
        }

        let main = blocks
            .pop()
            .ok_or_else(|| DecodeError::at(DecodeErrorKind::MissingMainBlock, data.len()))?;
        Ok(Self {
            main,
            unclaimed: blocks.into_iter(),
            pools: IndexMap::new(),
        })
    }

    #[inline]
    pub fn main(&mut self) -> &mut Reader<'a> {
        &mut self.main
    }

    /// The pool for `key`, claiming the next unread pool block on first use.
    pub fn pool(&mut self, key: PoolKey<'t>) -> Result<&mut PoolReader<'a>, DecodeErrorKind> {
        use indexmap::map::Entry;
        match self.pools.entry(key) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let block = self.unclaimed.next().ok_or(DecodeErrorKind::MissingPoolBlock)?;
                tracing::trace!(kind = ?key.kind, dedupe = ?key.dedupe, offset = block.offset(), "claimed value pool");
                Ok(e.insert(PoolReader {
                    block,
                    tracker: ReaderTracker::new(),
                }))
            }
        }
    }

    /// Checks that the walk consumed the whole message.
    pub fn finish(&self) -> Result<(), DecodeError> {
        let leftover = |r: &Reader<'_>| {
            (!r.is_exhausted()).then(|| {
                DecodeError::at(
                    DecodeErrorKind::TrailingBytes {
                        remaining: r.remaining(),
                    },
                    r.offset(),
                )
            })
        };
        if let Some(err) = leftover(&self.main) {
            return Err(err);
        }
        if let Some(err) = self.pools.values().find_map(|p| leftover(&p.block)) {
            return Err(err);
        }
        let unclaimed = self.unclaimed.as_slice();
        if let Some(first) = unclaimed.first() {
            return Err(DecodeError::at(
                DecodeErrorKind::UnclaimedPoolBlocks(unclaimed.len()),
                first.offset(),
            ));
        }
        Ok(())
    }
}
