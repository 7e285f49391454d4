//! Backreference trackers for value pools.
//!
//! The writer side hands out ids in first-encounter order; the reader side
//! rebuilds the same table as payloads arrive, so a backreference resolves to
//! the value that was new when its id was issued.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use crate::error::DecodeErrorKind;
use crate::label::{Label, LabelKind};

/// Result of offering a value to a [`WriterTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracked {
    /// First occurrence. The caller writes the payload to the pool.
    New,
    /// Seen before. The caller writes only this label.
    Backreference(Label),
}

/// Writer-side tracker: maps each distinct value to a backreference id.
#[derive(Debug)]
pub struct WriterTracker<K> {
    seen: HashMap<K, Label>,
    last_id: i64,
}

impl<K> Default for WriterTracker<K> {
    fn default() -> Self {
        Self {
            seen: HashMap::new(),
            last_id: Label::LOWEST_RESERVED,
        }
    }
}

impl<K: Eq + Hash> WriterTracker<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value`, returning [`Tracked::New`] the first time and its
    /// backreference label on every repeat.
    pub fn track<Q>(&mut self, value: &Q) -> Tracked
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(label) = self.seen.get(value) {
            return Tracked::Backreference(*label);
        }
        self.last_id -= 1;
        self.seen.insert(value.to_owned(), Label::new(self.last_id));
        Tracked::New
    }

    /// Number of distinct values seen.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Result of resolving a label through a [`ReaderTracker`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Value(T),
    /// A sentinel; the pool was not touched.
    Sentinel(LabelKind),
}

/// Reader-side tracker: the append-only table of materialized pool values.
#[derive(Debug)]
pub struct ReaderTracker<T> {
    seen: Vec<T>,
}

impl<T> Default for ReaderTracker<T> {
    fn default() -> Self {
        Self { seen: Vec::new() }
    }
}

impl<T: Clone> ReaderTracker<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `label`.
    ///
    /// A length label calls `materialize` with the payload length and stores
    /// the result; a backreference returns a stored value.
    pub fn value_for_label<F>(&mut self, label: Label, materialize: F) -> Result<Lookup<T>, DecodeErrorKind>
    where
        F: FnOnce(usize) -> Result<T, DecodeErrorKind>,
    {
        match label.kind() {
            LabelKind::Length => {
                let len = label.get() as u64;
                let len = usize::try_from(len).map_err(|_| DecodeErrorKind::LengthOutOfRange(len))?;
                let value = materialize(len)?;
                self.seen.push(value.clone());
                Ok(Lookup::Value(value))
            }
            LabelKind::Backreference => {
                let index = label.backreference_index().unwrap_or(u64::MAX);
                usize::try_from(index)
                    .ok()
                    .and_then(|i| self.seen.get(i))
                    .cloned()
                    .map(Lookup::Value)
                    .ok_or(DecodeErrorKind::InvalidBackreference {
                        index,
                        pool_size: self.seen.len(),
                    })
            }
            kind => Ok(Lookup::Sentinel(kind)),
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
