//! Feeds: iterators over a sequence of cells driving the evaluator (spec
//! §3.7, §4.4).
//!
//! A feed is shared between a frame and any sub-evaluation that borrows its
//! input (e.g. a nested `do` over the remainder of the same array), so spec
//! §3.7 describes it as "reference-counted implicitly by the frames that
//! share them". `Rc<RefCell<Feed>>` is the direct, idiomatic Rust
//! realization of that sentence — every other heap-ish structure in this
//! crate goes through an arena-and-index instead, but a feed's lifetime is
//! genuinely tied to however many frames are currently iterating it
//! concurrently, which is exactly what `Rc` models, not what an arena (which
//! would need its own manual refcount field to get the same behavior) buys
//! anything over.

use std::{cell::RefCell, rc::Rc};

use crate::{binding::Specifier, cell::Cell, ids::ArrayId};

pub type FeedHandle = Rc<RefCell<Feed>>;

/// What a feed iterates over (spec §3.7's three feed variants).
#[derive(Debug, Clone)]
pub enum FeedSource {
    /// Iterating an in-memory array at `index`, under `specifier`.
    Array { array: ArrayId, index: usize, specifier: Specifier },
    /// Iterating a platform variadic argument list. This crate's minimal
    /// embedding surface (spec §6) supplies variadic arguments as a
    /// pre-built `Vec<Cell>` rather than a true C varargs list, since there
    /// is no FFI boundary to cross in a pure-Rust port.
    Variadic { values: Vec<Cell>, index: usize },
    /// The singleton empty feed.
    End,
}

/// One iterator instance (spec §3.7).
#[derive(Debug, Clone)]
pub struct Feed {
    source: FeedSource,
    /// The value most recently fetched (spec: "value").
    pub value: Option<Cell>,
    /// The value that `fetch_next` will load next, or `None` at the feed's
    /// end (spec: "pending pointer").
    pub pending: Option<Cell>,
    /// Last value seen before the most recent fetch, written by
    /// `fetch_next_keep_lookback` for left-quoting operators (spec §4.4,
    /// §4.7, §9's "explicit lookback cell" design note).
    pub lookback: Option<Cell>,
    /// Cached variable lookup for `value` when it is a word, invalidated on
    /// any mutation that could change its meaning (spec §4.4).
    pub gotten: Option<Cell>,
}

impl Feed {
    #[must_use]
    pub fn from_array(array: ArrayId, specifier: Specifier, arrays: &crate::array::Arrays) -> FeedHandle {
        let mut feed = Self {
            source: FeedSource::Array { array, index: 0, specifier },
            value: None,
            pending: None,
            lookback: None,
            gotten: None,
        };
        feed.pending = arrays.get(array).cells.first().copied();
        Rc::new(RefCell::new(feed))
    }

    #[must_use]
    pub fn from_variadic(values: Vec<Cell>) -> FeedHandle {
        let pending = values.first().copied();
        Rc::new(RefCell::new(Self {
            source: FeedSource::Variadic { values, index: 0 },
            value: None,
            pending,
            lookback: None,
            gotten: None,
        }))
    }

    #[must_use]
    pub fn end() -> FeedHandle {
        Rc::new(RefCell::new(Self {
            source: FeedSource::End,
            value: None,
            pending: None,
            lookback: None,
            gotten: None,
        }))
    }

    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.pending.is_none()
    }

    #[must_use]
    pub fn specifier(&self) -> Specifier {
        match self.source {
            FeedSource::Array { specifier, .. } => specifier,
            _ => Specifier::Unspecified,
        }
    }

    /// Advances to the next cell in `self.pending`, refilling `pending` from
    /// the underlying source (spec §4.4 `fetch_next`).
    pub fn fetch_next(&mut self, arrays: &crate::array::Arrays) {
        self.value = self.pending.take();
        self.gotten = None;
        match &mut self.source {
            FeedSource::Array { array, index, .. } => {
                *index += 1;
                self.pending = arrays.get(*array).cells.get(*index).copied();
            }
            FeedSource::Variadic { values, index } => {
                *index += 1;
                self.pending = values.get(*index).copied();
            }
            FeedSource::End => {}
        }
    }

    /// Like [`Self::fetch_next`] but first snapshots `value` into
    /// `lookback` so the caller can refer to both (spec §4.4
    /// `fetch_next_keep_lookback`, used by enfix left-quoting, §4.7).
    pub fn fetch_next_keep_lookback(&mut self, arrays: &crate::array::Arrays) {
        self.lookback = self.value;
        self.fetch_next(arrays);
    }

    /// The array this feed is backed by, if any (used to take/release the
    /// HOLD flag on push/drop, spec §4.4).
    #[must_use]
    pub fn backing_array(&self) -> Option<ArrayId> {
        match self.source {
            FeedSource::Array { array, .. } => Some(array),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::array::{ArrayFlags, Arrays};

    #[test]
    fn fetch_next_walks_an_array() {
        let mut arrays = Arrays::new();
        let id = arrays.alloc(vec![Cell::integer(1), Cell::integer(2)], ArrayFlags::empty());
        let feed = Feed::from_array(id, Specifier::Unspecified, &arrays);
        {
            let mut f = feed.borrow_mut();
            assert!(!f.is_at_end());
            f.fetch_next(&arrays);
            assert_eq!(f.value, Some(Cell::integer(1)));
            f.fetch_next(&arrays);
            assert_eq!(f.value, Some(Cell::integer(2)));
            assert!(f.is_at_end());
        }
    }

    #[test]
    fn lookback_captures_prior_value() {
        let mut arrays = Arrays::new();
        let id = arrays.alloc(vec![Cell::integer(1), Cell::integer(2)], ArrayFlags::empty());
        let feed = Feed::from_array(id, Specifier::Unspecified, &arrays);
        let mut f = feed.borrow_mut();
        f.fetch_next(&arrays);
        f.fetch_next_keep_lookback(&arrays);
        assert_eq!(f.lookback, Some(Cell::integer(1)));
        assert_eq!(f.value, Some(Cell::integer(2)));
    }
}
