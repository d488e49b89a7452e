//! Symbol interning: canons, synonyms, and a tombstone-tolerant open-addressed
//! table.
//!
//! Grounded on `crates/ouros/src/intern.rs`'s `InternerBuilder`/`Interns`
//! split (a mutable builder used while compiling, a read-only view used
//! while running), but reworked around the case-insensitive canon/synonym
//! contract in spec §4.1 that the teacher's Python interner does not need
//! (Python identifiers are case-sensitive).
//!
//! # Layout
//!
//! - A **canon** owns the case-folded spelling and a circular ring of
//!   synonym ids (case-variant spellings that share it).
//! - A **synonym** is any interned spelling; it stores a 1-based "order
//!   index" used so a word cell can remember which exact casing it was
//!   written with.
//! - The table that maps byte spelling -> `SymbolId` is open-addressed with
//!   linear probing and tombstone deletion, per §4.1's contract. `ahash` is
//!   used for the probe hash (the teacher uses `ahash` throughout for the
//!   same reason: fast, DoS-irrelevant hashing for process-internal tables).

use std::hash::{Hash, Hasher};

use ahash::AHasher;

/// Interned symbol identifier. Stable for the lifetime of the table (ids are
/// only invalidated by [`SymbolTable::collect_unreferenced`], which is the
/// crate's stand-in for "the GC may remove an unreferenced canon").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One entry in the synonym table: either a canon (the case-folded
/// representative) or a non-canonical case variant.
#[derive(Debug, Clone)]
struct Synonym {
    /// Exact bytes as interned (preserves original casing).
    spelling: Box<str>,
    /// The canon this synonym belongs to (a canon is its own canon).
    canon: SymbolId,
    /// Next synonym in the canon's circular ring (a lone canon points to
    /// itself, matching §4.1's "singleton ring").
    next_synonym: SymbolId,
    /// 1-based position within the ring, reusing the lowest unused index on
    /// insertion/removal so displays stay stable and compact.
    order_index: u16,
    /// Well-known compile-time id, if this exact synonym was pre-registered
    /// during bootstrap (see [`WellKnown`]).
    well_known: Option<WellKnown>,
}

/// Slot state for the open-addressed probe table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Empty,
    /// A tombstone left by `remove`. Does not terminate a probe sequence,
    /// but is reusable by a subsequent insert (§4.1).
    Tombstone,
    Occupied(SymbolId),
}

/// A hash table of interned symbols.
///
/// Deletion and GC-driven removal are modeled by [`SymbolTable::collect_unreferenced`],
/// which is the only way `SymbolId`s become invalid; nothing else in this
/// crate removes a symbol out from under a live cell.
#[derive(Debug)]
pub struct SymbolTable {
    synonyms: Vec<Synonym>,
    slots: Vec<Slot>,
    /// Number of `Occupied` slots.
    len: usize,
    /// Number of `Tombstone` slots (tracked so load factor accounts for
    /// them; per §4.1, rehashing drops tombstones).
    tombstones: usize,
    well_known: Vec<SymbolId>,
}

/// Number of slots is always the next prime `>= 2 * capacity_hint`, matching
/// §4.1's "sized to a prime ≥ 2x entries".
const PRIMES: &[usize] = &[
    61, 127, 257, 521, 1049, 2099, 4201, 8419, 16843, 33703, 67409, 134837, 269683, 539389, 1_078_793,
];

fn next_prime_at_least(n: usize) -> usize {
    PRIMES.iter().copied().find(|&p| p >= n).unwrap_or_else(|| {
        let mut candidate = n | 1;
        loop {
            if is_probably_prime(candidate) {
                return candidate;
            }
            candidate += 2;
        }
    })
}

fn is_probably_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

fn case_fold(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

fn hash_of(s: &str) -> u64 {
    let mut hasher = AHasher::default();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Compile-time-known symbols assigned fixed ids during bootstrap, so the
/// evaluator can `match` on them in O(1) instead of comparing spellings.
/// Mirrors §4.1's "well-known ids" and the natives this crate ships (§4.11
/// of `SPEC_FULL.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum WellKnown {
    True,
    False,
    Blank,
    If,
    Either,
    While,
    Do,
    Reduce,
    Return,
    Unwind,
    Throw,
    Catch,
    Trap,
    Fail,
    Func,
    Adapt,
    Enclose,
    Specialize,
    Bind,
    In,
    #[strum(serialize = "value?")]
    ValueQ,
    #[strum(serialize = "unset?")]
    UnsetQ,
    Enfix,
    Add,
    Subtract,
    Multiply,
    Divide,
    Negate,
    #[strum(serialize = "equal?")]
    EqualQ,
    #[strum(serialize = "lesser?")]
    LesserQ,
    #[strum(serialize = "greater?")]
    GreaterQ,
    #[strum(serialize = "for-each")]
    ForEach,
    Name,
    With,
    Comment,
    Elide,
    Value,
    Let,
}

impl SymbolTable {
    /// Builds a fresh table pre-populated with every [`WellKnown`] symbol.
    #[must_use]
    pub fn new() -> Self {
        use strum::IntoEnumIterator;

        let slot_count = next_prime_at_least(2 * 64);
        let mut table = Self {
            synonyms: Vec::with_capacity(64),
            slots: vec![Slot::Empty; slot_count],
            len: 0,
            tombstones: 0,
            well_known: Vec::new(),
        };
        for wk in WellKnown::iter() {
            let spelling: &'static str = wk.into();
            let id = table.intern(spelling);
            table.synonyms[id.index()].well_known = Some(wk);
            let idx = wk as usize;
            if table.well_known.len() <= idx {
                table.well_known.resize(idx + 1, id);
            }
            table.well_known[idx] = id;
        }
        table
    }

    #[must_use]
    pub fn well_known(&self, wk: WellKnown) -> SymbolId {
        self.well_known[wk as usize]
    }

    fn load_factor_exceeded(&self) -> bool {
        (self.len + self.tombstones) * 2 > self.slots.len()
    }

    fn rehash(&mut self) {
        let new_len = next_prime_at_least(2 * (self.len + 1).max(self.slots.len() / 2 + 1));
        let mut new_slots = vec![Slot::Empty; new_len];
        for slot in &self.slots {
            if let Slot::Occupied(id) = *slot {
                let spelling = &self.synonyms[id.index()].spelling;
                let h = hash_of(&case_fold(spelling));
                insert_into(&mut new_slots, h, id);
            }
        }
        self.slots = new_slots;
        self.tombstones = 0;
    }

    /// `intern(utf8) -> SymbolId`: returns the unique symbol for the exact
    /// byte spelling. Equal bytes always yield an identical id; spellings
    /// differing only by case share a canon (§4.1, §8 "symbol interning").
    pub fn intern(&mut self, spelling: &str) -> SymbolId {
        if self.load_factor_exceeded() {
            self.rehash();
        }
        let folded = case_fold(spelling);
        let h = hash_of(&folded);
        let slot_count = self.slots.len();
        let mut skip = probe_skip(h, slot_count);
        let mut idx = (h as usize) % slot_count;
        let mut first_tombstone: Option<usize> = None;
        loop {
            match self.slots[idx] {
                Slot::Empty => break,
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(idx);
                    }
                }
                Slot::Occupied(canon_id) => {
                    if case_fold(&self.synonyms[canon_id.index()].spelling) == folded {
                        return self.find_or_add_synonym(canon_id, spelling);
                    }
                }
            }
            idx = (idx + skip) % slot_count;
            skip = skip.max(1);
        }

        // No canon for this case-folded spelling exists yet: create one.
        let canon_id = SymbolId(self.synonyms.len() as u32);
        self.synonyms.push(Synonym {
            spelling: spelling.into(),
            canon: canon_id,
            next_synonym: canon_id,
            order_index: 1,
            well_known: None,
        });
        let target = first_tombstone.unwrap_or(idx);
        if self.slots[target] == Slot::Tombstone {
            self.tombstones -= 1;
        }
        self.slots[target] = Slot::Occupied(canon_id);
        self.len += 1;
        canon_id
    }

    fn find_or_add_synonym(&mut self, canon_id: SymbolId, exact_spelling: &str) -> SymbolId {
        // Walk the ring looking for an exact byte match first.
        let mut cur = canon_id;
        loop {
            if self.synonyms[cur.index()].spelling.as_ref() == exact_spelling {
                return cur;
            }
            let next = self.synonyms[cur.index()].next_synonym;
            if next == canon_id {
                break;
            }
            cur = next;
        }

        // Not found: splice a new synonym into the ring right after the canon,
        // reusing the lowest unused order index.
        let used: Vec<u16> = {
            let mut v = Vec::new();
            let mut cur = canon_id;
            loop {
                v.push(self.synonyms[cur.index()].order_index);
                let next = self.synonyms[cur.index()].next_synonym;
                if next == canon_id {
                    break;
                }
                cur = next;
            }
            v
        };
        let mut order_index = 1u16;
        while used.contains(&order_index) {
            order_index += 1;
        }

        let new_id = SymbolId(self.synonyms.len() as u32);
        let canon_next = self.synonyms[canon_id.index()].next_synonym;
        self.synonyms.push(Synonym {
            spelling: exact_spelling.into(),
            canon: canon_id,
            next_synonym: canon_next,
            order_index,
            well_known: None,
        });
        self.synonyms[canon_id.index()].next_synonym = new_id;
        new_id
    }

    /// Returns the case-folded canon id shared by every case-variant of
    /// `symbol`.
    #[must_use]
    pub fn canon_of(&self, symbol: SymbolId) -> SymbolId {
        self.synonyms[symbol.index()].canon
    }

    #[must_use]
    pub fn spelling(&self, symbol: SymbolId) -> &str {
        &self.synonyms[symbol.index()].spelling
    }

    #[must_use]
    pub fn well_known_of(&self, symbol: SymbolId) -> Option<WellKnown> {
        self.synonyms[self.canon_of(symbol).index()].well_known
    }

    /// Removes the probe-table entry for `canon`, leaving a tombstone, and
    /// drops the synonym ring. This stands in for "the GC has determined no
    /// live cell references this canon or its synonyms any longer" — callers
    /// are responsible for that liveness judgement; the table does not scan
    /// for references itself (mark/sweep is out of scope, per spec §1).
    ///
    /// # Testable property
    /// After interning `n` distinct spellings and then calling this for every
    /// one of them, `self.live_canon_count() == 0` (§8).
    pub fn collect_unreferenced(&mut self, canon: SymbolId) {
        debug_assert_eq!(self.canon_of(canon), canon, "collect_unreferenced expects a canon id");
        let folded = case_fold(&self.synonyms[canon.index()].spelling);
        let h = hash_of(&folded);
        let slot_count = self.slots.len();
        let mut skip = probe_skip(h, slot_count);
        let mut idx = (h as usize) % slot_count;
        loop {
            match self.slots[idx] {
                Slot::Empty => return,
                Slot::Occupied(id) if id == canon => {
                    self.slots[idx] = Slot::Tombstone;
                    self.tombstones += 1;
                    self.len -= 1;
                    return;
                }
                _ => {}
            }
            idx = (idx + skip) % slot_count;
            skip = skip.max(1);
        }
    }

    #[must_use]
    pub fn live_canon_count(&self) -> usize {
        self.len
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

fn probe_skip(hash: u64, slot_count: usize) -> usize {
    // An odd skip that is coprime with any table size we use (all prime)
    // guarantees the probe sequence visits every slot before repeating.
    (((hash >> 32) as usize) | 1).max(1) % slot_count.max(1)
}

fn insert_into(slots: &mut [Slot], hash: u64, id: SymbolId) {
    let slot_count = slots.len();
    let mut skip = probe_skip(hash, slot_count);
    let mut idx = (hash as usize) % slot_count;
    loop {
        if slots[idx] == Slot::Empty {
            slots[idx] = Slot::Occupied(id);
            return;
        }
        idx = (idx + skip) % slot_count;
        skip = skip.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn equal_bytes_intern_identically() {
        let mut t = SymbolTable::new();
        assert_eq!(t.intern("foo"), t.intern("foo"));
    }

    #[test]
    fn case_variants_share_a_canon() {
        let mut t = SymbolTable::new();
        let a = t.intern("Foo");
        let b = t.intern("FOO");
        let c = t.intern("foo");
        assert_eq!(t.canon_of(a), t.canon_of(b));
        assert_eq!(t.canon_of(b), t.canon_of(c));
        // distinct spellings remain distinct ids
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn gc_collection_drains_live_count() {
        let mut t = SymbolTable::new();
        let before = t.live_canon_count();
        let ids: Vec<_> = (0..50).map(|i| t.intern(&format!("sym{i}"))).collect();
        assert_eq!(t.live_canon_count(), before + 50);
        for id in ids {
            t.collect_unreferenced(id);
        }
        assert_eq!(t.live_canon_count(), before);
    }

    #[test]
    fn well_known_ids_resolve() {
        let t = SymbolTable::new();
        let ret = t.well_known(WellKnown::Return);
        assert_eq!(t.well_known_of(ret), Some(WellKnown::Return));
        assert_eq!(t.spelling(ret), "return");
    }

    #[test]
    fn tombstones_are_reused_on_insert() {
        let mut t = SymbolTable::new();
        let id = t.intern("transient");
        t.collect_unreferenced(id);
        let before_slots = t.slots.len();
        // Reinterning after collection should not require growing the table
        // just to reclaim the tombstoned slot.
        let _ = t.intern("transient-2");
        assert_eq!(t.slots.len(), before_slots);
    }
}
