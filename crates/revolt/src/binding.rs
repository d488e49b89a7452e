//! The binding subsystem (spec §4.3): specific binding, relative binding,
//! and virtual binding ("patches"), plus the specifier-derivation and
//! bind-walk algorithms that tie them together.
//!
//! Grounded on the teacher's indirection style throughout `namespace.rs` and
//! `heap.rs` (small `Copy` ids into an arena rather than pointers), adapted
//! to the three-way binding union that spec §4.3 and §9 call the hardest
//! design point of the whole system.

use std::collections::HashMap;

use crate::{
    action::Param,
    array::Arrays,
    context::Contexts,
    ids::{ActionId, ArrayId, ContextId, PatchId},
    symbol::SymbolId,
};

/// What a word (or an array) is bound to. A tagged enum is the idiomatic
/// Rust realization of the C original's "binding field is union-typed over
/// {symbol, varlist, paramlist, patch chain}" (spec §9 design note).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// No storage resolved yet. The word's own symbol (always available from
    /// the cell's `CellData::Word`-family payload) is enough to report an
    /// `unbound` error, so this variant carries no payload of its own.
    Unbound,
    /// Specific binding (§4.3a): resolves in O(1) to a context slot.
    Specific { context: ContextId, index: u32 },
    /// Relative binding (§4.3b): resolves only once combined with a running
    /// invocation's frame context, i.e. a specifier.
    Relative { action: ActionId, index: u32 },
    /// Virtual binding (§4.3c): an override chain to consult before falling
    /// back to whatever the word was bound to underneath.
    Virtual(PatchId),
}

/// The binding environment carried by an array cell, or passed down while
/// evaluating a nested array, used to resolve [`Binding::Relative`] and
/// [`Binding::Virtual`] references (spec §3.8, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specifier {
    Unspecified,
    Frame(ContextId),
    Patch(PatchId),
}

/// One link of a virtual-binding override chain (spec §4.3c).
///
/// A patch never mutates the array it overrides; instead, looking a word up
/// through a patch chain checks each patch's overriding context before
/// falling through to whatever binding the word already had.
#[derive(Debug, Clone)]
pub struct Patch {
    /// The context that overrides bindings for words found in it.
    pub overriding: ContextId,
    /// Number of keys in `overriding` at the moment this patch was created,
    /// cached so lookup can detect (and ignore) keys added to the context
    /// afterward — mirrors §4.3's "verified against a cached length captured
    /// at bind time".
    pub cached_len: u32,
    /// Next patch in the chain, or `None` if this patch terminates directly
    /// at a frame varlist (tracked separately via `terminal`).
    pub next: Option<PatchId>,
    /// The frame varlist this chain ultimately bottoms out at, if any. Two
    /// patch chains can only be merged when they share a `terminal` (spec
    /// §4.3's "derive-specifier" rule 4).
    pub terminal: Option<ContextId>,
    /// Other patches that are identical except for `next`, linked in a
    /// circular ring purely so [`Patches::merge`] can reuse an existing
    /// chain instead of allocating a duplicate (spec §4.3's "variants
    /// ring").
    variants_next: PatchId,
}

/// Arena owning every [`Patch`] ever created.
#[derive(Debug, Default)]
pub struct Patches {
    patches: Vec<Patch>,
}

impl Patches {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PatchId) -> &Patch {
        &self.patches[id.index()]
    }

    /// Creates a fresh single-link patch chain overriding `context`, chained
    /// onto `next` (or terminating at `terminal` if `next` is `None`).
    pub fn push(&mut self, overriding: ContextId, cached_len: u32, next: Option<PatchId>, terminal: Option<ContextId>) -> PatchId {
        let id = PatchId::new(self.patches.len());
        self.patches.push(Patch {
            overriding,
            cached_len,
            next,
            terminal,
            variants_next: id,
        });
        id
    }

    /// Links `a` and `b` into the same variants ring (both chains differ
    /// only in their `next` link). Idempotent.
    fn link_variants(&mut self, a: PatchId, b: PatchId) {
        if a == b {
            return;
        }
        let a_next = self.patches[a.index()].variants_next;
        let b_next = self.patches[b.index()].variants_next;
        self.patches[a.index()].variants_next = b_next;
        self.patches[b.index()].variants_next = a_next;
    }

    /// Finds an existing patch in `start`'s variants ring whose `next`
    /// already equals `desired_next`, if any.
    fn find_variant_with_next(&self, start: PatchId, desired_next: Option<PatchId>) -> Option<PatchId> {
        let mut cur = start;
        loop {
            let p = &self.patches[cur.index()];
            if p.next == desired_next {
                return Some(cur);
            }
            cur = p.variants_next;
            if cur == start {
                return None;
            }
        }
    }

    /// Merges virtual-bind chain `child` on top of chain `parent` (spec
    /// §4.3 "derive-specifier" rule 4): the child's patches are prepended to
    /// the parent chain, reusing existing variants when one with the
    /// desired `next` already exists, memoized so repeated merges don't
    /// blow up allocation.
    ///
    /// # Panics
    /// In debug builds, panics if `child` and `parent` terminate at
    /// different frame varlists — merging across incompatible bottoms is a
    /// binder bug, not a runtime condition callers should handle.
    pub fn merge(&mut self, child: PatchId, parent: PatchId) -> PatchId {
        debug_assert_eq!(
            self.patches[child.index()].terminal,
            self.patches[parent.index()].terminal,
            "merge() requires chains to share a terminal frame varlist"
        );
        self.merge_onto(child, Some(parent))
    }

    fn merge_onto(&mut self, child: PatchId, onto: Option<PatchId>) -> PatchId {
        let p = self.patches[child.index()].clone();
        // Reuse an existing variant of `child` whose `next` is already `onto`.
        if let Some(existing) = self.find_variant_with_next(child, onto) {
            return existing;
        }
        let merged_next = match p.next {
            Some(next) => Some(self.merge_onto(next, onto)),
            None => onto,
        };
        let new_terminal = match onto {
            Some(o) => self.patches[o.index()].terminal,
            None => p.terminal,
        };
        let new_id = self.push(p.overriding, p.cached_len, merged_next, new_terminal);
        self.link_variants(child, new_id);
        new_id
    }
}

/// Implements spec §4.3's `derive-specifier` when descending into a nested
/// array during evaluation.
///
/// `array_binding` is the binding an array cell itself carries (`None` if
/// the array was never bound, e.g. a literal block constructed at runtime).
pub fn derive_specifier(
    patches: &mut Patches,
    contexts: &Contexts,
    parent: Specifier,
    array_binding: Option<Specifier>,
) -> Specifier {
    let Some(array_spec) = array_binding else {
        // Rule 1: array carries no binding of its own.
        return parent;
    };
    if matches!(parent, Specifier::Unspecified) {
        // Rule 2: nothing to combine with.
        return array_spec;
    }
    match (array_spec, parent) {
        (Specifier::Frame(array_frame), Specifier::Frame(parent_frame)) => {
            // Rule 3: both relative to an action's frame; keep the parent's
            // (the running) frame if it's the same action, else the array's
            // own relative reference wins (the array came from a different
            // invocation than the one currently running it, e.g. a function
            // value stored and called later).
            let compatible = contexts.get(array_frame).underlying_action == contexts.get(parent_frame).underlying_action;
            if compatible { Specifier::Frame(parent_frame) } else { Specifier::Frame(array_frame) }
        }
        (Specifier::Patch(child), Specifier::Patch(parent_chain)) => {
            // Rule 4: merge the two virtual-bind chains.
            Specifier::Patch(patches.merge(child, parent_chain))
        }
        (Specifier::Patch(child), Specifier::Frame(_)) => Specifier::Patch(child),
        (array_spec, _) => array_spec,
    }
}

/// Implements spec §4.3's `get_word_context`.
///
/// `symbol` is the word's own name, read directly off the cell
/// (`CellData::word_symbol`) rather than reconstructed from `binding` — a
/// patch overrides bindings by name, so the chain walk never needs to
/// inspect `binding`'s payload at all.
///
/// Returns the concrete `(context, index)` a word resolves to, or `None` if
/// the word is unbound.
pub fn get_word_context(
    symbol: SymbolId,
    binding: Binding,
    specifier: Specifier,
    patches: &Patches,
    contexts: &Contexts,
) -> Option<(ContextId, u32)> {
    if let Specifier::Patch(mut patch_id) = specifier {
        loop {
            let patch = patches.get(patch_id);
            if let Some(index) = contexts.find_key_within(patch.overriding, Some(symbol), patch.cached_len) {
                return Some((patch.overriding, index));
            }
            match patch.next {
                Some(next) => patch_id = next,
                None => break,
            }
        }
    }

    match binding {
        Binding::Unbound => None,
        Binding::Specific { context, index } => {
            if let Specifier::Frame(spec_frame) = specifier
                && contexts.is_overriding(spec_frame, context)
            {
                return Some((spec_frame, index));
            }
            Some((context, index))
        }
        Binding::Relative { action, index } => match specifier {
            Specifier::Frame(frame) if contexts.get(frame).underlying_action == Some(action) => Some((frame, index)),
            _ => None,
        },
        Binding::Virtual(_) => None,
    }
}

/// A transient canon -> index map used while bind-walking an array (spec
/// §4.3 "bind-walk"). The teacher stashes this in spare header bits of the
/// canon itself (`intern.rs`'s two-binder-slot trick); a plain `HashMap` is
/// the idiomatic Rust realization and the crate does not bind concurrently
/// from more than one thread, so there is no need to reserve multiple
/// concurrent slots the way the C original does.
#[derive(Debug, Default)]
pub struct Binder {
    entries: HashMap<SymbolId, u32>,
}

impl Binder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Populates the binder from a context's non-hidden keys.
    pub fn fill_from_context(&mut self, contexts: &Contexts, context: ContextId) {
        debug_assert!(self.entries.is_empty(), "binder entries must be paired: fill then clear");
        for (index, symbol) in contexts.visible_keys(context) {
            self.entries.insert(symbol, index);
        }
    }

    /// Populates the binder from an action's paramlist, for relative binding
    /// (spec §4.3b): a `func` body's words bind to paramlist slots, not a
    /// context, since no varlist exists until the action is actually called.
    pub fn fill_from_params(&mut self, params: &[Param]) {
        debug_assert!(self.entries.is_empty(), "binder entries must be paired: fill then clear");
        for (index, param) in params.iter().enumerate() {
            self.entries.insert(param.symbol, index as u32);
        }
    }

    #[must_use]
    pub fn get(&self, symbol: SymbolId) -> Option<u32> {
        self.entries.get(&symbol).copied()
    }

    pub fn insert(&mut self, symbol: SymbolId, index: u32) {
        self.entries.insert(symbol, index);
    }

    /// Zeroes out binder entries (spec §4.3's exit step). Debug builds
    /// assert set-count/clear-count pairing by requiring `fill_from_context`
    /// to observe an empty binder; this clears that precondition back to
    /// `true` for the next binder use.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// What a bind-walk rewrites matching words to point at (spec §4.3's "bind"
/// operation takes either a context, for specific binding, or an action's
/// paramlist, for relative binding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindTarget {
    Context(ContextId),
    Action(ActionId),
}

/// Recursively rewrites every word-kind cell in `array` whose symbol is
/// present in `binder`, and descends into every nested block/group/path
/// array regardless of whether the outer cell itself was rewritten (spec
/// §4.3 "bind-walk": binding is a deep-but-non-destructive rewrite of word
/// bindings only — it never touches non-word payloads).
///
/// `func`'s relative-bind of its own body and `make object!`'s specific-bind
/// of the block handed to it both go through this one walk, parameterized by
/// `target`.
pub fn bind_array(arrays: &mut Arrays, binder: &Binder, target: BindTarget, array: ArrayId) {
    let len = arrays.get(array).cells.len();
    for i in 0..len {
        let cell = arrays.get(array).cells[i];
        if let Some(symbol) = cell.data().word_symbol()
            && let Some(index) = binder.get(symbol)
        {
            let binding = match target {
                BindTarget::Context(context) => Binding::Specific { context, index },
                BindTarget::Action(action) => Binding::Relative { action, index },
            };
            arrays.get_mut(array).cells[i].set_binding(binding);
        }
        if let Some(nested) = cell.data().array_payload() {
            bind_array(arrays, binder, target, nested);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dummy_contexts() -> Contexts {
        Contexts::new()
    }

    #[test]
    fn merge_terminates_at_parent_bottom() {
        let mut patches = Patches::new();
        let contexts = dummy_contexts();
        let base = contexts.dummy_context_id_for_tests();
        let p = patches.push(base, 0, None, Some(base));
        let q = patches.push(base, 0, None, Some(base));
        let merged = patches.merge(p, q);
        assert_eq!(patches.get(merged).terminal, patches.get(q).terminal);
    }

    #[test]
    fn merge_is_idempotent_via_variants_ring() {
        let mut patches = Patches::new();
        let contexts = dummy_contexts();
        let base = contexts.dummy_context_id_for_tests();
        let p = patches.push(base, 0, None, Some(base));
        let q = patches.push(base, 0, None, Some(base));
        let once = patches.merge(p, q);
        let twice = patches.merge(p, once);
        assert_eq!(once, twice, "merge(p, merge(p, q)) == merge(p, q)");
    }

    #[test]
    fn bind_array_rewrites_matching_words_and_recurses() {
        use crate::{
            array::ArrayFlags,
            cell::{Cell, CellData},
            symbol::SymbolTable,
        };

        let mut symbols = SymbolTable::new();
        let mut arrays = Arrays::new();
        let x = symbols.intern("x");
        let y = symbols.intern("y");
        let inner = arrays.alloc(vec![Cell::word(x, Binding::Unbound)], ArrayFlags::empty());
        let outer = arrays.alloc(
            vec![Cell::word(x, Binding::Unbound), Cell::word(y, Binding::Unbound), Cell::new(CellData::Block(inner), Binding::Unbound)],
            ArrayFlags::empty(),
        );

        let mut binder = Binder::new();
        binder.insert(x, 0);
        let context = ContextId::new(0);
        bind_array(&mut arrays, &binder, BindTarget::Context(context), outer);
        binder.clear();

        assert_eq!(arrays.get(outer).cells[0].binding(), Binding::Specific { context, index: 0 });
        assert_eq!(arrays.get(outer).cells[1].binding(), Binding::Unbound, "y was never in the binder");
        assert_eq!(arrays.get(inner).cells[0].binding(), Binding::Specific { context, index: 0 }, "nested block must be walked too");
    }
}
