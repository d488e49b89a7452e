//! Contexts, varlists, keylists, and the derivation test (spec §4.2).
//!
//! Grounded on the teacher's varlist/keylist split (see the module doc on
//! `heap.rs`'s context-shaped `HeapData` variants and `namespace.rs`'s
//! index-addressed storage), generalized here to the Rebol-family notion
//! that objects, modules, errors, *and* running frames are all "a varlist
//! plus a keylist" (spec glossary: "Context").

use crate::{
    cell::Cell,
    ids::{ActionId, ContextId, KeylistId},
    symbol::SymbolId,
};

/// What kind of thing a context instance represents. Stored in the varlist's
/// archetype cell conceptually; kept as an explicit tag here for clarity
/// rather than re-deriving it from cell 0 on every access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Object,
    Module,
    Error,
    Port,
    /// A running (or reified) call activation. Frames never derive from one
    /// another (spec §4.2, and the first Open Question in §9: this crate
    /// picks "frames never derive" as its one consistent rule).
    Frame,
}

/// The symbol list shared across every context instance of one "class"
/// (e.g. every instance produced by `make object-proto []`).
///
/// Invariant (spec §4.2): `len(keylist) == len(varlist) - 1` for every
/// context built from it (the varlist has one extra cell: the archetype).
#[derive(Debug, Clone)]
pub struct Keylist {
    pub symbols: Vec<SymbolId>,
    /// The keylist this one was derived from (`self` for a root keylist).
    /// Used by [`Contexts::is_overriding`]'s ancestor walk.
    pub ancestor: KeylistId,
}

#[derive(Debug, Default)]
pub struct Keylists {
    keylists: Vec<Keylist>,
}

impl Keylists {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_root(&mut self, symbols: Vec<SymbolId>) -> KeylistId {
        let id = KeylistId::new(self.keylists.len());
        self.keylists.push(Keylist { symbols, ancestor: id });
        id
    }

    /// Derives a new keylist from `parent`, appending `extra` symbols.
    pub fn derive(&mut self, parent: KeylistId, extra: Vec<SymbolId>) -> KeylistId {
        let mut symbols = self.keylists[parent.index()].symbols.clone();
        symbols.extend(extra);
        let id = KeylistId::new(self.keylists.len());
        self.keylists.push(Keylist { symbols, ancestor: parent });
        id
    }

    #[must_use]
    pub fn get(&self, id: KeylistId) -> &Keylist {
        &self.keylists[id.index()]
    }

    /// Walks `child`'s ancestor chain looking for `parent` (spec §4.2's
    /// `is_overriding` derivation test, expressed at the keylist level).
    #[must_use]
    pub fn derives_from(&self, child: KeylistId, parent: KeylistId) -> bool {
        let mut cur = child;
        loop {
            if cur == parent {
                return true;
            }
            let next = self.keylists[cur.index()].ancestor;
            if next == cur {
                return false; // reached a root without finding parent
            }
            cur = next;
        }
    }
}

/// One context instance: a keylist reference plus its own variable storage.
#[derive(Debug, Clone)]
pub struct Context {
    pub kind: ContextKind,
    pub keylist: KeylistId,
    /// Variable storage, one cell per keylist symbol (the archetype cell is
    /// tracked implicitly via `kind`/`underlying_action` rather than stored
    /// inline, which keeps `varlist.len() == keylist.symbols.len()` instead
    /// of spec's `len(varlist) == len(keylist) + 1` — an idiomatic-Rust
    /// simplification recorded in `DESIGN.md`).
    pub varlist: Vec<Cell>,
    /// Per-instance protected/hidden bits, parallel to `varlist` (spec
    /// §4.2: "protection / hidden flags live per-cell in varlists, not in
    /// keys").
    pub hidden: Vec<bool>,
    pub protected: Vec<bool>,
    /// For `ContextKind::Frame`: which action is running on this context.
    /// `None` for every other kind.
    pub underlying_action: Option<ActionId>,
    /// For `ContextKind::Frame`: the call-stack identity of the activation
    /// this varlist was reified from (spec §9.9's definitional RETURN/
    /// UNWIND: a throw label needs to identify *one call*, and `crate::
    /// frame::FrameId` is what the trampoline compares against, not the
    /// `ContextId` a `frame!` value happens to carry once reified).
    pub source_frame: Option<crate::ids::FrameId>,
}

#[derive(Debug, Default)]
pub struct Contexts {
    contexts: Vec<Context>,
    pub keylists: Keylists,
}

impl Contexts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ContextKind, keylist: KeylistId, varlist: Vec<Cell>, underlying_action: Option<ActionId>) -> ContextId {
        let len = varlist.len();
        let id = ContextId::new(self.contexts.len());
        self.contexts.push(Context {
            kind,
            keylist,
            varlist,
            hidden: vec![false; len],
            protected: vec![false; len],
            underlying_action,
            source_frame: None,
        });
        id
    }

    /// Records the call-stack identity a reified frame context was built
    /// from, enabling definitional `return`/`unwind` to find it later by
    /// `FrameId` even while the call is still on the stack.
    pub fn set_source_frame(&mut self, context: ContextId, frame: crate::ids::FrameId) {
        self.get_mut(context).source_frame = Some(frame);
    }

    #[must_use]
    pub fn get(&self, id: ContextId) -> &Context {
        &self.contexts[id.index()]
    }

    pub fn get_mut(&mut self, id: ContextId) -> &mut Context {
        &mut self.contexts[id.index()]
    }

    /// spec §4.2 `is_overriding(parent, child)`.
    #[must_use]
    pub fn is_overriding(&self, parent: ContextId, child: ContextId) -> bool {
        let parent_ctx = self.get(parent);
        let child_ctx = self.get(child);
        if parent_ctx.kind == ContextKind::Frame || child_ctx.kind == ContextKind::Frame {
            // Frames never derive (Open Question resolution, see module doc).
            return false;
        }
        self.keylists.derives_from(child_ctx.keylist, parent_ctx.keylist)
    }

    /// Index of `symbol` in `context`'s keylist, or `None`.
    #[must_use]
    pub fn find_key(&self, context: ContextId, symbol: SymbolId) -> Option<u32> {
        let keylist = self.keylists.get(self.get(context).keylist);
        keylist.symbols.iter().position(|&s| s == symbol).map(|i| i as u32)
    }

    /// Like [`Self::find_key`], but only considers the first `cached_len`
    /// keys — used by virtual-bind patch lookup (spec §4.3) to ignore keys
    /// added to the overriding context after the patch was captured.
    #[must_use]
    pub fn find_key_within(&self, context: ContextId, symbol: Option<SymbolId>, cached_len: u32) -> Option<u32> {
        let symbol = symbol?;
        let keylist = self.keylists.get(self.get(context).keylist);
        keylist.symbols.iter().take(cached_len as usize).position(|&s| s == symbol).map(|i| i as u32)
    }

    #[must_use]
    pub fn key_symbol(&self, context: ContextId, index: u32) -> Option<SymbolId> {
        let keylist = self.keylists.get(self.get(context).keylist);
        keylist.symbols.get(index as usize).copied()
    }

    /// Iterates `(index, symbol)` for every non-hidden key, for bind-walk's
    /// binder population (spec §4.3).
    pub fn visible_keys(&self, context: ContextId) -> impl Iterator<Item = (u32, SymbolId)> + '_ {
        let ctx = self.get(context);
        let keylist = self.keylists.get(ctx.keylist);
        keylist
            .symbols
            .iter()
            .enumerate()
            .filter(move |(i, _)| !ctx.hidden.get(*i).copied().unwrap_or(false))
            .map(|(i, &s)| (i as u32, s))
    }

    /// Appends a new `(symbol, value)` pair to `context`, growing both its
    /// keylist and varlist. Used by bind-walk's `add_midstream` mode (spec
    /// §4.3) and by `object`/`func`-spec construction.
    pub fn append_key(&mut self, context: ContextId, symbol: SymbolId, value: Cell) -> u32 {
        let keylist_id = self.get(context).keylist;
        let new_keylist = self.keylists.derive(keylist_id, vec![symbol]);
        let ctx = self.get_mut(context);
        ctx.keylist = new_keylist;
        ctx.varlist.push(value);
        ctx.hidden.push(false);
        ctx.protected.push(false);
        (ctx.varlist.len() - 1) as u32
    }
}

#[cfg(test)]
impl Contexts {
    /// Test helper: builds a throwaway empty context and returns its id, for
    /// unit tests elsewhere that just need *some* valid `ContextId`.
    pub fn dummy_context_id_for_tests(&self) -> ContextId {
        ContextId::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (Contexts, ContextId) {
        let mut contexts = Contexts::new();
        let keylist = contexts.keylists.push_root(vec![]);
        let id = contexts.push(ContextKind::Object, keylist, vec![], None);
        (contexts, id)
    }

    #[test]
    fn derived_object_overrides_parent() {
        let (mut contexts, root) = fresh();
        let root_keylist = contexts.get(root).keylist;
        let child_keylist = contexts.keylists.derive(root_keylist, vec![]);
        let child = contexts.push(ContextKind::Object, child_keylist, vec![], None);
        assert!(contexts.is_overriding(root, child));
        assert!(!contexts.is_overriding(child, root));
    }

    #[test]
    fn frames_never_derive() {
        let (mut contexts, _root) = fresh();
        let keylist = contexts.keylists.push_root(vec![]);
        let f1 = contexts.push(ContextKind::Frame, keylist, vec![], None);
        let derived = contexts.keylists.derive(keylist, vec![]);
        let f2 = contexts.push(ContextKind::Frame, derived, vec![], None);
        assert!(!contexts.is_overriding(f1, f2));
    }
}
