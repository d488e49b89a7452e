//! Non-local exits: the cooperative throw side-channel (spec §4.9), kept
//! distinct from `fail` (spec §7's error/trap path, realized via ordinary
//! `Result` propagation — see `error.rs`'s module doc and `DESIGN.md` for
//! why Rust's own `?`-propagation is the idiomatic stand-in for the C
//! original's trap-stack long-jump).
//!
//! Grounded on spec §4.9 and §9's "single process-wide thrown-arg cell"
//! design note: a single side-channel slot rather than a discriminated
//! return threaded through every executor signature.

use crate::{cell::Cell, ids::FrameId, symbol::SymbolId};

/// What a throw's label identifies (spec §4.9: "`RETURN`, `UNWIND`, loop-
/// break/continue, `THROW` are all implemented this way").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrowLabel {
    /// A definitional `return`/`unwind`: caught exactly by the frame whose
    /// identity matches (spec §9.9).
    Frame(FrameId),
    /// `throw/name value 'some-word`: caught by a `catch` expecting the
    /// same name.
    Named(SymbolId),
    /// Plain `throw value`: caught by a `catch` with no `/name`.
    Anonymous,
}

/// The process-wide side channel (spec §4.9, §9): set by `R_THROWN`-
/// returning dispatchers, inspected and cleared by catching frames.
#[derive(Debug, Clone)]
pub struct Thrown {
    pub arg: Cell,
    pub label: ThrowLabel,
}

/// Whether a catching frame's expected name matches a thrown label (spec
/// §4.9's `catch [throw/name ...]` semantics, and §8's two catch-name
/// testable properties).
#[must_use]
pub fn label_matches(label: ThrowLabel, expect: CatchTarget) -> bool {
    match (label, expect) {
        (ThrowLabel::Anonymous, CatchTarget::Any) => true,
        (ThrowLabel::Named(got), CatchTarget::Name(want)) => got == want,
        (ThrowLabel::Frame(got), CatchTarget::Frame(want)) => got == want,
        _ => false,
    }
}

/// What a `catch`/`return`-matching site is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchTarget {
    /// Plain `catch [...]`: catches anonymous throws only.
    Any,
    Name(SymbolId),
    Frame(FrameId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_matches_any() {
        assert!(label_matches(ThrowLabel::Anonymous, CatchTarget::Any));
    }

    #[test]
    fn named_requires_matching_symbol() {
        let mut symbols = crate::symbol::SymbolTable::new();
        let a = symbols.intern("foo");
        let b = symbols.intern("bar");
        assert!(label_matches(ThrowLabel::Named(a), CatchTarget::Name(a)));
        assert!(!label_matches(ThrowLabel::Named(a), CatchTarget::Name(b)));
    }
}
