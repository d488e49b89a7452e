//! Structured runtime errors (spec §7) and their realization as `error!`
//! cells.
//!
//! Grounded on `exception_private::{ExcType, RunError}` in the teacher: a
//! plain hand-rolled enum plus a hand-rolled `Display`, not a `thiserror`
//! derive — the teacher's own core crate takes this position for its
//! exception type, and this crate follows suit (see `SPEC_FULL.md` §4.12).

use std::fmt;

use crate::{
    binding::Binding,
    cell::{Cell, CellData},
    context::{ContextKind, Contexts},
    symbol::{SymbolId, SymbolTable},
    text::Texts,
};

/// Result type alias used by every fallible core operation (spec §4.12's
/// `RunResult<T>` equivalent).
pub type RunResult<T> = Result<T, ExecError>;

/// The error kinds enumerated in spec §7, plus `Halt` for §5's cancellation
/// signal (the distilled spec lists it separately in §5/§7's policy
/// paragraph rather than in the error-kind list proper; `SPEC_FULL.md`
/// §4.12 folds it into this enum so `fail`'s plumbing has one error type to
/// carry, matching how the teacher's own `ResourceError`/`RunError` split
/// still funnels everything through one `RunError` at the call boundary).
#[derive(Debug, Clone, PartialEq)]
pub enum ExecError {
    /// A word has no binding at lookup time.
    Unbound { symbol: SymbolId },
    /// A variable or expression was required to produce a value but did not.
    NeedNonVoid { context: &'static str },
    /// An expression was required to produce a value but the feed ended.
    NeedNonEnd { context: &'static str },
    /// An action returned a value outside its declared return typeset.
    BadReturnType { action_label: Option<SymbolId> },
    /// A relatively-bound word was dereferenced without a matching frame.
    NotBoundNoRelative { symbol: SymbolId },
    /// A literal path in source position could not be enfix-quoted.
    LiteralLeftPath,
    /// An inlined/proxy action collided with a deferred enfix operator.
    AmbiguousInfix,
    /// A resource bound was exceeded (hash table, quote depth, trampoline
    /// step budget, ...).
    SizeLimit(String),
    /// A write was attempted on a cell marked protected.
    Protected,
    /// An `unwind`/`return`-style jump target was not found on the stack.
    InvalidExit,
    /// A native reported a type mismatch for one of its arguments.
    TypeMismatch { param: SymbolId, action_label: Option<SymbolId> },
    /// Arbitrary user-supplied text (`fail "message"`, `make error! ...`).
    User(String),
    /// The cooperative cancellation signal (spec §5) was sampled at a
    /// new-expression boundary.
    Halt,
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound { .. } => write!(f, "word is unbound"),
            Self::NeedNonVoid { context } => write!(f, "{context} expected a value, got none"),
            Self::NeedNonEnd { context } => write!(f, "{context} expected a value, feed ended"),
            Self::BadReturnType { .. } => write!(f, "action returned a value outside its return typeset"),
            Self::NotBoundNoRelative { .. } => write!(f, "relative word dereferenced without a matching frame"),
            Self::LiteralLeftPath => write!(f, "literal path cannot be used as an enfix left argument"),
            Self::AmbiguousInfix => write!(f, "ambiguous interaction with a deferred enfix operator"),
            Self::SizeLimit(msg) => write!(f, "size limit exceeded: {msg}"),
            Self::Protected => write!(f, "attempt to write a protected cell"),
            Self::InvalidExit => write!(f, "unwind target is not on the stack"),
            Self::TypeMismatch { .. } => write!(f, "argument does not match the expected type"),
            Self::User(msg) => write!(f, "{msg}"),
            Self::Halt => write!(f, "halted"),
        }
    }
}

impl std::error::Error for ExecError {}

impl ExecError {
    /// The well-known symbol naming this error's kind, used as the `kind`
    /// key in the `error!` context the interpreter builds when realizing a
    /// raised `ExecError` as a catchable value.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Unbound { .. } => "unbound",
            Self::NeedNonVoid { .. } => "need-non-void",
            Self::NeedNonEnd { .. } => "need-non-end",
            Self::BadReturnType { .. } => "bad-return-type",
            Self::NotBoundNoRelative { .. } => "not-bound",
            Self::LiteralLeftPath => "literal-left-path",
            Self::AmbiguousInfix => "ambiguous-infix",
            Self::SizeLimit(_) => "size-limit",
            Self::Protected => "protected",
            Self::InvalidExit => "invalid-exit",
            Self::TypeMismatch { .. } => "type-mismatch",
            Self::User(_) => "user",
            Self::Halt => "halt",
        }
    }

    /// Every symbol this error carries, for callers (bind-walk, dispatch)
    /// that want to report "which word/param" without matching on every
    /// variant themselves.
    #[must_use]
    pub fn culprit_symbol(&self) -> Option<SymbolId> {
        match *self {
            Self::Unbound { symbol } | Self::NotBoundNoRelative { symbol } => Some(symbol),
            Self::BadReturnType { action_label } => action_label,
            Self::TypeMismatch { param, .. } => Some(param),
            _ => None,
        }
    }

    /// Realizes this error as a language-level `error!` context (spec §7's
    /// catchable error value), mirroring `ResourceError::into_exception` in
    /// the teacher: a two-key object holding the error's `kind` word and its
    /// rendered `message` text, so `trap`'s recovery handler can inspect
    /// either one.
    #[must_use]
    pub fn into_cell(&self, symbols: &mut SymbolTable, contexts: &mut Contexts, texts: &mut Texts) -> Cell {
        let kind_symbol = symbols.intern(self.kind_name());
        let message_id = texts.alloc(self.to_string());
        let kind_key = symbols.intern("kind");
        let message_key = symbols.intern("message");
        let keylist = contexts.keylists.push_root(vec![kind_key, message_key]);
        let varlist = vec![Cell::word(kind_symbol, Binding::Unbound), Cell::inert(CellData::Text(message_id))];
        let context = contexts.push(ContextKind::Error, keylist, varlist, None);
        Cell::inert(CellData::Error(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn into_cell_carries_kind_and_message() {
        let mut symbols = SymbolTable::new();
        let mut contexts = Contexts::default();
        let mut texts = Texts::new();
        let err = ExecError::User("boom".into());
        let cell = err.into_cell(&mut symbols, &mut contexts, &mut texts);
        let CellData::Error(context) = cell.data() else { panic!("expected error! cell") };
        let ctx = contexts.get(*context);
        assert_eq!(ctx.kind, ContextKind::Error);
        assert_eq!(ctx.varlist.len(), 2);
    }
}
