//! Actions: callable function values (spec §3.5), their param lists, and
//! the composition phases (adapt/enclose/specialize) layered on top of a
//! base dispatcher (spec §4.6).
//!
//! Grounded on the teacher's `Function` (`function.rs`): a plain struct
//! describing everything a call needs to reconstruct its activation shape.
//! This crate's `Action` generalizes that to a *chain* of phases (the
//! teacher has no equivalent to `adapt`/`enclose`/`specialize` composing
//! over an existing callable, since Python functions don't compose this
//! way) — each phase wraps an `underlying` `ActionId` per spec §3.5.

use crate::{
    binding::Specifier,
    cell::Typeset,
    ids::{ActionId, ArrayId, ContextId},
    symbol::SymbolId,
};

/// How a formal parameter's argument is gathered during fulfillment (spec
/// §4.6's "Param classes").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamClass {
    /// Evaluated normally.
    Normal,
    /// Takes the next value literally, without evaluating it.
    HardQuoted,
    /// Literal unless the value is a group/get-word/get-path, which
    /// triggers evaluation.
    SoftQuoted,
    /// Soft-quoted unless a modal marker (`:refinement`) precedes the
    /// argument, in which case it is evaluated.
    Modal,
    /// Filled only by the dispatcher itself; never fulfilled from the feed.
    Local,
    /// A `return`-style special local (spec §9.9's definitional return).
    Return,
}

impl ParamClass {
    /// Whether this class ever consumes a value from the feed during
    /// ordinary (non-specialized) fulfillment.
    #[must_use]
    pub fn consumes_feed(self) -> bool {
        !matches!(self, Self::Local | Self::Return)
    }
}

/// One formal parameter (spec §3.5 "paramlist... typesets keyed by
/// symbol").
#[derive(Debug, Clone)]
pub struct Param {
    pub symbol: SymbolId,
    pub class: ParamClass,
    pub types: Typeset,
    /// A refinement (spec glossary): a named optional parameter that may be
    /// supplied out of order via a path invocation (spec §4.6 "pickups").
    pub is_refinement: bool,
    /// If set, this param is only fulfilled (from the feed) when the named
    /// refinement is active; otherwise it is left blank and the feed is not
    /// advanced for it. `None` for ordinary positional params and for
    /// refinement params themselves.
    pub refinement_arg_of: Option<SymbolId>,
}

impl Param {
    #[must_use]
    pub fn positional(symbol: SymbolId, class: ParamClass) -> Self {
        Self { symbol, class, types: Typeset::any_value(), is_refinement: false, refinement_arg_of: None }
    }

    #[must_use]
    pub fn refinement(symbol: SymbolId) -> Self {
        Self { symbol, class: ParamClass::Local, types: Typeset::any_value(), is_refinement: true, refinement_arg_of: None }
    }

    #[must_use]
    pub fn refinement_arg(symbol: SymbolId, owner: SymbolId) -> Self {
        Self { symbol, class: ParamClass::Normal, types: Typeset::any_value(), is_refinement: false, refinement_arg_of: Some(owner) }
    }
}

/// Left-argument class for an enfix (infix-positioned) action (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeftArgClass {
    Hard,
    Soft,
    Skippable,
}

/// Enfix metadata attached to an action created via the `enfix` native
/// (`SPEC_FULL.md` §4.11).
#[derive(Debug, Clone, Copy)]
pub struct EnfixInfo {
    pub left_class: LeftArgClass,
    /// DEFERS_LOOKBACK (spec §4.6): yields to an enclosing argument
    /// fulfillment's "second chance" instead of binding immediately.
    pub defers: bool,
    /// POSTPONES_ENTIRELY (spec §4.6): never takes a left argument while
    /// the caller is itself fulfilling an argument.
    pub postpones: bool,
}

/// Identifies one of this crate's built-in native dispatchers (spec
/// §4.11's "minimal action library"). Dispatched by a big `match` in
/// `natives.rs`, mirroring the teacher's `builtins`/`modules` enum-id
/// pattern (`crates/ouros/src/builtins.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum NativeId {
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
    If,
    Either,
    Else,
    While,
    ForEach,
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
    #[strum(serialize = "integer?")]
    IntegerQ,
    Enfix,
    Comment,
    Elide,
    /// Declares a word in the running frame's context and assigns it (spec
    /// §8 scenario 1's `let x: 10` surface syntax).
    Let,
    /// Vanishing "then"-combinator used to build `|` (spec §8's
    /// `(add 1 2) | (subtract 10 3)` example).
    ThenVanish,
    /// Pushes a value onto a block (supplementary native, not in the
    /// distilled spec's §4.11 list — added because §8 scenario 2's adapted
    /// `append` example needs a concrete series mutator; see `DESIGN.md`).
    Append,
    /// Shallow-clones a block (supplementary, same scenario 2 need).
    Copy,
    /// Writes to the interpreter's print sink (supplementary; see
    /// `DESIGN.md` and `io.rs` — backs §8 scenario 5's `print` side effect).
    Print,
}

/// A dispatcher: what actually runs when an action is invoked (spec §3.5).
#[derive(Debug, Clone)]
pub enum Dispatcher {
    /// One of this crate's built-in natives.
    Native(NativeId),
    /// An interpreted body produced by `func` (spec §4.11): evaluate `body`
    /// under `specifier` bound to the call's own frame.
    Interpreted { body: ArrayId },
    /// Adapter phase (spec §4.6): run `prelude` first, then redo-checked
    /// into `adaptee`.
    Adapter { prelude: ArrayId, adaptee: ActionId },
    /// Encloser phase (spec §4.6): build `inner`'s frame, then hand it (as
    /// a first-class frame value) to `outer`.
    Encloser { inner: ActionId, outer: ActionId },
    /// Specializer phase (spec §4.6): redo-checked into `base`, trusting
    /// the owning [`Action::exemplar`]'s pre-filled args.
    Specializer { base: ActionId },
}

/// A callable function value (spec §3.5).
#[derive(Debug, Clone)]
pub struct Action {
    pub paramlist: Vec<Param>,
    /// Specialization context giving fixed argument values, if this action
    /// (or one it composes over) has been partially applied.
    pub exemplar: Option<ContextId>,
    pub dispatcher: Dispatcher,
    /// The bottom of any composition chain (spec §3.5); used to decide
    /// stack-frame shape and specifier compatibility (spec §4.3 rule 3).
    pub underlying: ActionId,
    pub enfix: Option<EnfixInfo>,
    /// Declared return typeset; `None` means unconstrained (spec §4.6
    /// "bad-return-type" check).
    pub return_types: Option<Typeset>,
    /// The specifier a `func`-produced interpreted body's relative words
    /// resolve against once combined with a running frame (spec §4.3b).
    pub body_specifier: Specifier,
}

impl Action {
    #[must_use]
    pub fn is_enfix(&self) -> bool {
        self.enfix.is_some()
    }

    /// Returns the 0-based index of `symbol` in the paramlist, if present.
    #[must_use]
    pub fn param_index(&self, symbol: SymbolId) -> Option<usize> {
        self.paramlist.iter().position(|p| p.symbol == symbol)
    }
}

#[derive(Debug, Default)]
pub struct Actions {
    actions: Vec<Action>,
}

impl Actions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new primitive action (its own `underlying`).
    pub fn push_primitive(&mut self, paramlist: Vec<Param>, dispatcher: Dispatcher, enfix: Option<EnfixInfo>, return_types: Option<Typeset>, body_specifier: Specifier) -> ActionId {
        let id = ActionId::new(self.actions.len());
        self.actions.push(Action {
            paramlist,
            exemplar: None,
            dispatcher,
            underlying: id,
            enfix,
            return_types,
            body_specifier,
        });
        id
    }

    /// Pushes a composed action (adapt/enclose/specialize): `underlying` is
    /// inherited from `base` so stack-frame shape follows the bottom of the
    /// chain.
    pub fn push_composed(&mut self, paramlist: Vec<Param>, dispatcher: Dispatcher, base: ActionId, exemplar: Option<ContextId>) -> ActionId {
        let underlying = self.get(base).underlying;
        let enfix = self.get(base).enfix;
        let return_types = self.get(base).return_types;
        let body_specifier = self.get(base).body_specifier;
        let id = ActionId::new(self.actions.len());
        self.actions.push(Action {
            paramlist,
            exemplar,
            dispatcher,
            underlying,
            enfix,
            return_types,
            body_specifier,
        });
        id
    }

    /// Clones `base` with `enfix` metadata attached, for the `enfix` native
    /// (`SPEC_FULL.md` §4.11): enfix is pure metadata, not a new dispatch
    /// phase, so this is a plain clone-and-tag rather than a composition.
    pub fn push_enfixed(&mut self, base: ActionId, enfix: EnfixInfo) -> ActionId {
        let mut action = self.get(base).clone();
        action.enfix = Some(enfix);
        let id = ActionId::new(self.actions.len());
        self.actions.push(action);
        id
    }

    #[must_use]
    pub fn get(&self, id: ActionId) -> &Action {
        &self.actions[id.index()]
    }

    pub fn get_mut(&mut self, id: ActionId) -> &mut Action {
        &mut self.actions[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dummy_action(paramlist: Vec<Param>) -> (Actions, ActionId) {
        let mut actions = Actions::new();
        let id = actions.push_primitive(paramlist, Dispatcher::Native(NativeId::Add), None, None, Specifier::Unspecified);
        (actions, id)
    }

    #[test]
    fn primitive_action_is_its_own_underlying() {
        let (actions, id) = dummy_action(vec![]);
        assert_eq!(actions.get(id).underlying, id);
        assert!(!actions.get(id).is_enfix());
    }

    #[test]
    fn composed_action_inherits_underlying_and_enfix_from_base() {
        let (mut actions, base) = dummy_action(vec![]);
        let enfixed = actions.push_enfixed(base, EnfixInfo { left_class: LeftArgClass::Soft, defers: false, postpones: false });
        assert!(actions.get(enfixed).is_enfix());

        let composed = actions.push_composed(vec![], Dispatcher::Specializer { base: enfixed }, enfixed, None);
        assert_eq!(actions.get(composed).underlying, base);
        assert!(actions.get(composed).is_enfix());
    }

    #[test]
    fn param_index_finds_declared_params_only() {
        let mut symbols = crate::symbol::SymbolTable::new();
        let one = symbols.intern("one");
        let two = symbols.intern("two");
        let three = symbols.intern("three");
        let (actions, id) = dummy_action(vec![Param::positional(one, ParamClass::Normal), Param::positional(two, ParamClass::Normal)]);
        assert_eq!(actions.get(id).param_index(one), Some(0));
        assert_eq!(actions.get(id).param_index(two), Some(1));
        assert_eq!(actions.get(id).param_index(three), None);
    }

    #[test]
    fn param_class_consumes_feed_excludes_local_and_return() {
        assert!(ParamClass::Normal.consumes_feed());
        assert!(ParamClass::HardQuoted.consumes_feed());
        assert!(!ParamClass::Local.consumes_feed());
        assert!(!ParamClass::Return.consumes_feed());
    }
}
