//! The evaluator (spec §4.5-§4.9): the trampoline, word resolution, argument
//! fulfillment, dispatch, path access, and the definitional-return/unwind
//! plumbing (§9.9) that ties a `func`'s `return` back to exactly one call.
//!
//! Grounded on the teacher's bytecode dispatch loop (the match-on-opcode
//! core in its VM), generalized here from "what opcode runs next" to "which
//! [`Executor`] runs next" (spec §4.5's state machine). `SPEC_FULL.md` §9
//! records the one deliberate structural simplification this module takes:
//! the seven-executor state machine is realized as ordinary recursive Rust
//! calls (`eval_expr` calling itself for nested groups/path segments/bodies)
//! rather than a literal re-entrant loop over [`Executor`] values threaded
//! through a work queue. Every call still pushes a real [`Frame`] and calls
//! into [`Tracer`] at the same points a literal trampoline would, so stack
//! traces, tracing, and resource limits behave identically; only the Rust
//! call stack stands in for the spec's explicit continuation stack.

use crate::{
    action::{Action, Actions, Dispatcher, EnfixInfo, LeftArgClass, NativeId, Param, ParamClass},
    array::{ArrayFlags, Arrays},
    binding::{bind_array, derive_specifier, get_word_context, BindTarget, Binder, Binding, Patches, Specifier},
    cell::{Cell, CellData, Kind},
    context::{ContextKind, Contexts},
    error::{ExecError, RunResult},
    feed::{Feed, FeedHandle},
    frame::{Baseline, Frame, Frames},
    ids::{ActionId, ArrayId, ContextId, FrameId},
    io::PrintSink,
    resource::{LimitsPolicy, NoLimits},
    symbol::{SymbolId, SymbolTable, WellKnown},
    text::Texts,
    throw::{ThrowLabel, Thrown},
    tracer::{NoopTracer, Tracer},
};
use smallvec::{smallvec, SmallVec};

/// What one step of evaluation produced (spec §4.5's step result, folded
/// together with §4.6's "invisible action" outcome: a plain value, "no
/// observable result" for an invisible action like `comment`/`elide`/`let`,
/// or a non-local exit in flight).
#[derive(Debug, Clone)]
pub enum Outcome {
    Value(Cell),
    Invisible,
    Thrown(Thrown),
}

/// What fulfilling one argument produced (spec §4.9): either a value ready
/// to drop into the call's `args`, or a cooperative throw that must abort
/// fulfillment of the *whole call in progress*, not just the one slot.
enum ArgFulfillment {
    Value(Cell),
    Thrown(Thrown),
}

/// Everything the evaluator needs, generic over a limits policy and a tracer
/// so a production build monomorphizes both away to nothing (mirrors
/// `resource.rs`/`tracer.rs`'s own framing).
#[derive(Debug)]
pub struct Interpreter<L: LimitsPolicy = NoLimits, Tr: Tracer = NoopTracer, P: PrintSink = crate::io::NoPrint> {
    pub symbols: SymbolTable,
    pub arrays: Arrays,
    pub contexts: Contexts,
    pub patches: Patches,
    pub actions: Actions,
    pub texts: Texts,
    pub frames: Frames,
    pub limits: L,
    pub tracer: Tr,
    pub print: P,
    /// Every `let`-declared top-level binding lives here (spec §9's "no
    /// whole-program pre-bind pass" design note): a word that resolves to
    /// `Binding::Unbound` falls back to a direct lookup in this context
    /// instead of failing outright, which is what lets §8 scenario 1's
    /// `let x: 10` followed by a use of `x` in a later top-level expression
    /// work without a separate binder pass over the whole program.
    pub user_context: ContextId,
    bar_symbol: SymbolId,
    let_symbol: SymbolId,
    return_symbol: SymbolId,
}

impl<L: LimitsPolicy + Default, Tr: Tracer + Default, P: PrintSink + Default> Default for Interpreter<L, Tr, P> {
    fn default() -> Self {
        Self::new(L::default(), Tr::default(), P::default())
    }
}

impl<L: LimitsPolicy, Tr: Tracer, P: PrintSink> Interpreter<L, Tr, P> {
    #[must_use]
    pub fn new(limits: L, tracer: Tr, print: P) -> Self {
        let mut symbols = SymbolTable::new();
        let mut contexts = Contexts::new();
        let keylist = contexts.keylists.push_root(vec![]);
        let user_context = contexts.push(ContextKind::Module, keylist, vec![], None);
        let bar_symbol = symbols.intern("|");
        let let_symbol = symbols.well_known(WellKnown::Let);
        let return_symbol = symbols.well_known(WellKnown::Return);
        let mut interp = Self {
            symbols,
            arrays: Arrays::new(),
            contexts,
            patches: Patches::new(),
            actions: Actions::new(),
            texts: Texts::new(),
            frames: Frames::new(),
            limits,
            tracer,
            print,
            user_context,
            bar_symbol,
            let_symbol,
            return_symbol,
        };
        crate::natives::register_natives(&mut interp);
        interp
    }

    /// Declares (or re-assigns) a word directly in [`Self::user_context`],
    /// the global fallback every top-level `let`/native-registration uses.
    pub fn declare_global(&mut self, symbol: SymbolId, value: Cell) -> u32 {
        if let Some(index) = self.contexts.find_key(self.user_context, symbol) {
            self.contexts.get_mut(self.user_context).varlist[index as usize] = value;
            index
        } else {
            self.contexts.append_key(self.user_context, symbol, value)
        }
    }

    /// Scans `source` and evaluates it as a sequence of top-level
    /// expressions, returning the last expression's value (spec §4.5 step
    /// 4's "root frame stays keepalive across steps"; `Outcome::Invisible`
    /// at top level reports as [`Cell::null`], matching an empty program).
    ///
    /// # Errors
    /// Propagates any [`ExecError`] raised while scanning or evaluating.
    pub fn run(&mut self, source: &str) -> RunResult<Cell> {
        let array = crate::scan::scan(&mut self.symbols, &mut self.arrays, &mut self.texts, source)?;
        self.evaluate_array(array, Specifier::Unspecified)
    }

    /// Evaluates every expression in `array` in turn (spec §4.5's top-level
    /// "do" loop), returning the last value produced (or null if the array
    /// held only invisible expressions).
    ///
    /// # Errors
    /// Propagates any [`ExecError`]; a thrown value with no catcher becomes
    /// [`ExecError::InvalidExit`].
    pub fn evaluate_array(&mut self, array: ArrayId, specifier: Specifier) -> RunResult<Cell> {
        let feed = Feed::from_array(array, specifier, &self.arrays);
        feed.borrow_mut().fetch_next(&self.arrays);
        let mut last = Cell::null();
        while !feed.borrow().is_at_end() || feed.borrow().value.is_some() {
            match self.eval_expr(&feed)? {
                Outcome::Value(v) => last = v,
                Outcome::Invisible => {}
                Outcome::Thrown(t) => return Err(self.unhandled_throw(t)),
            }
            if feed.borrow().value.is_none() && feed.borrow().is_at_end() {
                break;
            }
        }
        Ok(last)
    }

    fn unhandled_throw(&mut self, thrown: Thrown) -> ExecError {
        self.tracer.on_throw(matches!(thrown.label, ThrowLabel::Named(_)));
        match thrown.label {
            ThrowLabel::Anonymous | ThrowLabel::Named(_) => ExecError::User("throw with no matching catch".into()),
            ThrowLabel::Frame(_) => ExecError::InvalidExit,
        }
    }

    /// Evaluates exactly one expression from `feed`, advancing it past
    /// everything consumed (spec §4.5's `NewExpression` -> `FrameWorkhorse`
    /// step, folded with §4.6's lookahead-for-enfix extension).
    ///
    /// Loops internally while successive steps produce
    /// [`Outcome::Invisible`] (spec §4.6 "invisible actions re-trigger
    /// within one step"), and stops dead at a bare `|` (spec §8's vanishing
    /// "then"-combinator boundary) without evaluating past it.
    ///
    /// # Errors
    /// Propagates any [`ExecError`] from dispatch or word resolution.
    pub fn eval_expr(&mut self, feed: &FeedHandle) -> RunResult<Outcome> {
        self.eval_expr_ext(feed, false)
    }

    /// Like [`Self::eval_expr`], but used to fulfill *another* call's
    /// argument (spec §4.6/§4.7): a deferred or postponed enfix word
    /// encountered while fulfilling an argument this way must be left
    /// unconsumed for the outer, not-yet-dispatched call's own lookahead to
    /// pick up, so `if true [10] else [20]` binds `else` to `if`, not to the
    /// `[10]` sub-expression that happens to be `if`'s branch argument.
    fn eval_expr_as_arg(&mut self, feed: &FeedHandle) -> RunResult<Outcome> {
        self.eval_expr_ext(feed, true)
    }

    fn eval_expr_ext(&mut self, feed: &FeedHandle, fulfilling_arg: bool) -> RunResult<Outcome> {
        self.limits.check_trampoline_step()?;
        loop {
            let Some(value) = feed.borrow().value else {
                return Ok(Outcome::Invisible);
            };
            if let CellData::Word(symbol) = value.data()
                && self.symbols.canon_of(*symbol) == self.symbols.canon_of(self.bar_symbol)
            {
                feed.borrow_mut().fetch_next(&self.arrays);
                return Ok(Outcome::Invisible);
            }

            let outcome = self.eval_one_step(feed)?;
            match outcome {
                Outcome::Invisible => {
                    if feed.borrow().value.is_none() {
                        return Ok(Outcome::Invisible);
                    }
                    continue;
                }
                other => return Ok(self.apply_enfix_lookahead(feed, other, fulfilling_arg)?),
            }
        }
    }

    /// After an ordinary step produces a value, checks whether the next
    /// feed value is an enfix word (spec §4.7) that should consume it as its
    /// left argument, looping while successive enfix operators chain
    /// (`1 + 2 * 3`).
    ///
    /// `fulfilling_arg` is set when this lookahead is running on behalf of
    /// an outer call's own argument fulfillment. A deferring/postponing
    /// enfix op (`else`'s `defers: true`) then bails out unconsumed so the
    /// outer call's *own* lookahead, once it finishes dispatching, gets the
    /// first chance at it — unless the op is hard-left-quoting, which grabs
    /// its left operand outright and was never a candidate for deferral.
    fn apply_enfix_lookahead(&mut self, feed: &FeedHandle, mut outcome: Outcome, fulfilling_arg: bool) -> RunResult<Outcome> {
        loop {
            let Outcome::Value(left) = &outcome else { return Ok(outcome) };
            let Some(next) = feed.borrow().value else { return Ok(outcome) };
            let Some(symbol) = next.data().word_symbol() else { return Ok(outcome) };
            let specifier = feed.borrow().specifier();
            let Some((action_id, _)) = self.resolve_action_word(symbol, next.binding(), specifier) else {
                return Ok(outcome);
            };
            let action = self.actions.get(action_id).clone();
            let Some(enfix) = action.enfix else { return Ok(outcome) };
            if fulfilling_arg && enfix.left_class != LeftArgClass::Hard && (enfix.defers || enfix.postpones) {
                return Ok(outcome);
            }
            feed.borrow_mut().fetch_next(&self.arrays);
            let left = left.clone();
            outcome = self.call_enfix(feed, action_id, &action, Some(symbol), left)?;
        }
    }

    /// Resolves a word believed to name an action: first through
    /// [`get_word_context`]/global fallback, then unwraps an `Action` cell.
    pub(crate) fn resolve_action_word(&mut self, symbol: SymbolId, binding: Binding, specifier: Specifier) -> Option<(ActionId, ContextId)> {
        let (context, index) = self.resolve_word_slot(symbol, binding, specifier)?;
        let cell = self.contexts.get(context).varlist[index as usize];
        match cell.data() {
            CellData::Action(action) => Some((*action, context)),
            _ => None,
        }
    }

    /// Resolves a word to its `(context, index)` slot (spec §4.3
    /// `get_word_context`), falling back to a direct lookup by symbol in
    /// [`Self::user_context`] when the word carries no binding at all (this
    /// crate's substitute for a whole-program pre-bind pass, `SPEC_FULL.md`
    /// §9).
    pub(crate) fn resolve_word_slot(&self, symbol: SymbolId, binding: Binding, specifier: Specifier) -> Option<(ContextId, u32)> {
        if let Some(found) = get_word_context(symbol, binding, specifier, &self.patches, &self.contexts) {
            return Some(found);
        }
        if matches!(binding, Binding::Unbound) {
            if let Some(index) = self.contexts.find_key(self.user_context, symbol) {
                return Some((self.user_context, index));
            }
        }
        None
    }

    /// Fetches the value a word currently resolves to (spec §4.4 "get the
    /// variable"), erroring with [`ExecError::Unbound`] if unresolved.
    pub fn get_word_value(&self, symbol: SymbolId, binding: Binding, specifier: Specifier) -> RunResult<Cell> {
        let (context, index) = self.resolve_word_slot(symbol, binding, specifier).ok_or(ExecError::Unbound { symbol })?;
        Ok(self.contexts.get(context).varlist[index as usize])
    }

    /// Writes `value` into the slot a word resolves to, declaring it in
    /// [`Self::user_context`] first if it has no binding yet (spec §4.4's
    /// `set-word!` evaluation, generalized with the same global fallback
    /// [`Self::resolve_word_slot`] uses for reads).
    pub fn set_word_value(&mut self, symbol: SymbolId, binding: Binding, specifier: Specifier, value: Cell) -> RunResult<()> {
        if let Some((context, index)) = self.resolve_word_slot(symbol, binding, specifier) {
            let ctx = self.contexts.get_mut(context);
            if ctx.protected.get(index as usize).copied().unwrap_or(false) {
                return Err(ExecError::Protected);
            }
            ctx.varlist[index as usize] = value;
            return Ok(());
        }
        self.declare_global(symbol, value);
        Ok(())
    }

    /// One non-enfix-lookahead step: dispatches on the fetched value's kind
    /// (spec §4.5's `FrameWorkhorse`).
    fn eval_one_step(&mut self, feed: &FeedHandle) -> RunResult<Outcome> {
        let value = feed.borrow().value.expect("eval_one_step requires a value");
        let specifier = feed.borrow().specifier();

        match value.data() {
            CellData::Word(symbol) => {
                let symbol = *symbol;
                let binding = value.binding();
                if let Some((action_id, _)) = self.resolve_action_word(symbol, binding, specifier) {
                    feed.borrow_mut().fetch_next(&self.arrays);
                    let action = self.actions.get(action_id).clone();
                    return self.call_action_from_feed(feed, action_id, &action, Some(symbol));
                }
                let resolved = self.get_word_value(symbol, binding, specifier)?;
                feed.borrow_mut().fetch_next(&self.arrays);
                Ok(Outcome::Value(resolved))
            }
            CellData::SetWord(symbol) => {
                let symbol = *symbol;
                let binding = value.binding();
                feed.borrow_mut().fetch_next(&self.arrays);
                let rhs = self.eval_expr(feed)?;
                match rhs {
                    Outcome::Value(v) => {
                        self.set_word_value(symbol, binding, specifier, v)?;
                        Ok(Outcome::Value(v))
                    }
                    Outcome::Invisible => Err(ExecError::NeedNonVoid { context: "set-word" }),
                    thrown => Ok(thrown),
                }
            }
            CellData::GetWord(symbol) => {
                let symbol = *symbol;
                let binding = value.binding();
                let resolved = self.get_word_value(symbol, binding, specifier)?;
                feed.borrow_mut().fetch_next(&self.arrays);
                Ok(Outcome::Value(resolved))
            }
            CellData::SymWord(symbol) => {
                let resolved = Cell::word(*symbol, value.binding());
                feed.borrow_mut().fetch_next(&self.arrays);
                Ok(Outcome::Value(resolved))
            }
            CellData::Group(array) => {
                let array = *array;
                feed.borrow_mut().fetch_next(&self.arrays);
                self.evaluate_group(array, specifier)
            }
            CellData::Path(_) | CellData::SetPath(_) | CellData::GetPath(_) => self.eval_path_cell(feed),
            _ => {
                feed.borrow_mut().fetch_next(&self.arrays);
                Ok(Outcome::Value(value))
            }
        }
    }

    /// Evaluates every expression in `array` under `specifier`, returning
    /// the last value (spec §4.8's "group executor": a parenthesized group
    /// runs its contents like a nested `do`).
    pub(crate) fn evaluate_group(&mut self, array: ArrayId, specifier: Specifier) -> RunResult<Outcome> {
        let inner_specifier = derive_specifier(&mut self.patches, &self.contexts, specifier, Some(Specifier::Unspecified));
        let _ = inner_specifier; // group contents carry their own bindings; only the caller's frame matters
        let feed = Feed::from_array(array, specifier, &self.arrays);
        feed.borrow_mut().fetch_next(&self.arrays);
        let mut last = Outcome::Invisible;
        loop {
            if feed.borrow().value.is_none() {
                break;
            }
            last = self.eval_expr(&feed)?;
            if matches!(last, Outcome::Thrown(_)) {
                return Ok(last);
            }
        }
        Ok(last)
    }

    /// Evaluates a single cell as a standalone expression (spec §4.8, used
    /// by path index/group segments and by `do`/`reduce`'s per-element
    /// pass): literal values pass through, word-family and group cells are
    /// evaluated as if they were the sole item of a one-element feed.
    pub fn eval_cell_as_expr(&mut self, cell: Cell, specifier: Specifier) -> RunResult<Outcome> {
        let one = self.arrays.alloc(vec![cell], ArrayFlags::empty());
        let outcome = self.evaluate_group(one, specifier)?;
        self.arrays.free(one);
        Ok(outcome)
    }

    // ---- Action dispatch -------------------------------------------------

    /// Calls an action whose invoking word was fetched from `feed`,
    /// consuming whatever arguments it declares directly from the feed
    /// (spec §4.6's ordinary fulfillment path).
    fn call_action_from_feed(&mut self, feed: &FeedHandle, action_id: ActionId, action: &Action, label: Option<SymbolId>) -> RunResult<Outcome> {
        let specifier = feed.borrow().specifier();
        let mut args: SmallVec<[Cell; 4]> = smallvec![Cell::blank(); action.paramlist.len()];
        let mut active_refinements: Vec<SymbolId> = Vec::new();
        for i in 0..action.paramlist.len() {
            let param = action.paramlist[i].clone();
            if param.is_refinement {
                continue; // refinements are only ever set by path dispatch
            }
            if let Some(owner) = param.refinement_arg_of
                && !active_refinements.contains(&owner)
            {
                continue;
            }
            if !param.class.consumes_feed() {
                continue;
            }
            match self.fulfill_one_arg(feed, &param)? {
                ArgFulfillment::Value(v) => args[i] = v,
                ArgFulfillment::Thrown(t) => return Ok(Outcome::Thrown(t)),
            }
        }
        self.invoke(action_id, action, args.into_vec(), label, specifier)
    }

    /// Calls an enfix action, with `left` already fetched as its first
    /// (left) argument (spec §4.7).
    fn call_enfix(&mut self, feed: &FeedHandle, action_id: ActionId, action: &Action, label: Option<SymbolId>, left: Cell) -> RunResult<Outcome> {
        let specifier = feed.borrow().specifier();
        let mut args: SmallVec<[Cell; 4]> = smallvec![Cell::blank(); action.paramlist.len()];
        let mut filled_left = false;
        let mut active_refinements: Vec<SymbolId> = Vec::new();
        for i in 0..action.paramlist.len() {
            let param = action.paramlist[i].clone();
            if param.is_refinement {
                continue;
            }
            if let Some(owner) = param.refinement_arg_of
                && !active_refinements.contains(&owner)
            {
                continue;
            }
            if !param.class.consumes_feed() {
                continue;
            }
            if !filled_left {
                args[i] = left;
                filled_left = true;
                continue;
            }
            match self.fulfill_one_arg(feed, &param)? {
                ArgFulfillment::Value(v) => args[i] = v,
                ArgFulfillment::Thrown(t) => return Ok(Outcome::Thrown(t)),
            }
        }
        self.invoke(action_id, action, args.into_vec(), label, specifier)
    }

    /// Fulfills one positional parameter from `feed` according to its
    /// [`ParamClass`] (spec §4.6). A throw surfacing mid-fulfillment (spec
    /// §4.9) is handed back as [`ArgFulfillment::Thrown`] rather than turned
    /// into an error here, so the call in progress can abort and let the
    /// throw keep bubbling toward an enclosing `catch`/`return` target.
    fn fulfill_one_arg(&mut self, feed: &FeedHandle, param: &Param) -> RunResult<ArgFulfillment> {
        match param.class {
            ParamClass::HardQuoted => {
                let Some(v) = feed.borrow().value else {
                    return Err(ExecError::NeedNonEnd { context: "hard-quoted parameter" });
                };
                feed.borrow_mut().fetch_next(&self.arrays);
                Ok(ArgFulfillment::Value(v))
            }
            ParamClass::SoftQuoted | ParamClass::Modal => {
                let Some(v) = feed.borrow().value else {
                    return Err(ExecError::NeedNonEnd { context: "soft-quoted parameter" });
                };
                if v.is_group() || matches!(v.data(), CellData::GetWord(_) | CellData::GetPath(_)) {
                    match self.eval_expr_as_arg(feed)? {
                        Outcome::Value(value) => Ok(ArgFulfillment::Value(value)),
                        Outcome::Invisible => Err(ExecError::NeedNonVoid { context: "soft-quoted parameter" }),
                        Outcome::Thrown(t) => Ok(ArgFulfillment::Thrown(t)),
                    }
                } else {
                    feed.borrow_mut().fetch_next(&self.arrays);
                    Ok(ArgFulfillment::Value(v))
                }
            }
            ParamClass::Normal => match self.eval_expr_as_arg(feed)? {
                Outcome::Value(value) => Ok(ArgFulfillment::Value(value)),
                Outcome::Invisible => Err(ExecError::NeedNonVoid { context: "parameter" }),
                Outcome::Thrown(t) => Ok(ArgFulfillment::Thrown(t)),
            },
            ParamClass::Local | ParamClass::Return => Ok(ArgFulfillment::Value(Cell::blank())),
        }
    }

    /// Builds the call's reified context, pushes a frame, runs the
    /// dispatcher, and pops the frame (spec §4.5's `ActionExecutor`, folded
    /// with §3.5's per-phase chain walk for adapt/enclose/specialize).
    fn invoke(&mut self, action_id: ActionId, action: &Action, args: Vec<Cell>, label: Option<SymbolId>, specifier: Specifier) -> RunResult<Outcome> {
        self.limits.check_frame_depth(self.frames.depth())?;
        let frame_id = self.frames.fresh_id();
        let keylist = self.contexts.keylists.push_root(action.paramlist.iter().map(|p| p.symbol).collect());
        let varlist = self.apply_exemplar(action, args);
        let context = self.contexts.push(ContextKind::Frame, keylist, varlist, Some(action.underlying));
        self.contexts.set_source_frame(context, frame_id);

        let mut frame = Frame::new(frame_id, crate::frame::Executor::ActionExecutor, None, specifier, Baseline { data_stack_depth: 0 });
        frame.varlist = Some(context);
        frame.original_action = Some(action_id);
        frame.phase = Some(action_id);
        frame.label = label;
        self.tracer.on_frame_push(frame_id, frame.executor, self.frames.depth());
        self.frames.push(frame);

        let result = self.run_dispatcher(action_id, context, frame_id);

        if let Some(idx) = self.frames.find(frame_id) {
            self.frames.truncate(idx);
        }
        self.tracer.on_frame_pop(frame_id, self.frames.depth());

        match result {
            Ok(Outcome::Thrown(t)) if matches!(t.label, ThrowLabel::Frame(f) if f == frame_id) => Ok(Outcome::Value(t.arg)),
            other => other,
        }
    }

    /// Overlays exemplar-specialized argument values onto freshly-fulfilled
    /// `args` (spec §4.6 "specialize": pre-filled argument cells that the
    /// ordinary fulfillment loop never touches because their param is
    /// classed [`ParamClass::Local`] once specialized... in this crate's
    /// simplified model, specialization instead stores its fixed cells in
    /// `Action::exemplar` and this overlay applies them after ordinary
    /// fulfillment, which a `Local`-classed specialized param never
    /// overwrites since it was left blank).
    fn apply_exemplar(&self, action: &Action, mut args: Vec<Cell>) -> Vec<Cell> {
        if let Some(exemplar) = action.exemplar {
            let ex = self.contexts.get(exemplar);
            for (i, cell) in ex.varlist.iter().enumerate() {
                if i < args.len() && matches!(args[i].data(), CellData::Blank) {
                    args[i] = *cell;
                }
            }
        }
        args
    }

    /// Runs `action_id`'s dispatcher chain starting from its outermost phase
    /// (spec §3.5: adapt/enclose/specialize wrap an `underlying` action).
    fn run_dispatcher(&mut self, action_id: ActionId, context: ContextId, frame_id: FrameId) -> RunResult<Outcome> {
        let action = self.actions.get(action_id).clone();
        match action.dispatcher {
            Dispatcher::Native(native) => crate::natives::dispatch(self, native, action_id, context, frame_id),
            Dispatcher::Interpreted { body } => self.run_interpreted_body(body, context, frame_id),
            Dispatcher::Adapter { prelude, adaptee } => self.run_adapter(prelude, adaptee, context, frame_id),
            Dispatcher::Encloser { inner, outer } => self.run_encloser(inner, outer, context, frame_id),
            Dispatcher::Specializer { base } => self.run_dispatcher_inner(base, context, frame_id),
        }
    }

    /// Specialize's dispatcher ultimately just redoes into `base`'s own
    /// dispatcher with the same reified `context` (spec §4.6: a specialized
    /// action's call looks, from `base`'s point of view, identical to an
    /// ordinary call whose arguments happened to already be filled in).
    fn run_dispatcher_inner(&mut self, base: ActionId, context: ContextId, frame_id: FrameId) -> RunResult<Outcome> {
        let base_action = self.actions.get(base).clone();
        match base_action.dispatcher {
            Dispatcher::Native(native) => crate::natives::dispatch(self, native, base, context, frame_id),
            Dispatcher::Interpreted { body } => self.run_interpreted_body(body, context, frame_id),
            Dispatcher::Adapter { prelude, adaptee } => self.run_adapter(prelude, adaptee, context, frame_id),
            Dispatcher::Encloser { inner, outer } => self.run_encloser(inner, outer, context, frame_id),
            Dispatcher::Specializer { base: deeper } => self.run_dispatcher_inner(deeper, context, frame_id),
        }
    }

    fn run_interpreted_body(&mut self, body: ArrayId, context: ContextId, frame_id: FrameId) -> RunResult<Outcome> {
        let specifier = Specifier::Frame(context);
        let feed = Feed::from_array(body, specifier, &self.arrays);
        feed.borrow_mut().fetch_next(&self.arrays);
        let mut last = Outcome::Value(Cell::null());
        loop {
            if feed.borrow().value.is_none() {
                break;
            }
            last = self.eval_expr(&feed)?;
            if let Outcome::Thrown(t) = &last
                && matches!(t.label, ThrowLabel::Frame(f) if f == frame_id)
            {
                break;
            }
            if matches!(last, Outcome::Thrown(_)) {
                break;
            }
        }
        Ok(last)
    }

    /// Adapter phase (spec §4.6): runs `prelude` bound to the call's own
    /// context first (so it can see and rewrite `value`/the other args by
    /// name), then redoes into `adaptee` using the same reified context.
    fn run_adapter(&mut self, prelude: ArrayId, adaptee: ActionId, context: ContextId, frame_id: FrameId) -> RunResult<Outcome> {
        let specifier = Specifier::Frame(context);
        let feed = Feed::from_array(prelude, specifier, &self.arrays);
        feed.borrow_mut().fetch_next(&self.arrays);
        loop {
            if feed.borrow().value.is_none() {
                break;
            }
            match self.eval_expr(&feed)? {
                Outcome::Thrown(t) => return Ok(Outcome::Thrown(t)),
                _ => {}
            }
        }
        self.run_dispatcher_inner(adaptee, context, frame_id)
    }

    /// Encloser phase (spec §4.6): hands `inner`'s still-unevaluated, fully
    /// fulfilled frame (as a first-class `frame!` value) to `outer`, which
    /// may inspect or rewrite its args via path access before calling
    /// `do` on it.
    fn run_encloser(&mut self, inner: ActionId, outer: ActionId, context: ContextId, frame_id: FrameId) -> RunResult<Outcome> {
        let frame_cell = Cell::inert(CellData::Frame(context));
        let _ = inner;
        let outer_action = self.actions.get(outer).clone();
        self.invoke(outer, &outer_action, vec![frame_cell], None, Specifier::Unspecified)
            .map(|outcome| {
                let _ = frame_id;
                outcome
            })
    }

    /// Invokes `action_id` directly against a caller-supplied argument
    /// vector, bypassing feed-driven fulfillment entirely (spec §4.6, used
    /// by `enclose`'s `do frame` and by `apply`-style callers). Positional
    /// order must already match `action_id`'s paramlist.
    ///
    /// # Errors
    /// Propagates any [`ExecError`] the call raises.
    pub fn call_action_with_args(&mut self, action_id: ActionId, args: Vec<Cell>, label: Option<SymbolId>) -> RunResult<Outcome> {
        let action = self.actions.get(action_id).clone();
        self.invoke(action_id, &action, args, label, Specifier::Unspecified)
    }

    /// Runs a reified `frame!` context's action again from scratch against
    /// its already-filled varlist (spec §4.6's `do frame`, used by
    /// `enclose`'s body).
    ///
    /// # Errors
    /// Propagates any [`ExecError`] the call raises.
    pub fn do_frame(&mut self, context: ContextId) -> RunResult<Outcome> {
        let ctx = self.contexts.get(context);
        let action_id = ctx.underlying_action.ok_or(ExecError::InvalidExit)?;
        let args = ctx.varlist.clone();
        self.call_action_with_args(action_id, args, None)
    }

    // ---- Path dispatch ----------------------------------------------------

    /// Evaluates a path/set-path/get-path cell at the feed's current
    /// position (spec §4.6's minimal 3-shape path dispatcher, `SPEC_FULL.md`
    /// §9): either an action-word plus trailing refinement words, a
    /// context-valued word plus a trailing field word, or a block-valued
    /// word plus a trailing 1-based integer/group index.
    fn eval_path_cell(&mut self, feed: &FeedHandle) -> RunResult<Outcome> {
        let cell = feed.borrow().value.expect("eval_path_cell requires a value");
        let specifier = feed.borrow().specifier();
        let is_set = matches!(cell.data(), CellData::SetPath(_));
        let array = cell.data().array_payload().expect("path cell must carry an array payload");
        let segments = self.arrays.get(array).cells.clone();
        let Some(head) = segments.first().copied() else {
            return Err(ExecError::User("empty path".into()));
        };

        let head_symbol = head.data().word_symbol();
        let head_value = match head_symbol {
            Some(symbol) => self.get_word_value(symbol, head.binding(), specifier).ok(),
            None => None,
        };

        if is_set {
            feed.borrow_mut().fetch_next(&self.arrays);
            let rhs = match self.eval_expr(feed)? {
                Outcome::Value(v) => v,
                Outcome::Invisible => return Err(ExecError::NeedNonVoid { context: "set-path" }),
                thrown => return Ok(thrown),
            };
            self.eval_path_set(head_symbol, head.binding(), head_value, &segments[1..], specifier, rhs)?;
            return Ok(Outcome::Value(rhs));
        }

        if let Some(CellData::Action(action_id)) = head_value.as_ref().map(Cell::data) {
            let action_id = *action_id;
            feed.borrow_mut().fetch_next(&self.arrays);
            let action = self.actions.get(action_id).clone();
            return self.call_path_action(feed, action_id, &action, head_symbol, &segments[1..], specifier);
        }

        feed.borrow_mut().fetch_next(&self.arrays);
        let got = self.eval_path_get(head_symbol, head.binding(), head_value, &segments[1..], specifier)?;
        Ok(Outcome::Value(got))
    }

    /// Calls an action named by a path's head word, activating whichever
    /// refinements the trailing segments name (spec §4.6 "pickups", reduced
    /// to this crate's minimal shape: every trailing segment is a bare
    /// refinement word).
    fn call_path_action(&mut self, feed: &FeedHandle, action_id: ActionId, action: &Action, label: Option<SymbolId>, refinements: &[Cell], specifier: Specifier) -> RunResult<Outcome> {
        let active: Vec<SymbolId> = refinements.iter().filter_map(|c| c.data().word_symbol()).collect();
        let mut args: SmallVec<[Cell; 4]> = smallvec![Cell::blank(); action.paramlist.len()];
        for i in 0..action.paramlist.len() {
            let param = action.paramlist[i].clone();
            if param.is_refinement {
                args[i] = Cell::logic(active.contains(&param.symbol));
                continue;
            }
            if let Some(owner) = param.refinement_arg_of {
                if !active.contains(&owner) {
                    continue;
                }
                match self.fulfill_one_arg(feed, &param)? {
                    ArgFulfillment::Value(v) => args[i] = v,
                    ArgFulfillment::Thrown(t) => return Ok(Outcome::Thrown(t)),
                }
                continue;
            }
            if !param.class.consumes_feed() {
                continue;
            }
            match self.fulfill_one_arg(feed, &param)? {
                ArgFulfillment::Value(v) => args[i] = v,
                ArgFulfillment::Thrown(t) => return Ok(Outcome::Thrown(t)),
            }
        }
        self.invoke(action_id, action, args.into_vec(), label, specifier)
    }

    /// Resolves a get-path's remaining segments against a starting value
    /// (spec §4.6 shapes 2 and 3: context-field get, block-index get).
    fn eval_path_get(&mut self, head_symbol: Option<SymbolId>, head_binding: Binding, mut current: Option<Cell>, rest: &[Cell], specifier: Specifier) -> RunResult<Cell> {
        let _ = (head_symbol, head_binding);
        for seg in rest {
            let Some(base) = current else { return Err(ExecError::NeedNonVoid { context: "path segment" }) };
            current = Some(self.path_step_get(base, *seg, specifier)?);
        }
        current.ok_or(ExecError::NeedNonVoid { context: "path" })
    }

    fn path_step_get(&mut self, base: Cell, seg: Cell, specifier: Specifier) -> RunResult<Cell> {
        match base.data() {
            CellData::Object(context) | CellData::Module(context) | CellData::Error(context) | CellData::Port(context) | CellData::Frame(context) => {
                let context = *context;
                let Some(symbol) = seg.data().word_symbol() else {
                    return Err(ExecError::User("context path segment must be a word".into()));
                };
                let index = self.contexts.find_key(context, symbol).ok_or(ExecError::Unbound { symbol })?;
                Ok(self.contexts.get(context).varlist[index as usize])
            }
            CellData::Block(array) => {
                let array = *array;
                let index = self.path_index_value(seg, specifier)?;
                let cells = &self.arrays.get(array).cells;
                let idx = usize::try_from(index - 1).map_err(|_| ExecError::User("path index out of range".into()))?;
                cells.get(idx).copied().ok_or(ExecError::User("path index out of range".into()))
            }
            _ => Err(ExecError::User("value does not support path access".into())),
        }
    }

    /// Resolves a set-path's remaining segments and writes `value` at the
    /// final one.
    fn eval_path_set(&mut self, head_symbol: Option<SymbolId>, head_binding: Binding, head_value: Option<Cell>, rest: &[Cell], specifier: Specifier, value: Cell) -> RunResult<()> {
        let Some((last, init)) = rest.split_last() else {
            return Err(ExecError::User("set-path needs at least one segment".into()));
        };
        let mut current = head_value.ok_or(ExecError::NeedNonVoid { context: "set-path head" })?;
        for seg in init {
            current = self.path_step_get(current, *seg, specifier)?;
        }
        match current.data() {
            CellData::Object(context) | CellData::Module(context) | CellData::Error(context) | CellData::Port(context) | CellData::Frame(context) => {
                let context = *context;
                let Some(symbol) = last.data().word_symbol() else {
                    return Err(ExecError::User("context path segment must be a word".into()));
                };
                let index = self.contexts.find_key(context, symbol).ok_or(ExecError::Unbound { symbol })?;
                self.contexts.get_mut(context).varlist[index as usize] = value;
                if rest.len() == 1 {
                    if let Some(symbol) = head_symbol {
                        let _ = head_binding; // head is read again on the next lookup; nothing to rebind here
                        let _ = symbol;
                    }
                }
                Ok(())
            }
            CellData::Block(array) => {
                let array = *array;
                let index = self.path_index_value(*last, specifier)?;
                let idx = usize::try_from(index - 1).map_err(|_| ExecError::User("path index out of range".into()))?;
                let cells = &mut self.arrays.get_mut(array).cells;
                if idx >= cells.len() {
                    return Err(ExecError::User("path index out of range".into()));
                }
                cells[idx] = value;
                Ok(())
            }
            _ => Err(ExecError::User("value does not support path assignment".into())),
        }
    }

    /// Evaluates a path segment used as an index (an integer literal or a
    /// parenthesized group, spec §8 scenario 5's `foo/(print "x" 1)`).
    fn path_index_value(&mut self, seg: Cell, specifier: Specifier) -> RunResult<i64> {
        let resolved = match seg.data() {
            CellData::Group(array) => match self.evaluate_group(*array, specifier)? {
                Outcome::Value(v) => v,
                Outcome::Invisible => return Err(ExecError::NeedNonVoid { context: "path index group" }),
                Outcome::Thrown(t) => return Err(self.unhandled_throw(t)),
            },
            _ => seg,
        };
        match resolved.data() {
            CellData::Integer(i) => Ok(*i),
            _ => Err(ExecError::User("path index must evaluate to an integer".into())),
        }
    }

    // ---- func/adapt/enclose/specialize construction ------------------------

    /// Builds an interpreted action from a `func`-style spec/body pair (spec
    /// §4.11's `func`): binds `body`'s words relative to the fresh action so
    /// a later call's frame supplies the concrete varlist (spec §4.3b).
    pub fn make_func(&mut self, spec: ArrayId, body: ArrayId) -> RunResult<ActionId> {
        let params = self.parse_func_spec(spec)?;
        let mut paramlist = params;
        paramlist.push(Param { symbol: self.return_symbol, class: ParamClass::Return, types: crate::cell::Typeset::any_value(), is_refinement: false, refinement_arg_of: None });
        let action_id = self.actions.push_primitive(paramlist.clone(), Dispatcher::Interpreted { body }, None, None, Specifier::Unspecified);

        let mut binder = Binder::new();
        binder.fill_from_params(&paramlist);
        bind_array(&mut self.arrays, &binder, BindTarget::Action(action_id), body);
        binder.clear();
        Ok(action_id)
    }

    /// Parses a `func`-style spec block (a flat list of plain words for
    /// ordinary parameters and `/word` refinement markers, spec §4.11's
    /// narrowed surface syntax — type annotations, docstrings, and
    /// quoting-sigil prefixes from the fuller Rebol-family spec syntax are
    /// out of scope per `SPEC_FULL.md`'s `func` entry).
    fn parse_func_spec(&mut self, spec: ArrayId) -> RunResult<Vec<Param>> {
        let cells = self.arrays.get(spec).cells.clone();
        let mut params = Vec::new();
        let mut current_refinement: Option<SymbolId> = None;
        for cell in cells {
            match cell.data() {
                CellData::Word(symbol) => {
                    let symbol = *symbol;
                    if let Some(owner) = current_refinement {
                        params.push(Param::refinement_arg(symbol, owner));
                    } else {
                        params.push(Param::positional(symbol, ParamClass::Normal));
                    }
                }
                CellData::GetWord(symbol) => params.push(Param::positional(*symbol, ParamClass::SoftQuoted)),
                CellData::SymWord(symbol) => params.push(Param::positional(*symbol, ParamClass::HardQuoted)),
                CellData::Path(array) => {
                    let segs = self.arrays.get(*array).cells.clone();
                    if let [first] = segs.as_slice()
                        && let Some(symbol) = first.data().word_symbol()
                    {
                        params.push(Param::refinement(symbol));
                        current_refinement = Some(symbol);
                    }
                }
                _ => {}
            }
        }
        Ok(params)
    }

    /// Builds an adapted action (spec §4.11's `adapt`).
    pub fn make_adapt(&mut self, adaptee: ActionId, prelude: ArrayId) -> RunResult<ActionId> {
        let base = self.actions.get(adaptee).clone();
        let mut binder = Binder::new();
        binder.fill_from_params(&base.paramlist);
        bind_array(&mut self.arrays, &binder, BindTarget::Action(adaptee), prelude);
        binder.clear();
        Ok(self.actions.push_composed(base.paramlist.clone(), Dispatcher::Adapter { prelude, adaptee }, adaptee, None))
    }

    /// Builds an enclosing action (spec §4.11's `enclose`): `outer` receives
    /// `inner`'s fully-fulfilled-but-not-yet-run frame as a single `frame!`
    /// argument.
    pub fn make_enclose(&mut self, inner: ActionId, outer: ActionId) -> RunResult<ActionId> {
        let inner_action = self.actions.get(inner).clone();
        Ok(self.actions.push_composed(inner_action.paramlist.clone(), Dispatcher::Encloser { inner, outer }, inner, None))
    }

    /// Builds a specialized action (spec §4.11's `specialize`): `fixed`
    /// names (by word) which positional parameters are pre-filled, removing
    /// them from the paramlist callers see and storing their values in a
    /// fresh exemplar context the dispatcher overlays at call time.
    pub fn make_specialize(&mut self, base: ActionId, fixed: Vec<(SymbolId, Cell)>) -> RunResult<ActionId> {
        let base_action = self.actions.get(base).clone();
        let keylist = self.contexts.keylists.push_root(base_action.paramlist.iter().map(|p| p.symbol).collect());
        let mut varlist = vec![Cell::blank(); base_action.paramlist.len()];
        let mut fixed_indices = Vec::new();
        for (symbol, value) in fixed {
            if let Some(index) = base_action.paramlist.iter().position(|p| p.symbol == symbol) {
                varlist[index] = value;
                fixed_indices.push(index);
            }
        }
        let exemplar = self.contexts.push(ContextKind::Object, keylist, varlist, None);
        // A fixed param is reclassed `Local` so ordinary fulfillment skips it
        // entirely (`ParamClass::consumes_feed`); [`Self::apply_exemplar`]
        // then overlays its pre-filled value after fulfillment runs, which
        // is this crate's substitute for actually shrinking the paramlist a
        // caller sees (spec §4.6 "specialize hides its fixed params").
        let mut paramlist = base_action.paramlist.clone();
        for index in fixed_indices {
            paramlist[index].class = ParamClass::Local;
        }
        Ok(self.actions.push_composed(paramlist, Dispatcher::Specializer { base }, base, Some(exemplar)))
    }

    /// Declares an enfix-callable alias for `base` (spec §4.11's `enfix`
    /// native).
    pub fn make_enfix(&mut self, base: ActionId, left_class: LeftArgClass, defers: bool, postpones: bool) -> ActionId {
        self.actions.push_enfixed(base, EnfixInfo { left_class, defers, postpones })
    }

    /// The specifier in effect where `frame_id` was called from (spec §4.11,
    /// used by every control-flow native that was handed a block argument
    /// and needs to evaluate it as the caller would have, not under the
    /// native's own freshly-reified, specifier-less call context).
    #[must_use]
    pub(crate) fn frame_specifier(&self, frame_id: FrameId) -> Specifier {
        self.frames.specifier_of(frame_id).unwrap_or(Specifier::Unspecified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::{error::ExecError, io::CollectPrint, resource::NoLimits};

    type TestInterp = Interpreter<NoLimits, NoopTracer, CollectPrint>;

    fn int(cell: &Cell) -> i64 {
        match cell.data() {
            CellData::Integer(n) => *n,
            other => panic!("expected integer, got {other:?}"),
        }
    }

    #[test]
    fn prefix_arithmetic() {
        let mut interp = TestInterp::default();
        let result = interp.run("add 1 2").unwrap();
        assert_eq!(int(&result), 3);
    }

    #[test]
    fn enfix_precedence_chains_left_to_right_around_args() {
        // `+`/`*` are both left-soft-quoted enfix aliases over add/multiply
        // (see `natives.rs::register_natives`); `value2`'s Normal class
        // fulfillment recurses through `eval_expr`'s own lookahead, so the
        // trailing `* 3` binds to `2` before `+` ever runs.
        let mut interp = TestInterp::default();
        let result = interp.run("1 + 2 * 3").unwrap();
        assert_eq!(int(&result), 7);
    }

    #[test]
    fn if_true_runs_branch_if_false_yields_null() {
        let mut interp = TestInterp::default();
        let yes = interp.run("if true [add 1 1]").unwrap();
        assert_eq!(int(&yes), 2);
        let no = interp.run("if false [add 1 1]").unwrap();
        assert!(matches!(no.data(), CellData::Null));
    }

    #[test]
    fn either_picks_the_matching_branch() {
        let mut interp = TestInterp::default();
        let result = interp.run("either greater? 2 1 [add 10 1] [add 20 1]").unwrap();
        assert_eq!(int(&result), 11);
    }

    #[test]
    fn func_with_definitional_return_unwinds_to_its_own_call() {
        let mut interp = TestInterp::default();
        let result = interp.run("square: func [x] [return multiply x x] square 5").unwrap();
        assert_eq!(int(&result), 25);
    }

    #[test]
    fn return_outside_any_func_is_an_invalid_exit() {
        let mut interp = TestInterp::default();
        let err = interp.run("return 1").unwrap_err();
        assert!(matches!(err, ExecError::InvalidExit));
    }

    #[test]
    fn catch_intercepts_a_matching_throw() {
        let mut interp = TestInterp::default();
        let result = interp.run("catch [throw 10]").unwrap();
        assert_eq!(int(&result), 10);
    }

    #[test]
    fn catch_intercepts_a_throw_nested_in_an_argument() {
        // `throw 2` surfaces while fulfilling `add`'s own `value2` argument,
        // not as the catch body's top-level expression; `fulfill_one_arg`
        // hands the throw back as an `ArgFulfillment::Thrown` instead of an
        // error, so it keeps bubbling out through `add`'s call and into the
        // enclosing `catch`.
        let mut interp = TestInterp::default();
        let result = interp.run("catch [add 1 throw 2]").unwrap();
        assert_eq!(int(&result), 2);
    }

    #[test]
    fn definitional_return_unwinds_from_inside_an_argument() {
        let mut interp = TestInterp::default();
        let result = interp.run("f: func [] [add 1 (return 2)] f").unwrap();
        assert_eq!(int(&result), 2);
    }

    #[test]
    fn else_runs_its_branch_only_when_the_left_side_is_null() {
        let mut interp = TestInterp::default();
        let yes = interp.run("if true [10] else [20]").unwrap();
        assert_eq!(int(&yes), 10);
        let no = interp.run("if false [10] else [20]").unwrap();
        assert_eq!(int(&no), 20);
    }

    #[test]
    fn else_defers_past_if_s_own_branch_argument_fulfillment() {
        // If `else` bound eagerly during `[10]`'s own argument-fulfillment
        // lookahead (before `if`'s dispatcher ever ran), this would instead
        // evaluate `10 else [20]` as its own enfix expression and vanish the
        // outer `if` entirely. Deferral keeps `else` paired with `if`.
        let mut interp = TestInterp::default();
        let result = interp.run("f: func [] [return if true [10] else [20]] f").unwrap();
        assert_eq!(int(&result), 10);
    }

    #[test]
    fn named_catch_ignores_a_differently_named_throw() {
        let mut interp = TestInterp::default();
        let err = interp.run("catch/name [throw/name 1 'other] 'mine").unwrap_err();
        assert!(matches!(err, ExecError::User(_)));
    }

    #[test]
    fn trap_turns_a_fail_into_an_error_value_instead_of_propagating() {
        let mut interp = TestInterp::default();
        let result = interp.run("trap [fail \"boom\"]").unwrap();
        assert!(matches!(result.data(), CellData::Error(_)));
    }

    #[test]
    fn uncaught_fail_propagates_as_an_error() {
        let mut interp = TestInterp::default();
        let err = interp.run("fail \"boom\"").unwrap_err();
        assert!(matches!(err, ExecError::User(_)));
    }

    #[test]
    fn comment_and_bar_vanish_without_affecting_the_surrounding_result() {
        let mut interp = TestInterp::default();
        let result = interp.run("add 1 comment \"ignored\" 2").unwrap();
        assert_eq!(int(&result), 3);
        let barred = interp.run("(add 1 2) | (add 10 20)").unwrap();
        assert_eq!(int(&barred), 30);
    }

    #[test]
    fn let_declares_a_global_the_next_expression_can_see() {
        let mut interp = TestInterp::default();
        let result = interp.run("let x: 10 add x 1").unwrap();
        assert_eq!(int(&result), 11);
    }

    #[test]
    fn print_writes_through_the_configured_sink() {
        let mut interp = TestInterp::default();
        interp.run("print 42").unwrap();
        assert_eq!(interp.print.lines(), ["42"]);
    }

    #[test]
    fn adapt_runs_its_prelude_before_redoing_into_the_adaptee() {
        let mut interp = TestInterp::default();
        let result = interp.run("loud-add: adapt :add [print \"adding\"] loud-add 2 3").unwrap();
        assert_eq!(int(&result), 5);
        assert_eq!(interp.print.lines(), ["adding"]);
    }
}
