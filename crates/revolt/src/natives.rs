//! The built-in native action library (`SPEC_FULL.md` §4.11).
//!
//! Grounded on the teacher's `builtins.rs`/`modules.rs` pattern: a flat enum
//! of native ids (`NativeId`, `action.rs`) plus one big dispatch `match`
//! here, rather than a closure or trait object per native — the teacher
//! picks the enum-and-match shape for exactly the same reason this crate
//! does, since every native needs the same mutable access to the whole
//! interpreter and a `Box<dyn Fn>` table would need to thread that access
//! through a trait object for no benefit.
//!
//! `register_natives` builds every [`NativeId`] into a callable [`Action`]
//! bound under its canonical spelling in [`Interpreter::user_context`];
//! `dispatch` runs one once its frame has been pushed and its arguments
//! fulfilled. `NativeId::ThenVanish` is deliberately never registered here:
//! the `|` vanishing separator is handled structurally by `evaluate.rs`'s
//! `eval_expr` (matching on `bar_symbol` directly, before any action lookup
//! happens at all), so there is no action left for this id to back. See
//! `DESIGN.md`.

use crate::{
    action::{Action, Actions, Dispatcher, EnfixInfo, LeftArgClass, NativeId, Param, ParamClass},
    array::ArrayFlags,
    binding::{bind_array, BindTarget, Binder, Specifier},
    cell::{Cell, CellData},
    context::ContextKind,
    error::{ExecError, RunResult},
    evaluate::{Interpreter, Outcome},
    feed::Feed,
    ids::{ActionId, ContextId, FrameId},
    resource::LimitsPolicy,
    symbol::{SymbolId, SymbolTable, WellKnown},
    throw::{label_matches, CatchTarget, ThrowLabel, Thrown},
    tracer::Tracer,
};

// ---- paramlist-building helpers ------------------------------------------

fn param(symbols: &mut SymbolTable, name: &str, class: ParamClass) -> Param {
    Param::positional(symbols.intern(name), class)
}

fn refinement(symbols: &mut SymbolTable, name: &str) -> Param {
    Param::refinement(symbols.intern(name))
}

fn refinement_arg(symbols: &mut SymbolTable, name: &str, owner: SymbolId) -> Param {
    Param::refinement_arg(symbols.intern(name), owner)
}

fn reg<L: LimitsPolicy, Tr: Tracer, P: crate::io::PrintSink>(interp: &mut Interpreter<L, Tr, P>, spelling: &str, paramlist: Vec<Param>, native: NativeId) -> ActionId {
    let action_id = interp.actions.push_primitive(paramlist, Dispatcher::Native(native), None, None, Specifier::Unspecified);
    let symbol = interp.symbols.intern(spelling);
    interp.declare_global(symbol, Cell::inert(CellData::Action(action_id)));
    action_id
}

/// Registers every native action and binds it under its canonical spelling
/// (`SPEC_FULL.md` §4.11).
pub fn register_natives<L: LimitsPolicy, Tr: Tracer, P: crate::io::PrintSink>(interp: &mut Interpreter<L, Tr, P>) {
    use NativeId::{
        Adapt, Add, Append, Bind, Catch, Comment, Copy, Divide, Do, Either, Elide, Enclose, Enfix, EqualQ, Fail, ForEach, Func, GreaterQ, If, In, LesserQ, Let, Multiply, Negate, Print, Reduce,
        Return, Specialize, Subtract, Throw, Trap, UnsetQ, Unwind, ValueQ, While,
    };

    // Arithmetic and comparison.
    let value1 = param(&mut interp.symbols, "value1", ParamClass::Normal);
    let value2 = param(&mut interp.symbols, "value2", ParamClass::Normal);
    let add_id = reg(interp, "add", vec![value1.clone(), value2.clone()], Add);
    reg(interp, "subtract", vec![value1.clone(), value2.clone()], Subtract);
    let multiply_id = reg(interp, "multiply", vec![value1.clone(), value2.clone()], Multiply);
    let divide_id = reg(interp, "divide", vec![value1.clone(), value2.clone()], Divide);
    reg(interp, "equal?", vec![value1.clone(), value2.clone()], EqualQ);
    reg(interp, "lesser?", vec![value1.clone(), value2.clone()], LesserQ);
    reg(interp, "greater?", vec![value1, value2], GreaterQ);

    let value = param(&mut interp.symbols, "value", ParamClass::Normal);
    reg(interp, "negate", vec![value], Negate);

    let plus = interp.make_enfix(add_id, LeftArgClass::Soft, false, false);
    let star = interp.make_enfix(multiply_id, LeftArgClass::Soft, false, false);
    let slash = interp.make_enfix(divide_id, LeftArgClass::Soft, false, false);
    let plus_symbol = interp.symbols.intern("+");
    interp.declare_global(plus_symbol, Cell::inert(CellData::Action(plus)));
    let star_symbol = interp.symbols.intern("*");
    interp.declare_global(star_symbol, Cell::inert(CellData::Action(star)));
    let slash_symbol = interp.symbols.intern("/");
    interp.declare_global(slash_symbol, Cell::inert(CellData::Action(slash)));

    // Control flow.
    let condition = param(&mut interp.symbols, "condition", ParamClass::Normal);
    let branch = param(&mut interp.symbols, "branch", ParamClass::Normal);
    reg(interp, "if", vec![condition, branch], If);

    let condition = param(&mut interp.symbols, "condition", ParamClass::Normal);
    let true_branch = param(&mut interp.symbols, "true-branch", ParamClass::Normal);
    let false_branch = param(&mut interp.symbols, "false-branch", ParamClass::Normal);
    reg(interp, "either", vec![condition, true_branch, false_branch], Either);

    let value = param(&mut interp.symbols, "value", ParamClass::Normal);
    let branch = param(&mut interp.symbols, "branch", ParamClass::Normal);
    let else_base = reg(interp, "else*", vec![value, branch], NativeId::Else);
    let else_enfix = interp.make_enfix(else_base, LeftArgClass::Soft, true, false);
    let else_symbol = interp.symbols.intern("else");
    interp.declare_global(else_symbol, Cell::inert(CellData::Action(else_enfix)));

    let condition = param(&mut interp.symbols, "condition", ParamClass::Normal);
    let body = param(&mut interp.symbols, "body", ParamClass::Normal);
    reg(interp, "while", vec![condition, body], While);

    let loop_var = param(&mut interp.symbols, "var", ParamClass::HardQuoted);
    let series = param(&mut interp.symbols, "series", ParamClass::Normal);
    let body = param(&mut interp.symbols, "body", ParamClass::Normal);
    reg(interp, "for-each", vec![loop_var, series, body], ForEach);

    let value = param(&mut interp.symbols, "value", ParamClass::Normal);
    reg(interp, "do", vec![value], Do);

    let value = param(&mut interp.symbols, "value", ParamClass::Normal);
    reg(interp, "reduce", vec![value], Reduce);

    // Non-local exits.
    let value = param(&mut interp.symbols, "value", ParamClass::Normal);
    reg(interp, "return", vec![value], Return);

    let target = param(&mut interp.symbols, "target", ParamClass::Normal);
    let value = param(&mut interp.symbols, "value", ParamClass::Normal);
    reg(interp, "unwind", vec![target, value], Unwind);

    let value = param(&mut interp.symbols, "value", ParamClass::Normal);
    let name_ref = refinement(&mut interp.symbols, "name");
    let name_sym = name_ref.symbol;
    let name_arg = refinement_arg(&mut interp.symbols, "name-value", name_sym);
    reg(interp, "throw", vec![value, name_ref, name_arg], Throw);

    let body = param(&mut interp.symbols, "body", ParamClass::Normal);
    let name_ref = refinement(&mut interp.symbols, "name");
    let name_sym = name_ref.symbol;
    let name_arg = refinement_arg(&mut interp.symbols, "name-value", name_sym);
    reg(interp, "catch", vec![body, name_ref, name_arg], Catch);

    let body = param(&mut interp.symbols, "body", ParamClass::Normal);
    let with_ref = refinement(&mut interp.symbols, "with");
    let with_sym = with_ref.symbol;
    let with_arg = refinement_arg(&mut interp.symbols, "handler", with_sym);
    reg(interp, "trap", vec![body, with_ref, with_arg], Trap);

    let message = param(&mut interp.symbols, "message", ParamClass::Normal);
    reg(interp, "fail", vec![message], Fail);

    // Action composition.
    let spec = param(&mut interp.symbols, "spec", ParamClass::Normal);
    let body = param(&mut interp.symbols, "body", ParamClass::Normal);
    reg(interp, "func", vec![spec, body], Func);

    let adaptee = param(&mut interp.symbols, "adaptee", ParamClass::Normal);
    let prelude = param(&mut interp.symbols, "prelude", ParamClass::Normal);
    reg(interp, "adapt", vec![adaptee, prelude], Adapt);

    let inner = param(&mut interp.symbols, "inner", ParamClass::Normal);
    let outer = param(&mut interp.symbols, "outer", ParamClass::Normal);
    reg(interp, "enclose", vec![inner, outer], Enclose);

    let base = param(&mut interp.symbols, "base", ParamClass::Normal);
    let fixed = param(&mut interp.symbols, "fixed", ParamClass::Normal);
    reg(interp, "specialize", vec![base, fixed], Specialize);

    // Binding and introspection.
    let words = param(&mut interp.symbols, "words", ParamClass::Normal);
    let context = param(&mut interp.symbols, "context", ParamClass::Normal);
    reg(interp, "bind", vec![words, context], Bind);

    let context = param(&mut interp.symbols, "context", ParamClass::Normal);
    let word = param(&mut interp.symbols, "word", ParamClass::Normal);
    reg(interp, "in", vec![context, word], In);

    let word = param(&mut interp.symbols, "word", ParamClass::Normal);
    reg(interp, "value?", vec![word], ValueQ);

    let value = param(&mut interp.symbols, "value", ParamClass::Normal);
    reg(interp, "unset?", vec![value], UnsetQ);

    let value = param(&mut interp.symbols, "value", ParamClass::Normal);
    reg(interp, "integer?", vec![value], NativeId::IntegerQ);

    let action = param(&mut interp.symbols, "action", ParamClass::Normal);
    reg(interp, "enfix", vec![action], Enfix);

    // Invisible.
    let value = param(&mut interp.symbols, "value", ParamClass::HardQuoted);
    reg(interp, "comment", vec![value], Comment);

    let value = param(&mut interp.symbols, "value", ParamClass::HardQuoted);
    reg(interp, "elide", vec![value], Elide);

    let target = param(&mut interp.symbols, "target", ParamClass::HardQuoted);
    let value = param(&mut interp.symbols, "value", ParamClass::Normal);
    reg(interp, "let", vec![target, value], Let);

    // Supplementary series/io natives (see `DESIGN.md`).
    let series = param(&mut interp.symbols, "series", ParamClass::Normal);
    let value = param(&mut interp.symbols, "value", ParamClass::Normal);
    reg(interp, "append", vec![series, value], Append);

    let series = param(&mut interp.symbols, "series", ParamClass::Normal);
    reg(interp, "copy", vec![series], Copy);

    let value = param(&mut interp.symbols, "value", ParamClass::Normal);
    reg(interp, "print", vec![value], Print);

    let _ = WellKnown::Value; // spellings above intentionally re-intern rather than reuse the well-known ids; see DESIGN.md.
}

// ---- small shared helpers -------------------------------------------------

enum Num {
    Int(i64),
    Dec(f64),
}

fn as_num(cell: Cell) -> RunResult<Num> {
    match cell.data() {
        CellData::Integer(i) => Ok(Num::Int(*i)),
        CellData::Decimal(d) => Ok(Num::Dec(*d)),
        _ => Err(ExecError::User("expected a number".into())),
    }
}

fn values_equal<L: LimitsPolicy, Tr: Tracer, P: crate::io::PrintSink>(interp: &Interpreter<L, Tr, P>, a: Cell, b: Cell) -> bool {
    match (a.data(), b.data()) {
        (CellData::Integer(x), CellData::Integer(y)) => x == y,
        (CellData::Integer(x), CellData::Decimal(y)) | (CellData::Decimal(y), CellData::Integer(x)) => (*x as f64) == *y,
        (CellData::Decimal(x), CellData::Decimal(y)) => x == y,
        (CellData::Logic(x), CellData::Logic(y)) => x == y,
        (CellData::Blank, CellData::Blank) | (CellData::Null, CellData::Null) => true,
        (CellData::Text(x), CellData::Text(y)) => interp.texts.get(*x) == interp.texts.get(*y),
        (CellData::Word(x), CellData::Word(y)) => interp.symbols.canon_of(*x) == interp.symbols.canon_of(*y),
        _ => false,
    }
}

fn resolve_action_cell<L: LimitsPolicy, Tr: Tracer, P: crate::io::PrintSink>(interp: &mut Interpreter<L, Tr, P>, cell: Cell, specifier: Specifier) -> RunResult<ActionId> {
    match cell.data() {
        CellData::Action(id) => Ok(*id),
        CellData::Word(_) | CellData::SetWord(_) | CellData::GetWord(_) | CellData::SymWord(_) => {
            let symbol = cell.data().word_symbol().expect("matched word-family variant");
            interp.resolve_action_word(symbol, cell.binding(), specifier).map(|(action_id, _)| action_id).ok_or(ExecError::Unbound { symbol })
        }
        _ => Err(ExecError::User("expected an action reference".into())),
    }
}

/// Finds the nearest enclosing `func` activation still on the stack (spec
/// §9.9): `return`'s own call may be nested several native frames (`if`,
/// `either`, ...) below the function it targets, so this walks the frame
/// stack by dispatcher shape rather than trusting the immediate parent.
fn find_enclosing_func<L: LimitsPolicy, Tr: Tracer, P: crate::io::PrintSink>(interp: &Interpreter<L, Tr, P>) -> Option<FrameId> {
    interp
        .frames
        .iter_rev()
        .skip(1)
        .find(|f| f.original_action.is_some_and(|a| matches!(interp.actions.get(a).dispatcher, Dispatcher::Interpreted { .. })))
        .map(|f| f.id)
}

/// Renders a cell to a human-readable string (used by `print`/`fail` and,
/// via `revolt-cli`, to display a top-level result).
#[must_use]
pub fn render<L: LimitsPolicy, Tr: Tracer, P: crate::io::PrintSink>(interp: &Interpreter<L, Tr, P>, cell: Cell) -> String {
    match cell.data() {
        CellData::Text(id) => interp.texts.get(*id).to_string(),
        CellData::Integer(i) => i.to_string(),
        CellData::Decimal(d) => d.to_string(),
        CellData::Logic(b) => (if *b { "true" } else { "false" }).to_string(),
        CellData::Blank => "_".to_string(),
        CellData::Null => String::new(),
        CellData::Word(s) | CellData::SetWord(s) | CellData::GetWord(s) | CellData::SymWord(s) => interp.symbols.spelling(*s).to_string(),
        other => format!("{other:?}"),
    }
}

/// Runs `dispatcher` (spec §4.11's "one big match" shape) once `native`'s
/// frame has been pushed and its arguments fulfilled into `context`'s
/// varlist.
///
/// # Errors
/// Propagates any [`ExecError`] the native raises.
#[expect(clippy::too_many_lines, reason = "one dispatch arm per native keeps the whole library in one place, matching the teacher's own builtins match")]
pub fn dispatch<L: LimitsPolicy, Tr: Tracer, P: crate::io::PrintSink>(interp: &mut Interpreter<L, Tr, P>, native: NativeId, _action_id: ActionId, context: ContextId, frame_id: FrameId) -> RunResult<Outcome> {
    match native {
        NativeId::Add | NativeId::Subtract | NativeId::Multiply | NativeId::Divide => {
            let ctx = interp.contexts.get(context);
            let a = as_num(ctx.varlist[0])?;
            let b = as_num(ctx.varlist[1])?;
            let result = match native {
                NativeId::Add => match (a, b) {
                    (Num::Int(x), Num::Int(y)) => Cell::integer(x + y),
                    (Num::Int(x), Num::Dec(y)) | (Num::Dec(y), Num::Int(x)) => Cell::decimal(x as f64 + y),
                    (Num::Dec(x), Num::Dec(y)) => Cell::decimal(x + y),
                },
                NativeId::Subtract => match (a, b) {
                    (Num::Int(x), Num::Int(y)) => Cell::integer(x - y),
                    (Num::Int(x), Num::Dec(y)) => Cell::decimal(x as f64 - y),
                    (Num::Dec(x), Num::Int(y)) => Cell::decimal(x - y as f64),
                    (Num::Dec(x), Num::Dec(y)) => Cell::decimal(x - y),
                },
                NativeId::Multiply => match (a, b) {
                    (Num::Int(x), Num::Int(y)) => Cell::integer(x * y),
                    (Num::Int(x), Num::Dec(y)) | (Num::Dec(y), Num::Int(x)) => Cell::decimal(x as f64 * y),
                    (Num::Dec(x), Num::Dec(y)) => Cell::decimal(x * y),
                },
                NativeId::Divide => match (a, b) {
                    (Num::Int(_), Num::Int(0)) => return Err(ExecError::User("division by zero".into())),
                    (Num::Int(x), Num::Int(y)) => Cell::integer(x / y),
                    (Num::Int(x), Num::Dec(y)) => Cell::decimal(x as f64 / y),
                    (Num::Dec(x), Num::Int(y)) => Cell::decimal(x / y as f64),
                    (Num::Dec(x), Num::Dec(y)) => Cell::decimal(x / y),
                },
                _ => unreachable!(),
            };
            Ok(Outcome::Value(result))
        }
        NativeId::Negate => {
            let ctx = interp.contexts.get(context);
            let result = match as_num(ctx.varlist[0])? {
                Num::Int(x) => Cell::integer(-x),
                Num::Dec(x) => Cell::decimal(-x),
            };
            Ok(Outcome::Value(result))
        }
        NativeId::EqualQ => {
            let ctx = interp.contexts.get(context);
            let (a, b) = (ctx.varlist[0], ctx.varlist[1]);
            Ok(Outcome::Value(Cell::logic(values_equal(interp, a, b))))
        }
        NativeId::LesserQ | NativeId::GreaterQ => {
            let ctx = interp.contexts.get(context);
            let a = as_num(ctx.varlist[0])?;
            let b = as_num(ctx.varlist[1])?;
            let (af, bf) = match (a, b) {
                (Num::Int(x), Num::Int(y)) => (x as f64, y as f64),
                (Num::Int(x), Num::Dec(y)) => (x as f64, y),
                (Num::Dec(x), Num::Int(y)) => (x, y as f64),
                (Num::Dec(x), Num::Dec(y)) => (x, y),
            };
            let result = if matches!(native, NativeId::LesserQ) { af < bf } else { af > bf };
            Ok(Outcome::Value(Cell::logic(result)))
        }

        NativeId::If => {
            let ctx = interp.contexts.get(context);
            let (cond, branch) = (ctx.varlist[0], ctx.varlist[1]);
            if cond.is_truthy() {
                let array = branch.data().array_payload().ok_or_else(|| ExecError::User("if needs a block branch".into()))?;
                interp.evaluate_group(array, interp.frame_specifier(frame_id))
            } else {
                Ok(Outcome::Value(Cell::null()))
            }
        }
        NativeId::Either => {
            let ctx = interp.contexts.get(context);
            let (cond, true_branch, false_branch) = (ctx.varlist[0], ctx.varlist[1], ctx.varlist[2]);
            let chosen = if cond.is_truthy() { true_branch } else { false_branch };
            let array = chosen.data().array_payload().ok_or_else(|| ExecError::User("either needs block branches".into()))?;
            interp.evaluate_group(array, interp.frame_specifier(frame_id))
        }
        NativeId::Else => {
            let ctx = interp.contexts.get(context);
            let (value, branch) = (ctx.varlist[0], ctx.varlist[1]);
            if value.is_truthy() {
                Ok(Outcome::Value(value))
            } else {
                let array = branch.data().array_payload().ok_or_else(|| ExecError::User("else needs a block branch".into()))?;
                interp.evaluate_group(array, interp.frame_specifier(frame_id))
            }
        }
        NativeId::While => {
            let ctx = interp.contexts.get(context);
            let (cond_cell, body_cell) = (ctx.varlist[0], ctx.varlist[1]);
            let cond_array = cond_cell.data().array_payload().ok_or_else(|| ExecError::User("while needs a block condition".into()))?;
            let body_array = body_cell.data().array_payload().ok_or_else(|| ExecError::User("while needs a block body".into()))?;
            let specifier = interp.frame_specifier(frame_id);
            let mut last = Outcome::Value(Cell::null());
            loop {
                match interp.evaluate_group(cond_array, specifier)? {
                    Outcome::Thrown(t) => return Ok(Outcome::Thrown(t)),
                    Outcome::Invisible => break,
                    Outcome::Value(v) if !v.is_truthy() => break,
                    Outcome::Value(_) => {}
                }
                match interp.evaluate_group(body_array, specifier)? {
                    Outcome::Thrown(t) => return Ok(Outcome::Thrown(t)),
                    other => last = other,
                }
            }
            Ok(last)
        }
        NativeId::ForEach => {
            let ctx = interp.contexts.get(context);
            let (var_cell, series_cell, body_cell) = (ctx.varlist[0], ctx.varlist[1], ctx.varlist[2]);
            let var_sym = var_cell.data().word_symbol().ok_or_else(|| ExecError::User("for-each needs a word".into()))?;
            let series_array = series_cell.data().array_payload().ok_or_else(|| ExecError::User("for-each needs a block series".into()))?;
            let body_array = body_cell.data().array_payload().ok_or_else(|| ExecError::User("for-each needs a block body".into()))?;
            let specifier = interp.frame_specifier(frame_id);
            let (outer_next, outer_terminal) = match specifier {
                Specifier::Patch(p) => (Some(p), interp.patches.get(p).terminal),
                Specifier::Frame(f) => (None, Some(f)),
                Specifier::Unspecified => (None, None),
            };
            let items = interp.arrays.get(series_array).cells.clone();
            let mut last = Outcome::Value(Cell::null());
            for item in items {
                let keylist = interp.contexts.keylists.push_root(vec![var_sym]);
                let loop_ctx = interp.contexts.push(ContextKind::Object, keylist, vec![item], None);
                let patch = interp.patches.push(loop_ctx, 1, outer_next, outer_terminal);
                match interp.evaluate_group(body_array, Specifier::Patch(patch))? {
                    Outcome::Thrown(t) => return Ok(Outcome::Thrown(t)),
                    other => last = other,
                }
            }
            Ok(last)
        }
        NativeId::Do => {
            let ctx = interp.contexts.get(context);
            let value = ctx.varlist[0];
            match value.data() {
                CellData::Block(array) | CellData::Group(array) => {
                    let array = *array;
                    interp.evaluate_group(array, interp.frame_specifier(frame_id))
                }
                CellData::Frame(frame_context) => {
                    let frame_context = *frame_context;
                    interp.do_frame(frame_context)
                }
                _ => Ok(Outcome::Value(value)),
            }
        }
        NativeId::Reduce => {
            let ctx = interp.contexts.get(context);
            let value = ctx.varlist[0];
            let array = value.data().array_payload().ok_or_else(|| ExecError::User("reduce needs a block".into()))?;
            let specifier = interp.frame_specifier(frame_id);
            let feed = Feed::from_array(array, specifier, &interp.arrays);
            feed.borrow_mut().fetch_next(&interp.arrays);
            let mut results = Vec::new();
            loop {
                if feed.borrow().value.is_none() {
                    break;
                }
                match interp.eval_expr(&feed)? {
                    Outcome::Value(v) => results.push(v),
                    Outcome::Invisible => {}
                    Outcome::Thrown(t) => return Ok(Outcome::Thrown(t)),
                }
            }
            let new_array = interp.arrays.alloc(results, ArrayFlags::empty());
            Ok(Outcome::Value(Cell::inert(CellData::Block(new_array))))
        }

        NativeId::Return => {
            let ctx = interp.contexts.get(context);
            let value = ctx.varlist[0];
            let target = find_enclosing_func(interp).ok_or(ExecError::InvalidExit)?;
            Ok(Outcome::Thrown(Thrown { arg: value, label: ThrowLabel::Frame(target) }))
        }
        NativeId::Unwind => {
            let ctx = interp.contexts.get(context);
            let (target_cell, value) = (ctx.varlist[0], ctx.varlist[1]);
            let CellData::Frame(target_context) = target_cell.data() else {
                return Err(ExecError::User("unwind needs a frame! target".into()));
            };
            let target_frame = interp.contexts.get(*target_context).source_frame.ok_or(ExecError::InvalidExit)?;
            Ok(Outcome::Thrown(Thrown { arg: value, label: ThrowLabel::Frame(target_frame) }))
        }
        NativeId::Throw => {
            let ctx = interp.contexts.get(context);
            let value = ctx.varlist[0];
            let name_active = ctx.varlist[1].is_truthy();
            let label = if name_active {
                let name_cell = ctx.varlist[2];
                let symbol = name_cell.data().word_symbol().ok_or_else(|| ExecError::User("throw/name needs a word".into()))?;
                ThrowLabel::Named(symbol)
            } else {
                ThrowLabel::Anonymous
            };
            Ok(Outcome::Thrown(Thrown { arg: value, label }))
        }
        NativeId::Catch => {
            let ctx = interp.contexts.get(context);
            let body_cell = ctx.varlist[0];
            let name_active = ctx.varlist[1].is_truthy();
            let target = if name_active {
                let symbol = ctx.varlist[2].data().word_symbol().ok_or_else(|| ExecError::User("catch/name needs a word".into()))?;
                CatchTarget::Name(symbol)
            } else {
                CatchTarget::Any
            };
            let array = body_cell.data().array_payload().ok_or_else(|| ExecError::User("catch needs a block".into()))?;
            match interp.evaluate_group(array, interp.frame_specifier(frame_id))? {
                Outcome::Thrown(t) if label_matches(t.label, target) => Ok(Outcome::Value(t.arg)),
                other => Ok(other),
            }
        }
        NativeId::Trap => {
            let ctx = interp.contexts.get(context);
            let body_cell = ctx.varlist[0];
            let with_active = ctx.varlist[1].is_truthy();
            let handler_cell = ctx.varlist[2];
            let array = body_cell.data().array_payload().ok_or_else(|| ExecError::User("trap needs a block".into()))?;
            let specifier = interp.frame_specifier(frame_id);
            match interp.evaluate_group(array, specifier) {
                Ok(other) => Ok(other),
                Err(err) => {
                    let error_cell = err.into_cell(&mut interp.symbols, &mut interp.contexts, &mut interp.texts);
                    if with_active {
                        let handler_id = resolve_action_cell(interp, handler_cell, specifier)?;
                        interp.call_action_with_args(handler_id, vec![error_cell], None)
                    } else {
                        Ok(Outcome::Value(error_cell))
                    }
                }
            }
        }
        NativeId::Fail => {
            let ctx = interp.contexts.get(context);
            let message_cell = ctx.varlist[0];
            let message = render(interp, message_cell);
            Err(ExecError::User(message))
        }

        NativeId::Func => {
            let ctx = interp.contexts.get(context);
            let (spec_cell, body_cell) = (ctx.varlist[0], ctx.varlist[1]);
            let spec_array = spec_cell.data().array_payload().ok_or_else(|| ExecError::User("func needs a spec block".into()))?;
            let body_array = body_cell.data().array_payload().ok_or_else(|| ExecError::User("func needs a body block".into()))?;
            let action_id = interp.make_func(spec_array, body_array)?;
            Ok(Outcome::Value(Cell::inert(CellData::Action(action_id))))
        }
        NativeId::Adapt => {
            let ctx = interp.contexts.get(context);
            let (adaptee_cell, prelude_cell) = (ctx.varlist[0], ctx.varlist[1]);
            let specifier = interp.frame_specifier(frame_id);
            let adaptee_id = resolve_action_cell(interp, adaptee_cell, specifier)?;
            let prelude_array = prelude_cell.data().array_payload().ok_or_else(|| ExecError::User("adapt needs a block prelude".into()))?;
            let action_id = interp.make_adapt(adaptee_id, prelude_array)?;
            Ok(Outcome::Value(Cell::inert(CellData::Action(action_id))))
        }
        NativeId::Enclose => {
            let ctx = interp.contexts.get(context);
            let (inner_cell, outer_cell) = (ctx.varlist[0], ctx.varlist[1]);
            let specifier = interp.frame_specifier(frame_id);
            let inner_id = resolve_action_cell(interp, inner_cell, specifier)?;
            let outer_id = resolve_action_cell(interp, outer_cell, specifier)?;
            let action_id = interp.make_enclose(inner_id, outer_id);
            Ok(Outcome::Value(Cell::inert(CellData::Action(action_id))))
        }
        NativeId::Specialize => {
            let ctx = interp.contexts.get(context);
            let (base_cell, fixed_cell) = (ctx.varlist[0], ctx.varlist[1]);
            let specifier = interp.frame_specifier(frame_id);
            let base_id = resolve_action_cell(interp, base_cell, specifier)?;
            let fixed_array = fixed_cell.data().array_payload().ok_or_else(|| ExecError::User("specialize needs a block of set-word/value pairs".into()))?;
            let cells = interp.arrays.get(fixed_array).cells.clone();
            let mut fixed = Vec::new();
            let mut i = 0;
            while i < cells.len() {
                let CellData::SetWord(symbol) = cells[i].data() else {
                    return Err(ExecError::User("specialize block must alternate set-word and value".into()));
                };
                let symbol = *symbol;
                let Some(&value_cell) = cells.get(i + 1) else {
                    return Err(ExecError::User("specialize block ended mid set-word/value pair".into()));
                };
                let value = match interp.eval_cell_as_expr(value_cell, specifier)? {
                    Outcome::Value(v) => v,
                    _ => return Err(ExecError::User("specialize value expression produced no value".into())),
                };
                fixed.push((symbol, value));
                i += 2;
            }
            let action_id = interp.make_specialize(base_id, fixed)?;
            Ok(Outcome::Value(Cell::inert(CellData::Action(action_id))))
        }

        NativeId::Bind => {
            let ctx = interp.contexts.get(context);
            let (block_cell, target_cell) = (ctx.varlist[0], ctx.varlist[1]);
            let array = block_cell.data().array_payload().ok_or_else(|| ExecError::User("bind needs a block".into()))?;
            let target_context = match target_cell.data() {
                CellData::Object(c) | CellData::Module(c) | CellData::Error(c) | CellData::Port(c) | CellData::Frame(c) => *c,
                _ => return Err(ExecError::User("bind target must be a context".into())),
            };
            let mut binder = Binder::new();
            binder.fill_from_context(&interp.contexts, target_context);
            bind_array(&mut interp.arrays, &binder, BindTarget::Context(target_context), array);
            binder.clear();
            Ok(Outcome::Value(block_cell))
        }
        NativeId::In => {
            let ctx = interp.contexts.get(context);
            let (context_cell, word_cell) = (ctx.varlist[0], ctx.varlist[1]);
            let target_context = match context_cell.data() {
                CellData::Object(c) | CellData::Module(c) | CellData::Error(c) | CellData::Port(c) | CellData::Frame(c) => *c,
                _ => return Err(ExecError::User("in needs a context".into())),
            };
            let symbol = word_cell.data().word_symbol().ok_or_else(|| ExecError::User("in needs a word".into()))?;
            let index = interp.contexts.find_key(target_context, symbol).ok_or(ExecError::Unbound { symbol })?;
            Ok(Outcome::Value(Cell::word(symbol, crate::binding::Binding::Specific { context: target_context, index })))
        }
        NativeId::ValueQ => {
            let ctx = interp.contexts.get(context);
            let word_cell = ctx.varlist[0];
            let symbol = word_cell.data().word_symbol().ok_or_else(|| ExecError::User("value? needs a word".into()))?;
            let specifier = interp.frame_specifier(frame_id);
            let found = interp.resolve_word_slot(symbol, word_cell.binding(), specifier).is_some();
            Ok(Outcome::Value(Cell::logic(found)))
        }
        NativeId::UnsetQ => {
            let ctx = interp.contexts.get(context);
            Ok(Outcome::Value(Cell::logic(matches!(ctx.varlist[0].data(), CellData::Null))))
        }
        NativeId::IntegerQ => {
            let ctx = interp.contexts.get(context);
            Ok(Outcome::Value(Cell::logic(matches!(ctx.varlist[0].data(), CellData::Integer(_)))))
        }
        NativeId::Enfix => {
            let ctx = interp.contexts.get(context);
            let action_cell = ctx.varlist[0];
            let specifier = interp.frame_specifier(frame_id);
            let base_id = resolve_action_cell(interp, action_cell, specifier)?;
            let enfixed = interp.make_enfix(base_id, LeftArgClass::Soft, false, false);
            Ok(Outcome::Value(Cell::inert(CellData::Action(enfixed))))
        }

        NativeId::Comment | NativeId::Elide => Ok(Outcome::Invisible),
        NativeId::Let => {
            let ctx = interp.contexts.get(context);
            let (target_cell, value) = (ctx.varlist[0], ctx.varlist[1]);
            let CellData::SetWord(symbol) = target_cell.data() else {
                return Err(ExecError::User("let needs a set-word target".into()));
            };
            let symbol = *symbol;
            interp.declare_global(symbol, value);
            Ok(Outcome::Value(value))
        }
        NativeId::ThenVanish => Ok(Outcome::Invisible),

        NativeId::Append => {
            let ctx = interp.contexts.get(context);
            let (series_cell, value) = (ctx.varlist[0], ctx.varlist[1]);
            let array = series_cell.data().array_payload().ok_or_else(|| ExecError::User("append needs a series".into()))?;
            interp.arrays.get_mut(array).cells.push(value);
            Ok(Outcome::Value(series_cell))
        }
        NativeId::Copy => {
            let ctx = interp.contexts.get(context);
            let series_cell = ctx.varlist[0];
            let array = series_cell.data().array_payload().ok_or_else(|| ExecError::User("copy needs a series".into()))?;
            let cells = interp.arrays.get(array).cells.clone();
            let new_array = interp.arrays.alloc(cells, ArrayFlags::empty());
            Ok(Outcome::Value(Cell::inert(CellData::Block(new_array))))
        }
        NativeId::Print => {
            let ctx = interp.contexts.get(context);
            let value = ctx.varlist[0];
            let text = render(interp, value);
            interp.print.print_line(&text);
            Ok(Outcome::Invisible)
        }
    }
}
