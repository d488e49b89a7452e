//! Data-driven scenarios exercising the evaluator end to end through
//! `Interpreter::run`, one case per testable property.
//!
//! Mirrors the teacher's `tests/inputs.rs` layout: small standalone cases
//! grouped by concern rather than one giant `#[test]` per feature area.

use pretty_assertions::assert_eq;
use revolt::{CellData, CollectPrint, Interpreter, NoLimits, NoopTracer};

type TestInterp = Interpreter<NoLimits, NoopTracer, CollectPrint>;

fn int(cell: &revolt::Cell) -> i64 {
    match cell.data() {
        CellData::Integer(n) => *n,
        other => panic!("expected integer, got {other:?}"),
    }
}

fn run(source: &str) -> revolt::Cell {
    let mut interp = TestInterp::default();
    interp.run(source).unwrap_or_else(|err| panic!("{source:?} failed: {err}"))
}

// === Arithmetic & comparison ===

#[test]
fn prefix_add() {
    assert_eq!(int(&run("add 1 2")), 3);
}

#[test]
fn nested_prefix_calls() {
    assert_eq!(int(&run("add 1 multiply 2 3")), 7);
}

#[test]
fn enfix_right_hand_side_recurses_through_its_own_lookahead() {
    // Each enfix right-hand argument is fulfilled via a recursive `eval_expr`
    // call, which performs its own lookahead before returning — so a chain of
    // enfix operators effectively right-associates: `a OP1 b OP2 c` reads as
    // `a OP1 (b OP2 c)`, not `(a OP1 b) OP2 c`.
    assert_eq!(int(&run("1 + 2 * 3")), 7); // 1 + (2 * 3)
    assert_eq!(int(&run("2 * 3 + 1")), 8); // 2 * (3 + 1)
}

#[test]
fn comparison_natives_return_logic() {
    let result = run("greater? 3 1");
    assert!(matches!(result.data(), CellData::Logic(true)));
    let result = run("greater? 1 3");
    assert!(matches!(result.data(), CellData::Logic(false)));
}

// === Control ===

#[test]
fn if_runs_its_branch_when_true() {
    assert_eq!(int(&run("if true [add 1 1]")), 2);
}

#[test]
fn if_yields_null_when_false() {
    let result = run("if false [add 1 1]");
    assert!(matches!(result.data(), CellData::Null));
}

#[test]
fn either_picks_the_matching_branch() {
    assert_eq!(int(&run("either greater? 2 1 [add 10 1] [add 20 1]")), 11);
    assert_eq!(int(&run("either greater? 1 2 [add 10 1] [add 20 1]")), 21);
}

#[test]
fn while_loop_accumulates_through_a_mutable_global() {
    let mut interp = TestInterp::default();
    let result = interp.run("total: 0 count: 0 while [lesser? count 5] [total: add total 1 count: add count 1] total").unwrap();
    assert_eq!(int(&result), 5);
}

#[test]
fn for_each_walks_a_block_in_order() {
    let mut interp = TestInterp::default();
    let result = interp.run("total: 0 for-each item [1 2 3 4] [total: add total item] total").unwrap();
    assert_eq!(int(&result), 10);
}

#[test]
fn do_evaluates_a_block_to_completion() {
    assert_eq!(int(&run("do [add 1 2]")), 3);
}

#[test]
fn reduce_evaluates_every_top_level_expression_in_a_block() {
    let mut interp = TestInterp::default();
    let result = interp.run("reduce [add 1 2]").unwrap();
    let CellData::Block(array) = result.data() else {
        panic!("expected a block result, got {:?}", result.data())
    };
    let cells = interp.arrays.get(*array).cells.clone();
    assert_eq!(cells.len(), 1);
    assert_eq!(int(&cells[0]), 3);
}

// === Non-local exit ===

#[test]
fn definitional_return_unwinds_to_its_own_call() {
    assert_eq!(int(&run("square: func [x] [return multiply x x] square 5")), 25);
}

#[test]
fn return_outside_any_call_is_an_invalid_exit() {
    let mut interp = TestInterp::default();
    let err = interp.run("return 1").unwrap_err();
    assert!(matches!(err, revolt::ExecError::InvalidExit));
}

#[test]
fn catch_intercepts_a_throw_at_the_top_of_its_body() {
    assert_eq!(int(&run("catch [throw 10]")), 10);
}

#[test]
fn catch_intercepts_a_throw_nested_in_an_argument() {
    assert_eq!(int(&run("catch [add 1 throw 2]")), 2);
}

#[test]
fn definitional_return_unwinds_from_inside_an_argument() {
    assert_eq!(int(&run("f: func [] [add 1 (return 2)] f")), 2);
}

#[test]
fn named_catch_matches_only_its_own_name() {
    assert_eq!(int(&run("catch/name [throw/name 10 'mine] 'mine")), 10);
}

#[test]
fn named_catch_lets_a_differently_named_throw_propagate() {
    let mut interp = TestInterp::default();
    let err = interp.run("catch/name [throw/name 1 'other] 'mine").unwrap_err();
    assert!(matches!(err, revolt::ExecError::User(_)));
}

#[test]
fn trap_converts_a_fail_into_a_catchable_error_value() {
    let result = run("trap [fail \"boom\"]");
    assert!(matches!(result.data(), CellData::Error(_)));
}

#[test]
fn trap_passes_through_a_successful_body_unchanged() {
    assert_eq!(int(&run("trap [add 1 2]")), 3);
}

#[test]
fn uncaught_fail_propagates_out_of_run() {
    let mut interp = TestInterp::default();
    let err = interp.run("fail \"boom\"").unwrap_err();
    assert!(matches!(err, revolt::ExecError::User(_)));
}

// === Action composition ===

#[test]
fn adapt_runs_its_prelude_then_redoes_into_the_adaptee() {
    let mut interp = TestInterp::default();
    let result = interp.run("loud-add: adapt :add [print \"adding\"] loud-add 2 3").unwrap();
    assert_eq!(int(&result), 5);
    assert_eq!(interp.print.lines(), ["adding"]);
}

#[test]
fn specialize_fixes_a_parameter_so_only_the_rest_remain() {
    let mut interp = TestInterp::default();
    let result = interp.run("add-ten: specialize :add [value1: 10] add-ten 5").unwrap();
    assert_eq!(int(&result), 15);
}

#[test]
fn enclose_hands_the_frame_to_the_outer_action() {
    let mut interp = TestInterp::default();
    let result = interp.run("doubled: enclose :add func [f] [multiply (do f) 2] doubled 1 2").unwrap();
    assert_eq!(int(&result), 6);
}

// === Invisible expressions / vanishing ===

#[test]
fn comment_vanishes_without_affecting_the_surrounding_expression() {
    assert_eq!(int(&run("add 1 comment \"ignored\" 2")), 3);
}

#[test]
fn bar_sequences_two_groups_yielding_the_second() {
    assert_eq!(int(&run("(add 1 2) | (add 10 20)")), 30);
}

#[test]
fn let_declares_a_global_the_next_expression_can_see() {
    assert_eq!(int(&run("let x: 10 add x 1")), 11);
}

// === Binding / introspection ===

#[test]
fn value_q_reports_whether_a_word_is_bound() {
    let mut interp = TestInterp::default();
    let bound = interp.run("value? 'add").unwrap();
    assert!(matches!(bound.data(), CellData::Logic(true)));
}
