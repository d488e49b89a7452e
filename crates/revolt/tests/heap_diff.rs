//! Tests for `HeapStats`/`HeapDiff` resource accounting, exercised through a
//! full `Interpreter` rather than the `Arrays` arena directly (see
//! `array.rs`'s own unit tests for that narrower scope).
//!
//! Mirrors the teacher's `tests/heap_diff.rs` layout: one concern per test,
//! grouped under a banner comment.

use pretty_assertions::assert_eq;
use revolt::{CollectPrint, HeapStats, Interpreter, NoLimits, NoopTracer};

type TestInterp = Interpreter<NoLimits, NoopTracer, CollectPrint>;

fn snapshot(interp: &TestInterp) -> HeapStats {
    HeapStats::capture(&interp.arrays, interp.symbols.live_canon_count())
}

// =============================================================================
// 1. Identical snapshots produce an empty diff
// =============================================================================

#[test]
fn diff_of_identical_snapshots_is_empty() {
    let interp = TestInterp::default();
    let stats = snapshot(&interp);
    let diff = stats.diff(&stats);
    assert_eq!(diff.live_arrays_delta, 0);
    assert_eq!(diff.free_slots_delta, 0);
    assert_eq!(diff.total_slots_delta, 0);
    assert_eq!(diff.interned_symbols_delta, 0);
}

// =============================================================================
// 2. Diff direction: before -> after shows growth as positive
// =============================================================================

#[test]
fn evaluating_a_block_literal_grows_the_array_arena() {
    let mut interp = TestInterp::default();
    let before = snapshot(&interp);
    interp.run("do [add 1 2]").unwrap();
    let after = snapshot(&interp);
    let diff = before.diff(&after);
    assert!(diff.live_arrays_delta > 0, "scanning `[add 1 2]` should allocate at least one array, got {}", diff.live_arrays_delta);
    assert!(diff.total_slots_delta > 0);
}

// =============================================================================
// 3. Interning new words grows the symbol count the diff reports
// =============================================================================

#[test]
fn declaring_a_new_global_interns_its_name() {
    let mut interp = TestInterp::default();
    let before = snapshot(&interp);
    interp.run("totally-new-name: 1").unwrap();
    let after = snapshot(&interp);
    let diff = before.diff(&after);
    assert!(diff.interned_symbols_delta > 0, "a fresh set-word spelling should intern a new canon, got {}", diff.interned_symbols_delta);
}

// =============================================================================
// 4. No array reclamation: this crate specifies GC invariants (spec §1) but
//    does not implement mark/sweep itself, so repeated evaluation keeps
//    growing the arena rather than reusing slots freed by a prior run.
// =============================================================================

#[test]
fn evaluating_the_same_program_twice_does_not_reuse_array_slots() {
    let mut interp = TestInterp::default();
    interp.run("do [add 1 2]").unwrap();
    let after_first = snapshot(&interp);
    interp.run("do [add 1 2]").unwrap();
    let after_second = snapshot(&interp);
    let diff = after_first.diff(&after_second);
    assert!(
        diff.live_arrays_delta > 0,
        "a second run should allocate fresh arrays rather than reuse the first run's, got {}",
        diff.live_arrays_delta
    );
    assert_eq!(after_first.free_slots, 0, "nothing in this crate ever frees an array on its own");
    assert_eq!(after_second.free_slots, 0);
}

// =============================================================================
// 5. Display formatting
// =============================================================================

#[test]
fn heap_diff_display_reports_no_changes_when_empty() {
    let interp = TestInterp::default();
    let stats = snapshot(&interp);
    let diff = stats.diff(&stats);
    assert_eq!(diff.to_string(), "HeapDiff: no changes");
}

#[test]
fn heap_diff_display_reports_deltas_when_nonempty() {
    let mut interp = TestInterp::default();
    let before = snapshot(&interp);
    interp.run("do [add 1 2]").unwrap();
    let after = snapshot(&interp);
    let diff = before.diff(&after);
    let text = diff.to_string();
    assert!(text.starts_with("HeapDiff:"));
    assert!(text.contains("live arrays"));
}
