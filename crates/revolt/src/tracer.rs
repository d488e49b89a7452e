//! Evaluator instrumentation (spec §4.14 / `SPEC_FULL.md`): a zero-cost
//! `Tracer` trait with hook methods, a `NoopTracer` that monomorphizes away,
//! and a `RecordingTracer` for tests/debugging.
//!
//! Directly grounded on `crates/ouros/src/tracer.rs`'s `VmTracer` /
//! `NoopTracer` / `RecordingTracer` split, narrowed to the events this
//! crate's trampoline actually produces (frame push/pop, executor entry,
//! throw, fail) instead of bytecode-level opcode dispatch.

use crate::{frame::Executor, ids::FrameId};

/// One recorded trampoline event (spec §4.5), captured by
/// [`RecordingTracer`] for tests and post-mortem debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    FramePush { frame: FrameId, executor: Executor, depth: usize },
    FramePop { frame: FrameId, depth: usize },
    ExecutorEnter { frame: FrameId, executor: Executor, state: u8 },
    Throw { label_is_named: bool },
    Fail { kind: &'static str },
}

/// Hook points the trampoline calls into at key moments (spec §4.5, §4.9).
/// Every method has a no-op default so implementations only override what
/// they need, exactly like the teacher's `VmTracer`.
pub trait Tracer: std::fmt::Debug {
    #[inline(always)]
    fn on_frame_push(&mut self, _frame: FrameId, _executor: Executor, _depth: usize) {}
    #[inline(always)]
    fn on_frame_pop(&mut self, _frame: FrameId, _depth: usize) {}
    #[inline(always)]
    fn on_executor_enter(&mut self, _frame: FrameId, _executor: Executor, _state: u8) {}
    #[inline(always)]
    fn on_throw(&mut self, _label_is_named: bool) {}
    #[inline(always)]
    fn on_fail(&mut self, _kind: &'static str) {}
}

/// Zero-cost production default. The trampoline is generic over `Tr:
/// Tracer`, so the compiler inlines every hook away when monomorphized with
/// this type, identical to how `NoLimits` eliminates limit-check overhead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Records every event into a `Vec`, for tests that assert on trampoline
/// shape (e.g. "exactly one frame push per action call") and for debugging.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl Tracer for RecordingTracer {
    fn on_frame_push(&mut self, frame: FrameId, executor: Executor, depth: usize) {
        self.events.push(TraceEvent::FramePush { frame, executor, depth });
    }

    fn on_frame_pop(&mut self, frame: FrameId, depth: usize) {
        self.events.push(TraceEvent::FramePop { frame, depth });
    }

    fn on_executor_enter(&mut self, frame: FrameId, executor: Executor, state: u8) {
        self.events.push(TraceEvent::ExecutorEnter { frame, executor, state });
    }

    fn on_throw(&mut self, label_is_named: bool) {
        self.events.push(TraceEvent::Throw { label_is_named });
    }

    fn on_fail(&mut self, kind: &'static str) {
        self.events.push(TraceEvent::Fail { kind });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn noop_tracer_ignores_every_hook() {
        let mut tracer = NoopTracer;
        tracer.on_frame_push(FrameId::new(0), Executor::NewExpression, 1);
        tracer.on_throw(true);
        // Nothing to assert on; the point is that these calls compile away to
        // nothing and don't panic.
    }

    #[test]
    fn recording_tracer_records_events_in_order() {
        let mut tracer = RecordingTracer::new();
        tracer.on_frame_push(FrameId::new(0), Executor::ActionExecutor, 1);
        tracer.on_executor_enter(FrameId::new(0), Executor::ActionExecutor, 0);
        tracer.on_frame_pop(FrameId::new(0), 0);
        assert_eq!(
            tracer.into_events(),
            vec![
                TraceEvent::FramePush { frame: FrameId::new(0), executor: Executor::ActionExecutor, depth: 1 },
                TraceEvent::ExecutorEnter { frame: FrameId::new(0), executor: Executor::ActionExecutor, state: 0 },
                TraceEvent::FramePop { frame: FrameId::new(0), depth: 0 },
            ]
        );
    }

    #[test]
    fn recording_tracer_events_accessor_does_not_consume() {
        let mut tracer = RecordingTracer::new();
        tracer.on_fail("user");
        assert_eq!(tracer.events().len(), 1);
        assert_eq!(tracer.events(), [TraceEvent::Fail { kind: "user" }]);
    }
}
