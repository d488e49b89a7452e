//! Frames: call activation records driving the trampoline (spec §3.6).
//!
//! Grounded on the teacher's call-stack-as-`Vec` pattern (the VM's frame
//! stack in `heap.rs`/bytecode dispatch): a frame's lifetime is genuinely
//! LIFO, so `Vec<Frame>` push/pop *is* the "pool allocation on push, freed
//! on drop" spec §3.6 describes — no separate arena/free-list indirection
//! is needed the way [`crate::array::Arrays`] or [`crate::context::Contexts`]
//! need one, because nothing outside the stack ever addresses a frame that
//! has already popped (a frame that needs to outlive its pop is *reified*
//! into a [`crate::context::Context`] first, spec glossary "Reify").

use crate::{binding::Specifier, cell::Cell, feed::FeedHandle, ids::{ActionId, ContextId, FrameId}, symbol::SymbolId};

/// Which executor function should run next for a frame (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Executor {
    NewExpression,
    FrameWorkhorse,
    PostSwitch,
    GroupExecutor,
    ActionExecutor,
    PathExecutor,
    JustUseOut,
}

/// A snapshot of global mutable state taken when a frame is pushed (spec
/// §3.6 "baseline"), used by `fail`'s unwind (spec §4.9) to restore
/// invariants and by §4.10's state-invariant checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Baseline {
    pub data_stack_depth: usize,
}

/// A call activation record (spec §3.6).
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: FrameId,
    pub executor: Executor,
    /// 0 = initial entry; re-entries after a sub-continuation carry a
    /// nonzero state reflecting which sub-continuation completed (spec
    /// §4.5 "State byte").
    pub state: u8,
    pub feed: Option<FeedHandle>,
    pub out: Cell,
    /// GC-safe scratch cell available to the executor (spec §4.8).
    pub spare: Cell,
    /// Once reified, the context holding this frame's arguments
    /// permanently (spec glossary "Reify"); `None` while the frame still
    /// owns `args` directly.
    pub varlist: Option<ContextId>,
    /// Argument storage while this frame is running an unreified action
    /// call. Index 0 corresponds to `original_action`'s first param.
    pub args: Vec<Cell>,
    pub original_action: Option<ActionId>,
    /// The compositional layer currently executing (spec §4.6 "phase").
    pub phase: Option<ActionId>,
    pub specifier: Specifier,
    /// The word that invoked this action, if any (spec §3.6 "label").
    pub label: Option<SymbolId>,
    pub cursor_param: usize,
    pub cursor_arg: usize,
    pub cursor_special: usize,
    pub baseline: Baseline,
    /// Parameter indices whose refinement pickup is still pending,
    /// collected during in-order fulfillment and revisited afterward
    /// (spec §4.6 "pickups").
    pub pickups: Vec<usize>,
}

impl Frame {
    #[must_use]
    pub fn new(id: FrameId, executor: Executor, feed: Option<FeedHandle>, specifier: Specifier, baseline: Baseline) -> Self {
        Self {
            id,
            executor,
            state: 0,
            feed,
            out: Cell::null(),
            spare: Cell::null(),
            varlist: None,
            args: Vec::new(),
            original_action: None,
            phase: None,
            specifier,
            label: None,
            cursor_param: 0,
            cursor_arg: 0,
            cursor_special: 0,
            baseline,
            pickups: Vec::new(),
        }
    }
}

/// The frame (call) stack. Push/pop order is strictly LIFO, matching spec
/// §3.6's "linked into a singly-linked top chain"; `Vec` already gives us
/// that chain, so there is no separate linked-list type to maintain.
#[derive(Debug, Default)]
pub struct Frames {
    stack: Vec<Frame>,
    next_id: u32,
}

impl Frames {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_id(&mut self) -> FrameId {
        let id = FrameId::new(self.next_id as usize);
        self.next_id += 1;
        id
    }

    pub fn push(&mut self, frame: Frame) {
        self.stack.push(frame);
    }

    #[must_use]
    pub fn pop(&mut self) -> Option<Frame> {
        self.stack.pop()
    }

    #[must_use]
    pub fn top(&self) -> Option<&Frame> {
        self.stack.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.stack.last_mut()
    }

    /// Mutable access to the frame just below the top, for post-switch and
    /// continuation plumbing that needs to write into the caller's `out`.
    pub fn parent_mut(&mut self) -> Option<&mut Frame> {
        let len = self.stack.len();
        if len < 2 { None } else { self.stack.get_mut(len - 2) }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Finds a frame by identity, searching from the top down (spec §4.9's
    /// definitional-return catching: "catching occurs exactly when an
    /// unwind-typed throw's label binding equals the frame").
    #[must_use]
    pub fn find(&self, id: FrameId) -> Option<usize> {
        self.stack.iter().rposition(|f| f.id == id)
    }

    /// The specifier a still-on-stack frame was pushed with, looked up by
    /// identity rather than position (used by natives that need the
    /// *caller's* specifier for a block argument they were handed, spec
    /// §4.11 — a native never pushes an intermediate body frame the way
    /// `func` does, so its own reified `context` carries no specifier of its
    /// own to fall back on).
    #[must_use]
    pub fn specifier_of(&self, id: FrameId) -> Option<Specifier> {
        self.find(id).map(|idx| self.stack[idx].specifier)
    }

    /// Iterates frames from the top of the stack downward, for natives that
    /// need to search their own ancestry rather than address a frame by
    /// identity (spec §9.9's definitional return: `return` must find the
    /// nearest enclosing `func` activation, which may be several native
    /// calls — `if`, `either` — further down the stack than its own caller).
    pub fn iter_rev(&self) -> impl Iterator<Item = &Frame> {
        self.stack.iter().rev()
    }

    /// Truncates the stack down to (and including) index `keep_len` frames,
    /// used by `fail`'s trap unwind (spec §4.9) and by a successful `catch`/
    /// `trap` that needs to discard everything pushed since it ran.
    pub fn truncate(&mut self, keep_len: usize) -> Vec<Frame> {
        self.stack.split_off(keep_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn frame_ids_are_distinct_and_monotone() {
        let mut frames = Frames::new();
        let a = frames.fresh_id();
        let b = frames.fresh_id();
        assert_ne!(a, b);
    }

    #[test]
    fn stack_is_lifo() {
        let mut frames = Frames::new();
        let id1 = frames.fresh_id();
        let id2 = frames.fresh_id();
        frames.push(Frame::new(id1, Executor::NewExpression, None, Specifier::Unspecified, Baseline { data_stack_depth: 0 }));
        frames.push(Frame::new(id2, Executor::NewExpression, None, Specifier::Unspecified, Baseline { data_stack_depth: 0 }));
        assert_eq!(frames.top().unwrap().id, id2);
        frames.pop();
        assert_eq!(frames.top().unwrap().id, id1);
    }
}
