//! `revolt`: a homoiconic, Rebol-family expression evaluator core
//! (`SPEC_FULL.md` §1-§2).
//!
//! This crate implements the data model (cells, arrays, symbols, contexts,
//! actions, frames, feeds), the three-tier binding subsystem, an evaluator
//! trampoline with enfix lookahead, action composition (`adapt`/`enclose`/
//! `specialize`), non-local exits (`throw`/`catch`/`trap`/`fail`), a minimal
//! in-memory scanner, and a small native action library. See `DESIGN.md` for
//! the grounding ledger tying each module back to its source of imitation.

mod action;
mod array;
mod binding;
mod cell;
mod context;
mod error;
mod evaluate;
mod feed;
mod frame;
mod ids;
mod io;
mod natives;
mod resource;
mod scan;
mod symbol;
mod text;
mod throw;
mod tracer;

pub use crate::{
    action::{Action, Actions, Dispatcher, EnfixInfo, LeftArgClass, NativeId, Param, ParamClass},
    array::{Array, ArrayFlags, Arrays, HeapDiff, HeapStats},
    binding::{BindTarget, Binder, Binding, Patch, Patches, Specifier},
    cell::{Cell, CellData, Kind, Typeset},
    context::{Context, ContextKind, Contexts, Keylist, Keylists},
    error::{ExecError, RunResult},
    evaluate::{Interpreter, Outcome},
    feed::{Feed, FeedHandle, FeedSource},
    frame::{Baseline, Executor, Frame, Frames},
    ids::{ActionId, ArrayId, BytesId, ContextId, FrameId, KeylistId, PatchId, TextId},
    io::{CollectPrint, NoPrint, PrintSink, StdPrint},
    natives::render,
    resource::{Bounded, EvalLimits, LimitsPolicy, NoLimits},
    scan::scan,
    symbol::{SymbolId, SymbolTable, WellKnown},
    text::{Blobs, Texts},
    throw::{CatchTarget, ThrowLabel, Thrown, label_matches},
    tracer::{NoopTracer, RecordingTracer, TraceEvent, Tracer},
};
