//! Direct invocation of installed versions.
//!
//! Unlike a bare invocation through the shim, everything here targets
//! explicit versions: concurrent fan-out for `compare` and `benchmark`, the
//! renderers over their results, and history replay.

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

mod benchmark;
mod diff;
mod engine;
mod replay;

pub use benchmark::{BenchmarkStats, Ranked, rank, render_ranking, render_stats, summarize};
pub use diff::{
    LineChange, TABLE_COLUMN_WIDTH, TableRow, UNIFIED_CONTEXT, UnifiedLine, are_outputs_identical,
    render_table, render_unified, table_rows, unified_diff,
};
/// Subprocess execution with a shared cancellable deadline.
pub use engine::{
    BenchmarkRun, ExecContext, ExecError, ExecutionEngine, ExecutionResult, FanOut,
};
pub use replay::{ReplayError, ReplayOutcome, replay, replay_args};
