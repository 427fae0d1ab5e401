//! redo - repeatedly run a command pipeline
//!
//! Provides the execution engine behind the `redo` binary:
//! - Builds and validates pipeline specifications (`cmd1 | cmd2 | ...`)
//! - Launches each round as a chain of piped child processes with a per-stage timeout
//! - Reduces each round to one status and repeats under a fixed-count or until-success policy

pub mod controller;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod spec;
pub mod stage;
pub mod telemetry;

// Re-export key types
pub use controller::{next_state, ControllerState, RepeatController, RunSummary};
pub use error::{RedoError, Result};
pub use pipeline::{reduce_outcomes, ProcessRoundExecutor, RoundExecutor, RoundResult};
pub use runner::{PipelineLauncher, StageOutcome, StageReport};
pub use spec::{
    parse_repeat, parse_timeout, ExecutionPolicy, Limits, PipelineSpec, RoundOptions, PIPE_TOKEN,
};
pub use stage::Stage;
pub use telemetry::init_tracing;
