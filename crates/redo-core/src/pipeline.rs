//! Round execution: run the pipeline once and reduce it to one verdict.

use crate::runner::{PipelineLauncher, StageOutcome, StageReport};
use crate::spec::PipelineSpec;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Result of one full round of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundResult {
    /// 1-based round number within the run.
    pub round: u64,

    /// Per-stage reports in pipeline order.
    pub stages: Vec<StageReport>,

    /// Status of the round as a whole (0 = success).
    pub overall_code: i32,

    /// When the round was launched.
    pub started_at: DateTime<Utc>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl RoundResult {
    /// Assemble a result from stage reports, applying [`reduce_outcomes`].
    pub fn from_reports(
        round: u64,
        stages: Vec<StageReport>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        let outcomes: Vec<StageOutcome> = stages.iter().map(|s| s.outcome.clone()).collect();
        let overall_code = reduce_outcomes(&outcomes);
        Self {
            round,
            stages,
            overall_code,
            started_at,
            duration_ms,
        }
    }

    /// Whether the round succeeded (overall code 0).
    pub fn succeeded(&self) -> bool {
        self.overall_code == 0
    }

    /// Whether any stage was killed by the timeout.
    pub fn timed_out(&self) -> bool {
        self.stages
            .iter()
            .any(|s| s.outcome == StageOutcome::TimedOut)
    }

    /// Number of stages that exited cleanly.
    pub fn passed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.outcome.passed()).count()
    }

    /// Number of stages that did not exit cleanly.
    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|s| !s.outcome.passed()).count()
    }
}

/// Reduce per-stage outcomes to the round's overall code.
///
/// The last stage decides, as in a shell pipeline, unless some stage never
/// launched: then the first launch failure is reported instead. An empty
/// slice cannot come from a validated spec and reduces to 0.
pub fn reduce_outcomes(outcomes: &[StageOutcome]) -> i32 {
    outcomes
        .iter()
        .find(|o| matches!(o, StageOutcome::LaunchFailed { .. }))
        .or_else(|| outcomes.last())
        .map(StageOutcome::code)
        .unwrap_or(0)
}

/// Executes one round of a pipeline.
#[async_trait]
pub trait RoundExecutor: Send + Sync {
    /// Run `spec` once as round number `round` and report the outcome.
    async fn execute(&self, spec: &PipelineSpec, round: u64) -> RoundResult;
}

/// Round executor backed by real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRoundExecutor;

#[async_trait]
impl RoundExecutor for ProcessRoundExecutor {
    async fn execute(&self, spec: &PipelineSpec, round: u64) -> RoundResult {
        let started_at = Utc::now();
        let start = Instant::now();

        let reports = PipelineLauncher::run(spec).await;

        RoundResult::from_reports(
            round,
            reports,
            started_at,
            start.elapsed().as_millis() as u64,
        )
    }
}
