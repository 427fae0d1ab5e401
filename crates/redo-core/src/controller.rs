//! Repeat control: drive rounds under the fixed-count or until-success policy.

use crate::pipeline::{RoundExecutor, RoundResult};
use crate::spec::{ExecutionPolicy, PipelineSpec};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

/// Controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Running,
    Stopped,
}

/// Decide the next state after `rounds` rounds, the latest being `last`.
///
/// Until-success runs without an upper bound; a permanently failing
/// pipeline loops forever.
pub fn next_state(policy: ExecutionPolicy, rounds: u64, last: &RoundResult) -> ControllerState {
    let stop = match policy {
        ExecutionPolicy::UntilSuccess => last.succeeded(),
        ExecutionPolicy::Fixed(count) => rounds >= u64::from(count),
    };
    if stop {
        ControllerState::Stopped
    } else {
        ControllerState::Running
    }
}

/// Summary of a complete run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Identifier attached to every round's log span.
    pub run_id: String,

    /// Rounds executed.
    pub rounds: u64,

    /// Rounds whose overall code was 0.
    pub successes: u64,

    /// The final round.
    pub last: Option<RoundResult>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl RunSummary {
    /// Whether the final round succeeded.
    pub fn last_succeeded(&self) -> bool {
        self.last.as_ref().is_some_and(RoundResult::succeeded)
    }
}

/// Top-level loop that re-runs a pipeline until its policy is satisfied.
pub struct RepeatController<E> {
    executor: E,
}

impl<E: RoundExecutor> RepeatController<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Run rounds of `spec` until the controller reaches `Stopped`.
    ///
    /// Every round spawns fresh processes from the same stage definitions.
    /// Round failures never become errors here; they only feed the policy.
    pub async fn run(&self, spec: &PipelineSpec) -> RunSummary {
        let run_id = Uuid::new_v4().to_string();
        let policy = spec.policy();
        let start = Instant::now();

        info!(run_id = %run_id, stages = spec.stages().len(), ?policy, "Starting run");

        let mut state = ControllerState::Running;
        let mut rounds = 0u64;
        let mut successes = 0u64;
        let mut last = None;

        while state == ControllerState::Running {
            let round = rounds + 1;
            let span = info_span!("round", run_id = %run_id, round);
            let result = self.executor.execute(spec, round).instrument(span).await;
            rounds = round;

            if result.succeeded() {
                successes += 1;
            }
            debug!(
                run_id = %run_id,
                round,
                overall_code = result.overall_code,
                timed_out = result.timed_out(),
                "Round finished"
            );

            state = next_state(policy, rounds, &result);
            last = Some(result);
        }

        let summary = RunSummary {
            run_id,
            rounds,
            successes,
            last,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(run_id = %summary.run_id, rounds, successes, "Run stopped");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{StageOutcome, StageReport};
    use crate::spec::{Limits, RoundOptions};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Executor that fails until `succeed_from` rounds have run.
    struct ScriptedExecutor {
        succeed_from: u64,
        calls: AtomicU64,
    }

    impl ScriptedExecutor {
        fn new(succeed_from: u64) -> Self {
            Self {
                succeed_from,
                calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl RoundExecutor for ScriptedExecutor {
        async fn execute(&self, _spec: &PipelineSpec, round: u64) -> RoundResult {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            assert_eq!(call, round, "rounds must be numbered consecutively");
            let code = if call >= self.succeed_from { 0 } else { 1 };
            RoundResult::from_reports(
                round,
                vec![StageReport {
                    program: "scripted".to_string(),
                    outcome: StageOutcome::Exited { code },
                    duration_ms: 0,
                }],
                Utc::now(),
                0,
            )
        }
    }

    fn spec(repeat_count: u32, until_success: bool) -> PipelineSpec {
        PipelineSpec::from_tokens(
            &["scripted".to_string()],
            RoundOptions {
                timeout: None,
                repeat_count,
                until_success,
            },
            Limits::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fixed_policy_runs_exact_count_despite_failures() {
        let controller = RepeatController::new(ScriptedExecutor::new(u64::MAX));
        let summary = controller.run(&spec(3, false)).await;

        assert_eq!(summary.rounds, 3);
        assert_eq!(summary.successes, 0);
        assert!(!summary.last_succeeded());
        assert_eq!(controller.executor.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fixed_policy_does_not_stop_on_success() {
        let controller = RepeatController::new(ScriptedExecutor::new(1));
        let summary = controller.run(&spec(4, false)).await;

        assert_eq!(summary.rounds, 4);
        assert_eq!(summary.successes, 4);
    }

    #[tokio::test]
    async fn test_until_success_stops_on_first_success() {
        let controller = RepeatController::new(ScriptedExecutor::new(3));
        let summary = controller.run(&spec(1, true)).await;

        assert_eq!(summary.rounds, 3);
        assert_eq!(summary.successes, 1);
        assert!(summary.last_succeeded());
    }

    #[tokio::test]
    async fn test_until_success_ignores_repeat_count() {
        let controller = RepeatController::new(ScriptedExecutor::new(7));
        let summary = controller.run(&spec(2, true)).await;

        assert_eq!(summary.rounds, 7);
    }

    #[test]
    fn test_next_state_transitions() {
        let failed = RoundResult::from_reports(1, vec![], Utc::now(), 0);
        // An empty round reduces to 0; build a failing one explicitly.
        let failed = RoundResult {
            overall_code: 1,
            ..failed
        };

        assert_eq!(
            next_state(ExecutionPolicy::Fixed(2), 1, &failed),
            ControllerState::Running
        );
        assert_eq!(
            next_state(ExecutionPolicy::Fixed(2), 2, &failed),
            ControllerState::Stopped
        );
        assert_eq!(
            next_state(ExecutionPolicy::UntilSuccess, 1000, &failed),
            ControllerState::Running
        );
    }
}
