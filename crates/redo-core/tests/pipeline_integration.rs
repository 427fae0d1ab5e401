//! Integration tests for round execution and repeat control with real processes.

use redo_core::{
    Limits, PipelineSpec, ProcessRoundExecutor, RepeatController, RoundExecutor, RoundOptions,
    StageOutcome,
};
use std::path::Path;
use std::time::{Duration, Instant};

fn tokens(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn pipeline(words: &[&str], options: RoundOptions) -> PipelineSpec {
    PipelineSpec::from_tokens(&tokens(words), options, Limits::default()).expect("valid pipeline")
}

/// Shell snippet that appends a line to `counter` and succeeds from the `n`th run on.
fn counting_script(counter: &Path, succeed_from: u32) -> String {
    format!(
        "echo run >> '{path}'; test $(wc -l < '{path}') -ge {n}",
        path = counter.display(),
        n = succeed_from
    )
}

fn line_count(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

/// Test: all-passing stages produce overall code 0
#[tokio::test]
async fn test_all_passing_stages_succeed() {
    let spec = pipeline(
        &["echo", "hello", "|", "cat", "|", "wc", "-l"],
        RoundOptions::default(),
    );

    let result = ProcessRoundExecutor.execute(&spec, 1).await;

    assert!(result.succeeded(), "round should succeed: {:?}", result);
    assert_eq!(result.passed_count(), 3);
    assert_eq!(result.failed_count(), 0);
}

/// Test: last stage determines the round status
#[tokio::test]
async fn test_last_stage_determines_status() {
    let spec = pipeline(&["false", "|", "true"], RoundOptions::default());
    let result = ProcessRoundExecutor.execute(&spec, 1).await;
    assert!(result.succeeded(), "false | true should succeed");
    assert_eq!(result.stages[0].outcome, StageOutcome::Exited { code: 1 });

    let spec = pipeline(&["true", "|", "false"], RoundOptions::default());
    let result = ProcessRoundExecutor.execute(&spec, 1).await;
    assert!(!result.succeeded(), "true | false should fail");
    assert_eq!(result.overall_code, 1);
}

/// Test: launch failure of an upstream stage is surfaced for the round
#[tokio::test]
async fn test_launch_failure_surfaces_for_round() {
    let spec = pipeline(
        &["/nonexistent-binary-that-does-not-exist", "|", "cat"],
        RoundOptions::default(),
    );

    let result = ProcessRoundExecutor.execute(&spec, 1).await;

    assert!(!result.succeeded());
    assert_eq!(result.overall_code, 127);
    assert_eq!(result.stages.len(), 2, "sibling stage still recorded");
    assert!(result.stages[1].outcome.passed());
}

/// Test: a stage outliving the timeout is killed and reported, not hung
#[tokio::test]
async fn test_timeout_terminates_stage() {
    let spec = pipeline(
        &["sleep", "5"],
        RoundOptions {
            timeout: Some(Duration::from_secs(1)),
            ..RoundOptions::default()
        },
    );

    let start = Instant::now();
    let result = ProcessRoundExecutor.execute(&spec, 1).await;

    assert!(start.elapsed() < Duration::from_secs(4), "stage was not killed");
    assert!(result.timed_out());
    assert!(!result.succeeded());
    assert_eq!(result.stages[0].outcome, StageOutcome::TimedOut);
}

/// Test: fixed repeat count runs exactly N rounds regardless of outcome
#[tokio::test]
async fn test_fixed_repeat_runs_exact_rounds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let counter = dir.path().join("runs");
    let script = counting_script(&counter, u32::MAX);

    let spec = pipeline(
        &["sh", "-c", &script],
        RoundOptions {
            repeat_count: 3,
            ..RoundOptions::default()
        },
    );

    let summary = RepeatController::new(ProcessRoundExecutor).run(&spec).await;

    assert_eq!(summary.rounds, 3);
    assert_eq!(summary.successes, 0);
    assert_eq!(line_count(&counter), 3);
}

/// Test: until-success stops on the first successful round
#[tokio::test]
async fn test_until_success_stops_after_first_success() {
    let dir = tempfile::tempdir().expect("tempdir");
    let counter = dir.path().join("runs");
    let script = counting_script(&counter, 3);

    let spec = pipeline(
        &["sh", "-c", &script],
        RoundOptions {
            repeat_count: 1,
            until_success: true,
            ..RoundOptions::default()
        },
    );

    let summary = RepeatController::new(ProcessRoundExecutor).run(&spec).await;

    assert_eq!(summary.rounds, 3);
    assert!(summary.last_succeeded());
    assert_eq!(line_count(&counter), 3);
}

/// Test: rounds are independent; the same pipeline yields the same outcomes
#[tokio::test]
async fn test_rounds_are_idempotent() {
    let spec = pipeline(
        &["echo", "same", "|", "grep", "-q", "same"],
        RoundOptions::default(),
    );

    let first = ProcessRoundExecutor.execute(&spec, 1).await;
    let second = ProcessRoundExecutor.execute(&spec, 2).await;

    let outcomes = |r: &redo_core::RoundResult| {
        r.stages
            .iter()
            .map(|s| s.outcome.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(outcomes(&first), outcomes(&second));
    assert_eq!(first.overall_code, second.overall_code);
}

/// Test: many rounds do not leak descriptors or children
#[tokio::test]
async fn test_many_rounds_complete() {
    let spec = pipeline(
        &["echo", "x", "|", "cat", "|", "cat"],
        RoundOptions {
            repeat_count: 50,
            ..RoundOptions::default()
        },
    );

    let summary = RepeatController::new(ProcessRoundExecutor).run(&spec).await;

    assert_eq!(summary.rounds, 50);
    assert_eq!(summary.successes, 50);
}
