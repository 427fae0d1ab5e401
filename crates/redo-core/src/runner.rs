//! Pipeline launching: spawn every stage, wire the pipes, reap every child.

use crate::spec::PipelineSpec;
use crate::stage::Stage;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Exit code reported for a stage killed by its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when a stage's program could not be executed.
pub const CANNOT_EXECUTE_EXIT_CODE: i32 = 126;

/// Exit code reported when a stage's program could not be found.
pub const NOT_FOUND_EXIT_CODE: i32 = 127;

/// How one stage of a round ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageOutcome {
    /// Process exited normally with this code.
    Exited { code: i32 },

    /// Process was terminated by a signal it did not arrange itself.
    Signaled { signal: i32 },

    /// Process outlived the round timeout and was killed.
    TimedOut,

    /// Process could not be spawned at all.
    LaunchFailed { code: i32, reason: String },

    /// Process was spawned but its status could not be collected.
    WaitFailed { reason: String },
}

impl StageOutcome {
    /// Shell-style status code for this outcome.
    pub fn code(&self) -> i32 {
        match self {
            StageOutcome::Exited { code } => *code,
            StageOutcome::Signaled { signal } => 128 + signal,
            StageOutcome::TimedOut => TIMEOUT_EXIT_CODE,
            StageOutcome::LaunchFailed { code, .. } => *code,
            StageOutcome::WaitFailed { .. } => 1,
        }
    }

    /// Whether this stage exited cleanly with status 0.
    pub fn passed(&self) -> bool {
        matches!(self, StageOutcome::Exited { code: 0 })
    }

    fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return StageOutcome::Exited { code };
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return StageOutcome::Signaled { signal };
            }
        }
        StageOutcome::WaitFailed {
            reason: format!("unrecognised exit status: {}", status),
        }
    }

    fn from_spawn_error(err: &io::Error) -> Self {
        let code = match err.kind() {
            io::ErrorKind::NotFound => NOT_FOUND_EXIT_CODE,
            _ => CANNOT_EXECUTE_EXIT_CODE,
        };
        StageOutcome::LaunchFailed {
            code,
            reason: err.to_string(),
        }
    }
}

/// Result of one stage within a round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageReport {
    /// Program the stage ran.
    pub program: String,

    /// How the stage ended.
    pub outcome: StageOutcome,

    /// Wall-clock time from spawn to reap, in milliseconds.
    pub duration_ms: u64,
}

/// A stage slot between spawn and reap.
enum Slot {
    Running {
        child: Child,
        started: Instant,
        deadline: Option<Instant>,
    },
    Failed(StageOutcome),
}

/// Spawns a pipeline as a chain of child processes and collects every stage.
pub struct PipelineLauncher;

impl PipelineLauncher {
    /// Run every stage of `spec` once and return one report per stage.
    ///
    /// Stage 0 reads the caller's stdin and the last stage writes the caller's
    /// stdout; every boundary in between is a fresh pipe. All children are
    /// reaped before this returns, whether they exit, time out or fail to start.
    pub async fn run(spec: &PipelineSpec) -> Vec<StageReport> {
        let timeout = spec.timeout().filter(|t| !t.is_zero());
        let slots = Self::spawn_all(spec.stages(), timeout);

        let waits = spec
            .stages()
            .iter()
            .zip(slots)
            .enumerate()
            .map(|(index, (stage, slot))| Self::collect(index, stage, slot));

        join_all(waits).await
    }

    fn spawn_all(stages: &[Stage], timeout: Option<Duration>) -> Vec<Slot> {
        let Some(last) = stages.len().checked_sub(1) else {
            return Vec::new();
        };
        let mut slots = Vec::with_capacity(stages.len());
        let mut upstream: Option<Stdio> = None;

        for (index, stage) in stages.iter().enumerate() {
            let stdin = match upstream.take() {
                Some(pipe) => pipe,
                None if index == 0 => Stdio::inherit(),
                // Upstream never started; give this stage an immediate EOF.
                None => Stdio::null(),
            };
            let stdout = if index == last {
                Stdio::inherit()
            } else {
                Stdio::piped()
            };

            let started = Instant::now();
            // The command owns the parent's copy of the upstream read end, so
            // dropping it right after spawn is what lets EOF reach this stage.
            let spawned = {
                let mut command = Command::new(&stage.program);
                command
                    .args(&stage.args)
                    .stdin(stdin)
                    .stdout(stdout)
                    .stderr(Stdio::inherit())
                    .kill_on_drop(true);
                command.spawn()
            };

            match spawned {
                Ok(mut child) => {
                    debug!(stage = index, program = %stage.program, pid = ?child.id(), "Spawned stage");
                    if index != last {
                        upstream = child.stdout.take().and_then(|out| {
                            match TryInto::<Stdio>::try_into(out) {
                                Ok(pipe) => Some(pipe),
                                Err(e) => {
                                    warn!(stage = index, error = %e, "Could not hand stage output downstream");
                                    None
                                }
                            }
                        });
                    }
                    slots.push(Slot::Running {
                        child,
                        started,
                        deadline: timeout.map(|t| started + t),
                    });
                }
                Err(e) => {
                    warn!(stage = index, program = %stage.program, error = %e, "Failed to launch stage");
                    slots.push(Slot::Failed(StageOutcome::from_spawn_error(&e)));
                }
            }
        }

        slots
    }

    async fn collect(index: usize, stage: &Stage, slot: Slot) -> StageReport {
        let (outcome, duration_ms) = match slot {
            Slot::Failed(outcome) => (outcome, 0),
            Slot::Running {
                mut child,
                started,
                deadline,
            } => {
                let outcome = Self::wait(index, stage, &mut child, deadline).await;
                (outcome, started.elapsed().as_millis() as u64)
            }
        };

        debug!(stage = index, program = %stage.program, ?outcome, "Stage finished");
        StageReport {
            program: stage.program.clone(),
            outcome,
            duration_ms,
        }
    }

    /// Wait for one child, killing it if it outlives its own deadline.
    ///
    /// Siblings are untouched; they see EOF or a broken pipe once this
    /// stage's descriptors close.
    async fn wait(
        index: usize,
        stage: &Stage,
        child: &mut Child,
        deadline: Option<Instant>,
    ) -> StageOutcome {
        let status = match deadline {
            None => child.wait().await,
            Some(deadline) => match tokio::time::timeout_at(deadline, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(stage = index, program = %stage.program, "Command timed out");
                    if let Err(e) = child.start_kill() {
                        debug!(stage = index, error = %e, "Kill after timeout failed");
                    }
                    // Reap so the slot never outlives the round.
                    if let Err(e) = child.wait().await {
                        warn!(stage = index, error = %e, "Failed to reap timed out stage");
                    }
                    return StageOutcome::TimedOut;
                }
            },
        };

        match status {
            Ok(status) => StageOutcome::from_status(status),
            Err(e) => {
                warn!(stage = index, program = %stage.program, error = %e, "Failed to wait for stage");
                StageOutcome::WaitFailed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
