//! Pipeline specification, validation limits and option value parsing.

use crate::error::{RedoError, Result};
use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token that separates pipeline stages.
pub const PIPE_TOKEN: &str = "|";

/// Default cap on stages per pipeline.
pub const DEFAULT_MAX_STAGES: usize = 32;

/// Default cap on arguments per stage (the program counts as one).
pub const DEFAULT_MAX_ARGS: usize = 32;

/// Validation limits applied when building a [`PipelineSpec`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Limits {
    pub max_stages: usize,
    pub max_args_per_stage: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_stages: DEFAULT_MAX_STAGES,
            max_args_per_stage: DEFAULT_MAX_ARGS,
        }
    }
}

/// Round-level parameters that sit alongside the stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundOptions {
    /// Per-stage wall-clock limit; `None` is unbounded.
    pub timeout: Option<Duration>,

    /// Rounds to run under the fixed-repeat policy.
    pub repeat_count: u32,

    /// Repeat until a round succeeds, ignoring `repeat_count`.
    pub until_success: bool,
}

impl Default for RoundOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            repeat_count: 1,
            until_success: false,
        }
    }
}

/// How many rounds the controller runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPolicy {
    /// Exactly this many rounds, regardless of outcome.
    Fixed(u32),

    /// Unbounded until one round's overall code is 0.
    UntilSuccess,
}

/// A validated pipeline plus its round parameters.
///
/// Deserialization goes through [`PipelineSpec::new`], so a decoded spec
/// obeys the same rules as one built from tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawPipelineSpec")]
pub struct PipelineSpec {
    stages: Vec<Stage>,
    timeout: Option<Duration>,
    repeat_count: u32,
    until_success: bool,
}

/// Wire shape of [`PipelineSpec`] before validation.
#[derive(Deserialize)]
struct RawPipelineSpec {
    stages: Vec<Stage>,
    timeout: Option<Duration>,
    repeat_count: u32,
    until_success: bool,
}

impl TryFrom<RawPipelineSpec> for PipelineSpec {
    type Error = RedoError;

    fn try_from(raw: RawPipelineSpec) -> Result<Self> {
        Self::new(
            raw.stages,
            RoundOptions {
                timeout: raw.timeout,
                repeat_count: raw.repeat_count,
                until_success: raw.until_success,
            },
        )
    }
}

impl PipelineSpec {
    /// Build a spec from already-constructed stages.
    pub fn new(stages: Vec<Stage>, options: RoundOptions) -> Result<Self> {
        if stages.is_empty() {
            return Err(RedoError::EmptyPipeline);
        }
        if options.repeat_count == 0 {
            return Err(RedoError::InvalidRepeat("0".to_string()));
        }
        Ok(Self {
            stages,
            timeout: options.timeout,
            repeat_count: options.repeat_count,
            until_success: options.until_success,
        })
    }

    /// Split command tokens on `|` into stages and validate them against `limits`.
    pub fn from_tokens(tokens: &[String], options: RoundOptions, limits: Limits) -> Result<Self> {
        if tokens.is_empty() {
            return Err(RedoError::EmptyPipeline);
        }

        let mut stages = Vec::new();
        for (index, segment) in tokens.split(|t| t == PIPE_TOKEN).enumerate() {
            if index >= limits.max_stages {
                return Err(RedoError::TooManyStages {
                    limit: limits.max_stages,
                });
            }
            let stage = Stage::from_tokens(index, segment)?;
            if segment.len() > limits.max_args_per_stage {
                return Err(RedoError::TooManyArguments {
                    program: stage.program,
                    limit: limits.max_args_per_stage,
                });
            }
            stages.push(stage);
        }

        Self::new(stages, options)
    }

    /// Stages in pipeline order; never empty.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Per-stage wall-clock limit; `None` is unbounded.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Rounds under the fixed-repeat policy; always at least 1.
    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    pub fn until_success(&self) -> bool {
        self.until_success
    }

    /// The policy the controller applies. `until_success` wins over the count.
    pub fn policy(&self) -> ExecutionPolicy {
        if self.until_success {
            ExecutionPolicy::UntilSuccess
        } else {
            ExecutionPolicy::Fixed(self.repeat_count)
        }
    }
}

/// Parse a timeout of the form `N`, `Ns`, `Nm` or `Nh`.
///
/// A bare number is seconds. Zero yields `Duration::ZERO`, which callers
/// treat as "no timeout".
pub fn parse_timeout(value: &str) -> Result<Duration> {
    let digits_end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (number, suffix) = value.split_at(digits_end);
    if number.is_empty() {
        return Err(RedoError::InvalidTimeout(value.to_string()));
    }
    let raw: u64 = number
        .parse()
        .map_err(|_| RedoError::InvalidTimeout(value.to_string()))?;

    let mut units = suffix.chars();
    let multiplier = match (units.next(), units.next()) {
        (None, _) | (Some('s'), None) => 1,
        (Some('m'), None) => 60,
        (Some('h'), None) => 3600,
        (Some(unit), None) => {
            return Err(RedoError::InvalidTimeUnit {
                value: value.to_string(),
                unit,
            })
        }
        (Some(_), Some(_)) => return Err(RedoError::InvalidTimeout(value.to_string())),
    };

    raw.checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| RedoError::InvalidTimeout(value.to_string()))
}

/// Parse a repeat count; must be a positive integer.
pub fn parse_repeat(value: &str) -> Result<u32> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(RedoError::InvalidRepeat(value.to_string())),
    }
}
