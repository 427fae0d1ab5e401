//! Pipeline stage definitions.

use crate::error::{RedoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One external program plus its arguments within a pipeline.
///
/// The program is resolved the way a shell would: a bare name is looked up
/// on `PATH`, anything containing a path separator is used as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage {
    /// Program to execute.
    pub program: String,

    /// Arguments passed verbatim, not including the program itself.
    pub args: Vec<String>,
}

impl Stage {
    /// Create a stage, rejecting an empty program name.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Result<Self> {
        let program = program.into();
        if program.is_empty() {
            return Err(RedoError::EmptyStage { index: 0 });
        }
        Ok(Self { program, args })
    }

    /// Build a stage from a token run: first token is the program.
    ///
    /// `index` is only used to report which stage was empty.
    pub fn from_tokens(index: usize, tokens: &[String]) -> Result<Self> {
        match tokens.split_first() {
            Some((program, args)) if !program.is_empty() => Ok(Self {
                program: program.clone(),
                args: args.to_vec(),
            }),
            _ => Err(RedoError::EmptyStage { index }),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
