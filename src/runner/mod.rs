//! Running a playbook through the external runner.

mod process;

use itertools::Itertools;
use std::path::PathBuf;

use crate::args::GlobalOptions;
use crate::error::{BridgeError, EXIT_INTERRUPTED, EXIT_SUCCESS};
use crate::vars::VariableSet;

pub use process::ProcessRunner;

/// Everything needed for one runner invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub playbook: PathBuf,
    pub inventory: PathBuf,
    pub globals: GlobalOptions,
    pub variables: VariableSet,
}

impl RunRequest {
    /// Arguments following the runner program.
    pub fn runner_args(&self) -> Result<Vec<String>, BridgeError> {
        let mut args = vec![
            self.playbook.display().to_string(),
            "--inventory".to_string(),
            self.inventory.display().to_string(),
        ];

        if !self.globals.targets.is_empty() {
            args.push("--limit".to_string());
            args.push(self.globals.targets.iter().join(":"));
        }

        if self.globals.verbose > 0 {
            args.push(format!("-{}", "v".repeat(usize::from(self.globals.verbose))));
        }

        if self.globals.check {
            args.push("--check".to_string());
        }

        if self.globals.ask_pass {
            args.push("-k".to_string());
        }

        if let Some(key) = &self.globals.private_key {
            args.push("--private-key".to_string());
            args.push(key.clone());
        }

        for extra in &self.globals.extra_vars {
            args.push("-e".to_string());
            args.push(extra.clone());
        }

        if !self.variables.is_empty() {
            args.push("-e".to_string());
            args.push(self.variables.to_json()?);
        }

        Ok(args)
    }
}

/// Terminal state of a runner invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The runner exited with this non-zero code.
    Failed(i32),
    /// The runner was killed by a signal, or we were asked to stop.
    Interrupted { signal: Option<i32> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub outcome: Outcome,
    pub diagnostic: Option<String>,
}

impl ExecutionResult {
    pub fn success() -> Self {
        ExecutionResult {
            outcome: Outcome::Success,
            diagnostic: None,
        }
    }

    pub fn failed(program: &str, code: i32) -> Self {
        ExecutionResult {
            outcome: Outcome::Failed(code),
            diagnostic: Some(format!("{} exited with code {}", program, code)),
        }
    }

    pub fn interrupted(program: &str, signal: Option<i32>) -> Self {
        let diagnostic = match signal {
            Some(signal) => format!("{} was terminated by signal {}", program, signal),
            None => format!("{} was interrupted", program),
        };
        ExecutionResult {
            outcome: Outcome::Interrupted { signal },
            diagnostic: Some(diagnostic),
        }
    }

    /// Process exit code reporting this result.
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            Outcome::Success => EXIT_SUCCESS,
            Outcome::Failed(code) => code,
            Outcome::Interrupted { .. } => EXIT_INTERRUPTED,
        }
    }
}

/// Executes playbooks. Blocks until the run is over.
#[cfg_attr(test, mockall::automock)]
pub trait PlaybookRunner {
    fn run(&self, request: &RunRequest) -> Result<ExecutionResult, BridgeError>;
}
