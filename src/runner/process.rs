use itertools::Itertools;
use log::{info, warn};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

use super::{ExecutionResult, PlaybookRunner, RunRequest};
use crate::config::AppConfig;
use crate::error::BridgeError;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static HANDLER: Once = Once::new();

/// Keep this process alive on SIGINT/SIGTERM and remember that it happened.
fn install_interrupt_handler() {
    HANDLER.call_once(|| {
        if let Err(e) = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst)) {
            warn!("Could not install interrupt handler: {}", e);
        }
    });
}

#[cfg(unix)]
fn terminating_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

fn classify(program: &str, status: &ExitStatus, interrupted: bool) -> ExecutionResult {
    if let Some(signal) = terminating_signal(status) {
        return ExecutionResult::interrupted(program, Some(signal));
    }
    if interrupted {
        return ExecutionResult::interrupted(program, None);
    }
    match status.code() {
        Some(0) => ExecutionResult::success(),
        Some(code) => ExecutionResult::failed(program, code),
        None => ExecutionResult::interrupted(program, None),
    }
}

/// Runs playbooks with an external program, `ansible-playbook` by default.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    /// Arguments placed before the playbook, e.g. `sh wrapper.sh`.
    leading_args: Vec<String>,
    ansible_config: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>) -> Self {
        ProcessRunner {
            program: program.into(),
            leading_args: Vec::new(),
            ansible_config: None,
        }
    }

    /// Use the configured runner, exporting `ANSIBLE_CONFIG` if the file exists.
    ///
    /// The runner setting is split on whitespace into a program and its leading arguments.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut words = config.runner.split_whitespace().map(String::from);
        let program = words.next().unwrap_or_else(|| config.runner.clone());
        let ansible_config = config
            .ansible_config_path
            .is_file()
            .then(|| config.ansible_config_path.clone());
        ProcessRunner {
            program,
            leading_args: words.collect(),
            ansible_config,
        }
    }

    pub fn with_ansible_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.ansible_config = Some(path.into());
        self
    }
}

impl PlaybookRunner for ProcessRunner {
    fn run(&self, request: &RunRequest) -> Result<ExecutionResult, BridgeError> {
        let args = request.runner_args()?;
        install_interrupt_handler();
        INTERRUPTED.store(false, Ordering::SeqCst);

        info!(
            "Running: {} {}",
            self.program,
            self.leading_args.iter().chain(&args).join(" ")
        );

        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(path) = &self.ansible_config {
            command.env("ANSIBLE_CONFIG", path);
        }

        let mut child = command.spawn().map_err(|source| BridgeError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let status = child.wait().map_err(|source| BridgeError::Wait {
            program: self.program.clone(),
            source,
        })?;

        Ok(classify(
            &self.program,
            &status,
            INTERRUPTED.load(Ordering::SeqCst),
        ))
    }
}
