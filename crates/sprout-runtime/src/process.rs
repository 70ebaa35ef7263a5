use crate::handle::EnvironmentHandle;
use crate::RuntimeError;
use sprout_schema::Command;
use std::collections::BTreeMap;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command as ProcessCommand, ExitStatus, Stdio};
use tracing::debug;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited(i32),
    Signaled(i32),
}

impl ExitOutcome {
    pub fn from_status(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => ExitOutcome::Exited(code),
            (None, Some(sig)) => ExitOutcome::Signaled(sig),
            (None, None) => ExitOutcome::Exited(-1),
        }
    }

    pub fn success(self) -> bool {
        self == ExitOutcome::Exited(0)
    }
}

impl std::fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitOutcome::Exited(code) => write!(f, "exit code {code}"),
            ExitOutcome::Signaled(sig) => write!(f, "signal {sig}"),
        }
    }
}

/// Builds and runs child processes inside an environment.
///
/// Variables are layered, later wins: inherited environment, the handle's
/// base variables, PATH with the profile bin directory first, runner extras,
/// then the command's own overrides. stdio is inherited.
pub struct ProcessRunner<'a> {
    handle: &'a EnvironmentHandle,
    extra_env: BTreeMap<String, String>,
}

impl<'a> ProcessRunner<'a> {
    pub fn new(handle: &'a EnvironmentHandle) -> Self {
        Self {
            handle,
            extra_env: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.insert(key.into(), value.into());
        self
    }

    pub fn build(&self, command: &Command) -> Result<ProcessCommand, RuntimeError> {
        let path = self.handle.search_path(std::env::var_os("PATH"))?;
        let mut cmd = ProcessCommand::new(&command.program);
        cmd.args(&command.args)
            .current_dir(&self.handle.workdir)
            .envs(&self.handle.base_env)
            .env("PATH", path)
            .envs(&self.extra_env)
            .envs(&command.env)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        Ok(cmd)
    }

    /// Run to completion.
    pub fn run(&self, command: &Command) -> Result<ExitOutcome, RuntimeError> {
        debug!("exec: {command} (cwd {})", self.handle.workdir.display());
        let status = self
            .build(command)?
            .status()
            .map_err(|source| RuntimeError::SpawnFailed {
                program: command.program.clone(),
                source,
            })?;
        Ok(ExitOutcome::from_status(status))
    }

    /// Start without waiting; the caller owns the child.
    pub fn spawn(&self, command: &Command) -> Result<Child, RuntimeError> {
        debug!("spawn: {command} (cwd {})", self.handle.workdir.display());
        self.build(command)?
            .spawn()
            .map_err(|source| RuntimeError::SpawnFailed {
                program: command.program.clone(),
                source,
            })
    }
}
