//! Sequential execution of lifecycle hooks.
//!
//! Hooks of a phase run one at a time in declaration order as child processes
//! of the environment. Each produces a `HookOutcome`; together they form the
//! phase's `PhaseReport`. A shutdown request is only observed between hooks.

use crate::concurrency::shutdown_requested;
use crate::CoreError;
use sprout_runtime::{EnvironmentHandle, ExitOutcome, ProcessRunner, RuntimeError};
use sprout_schema::{NormalizedHook, OnStartFailure, Phase};
use sprout_store::{HookOutcome, HookStatus, PhaseReport};
use std::time::Instant;
use tracing::{info, warn};

pub const PHASE_VAR: &str = "SPROUT_PHASE";
pub const HOOK_VAR: &str = "SPROUT_HOOK";

/// What happens to the remaining hooks of a phase after one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Skip the remaining hooks.
    Abort,
    /// Run every hook; the phase still fails.
    Continue,
}

impl FailurePolicy {
    /// `onCreate` always aborts; `onStart` follows the manifest.
    pub fn for_phase(phase: Phase, on_start: OnStartFailure) -> Self {
        match (phase, on_start) {
            (Phase::OnStart, OnStartFailure::Continue) => FailurePolicy::Continue,
            _ => FailurePolicy::Abort,
        }
    }
}

pub struct HookExecutor<'a> {
    handle: &'a EnvironmentHandle,
    interrupted: Box<dyn Fn() -> bool + 'a>,
}

impl<'a> HookExecutor<'a> {
    pub fn new(handle: &'a EnvironmentHandle) -> Self {
        Self {
            handle,
            interrupted: Box::new(shutdown_requested),
        }
    }

    /// Replace the shutdown check consulted before each hook.
    #[must_use]
    pub fn with_interrupt(mut self, check: impl Fn() -> bool + 'a) -> Self {
        self.interrupted = Box::new(check);
        self
    }

    pub fn run_phase(
        &self,
        phase: Phase,
        hooks: &[NormalizedHook],
        policy: FailurePolicy,
    ) -> PhaseReport {
        let started_at = chrono::Utc::now().to_rfc3339();
        let mut outcomes = Vec::with_capacity(hooks.len());
        let mut halted = false;
        let mut interrupted = false;

        for (index, hook) in hooks.iter().enumerate() {
            if !halted && (self.interrupted)() {
                warn!(
                    "{phase}: shutdown requested, skipping {} remaining hook(s)",
                    hooks.len() - index
                );
                halted = true;
                interrupted = true;
            }
            if halted {
                outcomes.push(skipped(hook));
                continue;
            }

            let outcome = self.run_hook(phase, hook);
            if outcome.status.is_failure() {
                warn!("{phase} hook '{}' {}", hook.name, outcome.status);
                if policy == FailurePolicy::Abort {
                    halted = true;
                }
            } else {
                info!(
                    "{phase} hook '{}' succeeded in {} ms",
                    hook.name, outcome.duration_ms
                );
            }
            outcomes.push(outcome);
        }

        PhaseReport {
            phase,
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            hooks: outcomes,
            interrupted,
        }
    }

    fn run_hook(&self, phase: Phase, hook: &NormalizedHook) -> HookOutcome {
        info!("{phase}: running hook '{}': {}", hook.name, hook.command);
        let start = Instant::now();
        let status = match ProcessRunner::new(self.handle)
            .env(PHASE_VAR, phase.as_str())
            .env(HOOK_VAR, hook.name.as_str())
            .run(&hook.command)
        {
            Ok(ExitOutcome::Exited(0)) => HookStatus::Succeeded,
            Ok(ExitOutcome::Exited(code)) => HookStatus::Failed {
                exit_code: Some(code),
                signal: None,
            },
            Ok(ExitOutcome::Signaled(sig)) => HookStatus::Failed {
                exit_code: None,
                signal: Some(sig),
            },
            Err(RuntimeError::SpawnFailed { source, .. }) => HookStatus::SpawnFailed {
                error: source.to_string(),
            },
            Err(e) => HookStatus::SpawnFailed {
                error: e.to_string(),
            },
        };
        HookOutcome {
            name: hook.name.clone(),
            command: hook.command.to_string(),
            status,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

fn skipped(hook: &NormalizedHook) -> HookOutcome {
    HookOutcome {
        name: hook.name.clone(),
        command: hook.command.to_string(),
        status: HookStatus::Skipped,
        duration_ms: 0,
    }
}

/// Turn an unsuccessful report into the error the caller returns.
pub fn phase_error(report: &PhaseReport) -> Option<CoreError> {
    if let Some(failed) = report.first_failure() {
        return Some(CoreError::HookFailed {
            phase: report.phase,
            hook: failed.name.clone(),
            status: failed.status.to_string(),
        });
    }
    if report.interrupted {
        return Some(CoreError::Interrupted(report.phase));
    }
    None
}
