use serde::{Deserialize, Serialize};
use sprout_schema::Phase;

/// How a single hook ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HookStatus {
    Succeeded,
    /// Non-zero exit, or termination by `signal` when `exit_code` is `None`.
    Failed {
        exit_code: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal: Option<i32>,
    },
    /// The process could not be spawned at all.
    SpawnFailed { error: String },
    /// Not run because an earlier hook failed or shutdown was requested.
    Skipped,
}

impl HookStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::SpawnFailed { .. })
    }
}

impl std::fmt::Display for HookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed {
                exit_code: Some(code),
                ..
            } => write!(f, "failed (exit code {code})"),
            Self::Failed {
                signal: Some(sig), ..
            } => write!(f, "failed (signal {sig})"),
            Self::Failed { .. } => write!(f, "failed"),
            Self::SpawnFailed { error } => write!(f, "spawn failed: {error}"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HookOutcome {
    pub name: String,
    /// Display form of the executed command.
    pub command: String,
    pub status: HookStatus,
    pub duration_ms: u64,
}

/// Result of running every hook of one phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub started_at: String,
    pub finished_at: String,
    pub hooks: Vec<HookOutcome>,
    #[serde(default)]
    pub interrupted: bool,
}

impl PhaseReport {
    pub fn succeeded(&self) -> bool {
        !self.interrupted && self.hooks.iter().all(|h| h.status == HookStatus::Succeeded)
    }

    pub fn first_failure(&self) -> Option<&HookOutcome> {
        self.hooks.iter().find(|h| h.status.is_failure())
    }

    /// Names of hooks that actually ran, in execution order.
    pub fn executed(&self) -> Vec<&str> {
        self.hooks
            .iter()
            .filter(|h| h.status != HookStatus::Skipped)
            .map(|h| h.name.as_str())
            .collect()
    }
}
