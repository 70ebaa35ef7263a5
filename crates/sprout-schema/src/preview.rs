use crate::command::Command;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder argument replaced by the preview's port at launch time.
pub const PORT_PLACEHOLDER: &str = "$PORT";

/// A declared long-running process an external host may launch and expose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreviewDescriptor {
    pub id: String,
    pub manager: String,
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl PreviewDescriptor {
    /// The concrete invocation: declared env injected, `$PORT` substituted.
    ///
    /// Returns `None` only for an empty command, which normalization rejects.
    pub fn to_command(&self) -> Option<Command> {
        let port = self.port.map(|p| p.to_string());
        let argv: Vec<String> = self
            .command
            .iter()
            .map(|arg| match &port {
                Some(p) if arg == PORT_PLACEHOLDER => p.clone(),
                _ => arg.clone(),
            })
            .collect();
        let mut cmd = Command::from_argv(&argv).ok()?;
        cmd.env.clone_from(&self.env);
        if let Some(p) = port {
            cmd.env.entry("PORT".to_owned()).or_insert(p);
        }
        Some(cmd)
    }
}

/// Preview descriptors read by a host process manager.
///
/// Carries no execution logic. When disabled, descriptors are still parsed
/// and validated but none are launchable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreviewRegistry {
    pub enabled: bool,
    pub previews: Vec<PreviewDescriptor>,
}

impl PreviewRegistry {
    pub fn launchable(&self) -> &[PreviewDescriptor] {
        if self.enabled {
            &self.previews
        } else {
            &[]
        }
    }

    pub fn get(&self, id: &str) -> Option<&PreviewDescriptor> {
        self.previews.iter().find(|p| p.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.previews.is_empty()
    }
}
