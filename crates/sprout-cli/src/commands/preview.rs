use super::{resolve_env_id, EXIT_FAILURE, EXIT_SUCCESS};
use sprout_core::Engine;
use tracing::info;

/// Launch a preview in the foreground and wait for it to exit.
pub fn run(engine: &Engine, env_id: &str, preview_id: &str) -> Result<u8, String> {
    let resolved = resolve_env_id(engine, env_id)?;
    let mut child = engine
        .launch_preview(&resolved, preview_id)
        .map_err(|e| e.to_string())?;
    info!("preview '{preview_id}' running as pid {}", child.id());
    let status = child
        .wait()
        .map_err(|e| format!("waiting for preview '{preview_id}': {e}"))?;
    if status.success() {
        Ok(EXIT_SUCCESS)
    } else {
        eprintln!("preview '{preview_id}' exited with {status}");
        Ok(EXIT_FAILURE)
    }
}
