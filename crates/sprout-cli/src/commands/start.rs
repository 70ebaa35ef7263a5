use super::{json_pretty, lock_store, print_report, resolve_env_id, EXIT_SUCCESS};
use sprout_core::{CoreError, Engine};
use sprout_schema::Phase;
use std::path::Path;

pub fn run(engine: &Engine, store_path: &Path, env_id: &str, json: bool) -> Result<u8, String> {
    let _lock = lock_store(store_path)?;
    let resolved = resolve_env_id(engine, env_id)?;

    match engine.start(&resolved) {
        Ok(result) => {
            if json {
                let payload = serde_json::json!({
                    "env_id": result.env_id,
                    "status": "started",
                    "start_count": result.start_count,
                    "on_start": result.report,
                });
                println!("{}", json_pretty(&payload)?);
            } else {
                print_report(&result.report);
                println!(
                    "started {} (start #{})",
                    &resolved[..12],
                    result.start_count
                );
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            if !json && matches!(e, CoreError::HookFailed { .. } | CoreError::Interrupted(_)) {
                if let Some(report) = engine
                    .inspect(&resolved)
                    .ok()
                    .and_then(|m| m.last_report(Phase::OnStart).cloned())
                {
                    print_report(&report);
                }
            }
            Err(e.to_string())
        }
    }
}
