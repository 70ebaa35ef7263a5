use super::provision::print_failed_phase;
use super::{json_pretty, lock_store, print_report, EXIT_SUCCESS};
use sprout_core::{Engine, ProvisionOptions};
use std::path::Path;

pub fn run(
    engine: &Engine,
    store_path: &Path,
    manifest: &Path,
    options: &ProvisionOptions,
    json: bool,
) -> Result<u8, String> {
    let _lock = lock_store(store_path)?;

    let result = match engine.up(manifest, options) {
        Ok(r) => r,
        Err(e) => {
            if !json {
                print_failed_phase(engine, manifest, &e);
            }
            return Err(e.to_string());
        }
    };

    if json {
        let payload = serde_json::json!({
            "env_id": result.identity.env_id,
            "short_id": result.identity.short_id,
            "provisioned": result.provisioned.is_some(),
            "status": "started",
            "start_count": result.start.start_count,
            "on_create": result.provisioned.as_ref().map(|p| &p.create_report),
            "on_start": result.start.report,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        if let Some(p) = &result.provisioned {
            print_report(&p.create_report);
            println!("provisioned environment {}", result.identity.short_id);
        }
        print_report(&result.start.report);
        println!(
            "started {} (start #{})",
            result.identity.short_id, result.start.start_count
        );
    }
    Ok(EXIT_SUCCESS)
}
