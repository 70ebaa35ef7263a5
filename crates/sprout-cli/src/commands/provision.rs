use super::{json_pretty, lock_store, print_report, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use sprout_core::{CoreError, Engine, ProvisionOptions};
use std::path::Path;

/// Show the persisted report of the phase a hook failure came from.
pub(crate) fn print_failed_phase(engine: &Engine, manifest: &Path, error: &CoreError) {
    let phase = match error {
        CoreError::HookFailed { phase, .. } | CoreError::Interrupted(phase) => *phase,
        _ => return,
    };
    let Ok((_, _, identity, _)) = engine.resolve_manifest(manifest) else {
        return;
    };
    if let Some(report) = engine
        .inspect(&identity.env_id)
        .ok()
        .and_then(|meta| meta.last_report(phase).cloned())
    {
        print_report(&report);
    }
}

pub fn run(
    engine: &Engine,
    store_path: &Path,
    manifest: &Path,
    options: &ProvisionOptions,
    json: bool,
) -> Result<u8, String> {
    let _lock = lock_store(store_path)?;

    let pb = if json {
        None
    } else {
        Some(spinner("provisioning environment..."))
    };

    let result = match engine.provision_with_options(manifest, options) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "environment provisioned");
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "provisioning failed");
                print_failed_phase(engine, manifest, &e);
            }
            return Err(e.to_string());
        }
    };

    if json {
        let payload = serde_json::json!({
            "env_id": result.identity.env_id,
            "short_id": result.identity.short_id,
            "name": options.name,
            "status": "created",
            "packages": result.lock_file.resolved_packages,
            "on_create": result.create_report,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        print_report(&result.create_report);
        match &options.name {
            Some(n) => println!("provisioned environment '{n}' ({})", result.identity.short_id),
            None => println!("provisioned environment {}", result.identity.short_id),
        }
        println!("env_id: {}", result.identity.env_id);
    }
    Ok(EXIT_SUCCESS)
}
