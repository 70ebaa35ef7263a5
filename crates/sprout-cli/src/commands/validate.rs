use super::{json_pretty, EXIT_SUCCESS};
use sprout_core::Engine;
use std::path::Path;

pub fn run(engine: &Engine, manifest: &Path, json: bool) -> Result<u8, String> {
    let (_, normalized, identity, project_dir) = engine
        .resolve_manifest(manifest)
        .map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "status": "valid",
            "env_id": identity.env_id,
            "short_id": identity.short_id,
            "project_dir": project_dir,
            "manifest": normalized,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("manifest is valid");
    println!("env_id:      {}", identity.env_id);
    println!("channel:     {}", normalized.channel);
    println!("backend:     {}", normalized.runtime_backend);
    if normalized.packages.is_empty() {
        println!("packages:    (none)");
    } else {
        println!("packages:    {}", normalized.packages.join(", "));
    }
    if !normalized.services.is_empty() {
        println!("services:    {}", normalized.services.join(", "));
    }
    for (label, hooks) in [
        ("onCreate", &normalized.on_create),
        ("onStart", &normalized.on_start),
    ] {
        println!("{label}:");
        if hooks.is_empty() {
            println!("  (none)");
        }
        for hook in hooks {
            println!("  {:<20} {}", hook.name, hook.command);
        }
    }
    if !normalized.previews.is_empty() {
        let state = if normalized.previews.enabled {
            "enabled"
        } else {
            "disabled"
        };
        println!("previews ({state}):");
        for p in &normalized.previews.previews {
            println!("  {:<20} {}", p.id, p.command.join(" "));
        }
    }
    Ok(EXIT_SUCCESS)
}
