use super::{json_pretty, resolve_env_id, EXIT_SUCCESS};
use sprout_core::Engine;

pub fn run(engine: &Engine, env_id: &str, json: bool) -> Result<u8, String> {
    let resolved = resolve_env_id(engine, env_id)?;
    let registry = engine.previews(&resolved).map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&registry)?);
        return Ok(EXIT_SUCCESS);
    }

    if registry.is_empty() {
        println!("no previews declared");
        return Ok(EXIT_SUCCESS);
    }
    if !registry.enabled {
        println!("previews are disabled; set [previews] enable = true to launch them");
    }
    println!("{:<16} {:<8} {:<6} COMMAND", "ID", "MANAGER", "PORT");
    for p in &registry.previews {
        let port = p.port.as_ref().map(ToString::to_string).unwrap_or_default();
        println!(
            "{:<16} {:<8} {:<6} {}",
            p.id,
            p.manager,
            port,
            p.command.join(" ")
        );
    }
    Ok(EXIT_SUCCESS)
}
