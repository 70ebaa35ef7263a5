use super::{lock_store, resolve_env_id, EXIT_SUCCESS};
use sprout_core::Engine;
use std::path::Path;

pub fn run(engine: &Engine, store_path: &Path, env_id: &str, new_name: &str) -> Result<u8, String> {
    let _lock = lock_store(store_path)?;

    let resolved = resolve_env_id(engine, env_id)?;
    engine
        .rename(&resolved, new_name)
        .map_err(|e| e.to_string())?;
    println!("renamed {} → '{}'", &resolved[..12], new_name);
    Ok(EXIT_SUCCESS)
}
