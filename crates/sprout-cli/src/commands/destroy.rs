use super::{lock_store, resolve_env_id, EXIT_SUCCESS};
use sprout_core::Engine;
use std::path::Path;

pub fn run(engine: &Engine, store_path: &Path, env_id: &str) -> Result<u8, String> {
    let _lock = lock_store(store_path)?;
    let resolved = resolve_env_id(engine, env_id)?;
    engine.destroy(&resolved).map_err(|e| e.to_string())?;
    println!("destroyed environment {}", &resolved[..12]);
    Ok(EXIT_SUCCESS)
}
