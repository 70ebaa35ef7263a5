use super::{colorize_state, json_pretty, print_report, resolve_env_id, EXIT_SUCCESS};
use sprout_core::Engine;
use sprout_schema::Phase;

pub fn run(engine: &Engine, env_id: &str, json: bool) -> Result<u8, String> {
    let resolved = resolve_env_id(engine, env_id)?;
    let meta = engine.inspect(&resolved).map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&meta)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("env_id:      {}", meta.env_id);
    println!("short_id:    {}", meta.short_id);
    println!("name:        {}", meta.name.as_deref().unwrap_or("(none)"));
    println!("state:       {}", colorize_state(&meta.state.to_string()));
    println!("project:     {}", meta.project_dir.display());
    println!("channel:     {}", meta.channel);
    println!("backend:     {}", meta.backend);
    println!("manifest:    {}", meta.manifest_hash);
    println!("create_runs: {}", meta.create_runs);
    println!("starts:      {}", meta.start_count);
    println!("created_at:  {}", meta.created_at);
    println!("updated_at:  {}", meta.updated_at);
    for phase in Phase::ALL {
        if let Some(report) = meta.last_report(phase) {
            println!();
            println!("last {phase} ({}):", report.finished_at);
            print_report(report);
        }
    }
    Ok(EXIT_SUCCESS)
}
