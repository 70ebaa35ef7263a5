pub mod completions;
pub mod destroy;
pub mod inspect;
pub mod list;
pub mod man_pages;
pub mod new;
pub mod preview;
pub mod previews;
pub mod provision;
pub mod rename;
pub mod start;
pub mod up;
pub mod validate;

use indicatif::{ProgressBar, ProgressStyle};
use sprout_core::{Engine, StoreLock};
use sprout_store::{HookStatus, PhaseReport, StoreLayout};
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;
pub const EXIT_RESOLUTION_ERROR: u8 = 4;
pub const EXIT_HOOK_FAILURE: u8 = 5;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn lock_store(store_path: &Path) -> Result<StoreLock, String> {
    let layout = StoreLayout::new(store_path);
    StoreLock::acquire(&layout.lock_file()).map_err(|e| format!("store lock: {e}"))
}

fn plain_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain_style());
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain_style());
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_state(state: &str) -> String {
    use console::Style;
    match state {
        "created" => Style::new().green().apply_to(state).to_string(),
        "started" => Style::new().cyan().bold().apply_to(state).to_string(),
        "resolved" => Style::new().yellow().apply_to(state).to_string(),
        "failed" => Style::new().red().apply_to(state).to_string(),
        other => other.to_owned(),
    }
}

fn colorize_status(status: &HookStatus) -> String {
    use console::Style;
    let text = status.to_string();
    match status {
        HookStatus::Succeeded => Style::new().green().apply_to(text).to_string(),
        HookStatus::Skipped => Style::new().dim().apply_to(text).to_string(),
        HookStatus::Failed { .. } | HookStatus::SpawnFailed { .. } => {
            Style::new().red().apply_to(text).to_string()
        }
    }
}

/// One line per hook: name, status, and duration.
pub fn print_report(report: &PhaseReport) {
    if report.hooks.is_empty() {
        println!("{}: no hooks", report.phase);
        return;
    }
    println!("{}:", report.phase);
    for hook in &report.hooks {
        println!(
            "  {:<20} {} ({} ms)",
            hook.name,
            colorize_status(&hook.status),
            hook.duration_ms
        );
    }
    if report.interrupted {
        println!("  (interrupted)");
    }
}

pub fn resolve_env_id(engine: &Engine, input: &str) -> Result<String, String> {
    if input.len() == 64 {
        return Ok(input.to_owned());
    }

    let envs = engine.list().map_err(|e| e.to_string())?;

    for e in &envs {
        if *e.env_id == *input || *e.short_id == *input || e.name.as_deref() == Some(input) {
            return Ok(e.env_id.to_string());
        }
    }

    let matches: Vec<_> = envs
        .iter()
        .filter(|e| e.env_id.starts_with(input) || e.short_id.starts_with(input))
        .collect();

    match matches.len() {
        0 => Err(format!("no environment matching '{input}'")),
        1 => Ok(matches[0].env_id.to_string()),
        n => Err(format!(
            "ambiguous env_id prefix '{input}': matches {n} environments"
        )),
    }
}
