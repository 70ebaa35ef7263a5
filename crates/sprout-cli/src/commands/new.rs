use super::{json_pretty, EXIT_SUCCESS};
use dialoguer::{Confirm, Input, Select};
use sprout_schema::{get_template, list_templates, parse_manifest_str, Template, MANIFEST_FILE};
use std::io::{stderr, stdin, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn load_template(name: &str) -> Result<&'static Template, String> {
    get_template(name).ok_or_else(|| {
        let known: Vec<_> = list_templates().iter().map(|t| t.name).collect();
        format!(
            "unknown template '{name}' (expected: {})",
            known.join(", ")
        )
    })
}

fn write_atomic(dest: &Path, content: &str) -> Result<(), String> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| format!("write temp file: {e}"))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| format!("write temp file: {e}"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| format!("fsync temp file: {e}"))?;
    tmp.persist(dest)
        .map_err(|e| format!("persist manifest: {}", e.error))?;
    Ok(())
}

fn ensure_can_write(dest: &Path, force: bool, is_tty: bool) -> Result<(), String> {
    if !dest.exists() || force {
        return Ok(());
    }
    let refuse = || format!("refusing to overwrite existing ./{MANIFEST_FILE} (pass --force)");
    if !is_tty {
        return Err(refuse());
    }
    let overwrite = Confirm::new()
        .with_prompt(format!("overwrite ./{MANIFEST_FILE}?"))
        .default(false)
        .interact()
        .map_err(|e| format!("prompt failed: {e}"))?;
    if overwrite {
        Ok(())
    } else {
        Err(refuse())
    }
}

fn prompt_template() -> Result<&'static Template, String> {
    let templates = list_templates();
    let items: Vec<String> = templates
        .iter()
        .map(|t| format!("{:<8} {}", t.name, t.description))
        .collect();
    let idx = Select::new()
        .with_prompt("template")
        .items(&items)
        .default(0)
        .interact()
        .map_err(|e| format!("prompt failed: {e}"))?;
    Ok(&templates[idx])
}

/// Append extra packages to a template, re-serializing it.
fn with_packages(template: &Template, extra: &str) -> Result<String, String> {
    let mut manifest =
        parse_manifest_str(template.manifest).map_err(|e| format!("template parse error: {e}"))?;
    manifest
        .packages
        .extend(extra.split_whitespace().map(str::to_owned));
    toml::to_string_pretty(&manifest).map_err(|e| format!("TOML serialization failed: {e}"))
}

pub fn run(template: Option<&str>, force: bool, json: bool) -> Result<u8, String> {
    let dest = Path::new(MANIFEST_FILE);
    let is_tty = stdin().is_terminal() && stderr().is_terminal();

    let chosen = match template {
        Some(name) => load_template(name)?,
        None if is_tty => prompt_template()?,
        None => load_template("minimal")?,
    };
    ensure_can_write(dest, force, is_tty)?;

    let mut content = chosen.manifest.to_owned();
    if is_tty && template.is_none() {
        let packages: String = Input::new()
            .with_prompt("extra packages (space-separated, empty to skip)")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| format!("prompt failed: {e}"))?;
        if !packages.trim().is_empty() {
            content = with_packages(chosen, &packages)?;
        }
    }

    write_atomic(dest, &content)?;
    if json {
        let payload = serde_json::json!({
            "status": "written",
            "path": format!("./{MANIFEST_FILE}"),
            "template": chosen.name,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("wrote ./{MANIFEST_FILE} from template '{}'", chosen.name);
    }
    Ok(EXIT_SUCCESS)
}
