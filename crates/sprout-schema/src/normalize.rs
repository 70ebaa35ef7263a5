use crate::command::Command;
use crate::manifest::{
    CommandDecl, HookDecl, ManifestError, ManifestV1, OnStartFailure, PreviewDecl,
};
use crate::phase::Phase;
use crate::preview::{PreviewDescriptor, PreviewRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::warn;

/// Validated, canonical form of a parsed manifest.
///
/// Packages and extensions keep declaration order with later duplicates
/// dropped, services become a sorted set, and every hook command is parsed
/// into a [`Command`]. This is what gets stored and executed; the manifest
/// file is never consulted again after provisioning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedManifest {
    pub manifest_version: u32,
    pub channel: String,
    pub packages: Vec<String>,
    pub extensions: Vec<String>,
    pub services: Vec<String>,
    pub runtime_backend: String,
    pub on_start_failure: OnStartFailure,
    pub on_create: Vec<NormalizedHook>,
    pub on_start: Vec<NormalizedHook>,
    pub previews: PreviewRegistry,
}

/// A named command bound to a phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedHook {
    pub name: String,
    pub command: Command,
}

impl ManifestV1 {
    pub fn normalize(&self) -> Result<NormalizedManifest, ManifestError> {
        if self.manifest_version != 1 {
            return Err(ManifestError::UnsupportedVersion(self.manifest_version));
        }

        let channel = self.channel.trim().to_owned();
        if channel.is_empty() {
            return Err(ManifestError::EmptyChannel);
        }

        let services: BTreeSet<String> = self
            .services
            .iter()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(NormalizedManifest {
            manifest_version: self.manifest_version,
            channel,
            packages: ordered_unique(&self.packages, "packages"),
            extensions: ordered_unique(&self.extensions, "extensions"),
            services: services.into_iter().collect(),
            runtime_backend: self.runtime.backend.trim().to_lowercase(),
            on_start_failure: self.runtime.on_start_failure,
            on_create: normalize_hooks(Phase::OnCreate, self.hooks.get(Phase::OnCreate))?,
            on_start: normalize_hooks(Phase::OnStart, self.hooks.get(Phase::OnStart))?,
            previews: PreviewRegistry {
                enabled: self.previews.enable,
                previews: normalize_previews(&self.previews.entries)?,
            },
        })
    }
}

impl NormalizedManifest {
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn hooks(&self, phase: Phase) -> &[NormalizedHook] {
        match phase {
            Phase::OnCreate => &self.on_create,
            Phase::OnStart => &self.on_start,
        }
    }
}

fn ordered_unique(values: &[String], field: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        let v = value.trim();
        if v.is_empty() {
            continue;
        }
        if seen.insert(v.to_owned()) {
            out.push(v.to_owned());
        } else {
            warn!("duplicate entry '{v}' in {field} ignored");
        }
    }
    out
}

fn normalize_hooks(phase: Phase, decls: &[HookDecl]) -> Result<Vec<NormalizedHook>, ManifestError> {
    let mut seen = HashSet::new();
    let mut hooks = Vec::with_capacity(decls.len());
    for (index, decl) in decls.iter().enumerate() {
        let name = decl.name.trim().to_owned();
        if name.is_empty() {
            return Err(ManifestError::EmptyHookName { phase, index });
        }
        if !seen.insert(name.clone()) {
            return Err(ManifestError::DuplicateHook { phase, hook: name });
        }

        let parsed = match &decl.command {
            CommandDecl::Line(line) => Command::parse(line),
            CommandDecl::Argv(argv) => Command::from_argv(argv),
        };
        let mut command = parsed.map_err(|source| ManifestError::InvalidHookCommand {
            phase,
            hook: name.clone(),
            source,
        })?;

        check_env_names(&decl.env, &format!("{phase} hook '{name}'"))?;
        command
            .env
            .extend(decl.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        hooks.push(NormalizedHook { name, command });
    }
    Ok(hooks)
}

fn normalize_previews(decls: &[PreviewDecl]) -> Result<Vec<PreviewDescriptor>, ManifestError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(decls.len());
    for decl in decls {
        let id = decl.id.trim().to_owned();
        if id.is_empty() {
            return Err(ManifestError::EmptyPreviewId);
        }
        if !seen.insert(id.clone()) {
            return Err(ManifestError::DuplicatePreview(id));
        }
        Command::from_argv(&decl.command).map_err(|source| {
            ManifestError::InvalidPreviewCommand {
                id: id.clone(),
                source,
            }
        })?;
        check_env_names(&decl.env, &format!("preview '{id}'"))?;

        out.push(PreviewDescriptor {
            id,
            manager: decl.manager.trim().to_owned(),
            command: decl.command.clone(),
            env: decl.env.clone(),
            port: decl.port,
        });
    }
    Ok(out)
}

fn check_env_names(env: &BTreeMap<String, String>, context: &str) -> Result<(), ManifestError> {
    for name in env.keys() {
        let valid = !name.is_empty()
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
        if !valid {
            return Err(ManifestError::InvalidEnvName {
                name: name.clone(),
                context: context.to_owned(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse_manifest_str;

    fn normalize(input: &str) -> Result<NormalizedManifest, ManifestError> {
        parse_manifest_str(input).unwrap().normalize()
    }

    #[test]
    fn packages_keep_declaration_order_and_drop_duplicates() {
        let n = normalize(
            r#"
manifest_version = 1
channel = " stable "
packages = ["python3", "git", "python3", " ", "curl"]
services = ["docker", "postgres", "docker"]
"#,
        )
        .unwrap();
        assert_eq!(n.channel, "stable");
        assert_eq!(n.packages, vec!["python3", "git", "curl"]);
        assert_eq!(n.services, vec!["docker", "postgres"]);
    }

    #[test]
    fn hooks_keep_declaration_order() {
        let n = normalize(
            r#"
manifest_version = 1
channel = "stable"
[[hooks.onCreate]]
name = "z-last-alphabetically"
command = "echo one"
[[hooks.onCreate]]
name = "a-first-alphabetically"
command = "echo two"
"#,
        )
        .unwrap();
        let names: Vec<_> = n.hooks(Phase::OnCreate).iter().map(|h| &h.name).collect();
        assert_eq!(names, vec!["z-last-alphabetically", "a-first-alphabetically"]);
        assert_eq!(n.on_create[1].command.args, vec!["two"]);
    }

    #[test]
    fn hook_env_table_overrides_inline_assignments() {
        let n = normalize(
            r#"
manifest_version = 1
channel = "stable"
[[hooks.onStart]]
name = "serve"
command = "MODE=inline PORT=1 ./start.sh"
env = { MODE = "table" }
"#,
        )
        .unwrap();
        let env = &n.on_start[0].command.env;
        assert_eq!(env.get("MODE").map(String::as_str), Some("table"));
        assert_eq!(env.get("PORT").map(String::as_str), Some("1"));
    }

    #[test]
    fn rejects_unparseable_hook_command_naming_the_hook() {
        let err = normalize(
            r#"
manifest_version = 1
channel = "stable"
[[hooks.onStart]]
name = "tunnel"
command = "cloudflared tunnel run &"
"#,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("onStart"), "{msg}");
        assert!(msg.contains("tunnel"), "{msg}");
    }

    #[test]
    fn rejects_empty_hook_name_and_duplicates() {
        assert!(matches!(
            normalize(
                r#"
manifest_version = 1
channel = "stable"
[[hooks.onCreate]]
name = "  "
command = "true"
"#
            ),
            Err(ManifestError::EmptyHookName { .. })
        ));
        assert!(matches!(
            normalize(
                r#"
manifest_version = 1
channel = "stable"
[[hooks.onCreate]]
name = "a"
command = "true"
[[hooks.onCreate]]
name = "a"
command = "false"
"#
            ),
            Err(ManifestError::DuplicateHook { .. })
        ));
    }

    #[test]
    fn rejects_empty_argv_command() {
        let err = normalize(
            r#"
manifest_version = 1
channel = "stable"
[[hooks.onCreate]]
name = "nothing"
command = []
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::InvalidHookCommand { .. }));
    }

    #[test]
    fn rejects_empty_channel_and_bad_version() {
        assert!(matches!(
            normalize("manifest_version = 1\nchannel = \"  \"\n"),
            Err(ManifestError::EmptyChannel)
        ));
        assert!(matches!(
            normalize("manifest_version = 2\nchannel = \"stable\"\n"),
            Err(ManifestError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn disabled_previews_are_still_validated() {
        let err = normalize(
            r#"
manifest_version = 1
channel = "stable"
[previews]
enable = false
[[previews.entries]]
id = "web"
command = ["npm"]
[[previews.entries]]
id = "web"
command = ["npm"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::DuplicatePreview(ref id) if id == "web"));
    }

    #[test]
    fn rejects_invalid_env_names() {
        let err = normalize(
            r#"
manifest_version = 1
channel = "stable"
[previews]
enable = true
[[previews.entries]]
id = "web"
command = ["npm"]
env = { "BAD-NAME" = "x" }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::InvalidEnvName { .. }));
    }

    #[test]
    fn equivalent_manifests_produce_same_canonical_json() {
        let a = normalize(
            r#"
manifest_version = 1
channel = "stable"
services = ["b", "a"]
[runtime]
backend = "MOCK"
"#,
        )
        .unwrap();
        let b = normalize(
            r#"
manifest_version = 1
channel = "stable"
services = ["a", "b", "a"]
[runtime]
backend = "mock"
"#,
        )
        .unwrap();
        assert_eq!(a.canonical_json().unwrap(), b.canonical_json().unwrap());
    }
}
