use crate::manifest::ManifestError;
use crate::normalize::NormalizedManifest;
use crate::types::{EnvId, ShortId};
use serde::Serialize;
use std::path::Path;

/// Deterministic identity for an environment.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EnvIdentity {
    pub env_id: EnvId,
    pub short_id: ShortId,
}

/// Compute the environment identity from normalized manifest content and the
/// project directory hooks run in.
///
/// The same manifest checked out in two directories yields two environments,
/// since hook side effects are relative to the working directory.
pub fn compute_env_id(
    normalized: &NormalizedManifest,
    project_dir: &Path,
) -> Result<EnvIdentity, ManifestError> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(normalized.canonical_json()?.as_bytes());
    hasher.update(format!("channel:{}", normalized.channel).as_bytes());
    for pkg in &normalized.packages {
        hasher.update(format!("pkg:{pkg}").as_bytes());
    }
    hasher.update(format!("backend:{}", normalized.runtime_backend).as_bytes());
    hasher.update(format!("project:{}", project_dir.display()).as_bytes());

    let hex = hasher.finalize().to_hex().to_string();
    let short = hex[..12].to_owned();

    Ok(EnvIdentity {
        env_id: EnvId::new(hex),
        short_id: ShortId::new(short),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse_manifest_str;

    fn normalized(input: &str) -> NormalizedManifest {
        parse_manifest_str(input).unwrap().normalize().unwrap()
    }

    #[test]
    fn stable_id_for_same_inputs() {
        let n = normalized("manifest_version = 1\nchannel = \"stable\"\npackages = [\"git\"]\n");
        let a = compute_env_id(&n, Path::new("/work/app")).unwrap();
        let b = compute_env_id(&n, Path::new("/work/app")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn package_order_changes_id() {
        let a = normalized(
            "manifest_version = 1\nchannel = \"stable\"\npackages = [\"git\", \"curl\"]\n",
        );
        let b = normalized(
            "manifest_version = 1\nchannel = \"stable\"\npackages = [\"curl\", \"git\"]\n",
        );
        let dir = Path::new("/work/app");
        assert_ne!(
            compute_env_id(&a, dir).unwrap(),
            compute_env_id(&b, dir).unwrap()
        );
    }

    #[test]
    fn project_dir_changes_id() {
        let n = normalized("manifest_version = 1\nchannel = \"stable\"\n");
        assert_ne!(
            compute_env_id(&n, Path::new("/a")).unwrap(),
            compute_env_id(&n, Path::new("/b")).unwrap()
        );
    }

    #[test]
    fn hook_change_changes_id() {
        let a = normalized(
            "manifest_version = 1\nchannel = \"stable\"\n[[hooks.onStart]]\nname = \"s\"\ncommand = \"./start.sh\"\n",
        );
        let b = normalized(
            "manifest_version = 1\nchannel = \"stable\"\n[[hooks.onStart]]\nname = \"s\"\ncommand = \"./start.sh --dev\"\n",
        );
        let dir = Path::new("/work");
        assert_ne!(
            compute_env_id(&a, dir).unwrap(),
            compute_env_id(&b, dir).unwrap()
        );
    }

    #[test]
    fn short_id_is_12_char_prefix() {
        let n = normalized("manifest_version = 1\nchannel = \"stable\"\n");
        let id = compute_env_id(&n, Path::new("/work")).unwrap();
        assert_eq!(id.short_id.len(), 12);
        assert!(id.env_id.starts_with(id.short_id.as_str()));
    }
}
