use crate::RuntimeError;
use serde::Deserialize;
use sprout_schema::{ResolutionResult, ResolvedPackage};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One package a channel provides.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CatalogEntry {
    pub version: String,
    /// Binaries linked into the environment profile.
    #[serde(default)]
    pub bin: Vec<PathBuf>,
}

/// The package set a channel identifier resolves to.
///
/// ```toml
/// [packages.python311]
/// version = "3.11.9"
/// bin = ["/usr/bin/python3.11"]
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ChannelCatalog {
    #[serde(default)]
    pub packages: BTreeMap<String, CatalogEntry>,
}

impl ChannelCatalog {
    pub fn load(channel: &str, path: &Path) -> Result<Self, RuntimeError> {
        if !path.is_file() {
            return Err(RuntimeError::UnknownChannel {
                channel: channel.to_owned(),
                path: path.display().to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| RuntimeError::InvalidCatalog {
            channel: channel.to_owned(),
            message: e.to_string(),
        })
    }

    pub fn get(&self, package: &str) -> Option<&CatalogEntry> {
        self.packages.get(package)
    }

    /// Pin every requested package, or fail naming all that are missing.
    pub fn resolve(
        &self,
        channel: &str,
        packages: &[String],
    ) -> Result<ResolutionResult, RuntimeError> {
        let missing: Vec<String> = packages
            .iter()
            .filter(|p| !self.packages.contains_key(p.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(RuntimeError::UnknownPackages {
                channel: channel.to_owned(),
                packages: missing,
            });
        }

        let packages = packages
            .iter()
            .filter_map(|name| {
                self.packages.get(name).map(|entry| ResolvedPackage {
                    name: name.clone(),
                    version: entry.version.clone(),
                })
            })
            .collect();
        Ok(ResolutionResult {
            channel: channel.to_owned(),
            packages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
[packages.git]
version = "2.45.0"
bin = ["/usr/bin/git"]

[packages.curl]
version = "8.7.1"
"#;

    #[test]
    fn resolve_preserves_declaration_order() {
        let catalog: ChannelCatalog = toml::from_str(CATALOG).unwrap();
        let res = catalog
            .resolve("stable", &["git".to_owned(), "curl".to_owned()])
            .unwrap();
        let names: Vec<&str> = res.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["git", "curl"]);
        assert_eq!(res.packages[1].version, "8.7.1");
    }

    #[test]
    fn resolve_names_every_missing_package() {
        let catalog: ChannelCatalog = toml::from_str(CATALOG).unwrap();
        let err = catalog
            .resolve(
                "stable",
                &["git".to_owned(), "nope".to_owned(), "zilch".to_owned()],
            )
            .unwrap_err();
        match err {
            RuntimeError::UnknownPackages { channel, packages } => {
                assert_eq!(channel, "stable");
                assert_eq!(packages, vec!["nope", "zilch"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_catalog_is_unknown_channel() {
        let dir = tempfile::tempdir().unwrap();
        let err = ChannelCatalog::load("ghost", &dir.path().join("ghost.toml")).unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownChannel { .. }));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn malformed_catalog_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[packages.git]\nversion = 1\n").unwrap();
        assert!(matches!(
            ChannelCatalog::load("bad", &path),
            Err(RuntimeError::InvalidCatalog { .. })
        ));
    }
}
