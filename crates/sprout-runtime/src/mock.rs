use crate::backend::ResolverBackend;
use crate::catalog::{CatalogEntry, ChannelCatalog};
use crate::handle::EnvironmentHandle;
use crate::RuntimeError;
use sprout_schema::ResolutionResult;
use std::fs;

pub const MOCK_VERSION: &str = "0.0.0-mock";

/// Packages every channel provides under the mock backend.
pub const MOCK_PACKAGES: &[&str] = &[
    "git", "curl", "python3", "nodejs", "docker", "gcc", "make", "cmake",
];

/// Backend with a fixed built-in catalog that installs marker files only.
pub struct MockBackend {
    catalog: ChannelCatalog,
}

impl Default for MockBackend {
    fn default() -> Self {
        let packages = MOCK_PACKAGES
            .iter()
            .map(|name| {
                (
                    (*name).to_owned(),
                    CatalogEntry {
                        version: MOCK_VERSION.to_owned(),
                        bin: Vec::new(),
                    },
                )
            })
            .collect();
        Self {
            catalog: ChannelCatalog { packages },
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResolverBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn resolve(
        &self,
        channel: &str,
        packages: &[String],
    ) -> Result<ResolutionResult, RuntimeError> {
        self.catalog.resolve(channel, packages)
    }

    fn install(
        &self,
        handle: &EnvironmentHandle,
        resolution: &ResolutionResult,
    ) -> Result<(), RuntimeError> {
        handle.prepare()?;
        let profile = handle.profile_dir();
        fs::write(
            profile.join(".sprout-mock"),
            format!("mock-env:{}\nchannel:{}\n", handle.env_id, resolution.channel),
        )?;
        for pkg in &resolution.packages {
            fs::write(
                profile.join(format!(".pkg-{}", pkg.name)),
                format!("{}@{}", pkg.name, pkg.version),
            )?;
        }
        Ok(())
    }
}
