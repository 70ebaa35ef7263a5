use crate::backend::ResolverBackend;
use crate::catalog::ChannelCatalog;
use crate::handle::EnvironmentHandle;
use crate::RuntimeError;
use sprout_schema::ResolutionResult;
use sprout_store::StoreLayout;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolves against `<store>/channels/<channel>.toml` and links host binaries
/// into the environment profile.
pub struct HostBackend {
    layout: StoreLayout,
}

impl HostBackend {
    pub fn with_store_root(store_root: &Path) -> Self {
        Self {
            layout: StoreLayout::new(store_root),
        }
    }

    fn catalog(&self, channel: &str) -> Result<ChannelCatalog, RuntimeError> {
        ChannelCatalog::load(channel, &self.layout.channel_catalog(channel))
    }
}

fn link_binary(bin: &Path, profile_bin: &Path, package: &str) -> Result<PathBuf, RuntimeError> {
    if !bin.exists() {
        return Err(RuntimeError::InstallFailed {
            package: package.to_owned(),
            message: format!("binary {} does not exist on this host", bin.display()),
        });
    }
    let Some(file_name) = bin.file_name() else {
        return Err(RuntimeError::InstallFailed {
            package: package.to_owned(),
            message: format!("binary path {} has no file name", bin.display()),
        });
    };
    let link = profile_bin.join(file_name);
    if link.symlink_metadata().is_ok() {
        fs::remove_file(&link)?;
    }
    std::os::unix::fs::symlink(bin, &link)?;
    Ok(link)
}

impl ResolverBackend for HostBackend {
    fn name(&self) -> &'static str {
        "host"
    }

    fn resolve(
        &self,
        channel: &str,
        packages: &[String],
    ) -> Result<ResolutionResult, RuntimeError> {
        let resolution = self.catalog(channel)?.resolve(channel, packages)?;
        debug!(
            "resolved {} packages against channel {channel}",
            resolution.packages.len()
        );
        Ok(resolution)
    }

    fn install(
        &self,
        handle: &EnvironmentHandle,
        resolution: &ResolutionResult,
    ) -> Result<(), RuntimeError> {
        let catalog = self.catalog(&resolution.channel)?;
        handle.prepare()?;
        for pkg in &resolution.packages {
            let Some(entry) = catalog.get(&pkg.name) else {
                return Err(RuntimeError::UnknownPackages {
                    channel: resolution.channel.clone(),
                    packages: vec![pkg.name.clone()],
                });
            };
            for bin in &entry.bin {
                let link = link_binary(bin, &handle.profile_bin, &pkg.name)?;
                debug!("linked {} -> {}", link.display(), bin.display());
            }
            info!("installed {}@{}", pkg.name, pkg.version);
        }
        Ok(())
    }
}
