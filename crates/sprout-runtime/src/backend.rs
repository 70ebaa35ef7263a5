use crate::handle::EnvironmentHandle;
use crate::RuntimeError;
use sprout_schema::ResolutionResult;
use std::path::Path;

/// Turns a channel plus package list into installed binaries.
pub trait ResolverBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Pin every package against the channel. Fails without side effects if
    /// the channel or any package is unknown.
    fn resolve(&self, channel: &str, packages: &[String])
        -> Result<ResolutionResult, RuntimeError>;

    /// Make every resolved package's binaries available under the handle's profile.
    fn install(
        &self,
        handle: &EnvironmentHandle,
        resolution: &ResolutionResult,
    ) -> Result<(), RuntimeError>;

    fn destroy(&self, handle: &EnvironmentHandle) -> Result<(), RuntimeError> {
        handle.teardown()
    }
}

pub fn select_backend(
    name: &str,
    store_root: &Path,
) -> Result<Box<dyn ResolverBackend>, RuntimeError> {
    match name {
        "host" => Ok(Box::new(crate::host::HostBackend::with_store_root(
            store_root,
        ))),
        "mock" => Ok(Box::new(crate::mock::MockBackend::new())),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}
