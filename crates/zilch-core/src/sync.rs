use crate::concurrency::shutdown_requested;
use crate::flake::{self, ENV_OUTPUT};
use crate::project::Project;
use crate::CoreError;
use tracing::info;
use zilch_runtime::BuildBackend;

/// Drives the persist → synthesize → lock → build sequence.
///
/// The manifest is persisted strictly before the first external-tool
/// invocation, so a cancellation mid-build can never corrupt it; at worst
/// the resource directory is left partial and the next sync rewrites it
/// entirely. Builder failures are surfaced with their captured output and
/// never retried.
pub struct Synchronizer<'a> {
    backend: &'a dyn BuildBackend,
}

impl<'a> Synchronizer<'a> {
    pub fn new(backend: &'a dyn BuildBackend) -> Self {
        Self { backend }
    }

    pub fn sync(&self, project: &Project) -> Result<(), CoreError> {
        info!("syncing {}", project.manifest_path().display());
        project.persist()?;
        if shutdown_requested() {
            return Err(CoreError::Interrupted);
        }

        flake::write_locked(
            project.sources(),
            project.packages(),
            project.resource_path(),
            self.backend,
        )?;
        if shutdown_requested() {
            return Err(CoreError::Interrupted);
        }

        self.backend
            .build(project.resource_path(), ENV_OUTPUT)
            .map_err(CoreError::Build)?;
        info!("environment built in {}", project.resource_path().display());
        Ok(())
    }

    /// Best-effort garbage collection in the builder's store. Not
    /// transactional with manifest state.
    pub fn autoremove(&self) -> Result<(), CoreError> {
        self.backend.collect_garbage()?;
        Ok(())
    }
}
