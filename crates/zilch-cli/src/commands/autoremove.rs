use super::{spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use zilch_core::{Project, Synchronizer};
use zilch_runtime::BuildBackend;

/// Rebuild first so the live environment stays referenced, then let the
/// builder collect everything unreachable.
pub fn run(project: &Project, backend: &dyn BuildBackend) -> Result<u8, String> {
    let synchronizer = Synchronizer::new(backend);

    let pb = spinner("rebuilding environment...");
    match synchronizer.sync(project) {
        Ok(()) => spin_ok(&pb, "environment rebuilt"),
        Err(e) => {
            spin_fail(&pb, "build failed");
            return Err(e.to_string());
        }
    }

    synchronizer.autoremove().map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}
