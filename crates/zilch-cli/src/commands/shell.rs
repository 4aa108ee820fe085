use super::{spin_fail, spin_ok, spinner};
use std::process::Command;
use zilch_core::{env_delta, Project, Synchronizer};
use zilch_runtime::BuildBackend;

/// Sync, compute the environment delta, and hand the terminal over to the
/// requested command (or the user's shell) with the delta applied.
pub fn run(
    project: &Project,
    backend: &dyn BuildBackend,
    command: &[String],
) -> Result<u8, String> {
    let pb = spinner("preparing environment...");
    let prepared = Synchronizer::new(backend)
        .sync(project)
        .and_then(|()| env_delta(project, backend));
    let delta = match prepared {
        Ok(delta) => {
            spin_ok(&pb, "environment ready");
            delta
        }
        Err(e) => {
            spin_fail(&pb, "environment not ready");
            return Err(e.to_string());
        }
    };

    let argv: Vec<String> = if command.is_empty() {
        vec![std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_owned())]
    } else {
        command.to_vec()
    };

    let mut child = Command::new(&argv[0]);
    child.args(&argv[1..]).envs(&delta);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let err = child.exec();
        Err(format!("failed to exec {}: {err}", argv[0]))
    }
    #[cfg(not(unix))]
    {
        let status = child
            .status()
            .map_err(|e| format!("failed to run {}: {e}", argv[0]))?;
        Ok(status.code().unwrap_or(1) as u8)
    }
}
