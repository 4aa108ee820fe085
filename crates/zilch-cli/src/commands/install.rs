use super::{json_pretty, scope_alias, spin_fail, spin_ok, spinner, EXIT_FAILURE, EXIT_SUCCESS};
use zilch_core::{Project, Synchronizer};
use zilch_runtime::BuildBackend;

pub fn run(
    project: &mut Project,
    backend: &dyn BuildBackend,
    packages: &[String],
    source: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let alias = scope_alias(source);
    let mut installed = Vec::new();
    let mut failed = Vec::new();

    // Per-item failures are reported and do not abort sibling installs.
    for name in packages {
        match project.add_package(name, alias, backend) {
            Ok(()) => installed.push(name.clone()),
            Err(e) => {
                eprintln!("error: cannot install '{name}': {e}");
                failed.push(name.clone());
            }
        }
    }

    if installed.is_empty() {
        return Ok(EXIT_FAILURE);
    }

    let pb = if json {
        None
    } else {
        Some(spinner("building environment..."))
    };
    match Synchronizer::new(backend).sync(project) {
        Ok(()) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "environment built");
            }
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "build failed");
            }
            return Err(e.to_string());
        }
    }

    if json {
        let payload = serde_json::json!({
            "installed": installed,
            "failed": failed,
            "source": alias,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        for name in &installed {
            println!("installed {name} (from {alias})");
        }
    }
    Ok(if failed.is_empty() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    })
}
