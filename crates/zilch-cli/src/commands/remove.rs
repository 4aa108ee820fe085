use super::{json_pretty, scope_alias, spin_fail, spin_ok, spinner, EXIT_FAILURE, EXIT_SUCCESS};
use zilch_core::{Project, Synchronizer};
use zilch_runtime::BuildBackend;

pub fn run(
    project: &mut Project,
    backend: &dyn BuildBackend,
    packages: &[String],
    source: Option<&str>,
    match_source: bool,
    json: bool,
) -> Result<u8, String> {
    let alias = match_source.then(|| scope_alias(source));
    let mut removed = Vec::new();
    let mut failed = Vec::new();

    for name in packages {
        match project.remove_package(name, alias) {
            Ok(package) => removed.push(package),
            Err(e) => {
                eprintln!("error: cannot remove '{name}': {e}");
                failed.push(name.clone());
            }
        }
    }

    if removed.is_empty() {
        return Ok(EXIT_FAILURE);
    }

    let pb = if json {
        None
    } else {
        Some(spinner("rebuilding environment..."))
    };
    match Synchronizer::new(backend).sync(project) {
        Ok(()) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "environment rebuilt");
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
            "removed": removed.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "failed": failed,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        for package in &removed {
            println!("removed {package}");
        }
    }
    Ok(if failed.is_empty() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    })
}
