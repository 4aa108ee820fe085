use super::{json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use zilch_core::{Project, Synchronizer};
use zilch_runtime::BuildBackend;

pub fn run(project: &Project, backend: &dyn BuildBackend, json: bool) -> Result<u8, String> {
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
            "manifest": project.manifest_path(),
            "resource_path": project.resource_path(),
            "packages": project.packages().len(),
            "status": "built",
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("environment built in {}", project.resource_path().display());
    }
    Ok(EXIT_SUCCESS)
}
