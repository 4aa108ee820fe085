use super::{json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use zilch_core::Project;
use zilch_runtime::BuildBackend;
use zilch_schema::Source;

pub fn add(
    project: &mut Project,
    backend: &dyn BuildBackend,
    url: &str,
    alias: &str,
    rev: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let source = match rev {
        Some(rev) => Source::pinned(url, alias, rev),
        None => Source::floating(url, alias),
    };
    let resolving = !source.is_pinned();

    let pb = if json || !resolving {
        None
    } else {
        Some(spinner("resolving source revision..."))
    };
    match project.add_source(source, backend) {
        Ok(()) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "source pinned");
            }
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "resolution failed");
            }
            return Err(e.to_string());
        }
    }
    project.persist().map_err(|e| e.to_string())?;

    let pinned = project
        .sources()
        .resolve(alias)
        .map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(pinned)?);
    } else {
        println!(
            "added source {} at {}",
            pinned,
            pinned.rev.as_deref().unwrap_or("?")
        );
    }
    Ok(EXIT_SUCCESS)
}

pub fn remove(project: &mut Project, alias: &str, json: bool) -> Result<u8, String> {
    let still_used: Vec<_> = project
        .packages()
        .iter()
        .filter(|package| package.source_alias == alias)
        .map(|package| package.name().to_owned())
        .collect();
    if !still_used.is_empty() {
        return Err(format!(
            "source '{alias}' is still used by: {}",
            still_used.join(", ")
        ));
    }

    let removed = project.remove_source(alias).map_err(|e| e.to_string())?;
    project.persist().map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&removed)?);
    } else {
        println!("removed source {removed}");
    }
    Ok(EXIT_SUCCESS)
}

pub fn list(project: &Project, json: bool) -> Result<u8, String> {
    if json {
        let payload: Vec<_> = project.sources().iter().collect();
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }
    for source in project.sources().iter() {
        println!(
            "{}\t{}\t{}",
            source.alias,
            source.url,
            source.rev.as_deref().unwrap_or("-")
        );
    }
    Ok(EXIT_SUCCESS)
}
