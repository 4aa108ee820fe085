use super::{json_pretty, EXIT_FAILURE, EXIT_SUCCESS};
use console::style;
use zilch_core::Project;
use zilch_runtime::BuildBackend;
use zilch_schema::split_attribute;

pub fn run(
    project: &Project,
    backend: &dyn BuildBackend,
    terms: &[String],
    source: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let scoped: Vec<_> = match source {
        Some(alias) => vec![project
            .sources()
            .resolve(alias)
            .map_err(|e| e.to_string())?],
        None => project.sources().iter().collect(),
    };

    let mut results = serde_json::Map::new();
    let mut hits = 0usize;
    for src in scoped {
        let entries = backend
            .search(&src.url, terms)
            .map_err(|e| format!("search in '{}' failed: {e}", src.alias))?;
        hits += entries.len();
        if json {
            results.insert(
                src.alias.clone(),
                serde_json::json!(entries
                    .iter()
                    .map(|entry| {
                        serde_json::json!({
                            "name": split_attribute(&entry.attribute).2,
                            "attribute": entry.attribute,
                            "version": entry.version,
                            "description": entry.description,
                        })
                    })
                    .collect::<Vec<_>>()),
            );
        } else {
            println!("{}", style(format!("── {} ──", src.alias)).yellow());
            for entry in &entries {
                let name = split_attribute(&entry.attribute).2;
                println!("{} ({})", style(name).green(), entry.version);
                if !entry.description.is_empty() {
                    println!("  {}", entry.description);
                }
                println!();
            }
        }
    }

    if json {
        println!("{}", json_pretty(&results)?);
    }
    Ok(if hits > 0 { EXIT_SUCCESS } else { EXIT_FAILURE })
}
