use super::{json_pretty, EXIT_SUCCESS};
use zilch_core::Project;

pub fn run(project: &Project, json: bool) -> Result<u8, String> {
    if json {
        let payload: Vec<_> = project
            .packages()
            .iter()
            .map(|package| {
                serde_json::json!({
                    "name": package.name(),
                    "source": package.source_alias,
                    "attribute": package.attribute,
                })
            })
            .collect();
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    if project.packages().is_empty() {
        println!("no packages installed");
        return Ok(EXIT_SUCCESS);
    }
    for package in project.packages().iter() {
        println!("{}\t{}", package.name(), package.source_alias);
    }
    Ok(EXIT_SUCCESS)
}
