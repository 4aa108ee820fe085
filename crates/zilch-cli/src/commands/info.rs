use super::{json_pretty, EXIT_FAILURE, EXIT_SUCCESS};
use console::style;
use zilch_core::Project;

pub fn run(
    project: &Project,
    name: &str,
    source: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let Some(package) = project.find_package(name, source) else {
        println!("package '{name}' not found");
        return Ok(EXIT_FAILURE);
    };

    if json {
        let payload = serde_json::json!({
            "name": package.name(),
            "attribute": package.attribute,
            "family": package.family(),
            "system": package.system(),
            "source": package.source_alias,
            "version": package.version,
            "description": package.description,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{}", style(package.name()).green());
        println!("  attribute: {}", package.attribute);
        println!("  source:    {}", package.source_alias);
        if let Some(version) = &package.version {
            println!("  version:   {version}");
        }
        if let Some(description) = &package.description {
            println!("  about:     {description}");
        }
    }
    Ok(EXIT_SUCCESS)
}
