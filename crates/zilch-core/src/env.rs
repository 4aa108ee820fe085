use crate::flake::ENV_OUTPUT;
use crate::project::Project;
use crate::CoreError;
use std::collections::BTreeMap;
use std::env;
use zilch_runtime::BuildBackend;

/// Compute the minimal environment patch that makes a shell behave as if
/// it ran inside the built environment.
///
/// The composite environment is activated in a throwaway subprocess that
/// dumps its variables NUL-separated; only keys added or changed relative
/// to this process's environment are returned, which keeps ambient noise
/// out of the delta.
pub fn env_delta(
    project: &Project,
    backend: &dyn BuildBackend,
) -> Result<BTreeMap<String, String>, CoreError> {
    let argv = vec!["env".to_owned(), "-0".to_owned()];
    let output = backend
        .run(project.resource_path(), ENV_OUTPUT, &argv)
        .map_err(CoreError::Build)?;
    let inner = parse_env_dump(&output.stdout);
    let outer: BTreeMap<String, String> = env::vars().collect();
    Ok(diff_environments(&outer, &inner))
}

/// Pairs from `inner` whose value is absent from or different in `outer`.
pub fn diff_environments(
    outer: &BTreeMap<String, String>,
    inner: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    inner
        .iter()
        .filter(|(key, value)| outer.get(key.as_str()) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn parse_env_dump(bytes: &[u8]) -> BTreeMap<String, String> {
    String::from_utf8_lossy(bytes)
        .split('\0')
        .filter_map(|entry| entry.split_once('='))
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}
