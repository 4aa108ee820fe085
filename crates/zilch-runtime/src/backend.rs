use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One hit from a package search, as reported by the external tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchEntry {
    /// Full build attribute path, `<family>.<system>.<name>`.
    pub attribute: String,
    pub version: String,
    pub description: String,
}

/// The external package-building tool, seen through its argv contract.
///
/// Every method is a blocking child-process invocation: exit 0 means
/// success, nonzero surfaces as `RuntimeError::Tool` with the captured
/// stdout/stderr. No timeouts, no retries.
pub trait BuildBackend: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    /// The builder's identifier for the current platform, e.g.
    /// `x86_64-linux`. Computed at most once per process.
    fn current_platform(&self) -> Result<String, RuntimeError>;

    /// Resolve every input declared in `dir`'s build description to an
    /// exact revision, recorded in the lock artifact next to it.
    fn lock(&self, dir: &Path) -> Result<(), RuntimeError>;

    /// Build the named output of the build description in `dir`.
    fn build(&self, dir: &Path, output: &str) -> Result<(), RuntimeError>;

    /// Run `argv` with the environment of the named output activated,
    /// capturing its output.
    fn run(
        &self,
        dir: &Path,
        output: &str,
        argv: &[String],
    ) -> Result<std::process::Output, RuntimeError>;

    /// Evaluate an attribute of the build description in `dir` to its raw
    /// string value (a store path for package attributes).
    fn eval_raw(&self, dir: &Path, attr: &str) -> Result<String, RuntimeError>;

    /// Query a source URL for packages matching the given terms.
    fn search(&self, url: &str, terms: &[String]) -> Result<Vec<SearchEntry>, RuntimeError>;

    /// Best-effort store garbage collection; output goes to the caller's
    /// terminal.
    fn collect_garbage(&self) -> Result<(), RuntimeError>;
}

pub fn select_backend(name: &str) -> Result<Box<dyn BuildBackend>, RuntimeError> {
    match name {
        "nix" => Ok(Box::new(crate::nix::NixBackend::new())),
        "mock" => Ok(Box::new(crate::mock::MockBackend::new())),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}
