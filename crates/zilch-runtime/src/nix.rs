use crate::backend::{BuildBackend, SearchEntry};
use crate::RuntimeError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::OnceLock;
use tracing::debug;

/// Backend driving the real `nix` binary.
pub struct NixBackend {
    program: String,
    /// Current-platform identifier, queried lazily and at most once per
    /// process run.
    system: OnceLock<String>,
}

#[derive(Debug, Deserialize)]
struct RawSearchEntry {
    #[serde(default)]
    version: String,
    #[serde(default)]
    description: String,
}

impl Default for NixBackend {
    fn default() -> Self {
        Self {
            program: "nix".to_owned(),
            system: OnceLock::new(),
        }
    }
}

impl NixBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            system: OnceLock::new(),
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.program)
    }

    fn run_tool(&self, op: &str, command: &mut Command) -> Result<Output, RuntimeError> {
        debug!("running {:?}", command);
        let output = command.output().map_err(|source| RuntimeError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(RuntimeError::Tool {
                op: op.to_owned(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

impl BuildBackend for NixBackend {
    fn name(&self) -> &str {
        "nix"
    }

    fn available(&self) -> bool {
        self.command()
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn current_platform(&self) -> Result<String, RuntimeError> {
        if let Some(system) = self.system.get() {
            return Ok(system.clone());
        }
        let output = self.run_tool(
            "evaluate current platform",
            self.command().args([
                "eval",
                "--impure",
                "--raw",
                "--expr",
                "builtins.currentSystem",
            ]),
        )?;
        let system = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if system.is_empty() {
            return Err(RuntimeError::InvalidOutput {
                op: "evaluate current platform".to_owned(),
                detail: "empty platform identifier".to_owned(),
            });
        }
        Ok(self.system.get_or_init(|| system).clone())
    }

    fn lock(&self, dir: &Path) -> Result<(), RuntimeError> {
        self.run_tool(
            "lock revisions",
            self.command().args(["flake", "lock"]).current_dir(dir),
        )?;
        Ok(())
    }

    fn build(&self, dir: &Path, output: &str) -> Result<(), RuntimeError> {
        self.run_tool(
            "build environment",
            self.command()
                .args(["build", &format!(".#{output}")])
                .current_dir(dir),
        )?;
        Ok(())
    }

    fn run(&self, dir: &Path, output: &str, argv: &[String]) -> Result<Output, RuntimeError> {
        if argv.is_empty() {
            return Err(RuntimeError::InvalidOutput {
                op: "run in environment".to_owned(),
                detail: "empty command".to_owned(),
            });
        }
        self.run_tool(
            "run in environment",
            self.command()
                .args(["shell", &format!(".#{output}"), "--command"])
                .args(argv)
                .current_dir(dir),
        )
    }

    fn eval_raw(&self, dir: &Path, attr: &str) -> Result<String, RuntimeError> {
        let output = self.run_tool(
            "evaluate attribute",
            self.command()
                .args(["eval", "--raw", &format!(".#{attr}")])
                .current_dir(dir),
        )?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    fn search(&self, url: &str, terms: &[String]) -> Result<Vec<SearchEntry>, RuntimeError> {
        let output = self.run_tool(
            "search packages",
            self.command()
                .arg("search")
                .arg(url)
                .args(terms)
                .arg("--json"),
        )?;
        let raw: BTreeMap<String, RawSearchEntry> = serde_json::from_slice(&output.stdout)
            .map_err(|e| RuntimeError::InvalidOutput {
                op: "search packages".to_owned(),
                detail: e.to_string(),
            })?;
        Ok(raw
            .into_iter()
            .map(|(attribute, entry)| SearchEntry {
                attribute,
                version: entry.version,
                description: entry.description,
            })
            .collect())
    }

    fn collect_garbage(&self) -> Result<(), RuntimeError> {
        // Output is left attached to the terminal so progress reaches the
        // user directly.
        let status = self
            .command()
            .args(["store", "gc"])
            .status()
            .map_err(|source| RuntimeError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(RuntimeError::Tool {
                op: "garbage collection".to_owned(),
                code: status.code(),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }
}
