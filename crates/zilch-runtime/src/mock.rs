use crate::backend::{BuildBackend, SearchEntry};
use crate::RuntimeError;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

/// Platform identifier reported by the mock backend.
pub const MOCK_SYSTEM: &str = "x86_64-mock";

/// Deterministic in-process stand-in for the external builder.
///
/// Locking honors `?rev=` pins and otherwise derives a stable
/// pseudo-revision from the input URL, so the two-phase lock protocol is
/// fully exercisable. Building materializes one marker file per named
/// output under `<dir>/store/`, which is what attribute evaluation then
/// points at. Output attributes containing `broken` fail the build, for
/// testing failure propagation.
#[derive(Default)]
pub struct MockBackend;

impl MockBackend {
    pub fn new() -> Self {
        Self
    }

    fn pseudo_rev(url: &str) -> String {
        let mut hex = blake3::hash(url.as_bytes()).to_hex().to_string();
        hex.truncate(40);
        hex
    }
}

/// Extract `(alias, url)` pairs from a build description's input lines.
fn parse_input_lines(text: &str) -> Vec<(String, String)> {
    let mut inputs = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        let Some((alias, rest)) = line.split_once(".url = \"") else {
            continue;
        };
        let Some(url) = rest.strip_suffix("\";") else {
            continue;
        };
        inputs.push((alias.to_owned(), url.to_owned()));
    }
    inputs
}

/// Extract the alias-qualified named outputs (`<attr> = inputs.…;`).
fn parse_named_outputs(text: &str) -> Vec<String> {
    let mut attrs = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if !line.ends_with(';') {
            continue;
        }
        let Some((attr, rest)) = line.split_once(" = inputs.") else {
            continue;
        };
        if attr.contains(' ') || attr.contains('"') || rest.is_empty() {
            continue;
        }
        attrs.push(attr.to_owned());
    }
    attrs
}

impl BuildBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn current_platform(&self) -> Result<String, RuntimeError> {
        Ok(MOCK_SYSTEM.to_owned())
    }

    fn lock(&self, dir: &Path) -> Result<(), RuntimeError> {
        let text = fs::read_to_string(dir.join("flake.nix"))?;
        let mut nodes = serde_json::Map::new();
        for (alias, url) in parse_input_lines(&text) {
            let rev = match url.split_once("?rev=") {
                Some((_, pinned)) => pinned.to_owned(),
                None => Self::pseudo_rev(&url),
            };
            debug!("mock lock: {alias} -> {rev}");
            nodes.insert(
                alias,
                serde_json::json!({ "locked": { "rev": rev, "url": url } }),
            );
        }
        nodes.insert("root".to_owned(), serde_json::json!({}));
        let lock = serde_json::json!({ "nodes": nodes, "version": 7 });
        fs::write(
            dir.join("flake.lock"),
            serde_json::to_string_pretty(&lock).map_err(|e| RuntimeError::InvalidOutput {
                op: "lock revisions".to_owned(),
                detail: e.to_string(),
            })?,
        )?;
        Ok(())
    }

    fn build(&self, dir: &Path, output: &str) -> Result<(), RuntimeError> {
        let text = fs::read_to_string(dir.join("flake.nix"))?;
        let attrs = parse_named_outputs(&text);
        if let Some(bad) = attrs.iter().find(|attr| attr.contains("broken")) {
            return Err(RuntimeError::Tool {
                op: "build environment".to_owned(),
                code: Some(1),
                stdout: String::new(),
                stderr: format!("error: attribute '{bad}' does not evaluate"),
            });
        }
        let store = dir.join("store");
        if store.exists() {
            fs::remove_dir_all(&store)?;
        }
        fs::create_dir_all(&store)?;
        for attr in attrs {
            fs::write(store.join(&attr), format!("{output}:{attr}\n"))?;
        }
        Ok(())
    }

    fn run(&self, dir: &Path, output: &str, argv: &[String]) -> Result<Output, RuntimeError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(RuntimeError::InvalidOutput {
                op: "run in environment".to_owned(),
                detail: "empty command".to_owned(),
            });
        };
        let result = Command::new(program)
            .args(args)
            .current_dir(dir)
            .env("ZILCH_MOCK_ENV", "1")
            .env("ZILCH_MOCK_OUTPUT", output)
            .output()
            .map_err(|source| RuntimeError::Spawn {
                program: program.clone(),
                source,
            })?;
        if result.status.success() {
            Ok(result)
        } else {
            Err(RuntimeError::Tool {
                op: "run in environment".to_owned(),
                code: result.status.code(),
                stdout: String::from_utf8_lossy(&result.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            })
        }
    }

    fn eval_raw(&self, dir: &Path, attr: &str) -> Result<String, RuntimeError> {
        Ok(dir.join("store").join(attr).to_string_lossy().into_owned())
    }

    fn search(&self, url: &str, terms: &[String]) -> Result<Vec<SearchEntry>, RuntimeError> {
        Ok(terms
            .iter()
            .map(|term| SearchEntry {
                attribute: format!("legacyPackages.{MOCK_SYSTEM}.{term}"),
                version: "1.0".to_owned(),
                description: format!("Mock entry for {term} from {url}"),
            })
            .collect())
    }

    fn collect_garbage(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAKE: &str = r#"{
  inputs = {
    nixpkgs.url = "github:NixOS/nixpkgs";
    extra.url = "github:foo/bar?rev=cafebabe";
  };
  outputs = { self, nixpkgs, ... } @ inputs: {
    packages = {
      zilch-env = inputs.nixpkgs.legacyPackages.${system}.buildEnv {
        paths = [
          inputs.nixpkgs.legacyPackages.${system}.hello
        ];
      };
      nixpkgs-hello = inputs.nixpkgs.legacyPackages.${system}.hello;
    };
  };
}
"#;

    #[test]
    fn lock_honors_rev_pins_and_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("flake.nix"), FLAKE).unwrap();
        let backend = MockBackend::new();
        backend.lock(dir.path()).unwrap();

        let lock: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("flake.lock")).unwrap())
                .unwrap();
        assert_eq!(lock["nodes"]["extra"]["locked"]["rev"], "cafebabe");
        let first = lock["nodes"]["nixpkgs"]["locked"]["rev"].clone();

        backend.lock(dir.path()).unwrap();
        let again: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("flake.lock")).unwrap())
                .unwrap();
        assert_eq!(again["nodes"]["nixpkgs"]["locked"]["rev"], first);
    }

    #[test]
    fn build_creates_markers_for_named_outputs_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("flake.nix"), FLAKE).unwrap();
        let backend = MockBackend::new();
        backend.build(dir.path(), "zilch-env").unwrap();

        assert!(dir.path().join("store/nixpkgs-hello").exists());
        // The composite-env binding opens a block, it is not a named output.
        assert!(!dir.path().join("store/zilch-env").exists());
    }

    #[test]
    fn broken_attribute_fails_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let flake = FLAKE.replace("nixpkgs-hello", "nixpkgs-broken");
        fs::write(dir.path().join("flake.nix"), flake).unwrap();
        let backend = MockBackend::new();
        let err = backend.build(dir.path(), "zilch-env").unwrap_err();
        assert!(matches!(err, RuntimeError::Tool { code: Some(1), .. }));
        assert!(err.to_string().contains("nixpkgs-broken"));
    }

    #[test]
    fn run_overlays_the_mock_environment() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::new();
        let output = backend
            .run(
                dir.path(),
                "zilch-env",
                &["sh".to_owned(), "-c".to_owned(), "echo $ZILCH_MOCK_ENV".to_owned()],
            )
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1");
    }

    #[test]
    fn failing_command_surfaces_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::new();
        let err = backend
            .run(dir.path(), "zilch-env", &["false".to_owned()])
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Tool { code: Some(1), .. }));
    }
}
