use std::fs;
use std::path::Path;
use thiserror::Error;

/// File the external tool writes its resolved revisions into.
pub const LOCK_FILE_NAME: &str = "flake.lock";

#[derive(Debug, Error)]
pub enum LockArtifactError {
    #[error("failed to read lock artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse lock artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("lock artifact records no revision for source '{0}'")]
    MissingRevision(String),
}

/// The builder-owned lock artifact.
///
/// Its format belongs to the external tool; zilch reads exactly one field
/// per source alias (`nodes.<alias>.locked.rev`) and treats everything
/// else as opaque.
#[derive(Debug)]
pub struct LockArtifact {
    root: serde_json::Value,
}

impl LockArtifact {
    pub fn read_from_dir(dir: &Path) -> Result<Self, LockArtifactError> {
        let text = fs::read_to_string(dir.join(LOCK_FILE_NAME))?;
        Ok(Self {
            root: serde_json::from_str(&text)?,
        })
    }

    /// The exact revision recorded for the input registered under `alias`.
    pub fn revision(&self, alias: &str) -> Result<&str, LockArtifactError> {
        self.root
            .get("nodes")
            .and_then(|nodes| nodes.get(alias))
            .and_then(|node| node.get("locked"))
            .and_then(|locked| locked.get("rev"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| LockArtifactError::MissingRevision(alias.to_owned()))
    }
}
