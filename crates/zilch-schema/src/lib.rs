//! Manifest document, data types, and lock-artifact access for zilch.
//!
//! This crate defines the schema layer: the comment-preserving TOML
//! manifest (`ManifestDocument`), the `Source` and `Package` types, the
//! manifest path resolution rules, and read access to the builder-owned
//! lock artifact (`LockArtifact`).

pub mod document;
pub mod lock;
pub mod package;
pub mod source;

pub use document::{
    resolve_manifest_path, user_global_manifest, ManifestDocument, ManifestError,
    MANIFEST_FILE_NAME, MANIFEST_PATH_ENV,
};
pub use lock::{LockArtifact, LockArtifactError, LOCK_FILE_NAME};
pub use package::{split_attribute, Package, DEFAULT_ATTRIBUTE_FAMILY};
pub use source::{Source, DEFAULT_SOURCE_ALIAS, DEFAULT_SOURCE_URL};
