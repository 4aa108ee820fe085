use crate::source::Source;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml_edit::{value, ArrayOfTables, DocumentMut, Item, Table};
use tracing::debug;

/// File name looked for in the working directory and under explicit
/// directory paths.
pub const MANIFEST_FILE_NAME: &str = "zilch.toml";

/// Environment variable overriding the manifest location.
pub const MANIFEST_PATH_ENV: &str = "ZILCH_PATH";

const DEFAULT_MANIFEST_VERSION: i64 = 1;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml_edit::TomlError),
    #[error("manifest field '{key}' must be {expected}")]
    FieldType { key: String, expected: &'static str },
    #[error("two sources share the alias '{0}'")]
    DuplicateAlias(String),
    #[error("package '{package}' references unknown source '{source_alias}'")]
    DanglingSource {
        package: String,
        source_alias: String,
    },
    #[error("{section} entry {index} out of range")]
    EntryOutOfRange { section: &'static str, index: usize },
    #[error("cannot locate the user configuration directories")]
    NoUserDirs,
}

/// The on-disk manifest, held as a formatting-preserving TOML document.
///
/// Comments and layout survive any field the API does not structurally
/// touch. All reads and structural edits go through typed accessors; the
/// raw document is never exposed.
#[derive(Debug)]
pub struct ManifestDocument {
    doc: DocumentMut,
    path: PathBuf,
    version: i64,
    resource_path: PathBuf,
    had_sources_section: bool,
}

impl ManifestDocument {
    /// Open (creating if necessary) the manifest at `path`.
    ///
    /// Parent directories are created as needed, a missing file starts
    /// empty, the format version defaults to 1, and the per-manifest
    /// resource directory is derived and created. Fails on malformed TOML
    /// or an invariant violation; never partially loads.
    pub fn open(path: &Path) -> Result<Self, ManifestError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if !path.exists() {
            fs::write(path, "")?;
        }

        let text = fs::read_to_string(path)?;
        let mut doc: DocumentMut = text.parse()?;

        let version = match doc.get("version") {
            None => {
                doc.insert("version", value(DEFAULT_MANIFEST_VERSION));
                DEFAULT_MANIFEST_VERSION
            }
            Some(item) => item.as_integer().ok_or(ManifestError::FieldType {
                key: "version".to_owned(),
                expected: "an integer",
            })?,
        };

        let resource_path = match doc.get("resource_path") {
            None => default_resource_path(path)?,
            Some(item) => PathBuf::from(item.as_str().ok_or(ManifestError::FieldType {
                key: "resource_path".to_owned(),
                expected: "a string",
            })?),
        };

        let had_sources_section = doc.contains_key("sources");
        for section in ["sources", "packages"] {
            match doc.get(section) {
                None => {
                    doc.insert(section, Item::ArrayOfTables(ArrayOfTables::new()));
                }
                Some(item) if item.is_array_of_tables() => {}
                Some(_) => {
                    return Err(ManifestError::FieldType {
                        key: section.to_owned(),
                        expected: "an array of tables",
                    })
                }
            }
        }

        let manifest = Self {
            doc,
            path: path.to_path_buf(),
            version,
            resource_path,
            had_sources_section,
        };
        manifest.validate()?;
        debug!(
            "opened manifest {} (version {version})",
            manifest.path.display()
        );
        Ok(manifest)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Per-manifest scratch directory holding the generated build
    /// description and lock artifact.
    pub fn resource_path(&self) -> &Path {
        &self.resource_path
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    /// Whether the document had no `sources` section at all when opened.
    /// Used to decide whether to register the default source.
    pub fn had_sources_section(&self) -> bool {
        self.had_sources_section
    }

    /// Check the document-level invariants: pairwise-distinct source
    /// aliases and no package referencing an unregistered source.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let sources = self.sources()?;
        let mut aliases = BTreeSet::new();
        for source in &sources {
            if !aliases.insert(source.alias.clone()) {
                return Err(ManifestError::DuplicateAlias(source.alias.clone()));
            }
        }
        for (name, alias) in self.packages()? {
            if !aliases.contains(&alias) {
                return Err(ManifestError::DanglingSource {
                    package: name,
                    source_alias: alias,
                });
            }
        }
        Ok(())
    }

    /// Serialize the document back to disk, formatting preserved.
    pub fn persist(&self) -> Result<(), ManifestError> {
        self.validate()?;
        fs::write(&self.path, self.doc.to_string())?;
        Ok(())
    }

    /// Source entries in document order.
    pub fn sources(&self) -> Result<Vec<Source>, ManifestError> {
        self.array("sources")?
            .iter()
            .map(|entry| {
                Ok(Source {
                    url: str_field(entry, "url")?,
                    alias: str_field(entry, "alias")?,
                    rev: opt_str_field(entry, "rev")?,
                })
            })
            .collect()
    }

    /// Package entries in document order, as `(name, source alias)`.
    pub fn packages(&self) -> Result<Vec<(String, String)>, ManifestError> {
        self.array("packages")?
            .iter()
            .map(|entry| Ok((str_field(entry, "name")?, str_field(entry, "source")?)))
            .collect()
    }

    pub fn push_source(&mut self, source: &Source) -> Result<(), ManifestError> {
        let mut entry = Table::new();
        entry["url"] = value(source.url.as_str());
        entry["alias"] = value(source.alias.as_str());
        if let Some(rev) = &source.rev {
            entry["rev"] = value(rev.as_str());
        }
        self.array_mut("sources")?.push(entry);
        Ok(())
    }

    /// Remove the source entry with the given alias. Returns whether an
    /// entry was removed.
    pub fn remove_source(&mut self, alias: &str) -> Result<bool, ManifestError> {
        let entries = self.array_mut("sources")?;
        let position = entries
            .iter()
            .position(|entry| entry.get("alias").and_then(Item::as_str) == Some(alias));
        match position {
            Some(index) => {
                entries.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn push_package(&mut self, name: &str, source_alias: &str) -> Result<(), ManifestError> {
        let mut entry = Table::new();
        entry["name"] = value(name);
        entry["source"] = value(source_alias);
        self.array_mut("packages")?.push(entry);
        Ok(())
    }

    /// Remove the package entry at `index` (document order).
    pub fn remove_package_at(&mut self, index: usize) -> Result<(), ManifestError> {
        let entries = self.array_mut("packages")?;
        if index >= entries.len() {
            return Err(ManifestError::EntryOutOfRange {
                section: "packages",
                index,
            });
        }
        entries.remove(index);
        Ok(())
    }

    fn array(&self, key: &'static str) -> Result<&ArrayOfTables, ManifestError> {
        self.doc
            .get(key)
            .and_then(Item::as_array_of_tables)
            .ok_or(ManifestError::FieldType {
                key: key.to_owned(),
                expected: "an array of tables",
            })
    }

    fn array_mut(&mut self, key: &'static str) -> Result<&mut ArrayOfTables, ManifestError> {
        self.doc
            .get_mut(key)
            .and_then(Item::as_array_of_tables_mut)
            .ok_or(ManifestError::FieldType {
                key: key.to_owned(),
                expected: "an array of tables",
            })
    }
}

fn str_field(entry: &Table, key: &str) -> Result<String, ManifestError> {
    entry
        .get(key)
        .and_then(Item::as_str)
        .map(ToOwned::to_owned)
        .ok_or(ManifestError::FieldType {
            key: key.to_owned(),
            expected: "a string",
        })
}

fn opt_str_field(entry: &Table, key: &str) -> Result<Option<String>, ManifestError> {
    match entry.get(key) {
        None => Ok(None),
        Some(item) => item
            .as_str()
            .map(|s| Some(s.to_owned()))
            .ok_or(ManifestError::FieldType {
                key: key.to_owned(),
                expected: "a string",
            }),
    }
}

/// Resolve which manifest file to use.
///
/// Precedence: explicit caller path, then `ZILCH_PATH`, then a manifest in
/// the working directory, then the user-global default. A path naming a
/// directory means the manifest inside it.
pub fn resolve_manifest_path(explicit: Option<&Path>) -> Result<PathBuf, ManifestError> {
    let env_override = env::var_os(MANIFEST_PATH_ENV).map(PathBuf::from);
    let cwd = env::current_dir()?;
    Ok(resolve_from(
        explicit.map(Path::to_path_buf),
        env_override,
        &cwd,
        user_global_manifest()?,
    ))
}

fn resolve_from(
    explicit: Option<PathBuf>,
    env_override: Option<PathBuf>,
    cwd: &Path,
    user_global: PathBuf,
) -> PathBuf {
    let chosen = explicit.or(env_override).unwrap_or_else(|| {
        let local = cwd.join(MANIFEST_FILE_NAME);
        if local.exists() {
            local
        } else {
            user_global
        }
    });
    if chosen.is_dir() {
        chosen.join(MANIFEST_FILE_NAME)
    } else {
        chosen
    }
}

/// The user-global manifest location, e.g. `~/.config/zilch/zilch.toml`.
pub fn user_global_manifest() -> Result<PathBuf, ManifestError> {
    let dirs = directories::BaseDirs::new().ok_or(ManifestError::NoUserDirs)?;
    Ok(dirs.config_dir().join("zilch").join(MANIFEST_FILE_NAME))
}

// Matches the classic conservative URL quoting: everything but
// alphanumerics and `-._~` is escaped, so any absolute path maps to a
// single flat directory name.
const DIR_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn default_resource_path(manifest_path: &Path) -> Result<PathBuf, ManifestError> {
    let dirs = directories::BaseDirs::new().ok_or(ManifestError::NoUserDirs)?;
    let parent = manifest_path.parent().unwrap_or_else(|| Path::new(""));
    let encoded = utf8_percent_encode(&parent.to_string_lossy(), DIR_SEGMENT).to_string();
    Ok(dirs.data_dir().join("zilch").join(encoded))
}
