use crate::flake;
use crate::packages::PackageSet;
use crate::registry::SourceRegistry;
use crate::CoreError;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use zilch_runtime::BuildBackend;
use zilch_schema::{
    resolve_manifest_path, LockArtifact, ManifestDocument, ManifestError, Package, Source,
    DEFAULT_SOURCE_ALIAS, DEFAULT_SOURCE_URL,
};

/// Installation state of a package name, as seen from the manifest and
/// the builder's store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageStatus {
    NotAdded,
    Added,
    Installed,
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAdded => write!(f, "not added"),
            Self::Added => write!(f, "added but not installed"),
            Self::Installed => write!(f, "installed"),
        }
    }
}

/// The project aggregate.
///
/// Owns the on-disk manifest document and the native source/package
/// collections derived from it. The two representations describe the same
/// facts at all times: every mutation updates both in one call, and the
/// mirror is validated after load and before every persist. Neither
/// representation is exposed mutably on its own.
#[derive(Debug)]
pub struct Project {
    doc: ManifestDocument,
    sources: SourceRegistry,
    packages: PackageSet,
}

impl Project {
    /// Load the project for `explicit_path`, falling back through the
    /// manifest path precedence rules.
    pub fn load(
        explicit_path: Option<&Path>,
        backend: &dyn BuildBackend,
    ) -> Result<Self, CoreError> {
        let path = resolve_manifest_path(explicit_path)?;
        Self::open_at(&path, backend)
    }

    /// Load the project from exactly `path` (created empty if missing).
    pub fn open_at(path: &Path, backend: &dyn BuildBackend) -> Result<Self, CoreError> {
        let doc = ManifestDocument::open(path)?;

        let sources = SourceRegistry::from_sources(doc.sources()?)?;
        let entries = doc.packages()?;
        let mut packages = Vec::with_capacity(entries.len());
        if !entries.is_empty() {
            let system = backend.current_platform()?;
            for (name, alias) in entries {
                packages.push(Package::from_name(&name, &system, alias));
            }
        }

        let mut project = Self {
            doc,
            sources,
            packages: PackageSet::from_packages(packages),
        };

        // Hand-edited or merge-conflicted manifests can carry duplicate
        // entries; normalize both representations and report each drop.
        let dropped = project.packages.dedup();
        for (index, _) in dropped.iter().rev() {
            project.doc.remove_package_at(*index)?;
        }
        for (_, package) in &dropped {
            warn!("removing duplicate package entry: {package}");
        }

        if !project.doc.had_sources_section() {
            info!("registering default source {DEFAULT_SOURCE_URL} as '{DEFAULT_SOURCE_ALIAS}'");
            project.add_source(
                Source::floating(DEFAULT_SOURCE_URL, DEFAULT_SOURCE_ALIAS),
                backend,
            )?;
        }

        project.validate()?;
        debug!(
            "loaded project: {} sources, {} packages",
            project.sources.len(),
            project.packages.len()
        );
        Ok(project)
    }

    pub fn manifest_path(&self) -> &Path {
        self.doc.path()
    }

    pub fn resource_path(&self) -> &Path {
        self.doc.resource_path()
    }

    pub fn version(&self) -> i64 {
        self.doc.version()
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    pub fn packages(&self) -> &PackageSet {
        &self.packages
    }

    /// Register a source. A floating source is pinned first: the build
    /// description is written with the other sources' pins, the external
    /// tool locks it, and the resolved revision is read back from the lock
    /// artifact; only then does the entry reach the document.
    pub fn add_source(
        &mut self,
        source: Source,
        backend: &dyn BuildBackend,
    ) -> Result<(), CoreError> {
        if self.sources.get(&source.alias).is_some() {
            return Err(CoreError::DuplicateAlias(source.alias));
        }
        let alias = source.alias.clone();
        if source.is_pinned() {
            self.doc.push_source(&source)?;
            self.sources.add(source)?;
        } else {
            self.sources.add(source)?;
            match self.resolve_revision(&alias, backend) {
                Ok(rev) => {
                    self.sources.set_rev(&alias, rev)?;
                    let pinned = self.sources.resolve(&alias)?.clone();
                    self.doc.push_source(&pinned)?;
                }
                Err(err) => {
                    // Roll the native insert back so both representations
                    // still agree.
                    let _ = self.sources.remove(&alias);
                    return Err(err);
                }
            }
        }
        self.validate()?;
        Ok(())
    }

    /// Unregister a source. Packages still referencing it are not touched
    /// here; the dangling reference is caught by the persist-time
    /// validator, so callers should check first.
    pub fn remove_source(&mut self, alias: &str) -> Result<Source, CoreError> {
        let removed = self.sources.remove(alias)?;
        if !self.doc.remove_source(alias)? {
            return Err(CoreError::MirrorMismatch(format!(
                "source '{alias}' present in memory but missing from the document"
            )));
        }
        Ok(removed)
    }

    /// Install a package from a registered source.
    pub fn add_package(
        &mut self,
        name: &str,
        source_alias: &str,
        backend: &dyn BuildBackend,
    ) -> Result<(), CoreError> {
        let source = self.sources.resolve(source_alias)?;
        let alias = source.alias.clone();
        let system = backend.current_platform()?;
        self.packages.add(Package::from_name(name, &system, alias))?;
        self.doc.push_package(name, source_alias)?;
        self.validate()?;
        Ok(())
    }

    /// Uninstall a package; `None` source alias matches any source.
    pub fn remove_package(
        &mut self,
        name: &str,
        source_alias: Option<&str>,
    ) -> Result<Package, CoreError> {
        let (package, index) = self.packages.remove(name, source_alias)?;
        self.doc.remove_package_at(index)?;
        self.validate()?;
        Ok(package)
    }

    pub fn find_package(&self, name: &str, source_alias: Option<&str>) -> Option<&Package> {
        self.packages.find(name, source_alias)
    }

    /// Whether a package is declared, and whether its build attribute has
    /// materialized in the builder's store.
    pub fn status(
        &self,
        name: &str,
        source_alias: Option<&str>,
        backend: &dyn BuildBackend,
    ) -> Result<PackageStatus, CoreError> {
        let Some(package) = self.find_package(name, source_alias) else {
            return Ok(PackageStatus::NotAdded);
        };
        let attr = format!("{}-{}", package.source_alias, package.name());
        let store_path = backend.eval_raw(self.resource_path(), &attr)?;
        if Path::new(&store_path).exists() {
            Ok(PackageStatus::Installed)
        } else {
            Ok(PackageStatus::Added)
        }
    }

    /// Validate the mirror invariant and persist the document.
    pub fn persist(&self) -> Result<(), CoreError> {
        self.validate()?;
        self.doc.persist()?;
        Ok(())
    }

    /// Check that document and native state describe the same facts:
    /// same counts, same field values, same order, and that every
    /// document source carries a pinned revision.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.doc.validate()?;

        let doc_sources = self.doc.sources()?;
        if doc_sources.len() != self.sources.len() {
            return Err(CoreError::MirrorMismatch(format!(
                "{} sources in document, {} in memory",
                doc_sources.len(),
                self.sources.len()
            )));
        }
        for (doc_source, source) in doc_sources.iter().zip(self.sources.iter()) {
            if doc_source != source {
                return Err(CoreError::MirrorMismatch(format!(
                    "source entry '{}' diverged from '{}'",
                    doc_source.alias, source.alias
                )));
            }
            if doc_source.rev.is_none() {
                return Err(CoreError::Manifest(ManifestError::FieldType {
                    key: format!("sources.{}.rev", doc_source.alias),
                    expected: "a pinned revision",
                }));
            }
        }

        let doc_packages = self.doc.packages()?;
        if doc_packages.len() != self.packages.len() {
            return Err(CoreError::MirrorMismatch(format!(
                "{} packages in document, {} in memory",
                doc_packages.len(),
                self.packages.len()
            )));
        }
        for ((doc_name, doc_alias), package) in doc_packages.iter().zip(self.packages.iter()) {
            if package.name() != doc_name || package.source_alias != *doc_alias {
                return Err(CoreError::MirrorMismatch(format!(
                    "package entry '{doc_name}' diverged from '{}'",
                    package.name()
                )));
            }
        }
        Ok(())
    }

    fn resolve_revision(
        &self,
        alias: &str,
        backend: &dyn BuildBackend,
    ) -> Result<String, CoreError> {
        let dir = self.resource_path();
        fs::create_dir_all(dir)?;
        fs::write(
            dir.join(flake::FLAKE_FILE_NAME),
            flake::render(&self.sources, &self.packages, flake::Pin::Revisions),
        )?;
        backend.lock(dir).map_err(CoreError::Lock)?;
        let artifact = LockArtifact::read_from_dir(dir)?;
        Ok(artifact.revision(alias)?.to_owned())
    }
}
