use crate::CoreError;
use std::collections::BTreeSet;
use zilch_schema::Package;

/// Installed packages, in manifest order.
#[derive(Debug, Default)]
pub struct PackageSet {
    packages: Vec<Package>,
}

impl PackageSet {
    pub fn from_packages(packages: Vec<Package>) -> Self {
        Self { packages }
    }

    pub fn add(&mut self, package: Package) -> Result<(), CoreError> {
        if self
            .packages
            .iter()
            .any(|existing| existing.ident() == package.ident())
        {
            return Err(CoreError::DuplicateInstall {
                name: package.name().to_owned(),
                source_alias: package.source_alias.clone(),
            });
        }
        self.packages.push(package);
        Ok(())
    }

    /// Index of the first package matching the predicate; `None` alias
    /// matches any source.
    pub fn position(&self, name: &str, source_alias: Option<&str>) -> Option<usize> {
        self.packages
            .iter()
            .position(|package| package.matches(name, source_alias))
    }

    pub fn find(&self, name: &str, source_alias: Option<&str>) -> Option<&Package> {
        self.position(name, source_alias)
            .map(|index| &self.packages[index])
    }

    /// Remove the first matching package, returning it with the index it
    /// occupied so the document mirror can drop the same entry.
    pub fn remove(
        &mut self,
        name: &str,
        source_alias: Option<&str>,
    ) -> Result<(Package, usize), CoreError> {
        let index = self
            .position(name, source_alias)
            .ok_or_else(|| CoreError::PackageNotFound(name.to_owned()))?;
        Ok((self.packages.remove(index), index))
    }

    /// Drop structurally duplicate entries, keeping the first of each
    /// identity. Returns the dropped packages with their original indexes
    /// in ascending order.
    pub fn dedup(&mut self) -> Vec<(usize, Package)> {
        let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
        let mut dropped_indexes = Vec::new();
        for (index, package) in self.packages.iter().enumerate() {
            let ident = (package.name().to_owned(), package.source_alias.clone());
            if !seen.insert(ident) {
                dropped_indexes.push(index);
            }
        }
        let mut dropped = Vec::new();
        for index in dropped_indexes.iter().rev() {
            dropped.push((*index, self.packages.remove(*index)));
        }
        dropped.reverse();
        dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
