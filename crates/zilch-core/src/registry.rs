use crate::CoreError;
use zilch_schema::Source;

/// Named package sources, in manifest order.
///
/// A plain ordered collection: alias uniqueness is enforced here, while
/// referential consistency with installed packages is the aggregate's
/// concern.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn from_sources(sources: Vec<Source>) -> Result<Self, CoreError> {
        let mut registry = Self::default();
        for source in sources {
            registry.add(source)?;
        }
        Ok(registry)
    }

    pub fn add(&mut self, source: Source) -> Result<(), CoreError> {
        if self.get(&source.alias).is_some() {
            return Err(CoreError::DuplicateAlias(source.alias));
        }
        self.sources.push(source);
        Ok(())
    }

    pub fn remove(&mut self, alias: &str) -> Result<Source, CoreError> {
        let position = self
            .sources
            .iter()
            .position(|source| source.alias == alias)
            .ok_or_else(|| CoreError::UnknownSource(alias.to_owned()))?;
        Ok(self.sources.remove(position))
    }

    pub fn resolve(&self, alias: &str) -> Result<&Source, CoreError> {
        self.get(alias)
            .ok_or_else(|| CoreError::UnknownSource(alias.to_owned()))
    }

    pub fn get(&self, alias: &str) -> Option<&Source> {
        self.sources.iter().find(|source| source.alias == alias)
    }

    /// Pin a registered source. Used while an add operation resolves the
    /// revision of a floating source.
    pub fn set_rev(&mut self, alias: &str, rev: String) -> Result<(), CoreError> {
        let source = self
            .sources
            .iter_mut()
            .find(|source| source.alias == alias)
            .ok_or_else(|| CoreError::UnknownSource(alias.to_owned()))?;
        source.rev = Some(rev);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_duplicate_alias() {
        let mut registry = SourceRegistry::default();
        registry
            .add(Source::pinned("github:NixOS/nixpkgs", "nixpkgs", "a"))
            .unwrap();
        let err = registry
            .add(Source::pinned("github:other/fork", "nixpkgs", "b"))
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateAlias(alias) if alias == "nixpkgs"));
    }

    #[test]
    fn remove_unknown_alias_fails() {
        let mut registry = SourceRegistry::default();
        assert!(matches!(
            registry.remove("ghost"),
            Err(CoreError::UnknownSource(alias)) if alias == "ghost"
        ));
    }

    #[test]
    fn resolve_returns_registered_source() {
        let registry = SourceRegistry::from_sources(vec![
            Source::pinned("github:NixOS/nixpkgs", "nixpkgs", "a"),
            Source::pinned("github:foo/bar", "bar", "b"),
        ])
        .unwrap();
        assert_eq!(registry.resolve("bar").unwrap().url, "github:foo/bar");
        assert!(registry.resolve("baz").is_err());
    }

    #[test]
    fn order_is_preserved() {
        let registry = SourceRegistry::from_sources(vec![
            Source::pinned("github:z/z", "z", "1"),
            Source::pinned("github:a/a", "a", "2"),
        ])
        .unwrap();
        let aliases: Vec<_> = registry.iter().map(|s| s.alias.as_str()).collect();
        assert_eq!(aliases, ["z", "a"]);
    }

    #[test]
    fn set_rev_pins_in_place() {
        let mut registry =
            SourceRegistry::from_sources(vec![Source::floating("github:a/a", "a")]).unwrap();
        registry.set_rev("a", "deadbeef".to_owned()).unwrap();
        assert_eq!(registry.resolve("a").unwrap().rev.as_deref(), Some("deadbeef"));
    }
}
