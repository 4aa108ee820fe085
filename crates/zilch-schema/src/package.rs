use serde::{Deserialize, Serialize};
use std::fmt;

/// An installed unit, identified by name and the source it comes from.
///
/// The full build attribute has the shape `<family>.<system>.<name>`,
/// e.g. `legacyPackages.x86_64-linux.hello`. The manifest only records
/// `name` and the source alias; the attribute is reassembled at load time
/// for the current platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Package {
    pub attribute: String,
    pub source_alias: String,
    pub version: Option<String>,
    pub description: Option<String>,
}

/// The attribute family every plain package name resolves under.
pub const DEFAULT_ATTRIBUTE_FAMILY: &str = "legacyPackages";

impl Package {
    pub fn new(attribute: impl Into<String>, source_alias: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            source_alias: source_alias.into(),
            version: None,
            description: None,
        }
    }

    /// Build a package from a bare name, qualified for the given platform.
    pub fn from_name(name: &str, system: &str, source_alias: impl Into<String>) -> Self {
        Self::new(
            format!("{DEFAULT_ATTRIBUTE_FAMILY}.{system}.{name}"),
            source_alias,
        )
    }

    /// Attribute family, e.g. `legacyPackages`.
    pub fn family(&self) -> &str {
        split_attribute(&self.attribute).0
    }

    /// Architecture and OS, e.g. `x86_64-linux`.
    pub fn system(&self) -> &str {
        split_attribute(&self.attribute).1
    }

    /// Package name; may itself contain dots (`python3Packages.numpy`).
    pub fn name(&self) -> &str {
        split_attribute(&self.attribute).2
    }

    /// Identity for equality and dedup: `(name, source alias)`.
    pub fn ident(&self) -> (&str, &str) {
        (self.name(), &self.source_alias)
    }

    /// The two-parameter lookup predicate: a `None` alias matches any source.
    pub fn matches(&self, name: &str, source_alias: Option<&str>) -> bool {
        self.name() == name && source_alias.map_or(true, |alias| self.source_alias == alias)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (from {})", self.name(), self.source_alias)
    }
}

/// Split a build attribute into `(family, system, name)`.
///
/// Everything after the second dot belongs to the name.
pub fn split_attribute(attribute: &str) -> (&str, &str, &str) {
    let mut parts = attribute.splitn(3, '.');
    let family = parts.next().unwrap_or("");
    let system = parts.next().unwrap_or("");
    let name = parts.next().unwrap_or("");
    (family, system, name)
}
