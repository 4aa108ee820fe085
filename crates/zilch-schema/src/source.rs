use serde::{Deserialize, Serialize};
use std::fmt;

/// A named, URL-addressed origin of packages.
///
/// A source with `rev: None` is *floating*; once registered in a project it
/// is pinned to an immutable revision and `rev` is always `Some`. `None` is
/// only transiently valid while an add operation resolves the revision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub alias: String,
    pub rev: Option<String>,
}

impl Source {
    /// A floating source, to be pinned during registration.
    pub fn floating(url: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alias: alias.into(),
            rev: None,
        }
    }

    pub fn pinned(
        url: impl Into<String>,
        alias: impl Into<String>,
        rev: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            alias: alias.into(),
            rev: Some(rev.into()),
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.rev.is_some()
    }

    /// The URL as it appears in a build-description input line.
    ///
    /// With `with_rev`, a pinned source carries its revision as a `?rev=`
    /// query suffix so the external tool locks exactly that revision.
    pub fn input_url(&self, with_rev: bool) -> String {
        match (&self.rev, with_rev) {
            (Some(rev), true) => format!("{}?rev={rev}", self.url),
            _ => self.url.clone(),
        }
    }
}

/// The source registered automatically when a manifest declares none.
pub const DEFAULT_SOURCE_URL: &str = "github:NixOS/nixpkgs";
pub const DEFAULT_SOURCE_ALIAS: &str = "nixpkgs";

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.alias, self.url)
    }
}
