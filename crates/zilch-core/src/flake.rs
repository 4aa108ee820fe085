use crate::packages::PackageSet;
use crate::registry::SourceRegistry;
use crate::CoreError;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::debug;
use zilch_runtime::BuildBackend;

/// Name of the generated build description inside the resource directory.
pub const FLAKE_FILE_NAME: &str = "flake.nix";

/// The composite environment output aggregating all installed packages.
pub const ENV_OUTPUT: &str = "zilch-env";

const TEMPLATE: &str = include_str!("../flake.nix.template");

const INPUTS_MARK: &str = "INPUTS_HERE";
const PACKAGES_MARK: &str = "PACKAGES_HERE";
const NAMED_OUTPUTS_MARK: &str = "NAME_EQUALS_PACKAGE_HERE";

const INPUTS_INDENT: usize = 4;
const PACKAGES_INDENT: usize = 12;
const NAMED_OUTPUTS_INDENT: usize = 8;

/// Whether input URLs carry their pinned revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pin {
    /// Suffix every pinned source with `?rev=`, so the lock step records
    /// exactly the requested revisions.
    Revisions,
    /// Bare URLs: the form left on disk, so external update tooling can
    /// re-float the inputs.
    Floating,
}

/// Render the build description for the given facts.
///
/// Deterministic and order-independent: generated names derive only from
/// source aliases, input lines are set-deduplicated and sorted, and
/// package lines follow manifest order.
pub fn render(sources: &SourceRegistry, packages: &PackageSet, pin: Pin) -> String {
    let input_lines: BTreeSet<String> = sources
        .iter()
        .map(|source| {
            format!(
                "{}.url = \"{}\";",
                source.alias,
                source.input_url(pin == Pin::Revisions)
            )
        })
        .collect();
    let package_lines: Vec<String> = packages
        .iter()
        .map(|package| {
            format!(
                "inputs.{}.{}.${{system}}.{}",
                package.source_alias,
                package.family(),
                package.name()
            )
        })
        .collect();
    let named_output_lines: Vec<String> = packages
        .iter()
        .map(|package| {
            format!(
                "{alias}-{name} = inputs.{alias}.{family}.${{system}}.{name};",
                alias = package.source_alias,
                family = package.family(),
                name = package.name()
            )
        })
        .collect();

    TEMPLATE
        .replace(INPUTS_MARK, &join_indented(input_lines, INPUTS_INDENT))
        .replace(PACKAGES_MARK, &join_indented(package_lines, PACKAGES_INDENT))
        .replace(
            NAMED_OUTPUTS_MARK,
            &join_indented(named_output_lines, NAMED_OUTPUTS_INDENT),
        )
}

fn join_indented(lines: impl IntoIterator<Item = String>, indent: usize) -> String {
    let separator = format!("\n{}", " ".repeat(indent));
    lines.into_iter().collect::<Vec<_>>().join(&separator)
}

/// States of the two-phase lock cycle. Each transition is one file write
/// or one subprocess call; the whole sequence reruns from `Unsynced` on
/// the next sync, so a crash between states is safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockPhase {
    Unsynced,
    PinnedWritten,
    Locked,
    Rendered,
}

/// Write the build description through the two-phase lock cycle.
///
/// The pinned text exists on disk only long enough for the external
/// tool's lock step to record the exact revisions; the final text is the
/// floating form, so the lock artifact stays the single place a revision
/// is written down.
pub fn write_locked(
    sources: &SourceRegistry,
    packages: &PackageSet,
    dir: &Path,
    backend: &dyn BuildBackend,
) -> Result<(), CoreError> {
    fs::create_dir_all(dir)?;
    let mut phase = LockPhase::Unsynced;
    debug!(?phase, "starting lock cycle in {}", dir.display());

    fs::write(
        dir.join(FLAKE_FILE_NAME),
        render(sources, packages, Pin::Revisions),
    )?;
    phase = LockPhase::PinnedWritten;
    debug!(?phase, "pinned build description written");

    backend.lock(dir).map_err(CoreError::Lock)?;
    phase = LockPhase::Locked;
    debug!(?phase, "revisions locked");

    fs::write(
        dir.join(FLAKE_FILE_NAME),
        render(sources, packages, Pin::Floating),
    )?;
    phase = LockPhase::Rendered;
    debug!(?phase, "floating build description written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zilch_schema::{Package, Source};

    fn fixtures() -> (Vec<Source>, Vec<Package>) {
        let sources = vec![
            Source::pinned("github:NixOS/nixpkgs", "nixpkgs", "f63ce8"),
            Source::pinned("github:foo/bar", "bar", "cafeba"),
        ];
        let packages = vec![
            Package::from_name("hello", "x86_64-linux", "nixpkgs"),
            Package::from_name("cowsay", "x86_64-linux", "bar"),
        ];
        (sources, packages)
    }

    #[test]
    fn render_is_deterministic_across_insertion_order() {
        let (sources, packages) = fixtures();
        let forward = SourceRegistry::from_sources(sources.clone()).unwrap();
        let mut reversed_sources = sources;
        reversed_sources.reverse();
        let reversed = SourceRegistry::from_sources(reversed_sources).unwrap();
        let set = PackageSet::from_packages(packages);

        let a = render(&forward, &set, Pin::Floating);
        let b = render(&reversed, &set, Pin::Floating);
        assert_eq!(a, b);
        assert_eq!(a, render(&forward, &set, Pin::Floating));
    }

    #[test]
    fn floating_render_has_no_revision_literal() {
        let (sources, packages) = fixtures();
        let registry = SourceRegistry::from_sources(sources).unwrap();
        let set = PackageSet::from_packages(packages);
        let text = render(&registry, &set, Pin::Floating);
        assert!(!text.contains("?rev="));
        assert!(!text.contains("f63ce8"));
        assert!(text.contains("nixpkgs.url = \"github:NixOS/nixpkgs\";"));
    }

    #[test]
    fn pinned_render_suffixes_revisions() {
        let (sources, packages) = fixtures();
        let registry = SourceRegistry::from_sources(sources).unwrap();
        let set = PackageSet::from_packages(packages);
        let text = render(&registry, &set, Pin::Revisions);
        assert!(text.contains("nixpkgs.url = \"github:NixOS/nixpkgs?rev=f63ce8\";"));
        assert!(text.contains("bar.url = \"github:foo/bar?rev=cafeba\";"));
    }

    #[test]
    fn named_outputs_derive_from_aliases() {
        let (sources, packages) = fixtures();
        let registry = SourceRegistry::from_sources(sources).unwrap();
        let set = PackageSet::from_packages(packages);
        let text = render(&registry, &set, Pin::Floating);
        assert!(text
            .contains("nixpkgs-hello = inputs.nixpkgs.legacyPackages.${system}.hello;"));
        assert!(text.contains("bar-cowsay = inputs.bar.legacyPackages.${system}.cowsay;"));
        assert!(text.contains("inputs.bar.legacyPackages.${system}.cowsay\n"));
    }

    #[test]
    fn identical_inputs_collapse() {
        // Same (url, alias) registered once: one input line regardless of
        // how many packages reference it.
        let registry = SourceRegistry::from_sources(vec![Source::pinned(
            "github:NixOS/nixpkgs",
            "nixpkgs",
            "f63ce8",
        )])
        .unwrap();
        let set = PackageSet::from_packages(vec![
            Package::from_name("hello", "x86_64-linux", "nixpkgs"),
            Package::from_name("cowsay", "x86_64-linux", "nixpkgs"),
        ]);
        let text = render(&registry, &set, Pin::Floating);
        assert_eq!(text.matches("nixpkgs.url = ").count(), 1);
    }
}
