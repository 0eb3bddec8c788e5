//! Parsers for npm `package.json` and `package-lock.json` files.
//!
//! `package.json` provides the project name and its direct declarations.
//! `package-lock.json` (lockfile versions 1, 2 and 3) provides the resolved
//! version of every hoisted package and the requirements packages place on
//! each other.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::types::{Declaration, DependencyKind, Ecosystem, LockedPackage, PackageId, ParsedManifest};
use super::{directory_name, ManifestKind, ManifestParser, ParseError, ParseResult};

/// Represents the structure of a package.json file.
///
/// Only the fields relevant to dependency analysis are modeled; everything
/// else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    /// Package name
    pub name: Option<String>,
    /// Package version
    pub version: Option<String>,
    /// Runtime dependencies
    pub dependencies: Option<BTreeMap<String, String>>,
    /// Development-only dependencies
    pub dev_dependencies: Option<BTreeMap<String, String>>,
    /// Dependencies the host must provide
    pub peer_dependencies: Option<BTreeMap<String, String>>,
    /// Dependencies that may fail to install
    pub optional_dependencies: Option<BTreeMap<String, String>>,
}

impl PackageJson {
    /// Returns true if any dependency section is non-empty.
    pub fn has_dependencies(&self) -> bool {
        self.sections().any(|(_, deps)| !deps.is_empty())
    }

    /// Iterates over the dependency sections with the kind each one implies.
    pub fn sections(&self) -> impl Iterator<Item = (DependencyKind, &BTreeMap<String, String>)> {
        [
            (DependencyKind::Normal, &self.dependencies),
            (DependencyKind::Dev, &self.dev_dependencies),
            (DependencyKind::Peer, &self.peer_dependencies),
            (DependencyKind::Optional, &self.optional_dependencies),
        ]
        .into_iter()
        .filter_map(|(kind, deps)| deps.as_ref().map(|d| (kind, d)))
    }
}

/// Parses a package.json from a string.
///
/// # Example
///
/// ```
/// use deplens::parser::package_json::parse_str;
///
/// let json = r#"{"name": "my-app", "version": "1.0.0"}"#;
/// let pkg = parse_str(json).unwrap();
/// assert_eq!(pkg.name, Some("my-app".to_string()));
/// ```
pub fn parse_str(content: &str) -> ParseResult<PackageJson> {
    let pkg: PackageJson = serde_json::from_str(content)?;
    Ok(pkg)
}

/// Parser for `package.json`.
pub struct PackageJsonParser;

impl ManifestParser for PackageJsonParser {
    fn parse(&self, path: &Path, content: &str) -> ParseResult<ParsedManifest> {
        let pkg = parse_str(content)?;
        let project_name = pkg
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| directory_name(path));
        let project = PackageId::new(Ecosystem::Npm, project_name);
        let mut manifest = ParsedManifest::new(path, ManifestKind::PackageJson, project);

        for (kind, deps) in pkg.sections() {
            for (name, raw) in deps {
                let id = PackageId::new(Ecosystem::Npm, name);
                let requirement = manifest.requirement(&id, raw);
                manifest
                    .declarations
                    .push(Declaration::direct(id, requirement, kind, path));
            }
        }
        Ok(manifest)
    }
}

/// Top level of a package-lock.json (any lockfile version).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageLock {
    name: Option<String>,
    #[serde(default)]
    lockfile_version: Option<u32>,
    /// lockfile v2/v3: keyed by install path (`node_modules/a/node_modules/b`)
    #[serde(default)]
    packages: BTreeMap<String, LockEntry>,
    /// lockfile v1 (and the v2 compatibility section): nested by name
    #[serde(default)]
    dependencies: BTreeMap<String, LegacyLockEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockEntry {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    dev: bool,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    link: bool,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    optional_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    peer_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyLockEntry {
    version: Option<String>,
    #[serde(default)]
    requires: BTreeMap<String, String>,
    #[serde(default)]
    dependencies: BTreeMap<String, LegacyLockEntry>,
}

/// Package name from an install path: the part after the last `node_modules/`.
fn name_from_install_path(key: &str) -> Option<&str> {
    key.rsplit_once("node_modules/")
        .map(|(_, name)| name)
        .filter(|name| !name.is_empty())
}

fn push_requirements(
    manifest: &mut ParsedManifest,
    path: &Path,
    dependent: Option<&PackageId>,
    deps: &BTreeMap<String, String>,
    kind: DependencyKind,
    nested: impl Fn(&str) -> bool,
) {
    for (name, raw) in deps {
        let id = PackageId::new(Ecosystem::Npm, name);
        let requirement = manifest.requirement(&id, raw);
        let declaration = match dependent {
            Some(dependent) => {
                Declaration::transitive(dependent.clone(), id, requirement, kind, path).with_nested(nested(name))
            }
            None => Declaration::direct(id, requirement, kind, path),
        };
        manifest.declarations.push(declaration);
    }
}

/// Follows node's lookup from the install path `from` upwards and reports
/// whether `dependency` lands on a copy other than `node_modules/<dependency>`.
fn resolves_nested(packages: &BTreeMap<String, LockEntry>, from: &str, dependency: &str) -> bool {
    let mut base = from;
    while !base.is_empty() {
        if packages.contains_key(&format!("{}/node_modules/{}", base, dependency)) {
            return true;
        }
        base = base.rsplit_once("/node_modules/").map_or("", |(parent, _)| parent);
    }
    false
}

fn parse_packages_section(manifest: &mut ParsedManifest, path: &Path, packages: &BTreeMap<String, LockEntry>) {
    for (key, entry) in packages {
        if entry.link {
            continue;
        }
        let dependent = if key.is_empty() {
            None
        } else {
            // workspace folders outside node_modules are not registry packages
            let Some(name) = name_from_install_path(key) else {
                continue;
            };
            let id = PackageId::new(Ecosystem::Npm, name);
            // only the hoisted copy decides the resolved version
            if key.strip_prefix("node_modules/") == Some(name) {
                if let Some(version) = &entry.version {
                    manifest.locked.push(LockedPackage::new(id.clone(), version));
                }
            }
            Some(id)
        };

        let runtime = if entry.dev {
            DependencyKind::Dev
        } else if entry.optional {
            DependencyKind::Optional
        } else {
            DependencyKind::Normal
        };
        let nested = |dependency: &str| resolves_nested(packages, key, dependency);
        push_requirements(manifest, path, dependent.as_ref(), &entry.dependencies, runtime, nested);
        push_requirements(
            manifest,
            path,
            dependent.as_ref(),
            &entry.optional_dependencies,
            DependencyKind::Optional,
            nested,
        );
        push_requirements(manifest, path, dependent.as_ref(), &entry.peer_dependencies, DependencyKind::Peer, nested);
        if dependent.is_none() {
            push_requirements(manifest, path, None, &entry.dev_dependencies, DependencyKind::Dev, nested);
        }
    }
}

fn parse_legacy_section(manifest: &mut ParsedManifest, path: &Path, dependencies: &BTreeMap<String, LegacyLockEntry>) {
    // each stack item carries the nested scopes enclosing it; the top level has none
    type Scope<'a> = &'a BTreeMap<String, LegacyLockEntry>;
    let mut stack: Vec<(Scope<'_>, Vec<Scope<'_>>)> = vec![(dependencies, Vec::new())];
    while let Some((entries, scopes)) = stack.pop() {
        for (name, entry) in entries {
            let id = PackageId::new(Ecosystem::Npm, name);
            if scopes.is_empty() {
                if let Some(version) = &entry.version {
                    manifest.locked.push(LockedPackage::new(id.clone(), version));
                }
            }
            let nested = |dependency: &str| {
                entry.dependencies.contains_key(dependency) || scopes.iter().any(|s| s.contains_key(dependency))
            };
            push_requirements(manifest, path, Some(&id), &entry.requires, DependencyKind::Normal, nested);
            if !entry.dependencies.is_empty() {
                let mut inner = scopes.clone();
                inner.push(&entry.dependencies);
                stack.push((&entry.dependencies, inner));
            }
        }
    }
}

/// Parser for `package-lock.json` and `npm-shrinkwrap.json`.
pub struct PackageLockParser;

impl ManifestParser for PackageLockParser {
    fn parse(&self, path: &Path, content: &str) -> ParseResult<ParsedManifest> {
        let lock: PackageLock = serde_json::from_str(content)?;
        let version = lock.lockfile_version.unwrap_or(1);
        if !(1..=3).contains(&version) {
            return Err(ParseError::InvalidManifest(format!(
                "unsupported lockfileVersion {}",
                version
            )));
        }

        let root_name = lock
            .name
            .clone()
            .or_else(|| lock.packages.get("").and_then(|root| root.name.clone()))
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| directory_name(path));
        let project = PackageId::new(Ecosystem::Npm, root_name);
        let mut manifest = ParsedManifest::new(path, ManifestKind::PackageLock, project);

        if !lock.packages.is_empty() {
            parse_packages_section(&mut manifest, path, &lock.packages);
        } else {
            parse_legacy_section(&mut manifest, path, &lock.dependencies);
        }
        Ok(manifest)
    }
}
