//! Parsers for `Cargo.toml` and `Cargo.lock`.

use std::collections::BTreeMap;
use std::path::Path;
use toml::{Table, Value};

use super::types::{Declaration, DependencyKind, Ecosystem, LockedPackage, PackageId, ParsedManifest};
use super::{directory_name, ManifestKind, ManifestParser, ParseError, ParseResult};
use crate::version::{compare, Comparison, Requirement};

/// Dependency tables and the kind each one implies.
const DEPENDENCY_TABLES: &[(&str, DependencyKind)] = &[
    ("dependencies", DependencyKind::Normal),
    ("dev-dependencies", DependencyKind::Dev),
    ("build-dependencies", DependencyKind::Build),
];

/// Parser for `Cargo.toml`.
pub struct CargoTomlParser;

/// Adds one declaration per entry of a dependency table.
fn push_table(manifest: &mut ParsedManifest, path: &Path, table: &Table, kind: DependencyKind) {
    for (key, spec) in table {
        let (name, requirement, kind) = match spec {
            Value::String(raw) => {
                let id = PackageId::new(Ecosystem::Cargo, key);
                (id.name.clone(), manifest.requirement(&id, raw), kind)
            }
            Value::Table(detail) => {
                // `package = "real-name"` renames the dependency locally
                let name = detail.get("package").and_then(Value::as_str).unwrap_or(key).to_string();
                let id = PackageId::new(Ecosystem::Cargo, &name);
                let requirement = match detail.get("version").and_then(Value::as_str) {
                    Some(raw) => manifest.requirement(&id, raw),
                    None if detail.contains_key("workspace") => Requirement::unversioned("workspace"),
                    None if detail.contains_key("git") => Requirement::unversioned("git"),
                    None if detail.contains_key("path") => Requirement::unversioned("path"),
                    None => Requirement::parse(Ecosystem::Cargo, "*").unwrap_or_else(|_| Requirement::unversioned("*")),
                };
                let optional = detail.get("optional").and_then(Value::as_bool).unwrap_or(false);
                let kind = if optional && kind == DependencyKind::Normal {
                    DependencyKind::Optional
                } else {
                    kind
                };
                (name, requirement, kind)
            }
            other => {
                manifest.warnings.push(crate::diagnostics::Warning::Parse {
                    path: path.to_path_buf(),
                    message: format!("dependency '{}' has an unsupported value: {}", key, other),
                });
                continue;
            }
        };
        let id = PackageId::new(Ecosystem::Cargo, name);
        manifest
            .declarations
            .push(Declaration::direct(id, requirement, kind, path));
    }
}

/// Adds the tables of a `[package]`-level scope: plain and per-target.
fn push_scope(manifest: &mut ParsedManifest, path: &Path, scope: &Table) {
    for (table_name, kind) in DEPENDENCY_TABLES {
        if let Some(table) = scope.get(*table_name).and_then(Value::as_table) {
            push_table(manifest, path, table, *kind);
        }
    }
    if let Some(targets) = scope.get("target").and_then(Value::as_table) {
        for target in targets.values().filter_map(Value::as_table) {
            for (table_name, kind) in DEPENDENCY_TABLES {
                if let Some(table) = target.get(*table_name).and_then(Value::as_table) {
                    push_table(manifest, path, table, *kind);
                }
            }
        }
    }
}

impl ManifestParser for CargoTomlParser {
    fn parse(&self, path: &Path, content: &str) -> ParseResult<ParsedManifest> {
        let doc: Table = toml::from_str(content)?;
        let package = doc.get("package").and_then(Value::as_table);
        let workspace = doc.get("workspace").and_then(Value::as_table);
        if package.is_none() && workspace.is_none() {
            return Err(ParseError::InvalidManifest(
                "Cargo.toml has neither [package] nor [workspace]".to_string(),
            ));
        }

        let project_name = package
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| directory_name(path));
        let project = PackageId::new(Ecosystem::Cargo, project_name);
        let mut manifest = ParsedManifest::new(path, ManifestKind::CargoToml, project);

        push_scope(&mut manifest, path, &doc);
        if let Some(shared) = workspace.and_then(|w| w.get("dependencies")).and_then(Value::as_table) {
            push_table(&mut manifest, path, shared, DependencyKind::Normal);
        }
        Ok(manifest)
    }
}

/// Parser for `Cargo.lock`.
///
/// Packages without a `source` are workspace members: the one named after
/// the directory (or the first) becomes the project, and only registry
/// packages contribute resolved versions.
pub struct CargoLockParser;

#[derive(Debug, serde::Deserialize)]
struct CargoLock {
    #[serde(default, rename = "package")]
    packages: Vec<LockPackage>,
}

#[derive(Debug, serde::Deserialize)]
struct LockPackage {
    name: String,
    version: String,
    source: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

impl ManifestParser for CargoLockParser {
    fn parse(&self, path: &Path, content: &str) -> ParseResult<ParsedManifest> {
        let lock: CargoLock = toml::from_str(content)?;
        let dir = directory_name(path);
        let members: Vec<&LockPackage> = lock.packages.iter().filter(|p| p.source.is_none()).collect();
        let project_name = members
            .iter()
            .find(|p| p.name == dir)
            .or_else(|| members.first())
            .map(|p| p.name.clone())
            .unwrap_or(dir);
        let project = PackageId::new(Ecosystem::Cargo, &project_name);
        let mut manifest = ParsedManifest::new(path, ManifestKind::CargoLock, project.clone());

        // several versions of one crate are normal; the newest stands for the node
        let mut newest: BTreeMap<&str, &str> = BTreeMap::new();
        for package in lock.packages.iter().filter(|p| p.source.is_some()) {
            let keep = match newest.get(package.name.as_str()) {
                Some(current) => compare(Ecosystem::Cargo, &package.version, current) == Comparison::Greater,
                None => true,
            };
            if keep {
                newest.insert(&package.name, &package.version);
            }
        }
        for (name, version) in &newest {
            manifest
                .locked
                .push(LockedPackage::new(PackageId::new(Ecosystem::Cargo, name), *version));
        }

        for package in &lock.packages {
            let dependent = PackageId::new(Ecosystem::Cargo, &package.name);
            for entry in &package.dependencies {
                // "name", "name version" or "name version (source)"
                let Some(dep_name) = entry.split_whitespace().next() else {
                    continue;
                };
                let id = PackageId::new(Ecosystem::Cargo, dep_name);
                let declaration = if dependent == project {
                    Declaration::direct(id, Requirement::unversioned(""), DependencyKind::Normal, path)
                } else {
                    Declaration::transitive(
                        dependent.clone(),
                        id,
                        Requirement::unversioned(""),
                        DependencyKind::Normal,
                        path,
                    )
                };
                manifest.declarations.push(declaration);
            }
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::RequirementKind;

    const CARGO_TOML: &str = r#"
[package]
name = "my-tool"
version = "0.1.0"

[dependencies]
serde = { version = "1.0", features = ["derive"] }
anyhow = "1"
toml_crate = { package = "toml", version = "0.8" }
local = { path = "../local" }
fancy = { git = "https://example.com/fancy.git" }
extra = { version = "2", optional = true }

[dev-dependencies]
tempfile = "3"

[build-dependencies]
cc = "1.0"

[target.'cfg(windows)'.dependencies]
winapi = "0.3"
"#;

    const CARGO_LOCK: &str = r#"
version = 3

[[package]]
name = "my-tool"
version = "0.1.0"
dependencies = ["serde", "syn 2.0.48"]

[[package]]
name = "serde"
version = "1.0.195"
source = "registry+https://github.com/rust-lang/crates.io-index"
dependencies = ["syn 1.0.109"]

[[package]]
name = "syn"
version = "1.0.109"
source = "registry+https://github.com/rust-lang/crates.io-index"

[[package]]
name = "syn"
version = "2.0.48"
source = "registry+https://github.com/rust-lang/crates.io-index"
"#;

    fn find<'a>(manifest: &'a ParsedManifest, name: &str) -> &'a Declaration {
        manifest.declarations.iter().find(|d| d.package.name == name).unwrap()
    }

    #[test]
    fn test_cargo_toml_tables() {
        let manifest = CargoTomlParser.parse(Path::new("my-tool/Cargo.toml"), CARGO_TOML).unwrap();
        assert_eq!(manifest.project.name, "my-tool");
        assert_eq!(manifest.declarations.len(), 9);
        assert_eq!(find(&manifest, "tempfile").kind, DependencyKind::Dev);
        assert_eq!(find(&manifest, "cc").kind, DependencyKind::Build);
        assert_eq!(find(&manifest, "extra").kind, DependencyKind::Optional);
        assert_eq!(find(&manifest, "winapi").kind, DependencyKind::Normal);
        assert!(manifest.warnings.is_empty());
    }

    #[test]
    fn test_cargo_toml_renames_and_sources() {
        let manifest = CargoTomlParser.parse(Path::new("Cargo.toml"), CARGO_TOML).unwrap();
        assert_eq!(find(&manifest, "toml").requirement.raw(), "0.8");
        assert_eq!(find(&manifest, "local").requirement.kind(), RequirementKind::Unversioned);
        assert_eq!(find(&manifest, "fancy").requirement.kind(), RequirementKind::Unversioned);
        assert_eq!(find(&manifest, "serde").requirement.kind(), RequirementKind::Range);
    }

    #[test]
    fn test_workspace_manifest() {
        let content = r#"
[workspace]
members = ["a", "b"]

[workspace.dependencies]
tokio = { version = "1.35", features = ["full"] }
"#;
        let manifest = CargoTomlParser.parse(Path::new("/src/repo/Cargo.toml"), content).unwrap();
        assert_eq!(manifest.project.name, "repo");
        assert_eq!(manifest.declarations.len(), 1);
        assert_eq!(find(&manifest, "tokio").requirement.raw(), "1.35");
    }

    #[test]
    fn test_workspace_inherited_dependency() {
        let content = "[package]\nname = \"a\"\n\n[dependencies]\ntokio = { workspace = true }\n";
        let manifest = CargoTomlParser.parse(Path::new("Cargo.toml"), content).unwrap();
        assert_eq!(find(&manifest, "tokio").requirement.kind(), RequirementKind::Unversioned);
    }

    #[test]
    fn test_not_a_cargo_manifest() {
        let result = CargoTomlParser.parse(Path::new("Cargo.toml"), "[foo]\nbar = 1\n");
        assert!(matches!(result, Err(ParseError::InvalidManifest(_))));
        let result = CargoTomlParser.parse(Path::new("Cargo.toml"), "[package\n");
        assert!(matches!(result, Err(ParseError::TomlError(_))));
    }

    #[test]
    fn test_cargo_lock() {
        let manifest = CargoLockParser.parse(Path::new("my-tool/Cargo.lock"), CARGO_LOCK).unwrap();
        assert_eq!(manifest.project.name, "my-tool");

        let syn = manifest.locked.iter().find(|l| l.package.name == "syn").unwrap();
        assert_eq!(syn.version, "2.0.48");
        assert_eq!(manifest.locked.len(), 2);

        assert_eq!(manifest.direct_count(), 2);
        let transitive = manifest.declarations.iter().find(|d| !d.is_direct()).unwrap();
        assert_eq!(transitive.dependent.as_ref().unwrap().name, "serde");
        assert_eq!(transitive.package.name, "syn");
    }
}
