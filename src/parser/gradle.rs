//! Parsers for Gradle version catalogs and dependency lock files.
//!
//! Both describe Maven artifacts, identified as `group:artifact`.

use std::collections::BTreeMap;
use std::path::Path;
use toml::{Table, Value};

use super::types::{Declaration, DependencyKind, Ecosystem, LockedPackage, PackageId, ParsedManifest};
use super::{ManifestKind, ManifestParser, ParseError, ParseResult};
use crate::diagnostics::Warning;
use crate::version::Requirement;

/// Project name for a Gradle file: the build's root directory.
///
/// Catalogs live in `<root>/gradle/`, so a parent directory named `gradle`
/// is skipped.
fn gradle_project(path: &Path) -> PackageId {
    let mut dir = path.parent();
    if dir.and_then(Path::file_name).is_some_and(|n| n == "gradle") {
        dir = dir.and_then(Path::parent);
    }
    let name = dir
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("project");
    PackageId::new(Ecosystem::Maven, name)
}

/// Parser for `gradle/libs.versions.toml`.
pub struct VersionCatalogParser;

/// Picks the requirement out of a rich version (`{ strictly = "..." }`).
fn rich_version(table: &Table) -> Option<&str> {
    ["strictly", "require", "prefer"]
        .iter()
        .find_map(|key| table.get(*key).and_then(Value::as_str))
}

/// Reads the `[versions]` table into alias → version text.
fn catalog_versions(doc: &Table) -> BTreeMap<String, String> {
    let mut versions = BTreeMap::new();
    let Some(table) = doc.get("versions").and_then(Value::as_table) else {
        return versions;
    };
    for (alias, value) in table {
        let text = match value {
            Value::String(s) => Some(s.as_str()),
            Value::Table(t) => rich_version(t),
            _ => None,
        };
        if let Some(text) = text {
            versions.insert(alias.clone(), text.to_string());
        }
    }
    versions
}

/// Outcome of reading one `[libraries]` entry.
enum Library {
    Versioned(String, String),
    Unversioned(String),
    Invalid(String),
}

fn read_library(alias: &str, value: &Value, versions: &BTreeMap<String, String>) -> Library {
    match value {
        Value::String(notation) => {
            let parts: Vec<&str> = notation.split(':').collect();
            match parts.as_slice() {
                [group, artifact] => Library::Unversioned(format!("{}:{}", group, artifact)),
                [group, artifact, version] => {
                    Library::Versioned(format!("{}:{}", group, artifact), version.to_string())
                }
                _ => Library::Invalid(format!("library '{}' has malformed notation '{}'", alias, notation)),
            }
        }
        Value::Table(table) => {
            let module = match (
                table.get("module").and_then(Value::as_str),
                table.get("group").and_then(Value::as_str),
                table.get("name").and_then(Value::as_str),
            ) {
                (Some(module), _, _) if module.contains(':') => module.to_string(),
                (None, Some(group), Some(name)) => format!("{}:{}", group, name),
                _ => return Library::Invalid(format!("library '{}' has no module", alias)),
            };

            // `version.ref = "x"` is a dotted key, so it arrives as a nested table
            let version = match table.get("version") {
                Some(Value::String(v)) => Some(Ok(v.clone())),
                Some(Value::Table(t)) => match t.get("ref").and_then(Value::as_str) {
                    Some(reference) => Some(lookup_ref(alias, reference, versions)),
                    None => rich_version(t).map(|v| Ok(v.to_string())),
                },
                _ => None,
            };

            match version {
                Some(Ok(version)) => Library::Versioned(module, version),
                Some(Err(message)) => Library::Invalid(message),
                None => Library::Unversioned(module),
            }
        }
        _ => Library::Invalid(format!("library '{}' has an unsupported value", alias)),
    }
}

fn lookup_ref(alias: &str, reference: &str, versions: &BTreeMap<String, String>) -> Result<String, String> {
    versions
        .get(reference)
        .cloned()
        .ok_or_else(|| format!("library '{}' refers to unknown version '{}'", alias, reference))
}

impl ManifestParser for VersionCatalogParser {
    fn parse(&self, path: &Path, content: &str) -> ParseResult<ParsedManifest> {
        let doc: Table = toml::from_str(content)?;
        let mut manifest = ParsedManifest::new(path, ManifestKind::GradleCatalog, gradle_project(path));
        let versions = catalog_versions(&doc);

        let Some(libraries) = doc.get("libraries") else {
            return Ok(manifest);
        };
        let libraries = libraries
            .as_table()
            .ok_or_else(|| ParseError::InvalidManifest("[libraries] must be a table".to_string()))?;

        for (alias, value) in libraries {
            let (module, requirement) = match read_library(alias, value, &versions) {
                Library::Versioned(module, raw) => {
                    let id = PackageId::new(Ecosystem::Maven, &module);
                    let requirement = manifest.requirement(&id, &raw);
                    (module, requirement)
                }
                Library::Unversioned(module) => (module, Requirement::unversioned("")),
                Library::Invalid(message) => {
                    manifest.warnings.push(Warning::Parse {
                        path: path.to_path_buf(),
                        message,
                    });
                    continue;
                }
            };
            manifest.declarations.push(Declaration::direct(
                PackageId::new(Ecosystem::Maven, module),
                requirement,
                DependencyKind::Normal,
                path,
            ));
        }
        Ok(manifest)
    }
}

/// Parser for `gradle.lockfile`.
///
/// Each line is `group:artifact:version=configuration,...`; the lock file
/// lists the whole resolved classpath without relations, so it only
/// contributes resolved versions.
pub struct GradleLockParser;

impl ManifestParser for GradleLockParser {
    fn parse(&self, path: &Path, content: &str) -> ParseResult<ParsedManifest> {
        let mut manifest = ParsedManifest::new(path, ManifestKind::GradleLockfile, gradle_project(path));

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("empty=") {
                continue;
            }
            let coordinates = line.split_once('=').map_or(line, |(coords, _)| coords);
            match coordinates.split(':').collect::<Vec<_>>().as_slice() {
                [group, artifact, version] if !version.is_empty() => {
                    let id = PackageId::new(Ecosystem::Maven, format!("{}:{}", group, artifact));
                    manifest.locked.push(LockedPackage::new(id, *version));
                }
                _ => manifest.warnings.push(Warning::Parse {
                    path: path.to_path_buf(),
                    message: format!("line {}: malformed lock entry '{}'", number + 1, line),
                }),
            }
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::RequirementKind;

    const CATALOG: &str = r#"
[versions]
kotlin = "1.9.22"
guava = { strictly = "[32.0,33.0)" }

[libraries]
kotlin-stdlib = { module = "org.jetbrains.kotlin:kotlin-stdlib", version.ref = "kotlin" }
guava = { group = "com.google.guava", name = "guava", version = { ref = "guava" } }
slf4j = "org.slf4j:slf4j-api:2.0.9"
junit-bom = "org.junit:junit-bom"
dynamic = { module = "com.example:dyn", version = "1.+" }
broken = { module = "com.example:broken", version.ref = "missing" }

[plugins]
kotlin-jvm = { id = "org.jetbrains.kotlin.jvm", version.ref = "kotlin" }
"#;

    fn find<'a>(manifest: &'a ParsedManifest, name: &str) -> &'a Declaration {
        manifest.declarations.iter().find(|d| d.package.name == name).unwrap()
    }

    #[test]
    fn test_version_catalog() {
        let manifest = VersionCatalogParser
            .parse(Path::new("/work/shop/gradle/libs.versions.toml"), CATALOG)
            .unwrap();
        assert_eq!(manifest.project.name, "shop");
        assert_eq!(manifest.declarations.len(), 5);
        assert_eq!(manifest.warnings.len(), 1);

        assert_eq!(find(&manifest, "org.jetbrains.kotlin:kotlin-stdlib").requirement.raw(), "1.9.22");
        assert_eq!(find(&manifest, "com.google.guava:guava").requirement.raw(), "[32.0,33.0)");
        assert_eq!(find(&manifest, "org.slf4j:slf4j-api").requirement.kind(), RequirementKind::Pinned);
        assert_eq!(find(&manifest, "org.junit:junit-bom").requirement.kind(), RequirementKind::Unversioned);
        assert_eq!(find(&manifest, "com.example:dyn").requirement.kind(), RequirementKind::Range);
    }

    #[test]
    fn test_catalog_without_libraries() {
        let manifest = VersionCatalogParser
            .parse(Path::new("gradle/libs.versions.toml"), "[versions]\na = \"1\"\n")
            .unwrap();
        assert!(manifest.declarations.is_empty());
    }

    #[test]
    fn test_gradle_lockfile() {
        let content = "\
# This is a Gradle generated file for dependency locking.
com.google.guava:guava:32.1.3-jre=compileClasspath,runtimeClasspath
org.slf4j:slf4j-api:2.0.9=runtimeClasspath
not-a-coordinate=compileClasspath
empty=annotationProcessor
";
        let manifest = GradleLockParser.parse(Path::new("/work/shop/gradle.lockfile"), content).unwrap();
        assert_eq!(manifest.project.name, "shop");
        assert_eq!(manifest.locked.len(), 2);
        assert_eq!(manifest.locked[0].package.name, "com.google.guava:guava");
        assert_eq!(manifest.locked[0].version, "32.1.3-jre");
        assert_eq!(manifest.warnings.len(), 1);
        assert!(manifest.declarations.is_empty());
    }
}
