//! Parser module for deplens.
//!
//! This module provides parsers for the manifest and lock file formats of
//! every supported ecosystem. Each file name pattern maps to one
//! [`ManifestKind`], and each kind to one [`ManifestParser`].
//!
//! # Supported Formats
//!
//! - **package.json**, **package-lock.json** (npm, lockfile v1/v2/v3)
//! - **Cargo.toml**, **Cargo.lock** (Rust)
//! - **requirements*.txt** (Python)
//! - **gradle/libs.versions.toml**, **gradle.lockfile** (Maven artifacts)
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use deplens::parser::ManifestKind;
//!
//! let kind = ManifestKind::detect(Path::new("web/package.json"));
//! assert_eq!(kind, Some(ManifestKind::PackageJson));
//!
//! let manifest = kind
//!     .unwrap()
//!     .parser()
//!     .parse(Path::new("web/package.json"), r#"{"name": "web", "dependencies": {"react": "^18.2.0"}}"#)
//!     .unwrap();
//! assert_eq!(manifest.direct_count(), 1);
//! ```

pub mod cargo;
pub mod gradle;
pub mod package_json;
pub mod python;
pub mod types;

use rayon::prelude::*;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::Warning;
use types::{Ecosystem, ParsedManifest};

/// Errors that can occur while parsing a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Failed to read the file from disk.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse JSON content.
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Failed to parse TOML content.
    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    /// The file parsed but its structure is not a valid manifest.
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
}

/// Result type alias for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A recognized manifest or lock file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    PackageJson,
    PackageLock,
    CargoToml,
    CargoLock,
    Requirements,
    GradleCatalog,
    GradleLockfile,
}

/// How a file name is matched.
enum FilePattern {
    Exact(&'static str),
    PrefixSuffix(&'static str, &'static str),
    Suffix(&'static str),
}

impl FilePattern {
    fn matches(&self, file_name: &str) -> bool {
        match self {
            FilePattern::Exact(name) => file_name == *name,
            FilePattern::PrefixSuffix(prefix, suffix) => {
                file_name.len() >= prefix.len() + suffix.len()
                    && file_name.starts_with(prefix)
                    && file_name.ends_with(suffix)
            }
            FilePattern::Suffix(suffix) => file_name.ends_with(suffix),
        }
    }
}

/// File pattern → format table, checked in order.
const MANIFEST_PATTERNS: &[(FilePattern, ManifestKind)] = &[
    (FilePattern::Exact("package.json"), ManifestKind::PackageJson),
    (FilePattern::Exact("package-lock.json"), ManifestKind::PackageLock),
    (FilePattern::Exact("npm-shrinkwrap.json"), ManifestKind::PackageLock),
    (FilePattern::Exact("Cargo.toml"), ManifestKind::CargoToml),
    (FilePattern::Exact("Cargo.lock"), ManifestKind::CargoLock),
    (FilePattern::PrefixSuffix("requirements", ".txt"), ManifestKind::Requirements),
    (FilePattern::Suffix(".versions.toml"), ManifestKind::GradleCatalog),
    (FilePattern::Exact("gradle.lockfile"), ManifestKind::GradleLockfile),
];

impl ManifestKind {
    /// Detects the format of a file from its name.
    pub fn detect(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        MANIFEST_PATTERNS
            .iter()
            .find(|(pattern, _)| pattern.matches(file_name))
            .map(|(_, kind)| *kind)
    }

    pub fn ecosystem(&self) -> Ecosystem {
        match self {
            ManifestKind::PackageJson | ManifestKind::PackageLock => Ecosystem::Npm,
            ManifestKind::CargoToml | ManifestKind::CargoLock => Ecosystem::Cargo,
            ManifestKind::Requirements => Ecosystem::PyPI,
            ManifestKind::GradleCatalog | ManifestKind::GradleLockfile => Ecosystem::Maven,
        }
    }

    /// Returns true for lock files (resolved versions rather than declarations).
    pub fn is_lock(&self) -> bool {
        matches!(
            self,
            ManifestKind::PackageLock | ManifestKind::CargoLock | ManifestKind::GradleLockfile
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            ManifestKind::PackageJson => "package.json",
            ManifestKind::PackageLock => "package-lock.json",
            ManifestKind::CargoToml => "Cargo.toml",
            ManifestKind::CargoLock => "Cargo.lock",
            ManifestKind::Requirements => "requirements.txt",
            ManifestKind::GradleCatalog => "libs.versions.toml",
            ManifestKind::GradleLockfile => "gradle.lockfile",
        }
    }

    /// The parser for this format.
    pub fn parser(&self) -> &'static dyn ManifestParser {
        match self {
            ManifestKind::PackageJson => &package_json::PackageJsonParser,
            ManifestKind::PackageLock => &package_json::PackageLockParser,
            ManifestKind::CargoToml => &cargo::CargoTomlParser,
            ManifestKind::CargoLock => &cargo::CargoLockParser,
            ManifestKind::Requirements => &python::RequirementsParser,
            ManifestKind::GradleCatalog => &gradle::VersionCatalogParser,
            ManifestKind::GradleLockfile => &gradle::GradleLockParser,
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Extracts declarations and locked versions from one file format.
pub trait ManifestParser: Sync {
    /// Parses the file content; `path` names the file in results and warnings.
    fn parse(&self, path: &Path, content: &str) -> ParseResult<ParsedManifest>;
}

/// Name used for a project that does not declare one: its directory name.
pub(crate) fn directory_name(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("project")
        .to_string()
}

/// Reads and parses a single manifest, detecting its format from the name.
///
/// # Errors
///
/// Returns `InvalidManifest` for unrecognized file names, and the read or
/// decode error otherwise.
pub fn parse_manifest(path: &Path) -> ParseResult<ParsedManifest> {
    let kind = ManifestKind::detect(path)
        .ok_or_else(|| ParseError::InvalidManifest(format!("unrecognized manifest: {}", path.display())))?;
    let content = fs::read_to_string(path)?;
    kind.parser().parse(path, &content)
}

/// Result of parsing a set of candidate files.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// Successfully parsed manifests.
    pub manifests: Vec<ParsedManifest>,
    /// Recognized manifests that failed, with the reason.
    pub failures: Vec<(PathBuf, ParseError)>,
    /// Candidates that matched no known format.
    pub unrecognized: Vec<PathBuf>,
}

impl ParseOutcome {
    /// Number of candidates that matched a known format.
    pub fn recognized(&self) -> usize {
        self.manifests.len() + self.failures.len()
    }

    /// Parse failures as warnings, in path order.
    pub fn failure_warnings(&self) -> Vec<Warning> {
        self.failures
            .iter()
            .map(|(path, error)| Warning::Parse {
                path: path.clone(),
                message: error.to_string(),
            })
            .collect()
    }
}

/// Parses candidate files in parallel.
///
/// Each parser fails independently; failures are collected rather than
/// aborting the batch. Results are returned in path order.
pub fn parse_manifests(paths: &[PathBuf]) -> ParseOutcome {
    let mut sorted: Vec<&PathBuf> = paths.iter().collect();
    sorted.sort();
    sorted.dedup();

    let results: Vec<(PathBuf, Option<ParseResult<ParsedManifest>>)> = sorted
        .par_iter()
        .map(|path| {
            let result = ManifestKind::detect(path).map(|_| parse_manifest(path));
            ((*path).clone(), result)
        })
        .collect();

    let mut outcome = ParseOutcome::default();
    for (path, result) in results {
        match result {
            None => outcome.unrecognized.push(path),
            Some(Ok(manifest)) => {
                tracing::debug!(
                    path = %path.display(),
                    direct = manifest.direct_count(),
                    locked = manifest.locked.len(),
                    "parsed manifest"
                );
                outcome.manifests.push(manifest);
            }
            Some(Err(error)) => {
                tracing::warn!(path = %path.display(), error = %error, "failed to parse manifest");
                outcome.failures.push((path, error));
            }
        }
    }
    outcome
}
