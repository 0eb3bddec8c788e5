//! Ecosystem-aware version handling.
//!
//! Each ecosystem has its own version grammar and range syntax. This module
//! hides those differences behind one [`Version`] type, one [`VersionRange`]
//! type (a union of intervals) and one [`Requirement`] type, so the graph and
//! the classifier never need to know which grammar produced a value.
//!
//! # Grammars
//!
//! - **npm / Cargo**: semantic versions (see [`semantic`])
//! - **PyPI**: PEP 440 (see [`pep440`])
//! - **Maven**: Maven component ordering (see [`maven`])

pub mod classify;
pub mod maven;
pub mod pep440;
pub mod range;
pub mod semantic;

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

use crate::parser::types::Ecosystem;

pub use classify::{classify, CandidateSource, Classification};
pub use maven::MavenVersion;
pub use pep440::Pep440Version;
pub use range::{Interval, VersionRange};

/// Errors produced while parsing versions or ranges.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VersionError {
    /// A version string does not follow the ecosystem's grammar.
    #[error("Invalid {ecosystem} version '{input}': {reason}")]
    InvalidVersion {
        ecosystem: Ecosystem,
        input: String,
        reason: String,
    },

    /// A range or specifier does not follow the ecosystem's grammar.
    #[error("Invalid {ecosystem} range '{input}': {reason}")]
    InvalidRange {
        ecosystem: Ecosystem,
        input: String,
        reason: String,
    },
}

impl VersionError {
    pub(crate) fn version(ecosystem: Ecosystem, input: &str, reason: impl Into<String>) -> Self {
        VersionError::InvalidVersion {
            ecosystem,
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn range(ecosystem: Ecosystem, input: &str, reason: impl Into<String>) -> Self {
        VersionError::InvalidRange {
            ecosystem,
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Outcome of comparing two versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Less,
    Equal,
    Greater,
    /// The versions cannot be ordered (different grammars or unparseable input).
    Incomparable,
}

impl Comparison {
    /// Converts to a standard ordering, if there is one.
    pub fn ordering(self) -> Option<Ordering> {
        match self {
            Comparison::Less => Some(Ordering::Less),
            Comparison::Equal => Some(Ordering::Equal),
            Comparison::Greater => Some(Ordering::Greater),
            Comparison::Incomparable => None,
        }
    }

    /// Returns the comparison seen from the other side.
    pub fn reverse(self) -> Self {
        match self {
            Comparison::Less => Comparison::Greater,
            Comparison::Greater => Comparison::Less,
            other => other,
        }
    }
}

impl From<Ordering> for Comparison {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => Comparison::Less,
            Ordering::Equal => Comparison::Equal,
            Ordering::Greater => Comparison::Greater,
        }
    }
}

/// A parsed version in one of the supported grammars.
#[derive(Debug, Clone)]
pub enum Version {
    /// Semantic version (npm, Cargo).
    Semver(semver::Version),
    /// PEP 440 version (PyPI).
    Pep440(Pep440Version),
    /// Maven version (Gradle / Maven repositories).
    Maven(MavenVersion),
}

impl Version {
    /// Parses a version string using the grammar of `ecosystem`.
    ///
    /// # Arguments
    ///
    /// * `ecosystem` - Ecosystem whose grammar applies
    /// * `input` - The version text, e.g. `1.2.3`, `2.0rc1`, `1.0-SNAPSHOT`
    ///
    /// # Example
    ///
    /// ```
    /// use deplens::parser::types::Ecosystem;
    /// use deplens::version::Version;
    ///
    /// let a = Version::parse(Ecosystem::Npm, "1.2").unwrap();
    /// let b = Version::parse(Ecosystem::Npm, "1.2.0").unwrap();
    /// assert_eq!(a, b);
    /// ```
    pub fn parse(ecosystem: Ecosystem, input: &str) -> VersionResult<Self> {
        match ecosystem {
            Ecosystem::Npm | Ecosystem::Cargo => semantic::parse_version(ecosystem, input).map(Version::Semver),
            Ecosystem::PyPI => Pep440Version::parse(input)
                .map(Version::Pep440)
                .map_err(|reason| VersionError::version(ecosystem, input, reason)),
            Ecosystem::Maven => MavenVersion::parse(input)
                .map(Version::Maven)
                .map_err(|reason| VersionError::version(ecosystem, input, reason)),
        }
    }

    /// Orders two versions. Versions of different grammars are incomparable.
    pub fn compare(&self, other: &Version) -> Comparison {
        match (self, other) {
            (Version::Semver(a), Version::Semver(b)) => a.cmp_precedence(b).into(),
            (Version::Pep440(a), Version::Pep440(b)) => a.cmp(b).into(),
            (Version::Maven(a), Version::Maven(b)) => a.cmp(b).into(),
            _ => Comparison::Incomparable,
        }
    }

    /// Returns true for pre-release versions (alpha, beta, rc, dev, snapshot...).
    pub fn is_prerelease(&self) -> bool {
        match self {
            Version::Semver(v) => !v.pre.is_empty(),
            Version::Pep440(v) => v.is_prerelease(),
            Version::Maven(v) => v.is_prerelease(),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Comparison::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other).ordering()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Semver(v) => write!(f, "{}", v),
            Version::Pep440(v) => write!(f, "{}", v),
            Version::Maven(v) => write!(f, "{}", v),
        }
    }
}

/// Compares two version strings of the same ecosystem.
///
/// Unparseable input is never an error here: it yields
/// [`Comparison::Incomparable`]. Callers that need to surface the problem
/// should parse with [`Version::parse`] themselves.
///
/// # Example
///
/// ```
/// use deplens::parser::types::Ecosystem;
/// use deplens::version::{compare, Comparison};
///
/// assert_eq!(compare(Ecosystem::PyPI, "1.0rc1", "1.0"), Comparison::Less);
/// assert_eq!(compare(Ecosystem::Npm, "1.0.0", "not-a-version"), Comparison::Incomparable);
/// ```
pub fn compare(ecosystem: Ecosystem, a: &str, b: &str) -> Comparison {
    match (Version::parse(ecosystem, a), Version::parse(ecosystem, b)) {
        (Ok(a), Ok(b)) => a.compare(&b),
        (Err(e), _) | (_, Err(e)) => {
            tracing::debug!(error = %e, "version comparison is incomparable");
            Comparison::Incomparable
        }
    }
}

/// Returns true if `version` lies inside `range`.
pub fn satisfies(range: &VersionRange, version: &Version) -> bool {
    range.contains(version)
}

/// How a requirement constrains versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementKind {
    /// Exactly one version is allowed.
    Pinned,
    /// A bounded set of versions is allowed.
    Range,
    /// Every version is allowed (`*`, `latest`, empty).
    Any,
    /// Not a registry version at all (git, path, URL, workspace, dist-tag).
    Unversioned,
    /// The requirement text could not be parsed.
    Invalid,
}

/// A declared version requirement: the raw text plus its normalized range.
#[derive(Debug, Clone)]
pub struct Requirement {
    raw: String,
    kind: RequirementKind,
    range: Option<VersionRange>,
}

impl Requirement {
    /// Parses a requirement using the range syntax of `ecosystem`.
    ///
    /// # Example
    ///
    /// ```
    /// use deplens::parser::types::Ecosystem;
    /// use deplens::version::{Requirement, RequirementKind};
    ///
    /// let req = Requirement::parse(Ecosystem::Cargo, "=1.0.3").unwrap();
    /// assert_eq!(req.kind(), RequirementKind::Pinned);
    ///
    /// let req = Requirement::parse(Ecosystem::Npm, "git+https://example.com/x.git").unwrap();
    /// assert_eq!(req.kind(), RequirementKind::Unversioned);
    /// ```
    pub fn parse(ecosystem: Ecosystem, raw: &str) -> VersionResult<Self> {
        let trimmed = raw.trim();
        let range = match ecosystem {
            Ecosystem::Npm => semantic::parse_npm_range(trimmed)?,
            Ecosystem::Cargo => semantic::parse_cargo_range(trimmed)?,
            Ecosystem::PyPI => pep440::parse_specifiers(trimmed)?,
            Ecosystem::Maven => maven::parse_range(trimmed)?,
        };

        Ok(match range {
            Some(range) => Self::from_range(trimmed, range),
            None => Self::unversioned(trimmed),
        })
    }

    /// Builds a requirement from an already-normalized range.
    pub fn from_range(raw: impl Into<String>, range: VersionRange) -> Self {
        let kind = if range.is_any() {
            RequirementKind::Any
        } else if range.as_exact().is_some() {
            RequirementKind::Pinned
        } else {
            RequirementKind::Range
        };
        Self {
            raw: raw.into(),
            kind,
            range: Some(range),
        }
    }

    /// A requirement that does not name a registry version.
    pub fn unversioned(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            kind: RequirementKind::Unversioned,
            range: None,
        }
    }

    /// A requirement whose text could not be parsed.
    pub fn invalid(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            kind: RequirementKind::Invalid,
            range: None,
        }
    }

    /// The requirement exactly as written in the manifest.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> RequirementKind {
        self.kind
    }

    /// The normalized range, or `None` for unversioned and invalid requirements.
    pub fn range(&self) -> Option<&VersionRange> {
        self.range.as_ref()
    }

    /// The pinned version, if the requirement allows exactly one.
    pub fn pinned(&self) -> Option<&Version> {
        self.range.as_ref().and_then(VersionRange::as_exact)
    }

    /// Returns true if the requirement constrains registry versions.
    pub fn is_versioned(&self) -> bool {
        self.range.is_some()
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            f.write_str("*")
        } else {
            f.write_str(&self.raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_semver_padding() {
        assert_eq!(compare(Ecosystem::Cargo, "1", "1.0.0"), Comparison::Equal);
        assert_eq!(compare(Ecosystem::Npm, "v1.2.3", "1.2.4"), Comparison::Less);
    }

    #[test]
    fn test_compare_ignores_build_metadata() {
        assert_eq!(compare(Ecosystem::Npm, "1.0.0+build.1", "1.0.0+build.2"), Comparison::Equal);
    }

    #[test]
    fn test_compare_unparseable_is_incomparable() {
        assert_eq!(compare(Ecosystem::Cargo, "abc", "1.0.0"), Comparison::Incomparable);
        assert_eq!(compare(Ecosystem::Maven, "1..2", "1.0"), Comparison::Incomparable);
    }

    #[test]
    fn test_cross_grammar_incomparable() {
        let a = Version::parse(Ecosystem::Npm, "1.0.0").unwrap();
        let b = Version::parse(Ecosystem::PyPI, "1.0.0").unwrap();
        assert_eq!(a.compare(&b), Comparison::Incomparable);
        assert!(a.partial_cmp(&b).is_none());
    }

    #[test]
    fn test_comparison_reverse() {
        assert_eq!(Comparison::Less.reverse(), Comparison::Greater);
        assert_eq!(Comparison::Equal.reverse(), Comparison::Equal);
        assert_eq!(Comparison::Incomparable.reverse(), Comparison::Incomparable);
    }

    #[test]
    fn test_requirement_kinds() {
        let req = Requirement::parse(Ecosystem::Npm, "^1.2.0").unwrap();
        assert_eq!(req.kind(), RequirementKind::Range);

        let req = Requirement::parse(Ecosystem::Npm, "2.0.0").unwrap();
        assert_eq!(req.kind(), RequirementKind::Pinned);
        assert_eq!(req.pinned().unwrap().to_string(), "2.0.0");

        let req = Requirement::parse(Ecosystem::Npm, "*").unwrap();
        assert_eq!(req.kind(), RequirementKind::Any);

        let req = Requirement::parse(Ecosystem::PyPI, "==1.4").unwrap();
        assert_eq!(req.kind(), RequirementKind::Pinned);

        let req = Requirement::parse(Ecosystem::Maven, "[1.0,2.0)").unwrap();
        assert_eq!(req.kind(), RequirementKind::Range);
    }

    #[test]
    fn test_requirement_invalid_range_is_error() {
        assert!(Requirement::parse(Ecosystem::Cargo, ">>1").is_err());
        assert!(Requirement::parse(Ecosystem::PyPI, "~=1").is_err());
    }

    #[test]
    fn test_requirement_display_empty() {
        let req = Requirement::parse(Ecosystem::Npm, "").unwrap();
        assert_eq!(req.to_string(), "*");
        assert_eq!(req.kind(), RequirementKind::Any);
    }

    #[test]
    fn test_satisfies() {
        let req = Requirement::parse(Ecosystem::Npm, "^1.2.0").unwrap();
        let v = Version::parse(Ecosystem::Npm, "1.5.0").unwrap();
        assert!(satisfies(req.range().unwrap(), &v));
        let v = Version::parse(Ecosystem::Npm, "2.0.0").unwrap();
        assert!(!satisfies(req.range().unwrap(), &v));
    }
}
