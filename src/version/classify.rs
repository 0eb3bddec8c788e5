//! Outdated / vulnerable classification of a single package.
//!
//! The classifier picks a *candidate* version for the node (the locked
//! version, else the pinned version, else the greatest published version
//! satisfying the declared range) and compares it with the registry's latest
//! release and with every advisory's affected range.

use serde::Serialize;

use super::{Comparison, Version, VersionRange};
use crate::diagnostics::Warning;
use crate::parser::types::PackageId;
use crate::registry::{PackageRecord, Severity};

/// Where the candidate version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CandidateSource {
    /// A lock file recorded this version.
    Resolved,
    /// The declaration pins exactly this version.
    Pinned,
    /// Greatest published, non-yanked release inside the declared range.
    MaxSatisfying,
}

/// Result of classifying one node against its registry record.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// Version the project is (or would be) using.
    pub candidate: Option<String>,
    pub candidate_source: Option<CandidateSource>,
    /// Latest release published on the registry.
    pub latest: Option<String>,
    /// Candidate is strictly older than latest.
    pub outdated: bool,
    /// Whether latest already satisfies the declared range.
    pub latest_in_range: Option<bool>,
    /// Candidate falls inside at least one advisory range.
    pub vulnerable: bool,
    /// Highest severity among matching advisories.
    pub severity: Option<Severity>,
    /// Identifiers of matching advisories.
    pub advisories: Vec<String>,
}

fn integrity(id: &PackageId, message: String) -> Warning {
    Warning::Integrity {
        package: Some(id.to_string()),
        message,
    }
}

fn parse_or_warn(id: &PackageId, what: &str, text: &str, warnings: &mut Vec<Warning>) -> Option<Version> {
    match Version::parse(id.ecosystem, text) {
        Ok(v) => Some(v),
        Err(e) => {
            warnings.push(integrity(id, format!("{} version is not comparable: {}", what, e)));
            None
        }
    }
}

/// Classifies a node.
///
/// # Arguments
///
/// * `id` - Identity of the node (selects the version grammar)
/// * `range` - Effective declared range, `None` when unversioned
/// * `resolved` - Version recorded by a lock file, if any
/// * `record` - Registry data for the package
///
/// # Returns
///
/// The classification plus any integrity warnings raised along the way.
/// Unparseable versions never fail the call; they make the affected
/// comparison inconclusive and produce a warning.
pub fn classify(
    id: &PackageId,
    range: Option<&VersionRange>,
    resolved: Option<&str>,
    record: &PackageRecord,
) -> (Classification, Vec<Warning>) {
    let mut warnings = Vec::new();
    let mut result = Classification::default();

    let published: Vec<Version> = record
        .versions
        .iter()
        .filter(|v| !record.yanked.contains(v))
        .filter_map(|v| match Version::parse(id.ecosystem, v) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::debug!(package = %id, error = %e, "skipping unparseable published version");
                None
            }
        })
        .collect();
    let releases: Vec<&Version> = published.iter().filter(|v| !v.is_prerelease()).collect();

    let latest = match &record.latest {
        Some(text) => parse_or_warn(id, "latest", text, &mut warnings),
        None => VersionRange::any().max_satisfying(releases.iter().copied()).cloned(),
    };

    let candidate = if let Some(text) = resolved {
        parse_or_warn(id, "resolved", text, &mut warnings).map(|v| (v, CandidateSource::Resolved))
    } else if let Some(pinned) = range.and_then(VersionRange::as_exact) {
        Some((pinned.clone(), CandidateSource::Pinned))
    } else {
        range
            .and_then(|r| r.max_satisfying(releases.iter().copied()))
            .map(|v| (v.clone(), CandidateSource::MaxSatisfying))
    };

    if let (Some((candidate, _)), Some(latest)) = (&candidate, &latest) {
        match candidate.compare(latest) {
            Comparison::Less => result.outdated = true,
            Comparison::Incomparable => {
                warnings.push(integrity(
                    id,
                    format!("cannot compare {} with latest {}", candidate, latest),
                ));
            }
            Comparison::Equal | Comparison::Greater => {}
        }
    }

    if let (Some(range), Some(latest)) = (range, &latest) {
        result.latest_in_range = Some(range.contains(latest));
    }

    if let Some((candidate, _)) = &candidate {
        for advisory in &record.advisories {
            let affected = match advisory.affected_range(id.ecosystem) {
                Ok(affected) => affected,
                Err(e) => {
                    warnings.push(integrity(
                        id,
                        format!("advisory {} has an unusable range: {}", advisory.id, e),
                    ));
                    continue;
                }
            };
            if affected.contains(candidate) {
                result.vulnerable = true;
                result.advisories.push(advisory.id.clone());
                result.severity = result.severity.max(Some(advisory.severity));
            }
        }
    }

    result.latest = latest.map(|v| v.to_string());
    if let Some((version, source)) = candidate {
        result.candidate = Some(version.to_string());
        result.candidate_source = Some(source);
    }
    (result, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::Ecosystem;
    use crate::registry::{Advisory, AffectedRange};
    use crate::version::Requirement;

    fn record(latest: &str, versions: &[&str]) -> PackageRecord {
        PackageRecord {
            latest: Some(latest.to_string()),
            versions: versions.iter().map(|v| v.to_string()).collect(),
            ..PackageRecord::default()
        }
    }

    fn range(eco: Ecosystem, spec: &str) -> VersionRange {
        Requirement::parse(eco, spec).unwrap().range().unwrap().clone()
    }

    fn advisory(id: &str, severity: Severity, expr: &str) -> Advisory {
        Advisory {
            id: id.to_string(),
            severity,
            affected: vec![AffectedRange::Expression { expr: expr.to_string() }],
            ..Advisory::default()
        }
    }

    #[test]
    fn test_locked_behind_latest_is_outdated() {
        let id = PackageId::new(Ecosystem::Npm, "libX");
        let r = range(Ecosystem::Npm, "^1.2.0");
        let rec = record("1.5.0", &["1.2.0", "1.2.3", "1.5.0"]);
        let (c, warnings) = classify(&id, Some(&r), Some("1.2.3"), &rec);
        assert!(c.outdated);
        assert!(!c.vulnerable);
        assert_eq!(c.candidate.as_deref(), Some("1.2.3"));
        assert_eq!(c.candidate_source, Some(CandidateSource::Resolved));
        assert_eq!(c.latest_in_range, Some(true));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_pinned_vulnerable_not_outdated() {
        let id = PackageId::new(Ecosystem::Npm, "libY");
        let r = range(Ecosystem::Npm, "2.0.0");
        let mut rec = record("2.0.0", &["1.0.0", "2.0.0"]);
        rec.advisories.push(advisory("GHSA-1", Severity::High, "<2.1.0"));
        let (c, _) = classify(&id, Some(&r), None, &rec);
        assert!(!c.outdated);
        assert!(c.vulnerable);
        assert_eq!(c.severity, Some(Severity::High));
        assert_eq!(c.advisories, vec!["GHSA-1".to_string()]);
        assert_eq!(c.candidate_source, Some(CandidateSource::Pinned));
    }

    #[test]
    fn test_max_satisfying_skips_prerelease_and_yanked() {
        let id = PackageId::new(Ecosystem::Cargo, "serde");
        let r = range(Ecosystem::Cargo, "1.0");
        let mut rec = record("2.0.0", &["1.0.0", "1.4.0", "1.5.0", "1.6.0-beta.1", "2.0.0"]);
        rec.yanked.push("1.5.0".to_string());
        let (c, _) = classify(&id, Some(&r), None, &rec);
        assert_eq!(c.candidate.as_deref(), Some("1.4.0"));
        assert_eq!(c.candidate_source, Some(CandidateSource::MaxSatisfying));
        assert!(c.outdated);
        assert_eq!(c.latest_in_range, Some(false));
    }

    #[test]
    fn test_severity_is_maximum_of_matches() {
        let id = PackageId::new(Ecosystem::PyPI, "django");
        let r = range(Ecosystem::PyPI, "==3.2.0");
        let mut rec = record("5.0", &["3.2.0", "5.0"]);
        rec.advisories.push(advisory("A", Severity::Low, "<4.0"));
        rec.advisories.push(advisory("B", Severity::Critical, ">=3.0,<3.3"));
        rec.advisories.push(advisory("C", Severity::High, ">=4.0"));
        let (c, _) = classify(&id, Some(&r), None, &rec);
        assert!(c.vulnerable);
        assert_eq!(c.severity, Some(Severity::Critical));
        assert_eq!(c.advisories.len(), 2);
    }

    #[test]
    fn test_latest_derived_from_versions() {
        let id = PackageId::new(Ecosystem::Maven, "org.example:lib");
        let r = range(Ecosystem::Maven, "1.0");
        let rec = PackageRecord {
            versions: vec!["1.0".into(), "1.1".into(), "2.0-SNAPSHOT".into()],
            ..PackageRecord::default()
        };
        let (c, _) = classify(&id, Some(&r), None, &rec);
        assert_eq!(c.latest.as_deref(), Some("1.1"));
        assert!(c.outdated);
    }

    #[test]
    fn test_unparseable_resolved_warns() {
        let id = PackageId::new(Ecosystem::Npm, "odd");
        let r = range(Ecosystem::Npm, "^1.0.0");
        let rec = record("1.0.0", &["1.0.0"]);
        let (c, warnings) = classify(&id, Some(&r), Some("not-a-version"), &rec);
        assert!(!c.outdated);
        assert!(c.candidate.is_none());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_unversioned_has_no_candidate() {
        let id = PackageId::new(Ecosystem::Npm, "gitdep");
        let rec = record("3.0.0", &["3.0.0"]);
        let (c, _) = classify(&id, None, None, &rec);
        assert!(c.candidate.is_none());
        assert!(!c.outdated);
        assert!(!c.vulnerable);
        assert_eq!(c.latest.as_deref(), Some("3.0.0"));
    }
}
