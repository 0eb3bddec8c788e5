//! OSV advisory database (`https://api.osv.dev`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::HttpClient;
use super::{Advisory, AdvisorySource, AffectedRange, RegistryError, Severity};
use crate::parser::types::PackageId;

/// Upper bound on result pages followed for one package.
const MAX_PAGES: usize = 10;

/// Queries `{base}/v1/query` for every advisory affecting a package.
pub struct OsvDatabase {
    http: HttpClient,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    package: QueryPackage<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct QueryPackage<'a> {
    name: &'a str,
    ecosystem: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    vulns: Vec<OsvVulnerability>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsvVulnerability {
    id: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    severity: Vec<OsvSeverity>,
    #[serde(default)]
    database_specific: Option<serde_json::Value>,
    #[serde(default)]
    affected: Vec<OsvAffected>,
}

#[derive(Debug, Deserialize)]
struct OsvSeverity {
    #[serde(rename = "type")]
    kind: String,
    score: String,
}

#[derive(Debug, Deserialize)]
struct OsvAffected {
    #[serde(default)]
    package: Option<OsvPackage>,
    #[serde(default)]
    ranges: Vec<OsvRange>,
    #[serde(default)]
    versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OsvPackage {
    name: String,
}

#[derive(Debug, Deserialize)]
struct OsvRange {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    events: Vec<OsvEvent>,
}

#[derive(Debug, Default, Deserialize)]
struct OsvEvent {
    introduced: Option<String>,
    fixed: Option<String>,
    last_affected: Option<String>,
}

impl OsvDatabase {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Pairs each `introduced` event with the next closing event.
fn events_to_ranges(events: &[OsvEvent]) -> Vec<AffectedRange> {
    let mut ranges = Vec::new();
    let mut open: Option<String> = None;
    let mut started = false;

    for event in events {
        if let Some(introduced) = &event.introduced {
            if started {
                ranges.push(AffectedRange::Events {
                    introduced: open.take(),
                    fixed: None,
                    last_affected: None,
                });
            }
            open = Some(introduced.clone());
            started = true;
        }
        if event.fixed.is_some() || event.last_affected.is_some() {
            ranges.push(AffectedRange::Events {
                introduced: open.take(),
                fixed: event.fixed.clone(),
                last_affected: event.last_affected.clone(),
            });
            started = false;
        }
    }
    if started {
        ranges.push(AffectedRange::Events {
            introduced: open,
            fixed: None,
            last_affected: None,
        });
    }
    ranges
}

/// Reads a rating from `database_specific.severity`, then from CVSS scores.
fn severity_of(vuln: &OsvVulnerability) -> Severity {
    let labelled = vuln
        .database_specific
        .as_ref()
        .and_then(|d| d.get("severity"))
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<Severity>().ok())
        .filter(|s| *s != Severity::Unknown);
    if let Some(severity) = labelled {
        return severity;
    }
    vuln.severity
        .iter()
        .filter(|s| s.kind.starts_with("CVSS"))
        .filter_map(|s| s.score.parse::<f64>().ok())
        .map(Severity::from_cvss)
        .max()
        .unwrap_or_default()
}

fn to_advisory(vuln: OsvVulnerability, package: &PackageId) -> Option<Advisory> {
    let severity = severity_of(&vuln);
    let mut affected = Vec::new();

    for entry in &vuln.affected {
        let matches = entry
            .package
            .as_ref()
            .map(|p| PackageId::new(package.ecosystem, &p.name) == *package)
            .unwrap_or(true);
        if !matches {
            continue;
        }
        for range in &entry.ranges {
            // GIT ranges are commit hashes
            if range.kind == "SEMVER" || range.kind == "ECOSYSTEM" {
                affected.extend(events_to_ranges(&range.events));
            }
        }
        if !entry.versions.is_empty() {
            affected.push(AffectedRange::Versions {
                versions: entry.versions.clone(),
            });
        }
    }

    if affected.is_empty() {
        return None;
    }
    Some(Advisory {
        id: vuln.id,
        aliases: vuln.aliases,
        summary: vuln.summary.filter(|s| !s.is_empty()).or(vuln.details),
        severity,
        affected,
    })
}

#[async_trait]
impl AdvisorySource for OsvDatabase {
    async fn advisories(&self, package: &PackageId) -> Result<Vec<Advisory>, RegistryError> {
        let url = format!("{}/v1/query", self.base_url);
        let mut advisories = Vec::new();
        let mut page_token = None;

        for _ in 0..MAX_PAGES {
            let request = QueryRequest {
                package: QueryPackage {
                    name: &package.name,
                    ecosystem: package.ecosystem.osv_name(),
                },
                page_token: page_token.take(),
            };
            let response: QueryResponse = self.http.post_json(&url, &request).await?;
            advisories.extend(response.vulns.into_iter().filter_map(|v| to_advisory(v, package)));

            match response.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        tracing::debug!(package = %package, count = advisories.len(), "osv advisories");
        Ok(advisories)
    }
}
