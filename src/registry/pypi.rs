//! PyPI JSON API plugin.
//!
//! Besides versions, the PyPI JSON API reports known vulnerabilities from
//! the Python advisory database; these are attached to the record directly.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::http::HttpClient;
use super::{Advisory, AffectedRange, PackageRecord, RegistryError, RegistrySource};
use crate::parser::types::Ecosystem;

/// Reads project metadata from `/pypi/{name}/json`.
pub struct PypiRegistry {
    http: HttpClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    info: ProjectInfo,
    #[serde(default)]
    releases: BTreeMap<String, Vec<ReleaseFile>>,
    #[serde(default)]
    vulnerabilities: Vec<PypiVulnerability>,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseFile {
    #[serde(default)]
    yanked: bool,
}

#[derive(Debug, Deserialize)]
struct PypiVulnerability {
    id: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    fixed_in: Vec<String>,
    #[serde(default)]
    withdrawn: Option<String>,
}

impl PypiRegistry {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, name: &str) -> Result<String, RegistryError> {
        let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(RegistryError::InvalidIdentity(name.to_string()));
        }
        Ok(format!("{}/pypi/{}/json", self.base_url, name))
    }
}

/// Every version below a listed fix is treated as affected; with several
/// fixed branches this over-approximates.
fn to_advisory(vuln: PypiVulnerability) -> Advisory {
    let affected = if vuln.fixed_in.is_empty() {
        vec![AffectedRange::Events {
            introduced: None,
            fixed: None,
            last_affected: None,
        }]
    } else {
        vuln.fixed_in
            .into_iter()
            .map(|fixed| AffectedRange::Events {
                introduced: None,
                fixed: Some(fixed),
                last_affected: None,
            })
            .collect()
    };
    Advisory {
        id: vuln.id,
        aliases: vuln.aliases,
        summary: vuln.summary.or(vuln.details),
        severity: Default::default(),
        affected,
    }
}

fn to_record(response: ProjectResponse) -> PackageRecord {
    // a release counts as yanked only when every file in it is
    let yanked = response
        .releases
        .iter()
        .filter(|(_, files)| !files.is_empty() && files.iter().all(|f| f.yanked))
        .map(|(version, _)| version.clone())
        .collect();
    let advisories = response
        .vulnerabilities
        .into_iter()
        .filter(|v| v.withdrawn.is_none())
        .map(to_advisory)
        .collect();
    PackageRecord {
        latest: response.info.version,
        versions: response.releases.into_keys().collect(),
        yanked,
        advisories,
        advisories_checked: true,
        ..PackageRecord::default()
    }
}

#[async_trait]
impl RegistrySource for PypiRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::PyPI
    }

    async fn fetch(&self, name: &str) -> Result<PackageRecord, RegistryError> {
        let url = self.url(name)?;
        let response: ProjectResponse = self.http.get_json(&url).await?;
        Ok(to_record(response))
    }
}
