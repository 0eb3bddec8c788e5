//! crates.io registry plugin.

use async_trait::async_trait;
use serde::Deserialize;

use super::http::HttpClient;
use super::{PackageRecord, RegistryError, RegistrySource};
use crate::parser::types::Ecosystem;

/// Reads crate metadata from the crates.io web API.
pub struct CratesRegistry {
    http: HttpClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateInfo,
    #[serde(default)]
    versions: Vec<CrateVersion>,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
    #[serde(default)]
    max_stable_version: Option<String>,
    #[serde(default)]
    max_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrateVersion {
    num: String,
    #[serde(default)]
    yanked: bool,
}

impl CratesRegistry {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, name: &str) -> Result<String, RegistryError> {
        let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
        if !valid {
            return Err(RegistryError::InvalidIdentity(name.to_string()));
        }
        Ok(format!("{}/api/v1/crates/{}", self.base_url, name))
    }
}

fn to_record(response: CrateResponse) -> PackageRecord {
    let latest = response
        .krate
        .max_stable_version
        .filter(|v| !v.is_empty())
        .or(response.krate.max_version);
    let yanked = response
        .versions
        .iter()
        .filter(|v| v.yanked)
        .map(|v| v.num.clone())
        .collect();
    PackageRecord {
        latest,
        versions: response.versions.into_iter().map(|v| v.num).collect(),
        yanked,
        ..PackageRecord::default()
    }
}

#[async_trait]
impl RegistrySource for CratesRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Cargo
    }

    async fn fetch(&self, name: &str) -> Result<PackageRecord, RegistryError> {
        let url = self.url(name)?;
        let response: CrateResponse = self.http.get_json(&url).await?;
        Ok(to_record(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_record() {
        let json = r#"{
            "crate": {"name": "serde", "max_stable_version": "1.0.200", "max_version": "1.0.201-rc.1"},
            "versions": [
                {"num": "1.0.201-rc.1", "yanked": false},
                {"num": "1.0.200", "yanked": false},
                {"num": "1.0.199", "yanked": true}
            ]
        }"#;
        let response: CrateResponse = serde_json::from_str(json).unwrap();
        let record = to_record(response);
        assert_eq!(record.latest.as_deref(), Some("1.0.200"));
        assert_eq!(record.versions.len(), 3);
        assert_eq!(record.yanked, vec!["1.0.199".to_string()]);
    }

    #[test]
    fn test_invalid_name() {
        let http = HttpClient::new("test", std::time::Duration::from_secs(1)).unwrap();
        let registry = CratesRegistry::new(http, "https://crates.io");
        assert_eq!(
            registry.url("serde").unwrap(),
            "https://crates.io/api/v1/crates/serde"
        );
        assert!(matches!(registry.url("../etc"), Err(RegistryError::InvalidIdentity(_))));
    }
}
