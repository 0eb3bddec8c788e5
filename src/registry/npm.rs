//! npm registry plugin.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::http::HttpClient;
use super::{PackageRecord, RegistryError, RegistrySource};
use crate::parser::types::Ecosystem;

/// Reads package documents ("packuments") from an npm-compatible registry.
pub struct NpmRegistry {
    http: HttpClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Packument {
    #[serde(rename = "dist-tags", default)]
    dist_tags: BTreeMap<String, String>,
    #[serde(default)]
    versions: BTreeMap<String, PackumentVersion>,
}

#[derive(Debug, Deserialize)]
struct PackumentVersion {
    #[serde(default)]
    deprecated: Option<serde_json::Value>,
}

impl NpmRegistry {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, name: &str) -> Result<String, RegistryError> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(RegistryError::InvalidIdentity(name.to_string()));
        }
        // scoped packages keep the `@` but escape the slash
        Ok(format!("{}/{}", self.base_url, name.replace('/', "%2F")))
    }
}

fn to_record(packument: Packument) -> PackageRecord {
    let latest = packument.dist_tags.get("latest").cloned();
    let deprecated = latest
        .as_ref()
        .and_then(|l| packument.versions.get(l))
        .and_then(|v| match &v.deprecated {
            Some(serde_json::Value::String(message)) if !message.is_empty() => Some(message.clone()),
            Some(serde_json::Value::Bool(true)) => Some("deprecated".to_string()),
            _ => None,
        });
    PackageRecord {
        latest,
        versions: packument.versions.into_keys().collect(),
        deprecated,
        ..PackageRecord::default()
    }
}

#[async_trait]
impl RegistrySource for NpmRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }

    async fn fetch(&self, name: &str) -> Result<PackageRecord, RegistryError> {
        let url = self.url(name)?;
        let packument: Packument = self.http.get_json(&url).await?;
        Ok(to_record(packument))
    }
}
