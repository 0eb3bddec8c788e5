//! Maven repository plugin.
//!
//! Reads `maven-metadata.xml` for a `group:artifact` coordinate from each
//! configured repository in turn, stopping at the first that has it.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::http::HttpClient;
use super::{PackageRecord, RegistryError, RegistrySource};
use crate::parser::types::Ecosystem;

/// Reads artifact metadata from one or more Maven repositories.
pub struct MavenRegistry {
    http: HttpClient,
    repositories: Vec<String>,
}

/// The parts of `maven-metadata.xml` we use.
#[derive(Debug, Default, PartialEq)]
pub struct MavenMetadata {
    pub latest: Option<String>,
    pub release: Option<String>,
    pub versions: Vec<String>,
    pub last_updated: Option<String>,
}

impl MavenMetadata {
    /// Parses the `<metadata><versioning>` section of a metadata document.
    pub fn parse(xml: &str) -> Result<Self, RegistryError> {
        let mut reader = Reader::from_str(xml.trim());
        let mut buf = Vec::new();
        let mut path: Vec<String> = Vec::new();
        let mut metadata = MavenMetadata::default();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    path.push(String::from_utf8_lossy(e.name().as_ref()).to_string());
                }
                Ok(Event::End(_)) => {
                    path.pop();
                }
                Ok(Event::Text(t)) => {
                    let text = reader
                        .decoder()
                        .decode(&t)
                        .map_err(|e| RegistryError::Decode(e.to_string()))?
                        .trim()
                        .to_string();
                    if text.is_empty() {
                        buf.clear();
                        continue;
                    }
                    let tail: Vec<&str> = path.iter().rev().take(2).map(String::as_str).collect();
                    match tail.as_slice() {
                        ["latest", "versioning"] => metadata.latest = Some(text),
                        ["release", "versioning"] => metadata.release = Some(text),
                        ["lastUpdated", "versioning"] => metadata.last_updated = Some(text),
                        ["version", "versions"] => metadata.versions.push(text),
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(RegistryError::Decode(format!("XML parse error: {}", e))),
                _ => {}
            }
            buf.clear();
        }

        if !path.is_empty() {
            return Err(RegistryError::Decode("truncated maven-metadata.xml".to_string()));
        }
        Ok(metadata)
    }
}

impl MavenRegistry {
    pub fn new(http: HttpClient, repositories: Vec<String>) -> Self {
        Self {
            http,
            repositories: repositories
                .into_iter()
                .map(|r| r.trim_end_matches('/').to_string())
                .collect(),
        }
    }

    /// Path of the metadata file relative to a repository root.
    fn metadata_path(name: &str) -> Result<String, RegistryError> {
        let (group, artifact) = name
            .split_once(':')
            .filter(|(g, a)| !g.is_empty() && !a.is_empty() && !a.contains(':'))
            .ok_or_else(|| RegistryError::InvalidIdentity(name.to_string()))?;
        Ok(format!("{}/{}/maven-metadata.xml", group.replace('.', "/"), artifact))
    }
}

fn to_record(metadata: MavenMetadata) -> PackageRecord {
    PackageRecord {
        latest: metadata.release.or(metadata.latest),
        versions: metadata.versions,
        ..PackageRecord::default()
    }
}

#[async_trait]
impl RegistrySource for MavenRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Maven
    }

    async fn fetch(&self, name: &str) -> Result<PackageRecord, RegistryError> {
        let path = Self::metadata_path(name)?;
        let mut last_error = None;

        for repository in &self.repositories {
            let url = format!("{}/{}", repository, path);
            match self.http.get_text(&url).await {
                Ok(xml) => return MavenMetadata::parse(&xml).map(to_record),
                Err(RegistryError::NotFound) => continue,
                Err(e) => {
                    tracing::debug!(repository = %repository, error = %e, "maven repository failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(RegistryError::NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>org.slf4j</groupId>
  <artifactId>slf4j-api</artifactId>
  <versioning>
    <latest>2.1.0-alpha1</latest>
    <release>2.0.13</release>
    <versions>
      <version>1.7.36</version>
      <version>2.0.13</version>
      <version>2.1.0-alpha1</version>
    </versions>
    <lastUpdated>20240401000000</lastUpdated>
  </versioning>
</metadata>"#;

    #[test]
    fn test_parse_metadata() {
        let metadata = MavenMetadata::parse(METADATA).unwrap();
        assert_eq!(metadata.latest.as_deref(), Some("2.1.0-alpha1"));
        assert_eq!(metadata.release.as_deref(), Some("2.0.13"));
        assert_eq!(metadata.versions, vec!["1.7.36", "2.0.13", "2.1.0-alpha1"]);
        assert_eq!(metadata.last_updated.as_deref(), Some("20240401000000"));
    }

    #[test]
    fn test_release_preferred_over_latest() {
        let record = to_record(MavenMetadata::parse(METADATA).unwrap());
        assert_eq!(record.latest.as_deref(), Some("2.0.13"));
    }

    #[test]
    fn test_malformed_metadata() {
        assert!(MavenMetadata::parse("<metadata><versioning>").is_err());
    }

    #[test]
    fn test_metadata_path() {
        assert_eq!(
            MavenRegistry::metadata_path("org.slf4j:slf4j-api").unwrap(),
            "org/slf4j/slf4j-api/maven-metadata.xml"
        );
        assert!(MavenRegistry::metadata_path("no-colon").is_err());
        assert!(MavenRegistry::metadata_path("a:b:c").is_err());
    }
}
