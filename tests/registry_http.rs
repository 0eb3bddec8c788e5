//! Registry plugins against a local HTTP server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use deplens::config::EngineConfig;
use deplens::parser::types::{Ecosystem, PackageId};
use deplens::registry::crates::CratesRegistry;
use deplens::registry::http::HttpClient;
use deplens::registry::maven::MavenRegistry;
use deplens::registry::npm::NpmRegistry;
use deplens::registry::osv::OsvDatabase;
use deplens::registry::pypi::PypiRegistry;
use deplens::registry::{AdvisorySource, Enrichment, RegistryClient, RegistryError, RegistrySource, ResponseCache};

fn http() -> HttpClient {
    HttpClient::new("deplens-tests", Duration::from_secs(5)).unwrap()
}

fn config_for(server: &MockServer) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.registries.npm = server.uri();
    config.registries.crates = server.uri();
    config.registries.pypi = server.uri();
    config.registries.maven = vec![server.uri()];
    config.registries.osv = Some(server.uri());
    config.retry.initial_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config
}

#[tokio::test]
async fn test_npm_packument() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/left-pad"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "left-pad",
            "dist-tags": {"latest": "1.3.0"},
            "versions": {"1.0.0": {}, "1.3.0": {"deprecated": "use padStart"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = NpmRegistry::new(http(), &server.uri());
    let record = registry.fetch("left-pad").await.unwrap();
    assert_eq!(record.latest.as_deref(), Some("1.3.0"));
    assert_eq!(record.versions, vec!["1.0.0", "1.3.0"]);
    assert_eq!(record.deprecated.as_deref(), Some("use padStart"));
}

#[tokio::test]
async fn test_npm_missing_package() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/no-such-package"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let registry = NpmRegistry::new(http(), &server.uri());
    assert_eq!(registry.fetch("no-such-package").await.unwrap_err(), RegistryError::NotFound);
}

#[tokio::test]
async fn test_crates_io_versions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/crates/serde"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "crate": {"name": "serde", "max_stable_version": "1.0.200", "max_version": "1.0.200"},
            "versions": [
                {"num": "1.0.200", "yanked": false},
                {"num": "1.0.199", "yanked": true}
            ]
        })))
        .mount(&server)
        .await;

    let registry = CratesRegistry::new(http(), &server.uri());
    let record = registry.fetch("serde").await.unwrap();
    assert_eq!(record.latest.as_deref(), Some("1.0.200"));
    assert_eq!(record.yanked, vec!["1.0.199".to_string()]);
}

#[tokio::test]
async fn test_pypi_project_with_vulnerabilities() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pypi/requests/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "info": {"name": "requests", "version": "2.31.0"},
            "releases": {"2.30.0": [{"yanked": false}], "2.31.0": [{"yanked": false}]},
            "vulnerabilities": [
                {"id": "PYSEC-2023-74", "aliases": ["CVE-2023-32681"], "details": "leaks proxy creds", "fixed_in": ["2.31.0"]}
            ]
        })))
        .mount(&server)
        .await;

    let registry = PypiRegistry::new(http(), &server.uri());
    let record = registry.fetch("requests").await.unwrap();
    assert_eq!(record.latest.as_deref(), Some("2.31.0"));
    assert_eq!(record.advisories.len(), 1);
    assert_eq!(record.advisories[0].fixed_versions(), vec!["2.31.0"]);
}

#[tokio::test]
async fn test_maven_falls_through_repositories() {
    let mirror = MockServer::start().await;
    let central = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/org/slf4j/slf4j-api/maven-metadata.xml"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mirror)
        .await;
    Mock::given(method("GET"))
        .and(path("/org/slf4j/slf4j-api/maven-metadata.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<?xml version="1.0" encoding="UTF-8"?>
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
  </versioning>
</metadata>"#,
        ))
        .expect(1)
        .mount(&central)
        .await;

    let registry = MavenRegistry::new(http(), vec![mirror.uri(), format!("{}/", central.uri())]);
    let record = registry.fetch("org.slf4j:slf4j-api").await.unwrap();
    assert_eq!(record.latest.as_deref(), Some("2.0.13"));
    assert_eq!(record.versions.len(), 3);
}

#[tokio::test]
async fn test_osv_follows_pages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/query"))
        .and(body_partial_json(json!({"package": {"name": "lodash", "ecosystem": "npm"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vulns": [{
                "id": "GHSA-35jh-r3h4-6jhm",
                "aliases": ["CVE-2021-23337"],
                "summary": "Command Injection in lodash",
                "database_specific": {"severity": "HIGH"},
                "affected": [{
                    "package": {"name": "lodash", "ecosystem": "npm"},
                    "ranges": [{"type": "SEMVER", "events": [{"introduced": "0"}, {"fixed": "4.17.21"}]}]
                }]
            }],
            "next_page_token": "page-2"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/query"))
        .and(body_partial_json(json!({"page_token": "page-2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vulns": [{
                "id": "GHSA-p6mc-m468-83gw",
                "database_specific": {"severity": "MODERATE"},
                "affected": [{
                    "package": {"name": "lodash", "ecosystem": "npm"},
                    "ranges": [{"type": "SEMVER", "events": [{"introduced": "0"}, {"fixed": "4.17.19"}]}]
                }]
            }]
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    let osv = OsvDatabase::new(http(), &server.uri());
    let advisories = osv.advisories(&PackageId::new(Ecosystem::Npm, "lodash")).await.unwrap();
    let ids: Vec<&str> = advisories.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["GHSA-35jh-r3h4-6jhm", "GHSA-p6mc-m468-83gw"]);
}

#[tokio::test]
async fn test_client_retries_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/left-pad"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/left-pad"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dist-tags": {"latest": "1.3.0"},
            "versions": {"1.3.0": {}}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(ResponseCache::in_memory());
    let client = RegistryClient::from_config(&config_for(&server), Arc::clone(&cache)).unwrap();
    let id = PackageId::new(Ecosystem::Npm, "left-pad");

    let enrichment = client.lookup(&id, &CancellationToken::new()).await;
    let record = enrichment.record().unwrap();
    assert_eq!(record.latest.as_deref(), Some("1.3.0"));
    assert!(record.advisories_checked);
    assert_eq!(cache.len(), 1);

    // served from the cache, no further requests
    let again = client.lookup(&id, &CancellationToken::new()).await;
    assert_eq!(again, enrichment);
}

#[tokio::test]
async fn test_client_gives_up_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/crates/tokio"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let cache = Arc::new(ResponseCache::in_memory());
    let client = RegistryClient::from_config(&config_for(&server), Arc::clone(&cache)).unwrap();
    let enrichment = client
        .lookup(&PackageId::new(Ecosystem::Cargo, "tokio"), &CancellationToken::new())
        .await;

    assert!(matches!(enrichment, Enrichment::Unavailable { .. }));
    assert_eq!(enrichment.reason(), Some("registry HTTP error: status 500"));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_advisory_failure_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pypi/flask/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "info": {"version": "3.0.3"},
            "releases": {"3.0.3": [{"yanked": false}]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/query"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let cache = Arc::new(ResponseCache::in_memory());
    let client = RegistryClient::from_config(&config_for(&server), Arc::clone(&cache)).unwrap();
    let enrichment = client
        .lookup(&PackageId::new(Ecosystem::PyPI, "Flask"), &CancellationToken::new())
        .await;

    let record = enrichment.record().unwrap();
    assert_eq!(record.latest.as_deref(), Some("3.0.3"));
    assert!(record.advisory_error.is_some());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_offline_without_cache_is_unavailable() {
    let server = MockServer::start().await;
    let mut config = config_for(&server);
    config.enrich.offline = true;

    let client = RegistryClient::from_config(&config, Arc::new(ResponseCache::in_memory())).unwrap();
    let enrichment = client
        .lookup(&PackageId::new(Ecosystem::Npm, "react"), &CancellationToken::new())
        .await;
    assert!(matches!(enrichment, Enrichment::Unavailable { .. }));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
