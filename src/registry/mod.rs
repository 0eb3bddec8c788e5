//! Registry access: latest versions and security advisories per package.
//!
//! Each ecosystem has one [`RegistrySource`] plugin; an optional
//! [`AdvisorySource`] adds vulnerability data across ecosystems. The
//! [`RegistryClient`] ties them together with the response cache, retry
//! policy and cancellation, and always answers with an [`Enrichment`]
//! rather than an error.

pub mod cache;
pub mod crates;
pub mod http;
pub mod maven;
pub mod npm;
pub mod osv;
pub mod pypi;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::config::{EngineConfig, RegistryConfig};
use crate::parser::types::{Ecosystem, PackageId};
use crate::version::{Requirement, Version, VersionRange, VersionResult};

pub use cache::{CachedLookup, ResponseCache};
pub use retry::{retry_with_backoff, RetryConfig};

/// Advisory severity. `Unknown` orders below every rated severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Unknown,
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    /// Maps a CVSS base score to a severity bucket.
    pub fn from_cvss(score: f64) -> Self {
        match score {
            s if s >= 9.0 => Severity::Critical,
            s if s >= 7.0 => Severity::High,
            s if s >= 4.0 => Severity::Moderate,
            s if s > 0.0 => Severity::Low,
            _ => Severity::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Unknown => "unknown",
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "moderate" | "medium" => Ok(Severity::Moderate),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            "unknown" | "" => Ok(Severity::Unknown),
            other => Err(format!("Unknown severity: '{}'", other)),
        }
    }
}

/// One affected-version description inside an advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AffectedRange {
    /// OSV-style events: affected from `introduced` up to `fixed` (exclusive)
    /// or `last_affected` (inclusive).
    Events {
        introduced: Option<String>,
        fixed: Option<String>,
        last_affected: Option<String>,
    },
    /// A range in the ecosystem's own requirement syntax (`<2.1.0`).
    Expression { expr: String },
    /// An explicit list of affected versions.
    Versions { versions: Vec<String> },
}

impl AffectedRange {
    fn to_range(&self, ecosystem: Ecosystem) -> VersionResult<VersionRange> {
        use std::ops::Bound;
        match self {
            AffectedRange::Events {
                introduced,
                fixed,
                last_affected,
            } => {
                let lower = match introduced.as_deref() {
                    None | Some("0") | Some("") => Bound::Unbounded,
                    Some(v) => Bound::Included(Version::parse(ecosystem, v)?),
                };
                let upper = match (fixed.as_deref(), last_affected.as_deref()) {
                    (Some(v), _) => Bound::Excluded(Version::parse(ecosystem, v)?),
                    (None, Some(v)) => Bound::Included(Version::parse(ecosystem, v)?),
                    (None, None) => Bound::Unbounded,
                };
                Ok(VersionRange::between(lower, upper))
            }
            AffectedRange::Expression { expr } => Ok(Requirement::parse(ecosystem, expr)?
                .range()
                .cloned()
                .unwrap_or_else(VersionRange::empty)),
            AffectedRange::Versions { versions } => {
                let mut range = VersionRange::empty();
                for v in versions {
                    range = range.union(VersionRange::exact(Version::parse(ecosystem, v)?));
                }
                Ok(range)
            }
        }
    }
}

/// A published security advisory for one package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub affected: Vec<AffectedRange>,
}

impl Advisory {
    /// Union of every affected range, in the package's version grammar.
    pub fn affected_range(&self, ecosystem: Ecosystem) -> VersionResult<VersionRange> {
        let mut range = VersionRange::empty();
        for affected in &self.affected {
            range = range.union(affected.to_range(ecosystem)?);
        }
        Ok(range)
    }

    /// Versions named as fixes by the advisory's events.
    pub fn fixed_versions(&self) -> Vec<&str> {
        self.affected
            .iter()
            .filter_map(|a| match a {
                AffectedRange::Events { fixed: Some(f), .. } => Some(f.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns true if both advisories describe the same issue.
    fn same_issue(&self, other: &Advisory) -> bool {
        self.id == other.id || self.aliases.contains(&other.id) || other.aliases.contains(&self.id)
    }
}

/// Registry metadata for one package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Latest stable release as reported by the registry.
    pub latest: Option<String>,
    /// Every published version.
    #[serde(default)]
    pub versions: Vec<String>,
    /// Versions withdrawn from the registry.
    #[serde(default)]
    pub yanked: Vec<String>,
    /// Deprecation notice for the package, if any.
    #[serde(default)]
    pub deprecated: Option<String>,
    #[serde(default)]
    pub advisories: Vec<Advisory>,
    /// True once an advisory source answered for this package.
    #[serde(default)]
    pub advisories_checked: bool,
    /// Why advisory data is missing, when the lookup failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory_error: Option<String>,
}

impl PackageRecord {
    /// Adds advisories from an advisory source, replacing entries that
    /// describe the same issue.
    pub fn merge_advisories(&mut self, incoming: Vec<Advisory>) {
        for advisory in incoming {
            self.advisories.retain(|existing| !existing.same_issue(&advisory));
            self.advisories.push(advisory);
        }
        self.advisories_checked = true;
        self.advisory_error = None;
    }
}

/// Errors raised by registry and advisory lookups.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// The registry has no record of the package.
    #[error("package not found")]
    NotFound,

    /// The package name cannot be expressed as a registry query.
    #[error("invalid package identity: {0}")]
    InvalidIdentity(String),

    /// The registry asked us to slow down.
    #[error("registry rate limited the request")]
    RateLimited,

    /// Unexpected HTTP status.
    #[error("registry HTTP error: status {status}")]
    Http { status: u16 },

    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The payload could not be decoded.
    #[error("malformed registry response: {0}")]
    Decode(String),

    /// The run was cancelled while the request was in flight.
    #[error("request cancelled")]
    Cancelled,

    /// The HTTP client could not be constructed.
    #[error("registry client setup failed: {0}")]
    Setup(String),
}

impl RegistryError {
    /// Transient failures are worth retrying; everything else is final.
    pub fn is_transient(&self) -> bool {
        match self {
            RegistryError::RateLimited | RegistryError::Network(_) | RegistryError::Timeout => true,
            RegistryError::Http { status } => *status >= 500,
            _ => false,
        }
    }
}

/// Outcome of enriching one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    /// The registry answered.
    Known(PackageRecord),
    /// The registry definitively has no usable record.
    Unknown { reason: String },
    /// The registry could not be reached in time.
    Unavailable { reason: String },
}

impl Enrichment {
    pub fn label(&self) -> &'static str {
        match self {
            Enrichment::Known(_) => "known",
            Enrichment::Unknown { .. } => "unknown",
            Enrichment::Unavailable { .. } => "unavailable",
        }
    }

    pub fn record(&self) -> Option<&PackageRecord> {
        match self {
            Enrichment::Known(record) => Some(record),
            _ => None,
        }
    }

    /// Reason the node has no registry data, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Enrichment::Known(_) => None,
            Enrichment::Unknown { reason } | Enrichment::Unavailable { reason } => Some(reason),
        }
    }
}

/// A registry that knows the published versions of one ecosystem.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Ecosystem served by this source.
    fn ecosystem(&self) -> Ecosystem;

    /// Fetches the version list for a package name.
    ///
    /// Implementations return [`RegistryError::NotFound`] when the registry
    /// has no such package, and leave retries to the caller.
    async fn fetch(&self, name: &str) -> Result<PackageRecord, RegistryError>;
}

/// A database of security advisories.
#[async_trait]
pub trait AdvisorySource: Send + Sync {
    /// Fetches every advisory recorded for a package, whatever the version.
    async fn advisories(&self, package: &PackageId) -> Result<Vec<Advisory>, RegistryError>;
}

/// Combines registry plugins, the advisory source, the cache and the retry
/// policy into single per-package lookups.
pub struct RegistryClient {
    sources: HashMap<Ecosystem, Arc<dyn RegistrySource>>,
    advisories: Option<Arc<dyn AdvisorySource>>,
    cache: Arc<ResponseCache>,
    retry: RetryConfig,
    offline: bool,
}

impl RegistryClient {
    /// Creates a client with no sources attached.
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self {
            sources: HashMap::new(),
            advisories: None,
            cache,
            retry: RetryConfig::default(),
            offline: false,
        }
    }

    /// Creates a client with the HTTP plugins described by the configuration.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use deplens::config::EngineConfig;
    /// use deplens::registry::{RegistryClient, ResponseCache};
    ///
    /// let config = EngineConfig::default();
    /// let client = RegistryClient::from_config(&config, Arc::new(ResponseCache::in_memory())).unwrap();
    /// ```
    pub fn from_config(config: &EngineConfig, cache: Arc<ResponseCache>) -> Result<Self, RegistryError> {
        let registries: &RegistryConfig = &config.registries;
        let http = http::HttpClient::new(
            &registries.user_agent,
            Duration::from_secs(registries.request_timeout_secs),
        )?;

        let mut client = Self::new(cache)
            .with_retry(config.retry.to_retry_config())
            .offline(config.enrich.offline)
            .with_source(Arc::new(npm::NpmRegistry::new(http.clone(), &registries.npm)))
            .with_source(Arc::new(crates::CratesRegistry::new(http.clone(), &registries.crates)))
            .with_source(Arc::new(pypi::PypiRegistry::new(http.clone(), &registries.pypi)))
            .with_source(Arc::new(maven::MavenRegistry::new(http.clone(), registries.maven.clone())));

        if let Some(osv_url) = registries.osv.as_deref() {
            client = client.with_advisory_source(Arc::new(osv::OsvDatabase::new(http, osv_url)));
        }
        Ok(client)
    }

    /// Registers (or replaces) the source for its ecosystem.
    pub fn with_source(mut self, source: Arc<dyn RegistrySource>) -> Self {
        self.sources.insert(source.ecosystem(), source);
        self
    }

    pub fn with_advisory_source(mut self, source: Arc<dyn AdvisorySource>) -> Self {
        self.advisories = Some(source);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// In offline mode only cached data is served.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Looks up one package.
    ///
    /// Never fails: a definite miss becomes [`Enrichment::Unknown`], and
    /// exhausted retries or cancellation become [`Enrichment::Unavailable`].
    /// Only complete answers are cached. With an advisory source attached,
    /// a cached record stored without advisories is fetched again (unless
    /// offline).
    #[instrument(level = "debug", skip(self, cancel), fields(package = %id))]
    pub async fn lookup(&self, id: &PackageId, cancel: &CancellationToken) -> Enrichment {
        if let Some(cached) = self.cache.get(id) {
            if self.offline || self.advisories.is_none() || cached.has_advisories() {
                debug!("cache hit");
                return cached.into_enrichment();
            }
            debug!("cached record has no advisory data, refreshing");
        }
        if self.offline {
            return Enrichment::Unavailable {
                reason: "offline mode and no cached data".to_string(),
            };
        }
        let Some(source) = self.sources.get(&id.ecosystem) else {
            return Enrichment::Unknown {
                reason: format!("no registry configured for {}", id.ecosystem),
            };
        };

        let mut record = match retry_with_backoff(&self.retry, cancel, || source.fetch(&id.name)).await {
            Ok(record) => record,
            Err(e) if e.is_transient() || e == RegistryError::Cancelled => {
                warn!(error = %e, "registry lookup gave up");
                return Enrichment::Unavailable { reason: e.to_string() };
            }
            Err(e) => {
                debug!(error = %e, "registry has no usable record");
                let reason = e.to_string();
                self.cache.insert(id.clone(), CachedLookup::Missing { reason: reason.clone() });
                return Enrichment::Unknown { reason };
            }
        };

        let mut complete = true;
        if let Some(advisories) = &self.advisories {
            match retry_with_backoff(&self.retry, cancel, || advisories.advisories(id)).await {
                Ok(found) => record.merge_advisories(found),
                Err(e) => {
                    warn!(error = %e, "advisory lookup failed");
                    record.advisory_error = Some(e.to_string());
                    complete = false;
                }
            }
        }

        if complete {
            self.cache.insert(id.clone(), CachedLookup::Found { record: record.clone() });
        }
        Enrichment::Known(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        result: Result<PackageRecord, RegistryError>,
    }

    #[async_trait]
    impl RegistrySource for CountingSource {
        fn ecosystem(&self) -> Ecosystem {
            Ecosystem::Npm
        }

        async fn fetch(&self, _name: &str) -> Result<PackageRecord, RegistryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    struct FailingAdvisories;

    struct NoAdvisories;

    #[async_trait]
    impl AdvisorySource for NoAdvisories {
        async fn advisories(&self, _package: &PackageId) -> Result<Vec<Advisory>, RegistryError> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl AdvisorySource for FailingAdvisories {
        async fn advisories(&self, _package: &PackageId) -> Result<Vec<Advisory>, RegistryError> {
            Err(RegistryError::Http { status: 503 })
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
        }
    }

    fn record() -> PackageRecord {
        PackageRecord {
            latest: Some("1.0.0".to_string()),
            versions: vec!["1.0.0".to_string()],
            ..PackageRecord::default()
        }
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Unknown < Severity::Low);
        assert!(Severity::Low < Severity::Moderate);
        assert!(Severity::High < Severity::Critical);
        assert_eq!("medium".parse::<Severity>().unwrap(), Severity::Moderate);
        assert_eq!(Severity::from_cvss(9.8), Severity::Critical);
        assert_eq!(Severity::from_cvss(5.0), Severity::Moderate);
    }

    #[test]
    fn test_transient_classification() {
        assert!(RegistryError::Timeout.is_transient());
        assert!(RegistryError::RateLimited.is_transient());
        assert!(RegistryError::Http { status: 502 }.is_transient());
        assert!(!RegistryError::Http { status: 403 }.is_transient());
        assert!(!RegistryError::NotFound.is_transient());
        assert!(!RegistryError::Decode("x".into()).is_transient());
    }

    #[test]
    fn test_events_range() {
        let advisory = Advisory {
            id: "OSV-1".into(),
            affected: vec![AffectedRange::Events {
                introduced: Some("0".into()),
                fixed: Some("2.1.0".into()),
                last_affected: None,
            }],
            ..Advisory::default()
        };
        let range = advisory.affected_range(Ecosystem::Npm).unwrap();
        assert!(range.contains(&Version::parse(Ecosystem::Npm, "2.0.9").unwrap()));
        assert!(!range.contains(&Version::parse(Ecosystem::Npm, "2.1.0").unwrap()));
        assert_eq!(advisory.fixed_versions(), vec!["2.1.0"]);
    }

    #[test]
    fn test_merge_advisories_dedupes_aliases() {
        let mut rec = record();
        rec.advisories.push(Advisory {
            id: "PYSEC-1".into(),
            ..Advisory::default()
        });
        rec.merge_advisories(vec![Advisory {
            id: "GHSA-x".into(),
            aliases: vec!["PYSEC-1".into()],
            severity: Severity::High,
            ..Advisory::default()
        }]);
        assert_eq!(rec.advisories.len(), 1);
        assert_eq!(rec.advisories[0].id, "GHSA-x");
        assert!(rec.advisories_checked);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            result: Ok(record()),
        });
        let client = RegistryClient::new(Arc::new(ResponseCache::in_memory())).with_source(source.clone());
        let id = PackageId::new(Ecosystem::Npm, "left-pad");
        let token = CancellationToken::new();

        let first = client.lookup(&id, &token).await;
        let second = client.lookup(&id, &token).await;
        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_unknown_without_retry() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            result: Err(RegistryError::NotFound),
        });
        let client = RegistryClient::new(Arc::new(ResponseCache::in_memory()))
            .with_retry(fast_retry())
            .with_source(source.clone());
        let id = PackageId::new(Ecosystem::Npm, "ghost");
        let outcome = client.lookup(&id, &CancellationToken::new()).await;
        assert_eq!(outcome.label(), "unknown");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_exhaustion_is_unavailable() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            result: Err(RegistryError::Timeout),
        });
        let client = RegistryClient::new(Arc::new(ResponseCache::in_memory()))
            .with_retry(fast_retry())
            .with_source(source.clone());
        let id = PackageId::new(Ecosystem::Npm, "slow");
        let outcome = client.lookup(&id, &CancellationToken::new()).await;
        assert_eq!(outcome.label(), "unavailable");
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert!(client.cache().get(&id).is_none());
    }

    #[tokio::test]
    async fn test_advisory_failure_keeps_version_data() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            result: Ok(record()),
        });
        let client = RegistryClient::new(Arc::new(ResponseCache::in_memory()))
            .with_retry(fast_retry())
            .with_source(source)
            .with_advisory_source(Arc::new(FailingAdvisories));
        let id = PackageId::new(Ecosystem::Npm, "lib");
        let outcome = client.lookup(&id, &CancellationToken::new()).await;
        let rec = outcome.record().unwrap();
        assert_eq!(rec.latest.as_deref(), Some("1.0.0"));
        assert!(!rec.advisories_checked);
        assert!(rec.advisory_error.is_some());
        assert!(client.cache().get(&id).is_none());
    }

    #[tokio::test]
    async fn test_offline_serves_only_cache() {
        let client = RegistryClient::new(Arc::new(ResponseCache::in_memory())).offline(true);
        let id = PackageId::new(Ecosystem::Cargo, "serde");
        let outcome = client.lookup(&id, &CancellationToken::new()).await;
        assert_eq!(outcome.label(), "unavailable");

        client.cache().insert(id.clone(), CachedLookup::Found { record: record() });
        let outcome = client.lookup(&id, &CancellationToken::new()).await;
        assert_eq!(outcome.label(), "known");
    }

    #[tokio::test]
    async fn test_without_advisory_source_record_stays_unchecked() {
        let cache = Arc::new(ResponseCache::in_memory());
        let id = PackageId::new(Ecosystem::Npm, "libq");
        let plain = RegistryClient::new(Arc::clone(&cache)).with_source(Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            result: Ok(record()),
        }));
        let outcome = plain.lookup(&id, &CancellationToken::new()).await;
        assert!(!outcome.record().unwrap().advisories_checked);

        // the same cache, now with advisories available
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            result: Ok(record()),
        });
        let checked = RegistryClient::new(Arc::clone(&cache))
            .with_source(source.clone())
            .with_advisory_source(Arc::new(NoAdvisories));
        let outcome = checked.lookup(&id, &CancellationToken::new()).await;
        assert!(outcome.record().unwrap().advisories_checked);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(cache.get(&id).unwrap().has_advisories());

        let again = checked.lookup(&id, &CancellationToken::new()).await;
        assert_eq!(again, outcome);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_source_is_unknown() {
        let client = RegistryClient::new(Arc::new(ResponseCache::in_memory()));
        let id = PackageId::new(Ecosystem::Maven, "g:a");
        let outcome = client.lookup(&id, &CancellationToken::new()).await;
        assert_eq!(outcome.label(), "unknown");
    }
}
