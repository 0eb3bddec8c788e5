//! Parallel registry enrichment of a dependency graph.
//!
//! Lookups run on a bounded worker pool: a [`Semaphore`] caps the number of
//! requests in flight, each worker reports `(package, outcome)` on a channel,
//! and the caller is the only writer to the graph. The whole stage has one
//! deadline; whatever is still pending when it passes (or when the run is
//! cancelled) is marked unavailable and reported with a single warning.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EnrichSection;
use crate::diagnostics::Warning;
use crate::graph::DependencyGraph;
use crate::parser::types::PackageId;
use crate::registry::{Enrichment, RegistryClient};

/// About thirty years; stands in for "no deadline" when the timeout is too
/// large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichOptions {
    /// Maximum number of lookups in flight
    pub concurrency: usize,
    /// Deadline for the whole enrichment stage
    pub timeout: Duration,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self::from(&EnrichSection::default())
    }
}

impl From<&EnrichSection> for EnrichOptions {
    fn from(section: &EnrichSection) -> Self {
        Self {
            concurrency: section.concurrency,
            timeout: Duration::from_secs(section.timeout_secs),
        }
    }
}

/// A graph after enrichment and classification, plus every warning raised
/// on the way.
#[derive(Debug, Default)]
pub struct EnrichedGraph {
    pub graph: DependencyGraph,
    pub warnings: Vec<Warning>,
}

impl EnrichedGraph {
    /// Wraps a graph that was never sent to a registry.
    ///
    /// Every package renders as unchecked.
    pub fn unenriched(graph: DependencyGraph, warnings: Vec<Warning>) -> Self {
        Self { graph, warnings }
    }

    /// Puts earlier-stage warnings (parsing, graph building) in front.
    pub fn prepend_warnings(&mut self, mut earlier: Vec<Warning>) {
        earlier.append(&mut self.warnings);
        self.warnings = earlier;
    }

    pub fn has_outdated(&self) -> bool {
        self.graph.packages().iter().any(|n| n.is_outdated())
    }

    pub fn has_vulnerable(&self) -> bool {
        self.graph.packages().iter().any(|n| n.is_vulnerable())
    }
}

/// Why the pool stopped before every lookup reported back.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Interrupted {
    Deadline,
    Cancelled,
}

/// Runs registry lookups for every package of a graph.
pub struct Enricher {
    client: Arc<RegistryClient>,
    options: EnrichOptions,
}

impl Enricher {
    pub fn new(client: Arc<RegistryClient>, options: EnrichOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &EnrichOptions {
        &self.options
    }

    /// Enriches and classifies every package node.
    ///
    /// Never fails. Each node receives exactly one [`Enrichment`]: the
    /// registry's answer, or `Unavailable` when the lookup gave up, the
    /// deadline passed, or `cancel` fired.
    pub async fn enrich(&self, mut graph: DependencyGraph, cancel: &CancellationToken) -> EnrichedGraph {
        let pending = graph.pending_enrichment();
        let total = pending.len();
        let mut warnings = Vec::new();
        info!(
            packages = total,
            concurrency = self.options.concurrency,
            timeout_secs = self.options.timeout.as_secs(),
            "enriching dependency graph"
        );

        let interrupted = if pending.is_empty() {
            None
        } else {
            self.run_pool(&mut graph, pending, cancel, &mut warnings).await
        };

        let leftover = graph.pending_enrichment();
        if !leftover.is_empty() {
            let reason = match interrupted {
                Some(Interrupted::Deadline) => "enrichment deadline exceeded",
                Some(Interrupted::Cancelled) => "enrichment cancelled",
                None => "lookup did not complete",
            };
            for id in &leftover {
                graph.set_enrichment(
                    id,
                    Enrichment::Unavailable {
                        reason: reason.to_string(),
                    },
                );
            }
            warnings.push(match interrupted {
                Some(Interrupted::Cancelled) => Warning::Cancelled {
                    pending: leftover.len(),
                },
                _ => Warning::Timeout {
                    pending: leftover.len(),
                    timeout_secs: self.options.timeout.as_secs(),
                },
            });
            warn!(pending = leftover.len(), reason, "packages left unchecked");
        }

        warnings.extend(graph.classify_all());
        info!(
            packages = total,
            unchecked = leftover.len(),
            warnings = warnings.len(),
            "enrichment complete"
        );
        EnrichedGraph { graph, warnings }
    }

    async fn run_pool(
        &self,
        graph: &mut DependencyGraph,
        pending: Vec<PackageId>,
        cancel: &CancellationToken,
        warnings: &mut Vec<Warning>,
    ) -> Option<Interrupted> {
        let deadline = deadline_after(self.options.timeout);
        let limit = self.options.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let (tx, mut rx) = mpsc::channel::<(PackageId, Enrichment)>(limit * 2);
        let workers_cancel = cancel.child_token();
        let mut workers = JoinSet::new();

        for id in pending {
            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            let cancel = workers_cancel.clone();
            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                if cancel.is_cancelled() {
                    return;
                }
                let outcome = client.lookup(&id, &cancel).await;
                // the receiver is gone once the pool was interrupted
                let _ = tx.send((id, outcome)).await;
            });
        }
        drop(tx);

        let interrupted = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Some(Interrupted::Cancelled),
                received = timeout_at(deadline, rx.recv()) => match received {
                    Ok(Some((id, outcome))) => record(graph, id, outcome, warnings),
                    Ok(None) => break None,
                    Err(_) => break Some(Interrupted::Deadline),
                },
            }
        };

        workers_cancel.cancel();
        workers.abort_all();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    warn!(error = %e, "enrichment worker panicked");
                }
            }
        }
        interrupted
    }
}

/// Writes one lookup outcome into the graph.
fn record(graph: &mut DependencyGraph, id: PackageId, outcome: Enrichment, warnings: &mut Vec<Warning>) {
    match &outcome {
        Enrichment::Known(_) => debug!(package = %id, "registry record attached"),
        Enrichment::Unknown { reason } => debug!(package = %id, reason = %reason, "no registry record"),
        Enrichment::Unavailable { reason } => warnings.push(Warning::Registry {
            package: id.to_string(),
            message: reason.clone(),
        }),
    }
    if !graph.set_enrichment(&id, outcome) {
        debug!(package = %id, "enrichment already set; ignoring duplicate");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::{Declaration, DependencyKind, Ecosystem, LockedPackage, ParsedManifest};
    use crate::parser::ManifestKind;
    use crate::registry::{PackageRecord, RegistryError, RegistrySource, ResponseCache, RetryConfig};
    use crate::version::Requirement;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;

    /// Serves canned records; names listed in `slow` never answer in time.
    struct FakeRegistry {
        records: HashMap<String, PackageRecord>,
        slow: Vec<String>,
    }

    #[async_trait]
    impl RegistrySource for FakeRegistry {
        fn ecosystem(&self) -> Ecosystem {
            Ecosystem::Npm
        }

        async fn fetch(&self, name: &str) -> Result<PackageRecord, RegistryError> {
            if self.slow.iter().any(|s| s == name) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            self.records.get(name).cloned().ok_or(RegistryError::NotFound)
        }
    }

    fn released(latest: &str, versions: &[&str]) -> PackageRecord {
        PackageRecord {
            latest: Some(latest.to_string()),
            versions: versions.iter().map(|v| v.to_string()).collect(),
            advisories_checked: true,
            ..PackageRecord::default()
        }
    }

    fn graph(names: &[(&str, &str)], locked: &[(&str, &str)]) -> DependencyGraph {
        let path = Path::new("app/package.json");
        let mut manifest = ParsedManifest::new(path, ManifestKind::PackageJson, PackageId::new(Ecosystem::Npm, "app"));
        for (name, raw) in names {
            let id = PackageId::new(Ecosystem::Npm, *name);
            let requirement = Requirement::parse(Ecosystem::Npm, raw).unwrap();
            manifest
                .declarations
                .push(Declaration::direct(id, requirement, DependencyKind::Normal, path));
        }
        for (name, version) in locked {
            manifest
                .locked
                .push(LockedPackage::new(PackageId::new(Ecosystem::Npm, *name), *version));
        }
        DependencyGraph::from_manifests(vec![manifest]).0
    }

    fn enricher(registry: FakeRegistry, options: EnrichOptions) -> Enricher {
        let client = RegistryClient::new(Arc::new(ResponseCache::in_memory()))
            .with_retry(RetryConfig {
                max_attempts: 1,
                ..RetryConfig::default()
            })
            .with_source(Arc::new(registry));
        Enricher::new(Arc::new(client), options)
    }

    fn node_label(enriched: &EnrichedGraph, name: &str) -> &'static str {
        enriched
            .graph
            .node(&PackageId::new(Ecosystem::Npm, name))
            .and_then(|n| n.enrichment())
            .map(Enrichment::label)
            .unwrap_or("none")
    }

    #[tokio::test]
    async fn test_enrich_classifies_every_node() {
        let registry = FakeRegistry {
            records: HashMap::from([
                ("react".to_string(), released("18.3.1", &["18.2.0", "18.3.1"])),
                ("lodash".to_string(), released("4.17.21", &["4.17.21"])),
            ]),
            slow: vec![],
        };
        let g = graph(&[("react", "^18.2.0"), ("lodash", "4.17.21"), ("ghost", "^1.0.0")], &[("react", "18.2.0")]);
        let enriched = enricher(registry, EnrichOptions::default())
            .enrich(g, &CancellationToken::new())
            .await;

        assert_eq!(node_label(&enriched, "react"), "known");
        assert_eq!(node_label(&enriched, "ghost"), "unknown");
        let react = enriched.graph.node(&PackageId::new(Ecosystem::Npm, "react")).unwrap();
        assert!(react.is_outdated());
        let lodash = enriched.graph.node(&PackageId::new(Ecosystem::Npm, "lodash")).unwrap();
        assert!(!lodash.is_outdated());
        assert!(enriched.has_outdated());
        assert!(!enriched.has_vulnerable());
        assert!(enriched.graph.pending_enrichment().is_empty());
    }

    #[tokio::test]
    async fn test_deadline_marks_pending_unavailable() {
        let registry = FakeRegistry {
            records: HashMap::from([("fast".to_string(), released("1.0.0", &["1.0.0"]))]),
            slow: vec!["slow".to_string()],
        };
        let options = EnrichOptions {
            concurrency: 4,
            timeout: Duration::from_millis(200),
        };
        let g = graph(&[("fast", "1.0.0"), ("slow", "^1.0.0")], &[]);
        let enriched = enricher(registry, options).enrich(g, &CancellationToken::new()).await;

        assert_eq!(node_label(&enriched, "fast"), "known");
        assert_eq!(node_label(&enriched, "slow"), "unavailable");
        assert!(enriched
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::Timeout { pending: 1, .. })));
    }

    #[tokio::test]
    async fn test_cancelled_run_still_returns() {
        let registry = FakeRegistry {
            records: HashMap::new(),
            slow: vec!["a".to_string(), "b".to_string()],
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let g = graph(&[("a", "^1.0.0"), ("b", "^1.0.0")], &[]);
        let enriched = enricher(registry, EnrichOptions::default()).enrich(g, &cancel).await;

        assert_eq!(node_label(&enriched, "a"), "unavailable");
        assert_eq!(node_label(&enriched, "b"), "unavailable");
        assert!(enriched
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::Cancelled { pending: 2 })));
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let deadline = deadline_after(Duration::MAX);
        assert!(deadline > Instant::now() + Duration::from_secs(86_400));
        let soon = deadline_after(Duration::from_secs(1));
        assert!(soon < deadline);
    }

    #[tokio::test]
    async fn test_enrich_with_unbounded_timeout() {
        let registry = FakeRegistry {
            records: HashMap::from([("react".to_string(), released("18.3.1", &["18.3.1"]))]),
            slow: vec![],
        };
        let options = EnrichOptions {
            concurrency: 2,
            timeout: Duration::from_secs(u64::MAX),
        };
        let g = graph(&[("react", "^18.0.0")], &[]);
        let enriched = enricher(registry, options).enrich(g, &CancellationToken::new()).await;
        assert_eq!(node_label(&enriched, "react"), "known");
        assert!(!enriched.warnings.iter().any(|w| matches!(w, Warning::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_empty_graph() {
        let registry = FakeRegistry {
            records: HashMap::new(),
            slow: vec![],
        };
        let enriched = enricher(registry, EnrichOptions::default())
            .enrich(DependencyGraph::new(), &CancellationToken::new())
            .await;
        assert!(enriched.graph.is_empty());
        assert!(enriched.warnings.is_empty());
    }

    #[test]
    fn test_prepend_warnings() {
        let mut enriched = EnrichedGraph::unenriched(DependencyGraph::new(), vec![Warning::Cancelled { pending: 1 }]);
        enriched.prepend_warnings(vec![Warning::Integrity {
            package: None,
            message: "first".to_string(),
        }]);
        assert_eq!(enriched.warnings[0].label(), "integrity");
        assert_eq!(enriched.warnings[1].label(), "cancelled");
    }
}
