use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use deplens::config::EngineConfig;
use deplens::engine::{build_graph, discover_manifests, find_unused, BuildOutput};
use deplens::enrich::{EnrichOptions, EnrichedGraph, Enricher};
use deplens::export::{render, ReportFilter, ReportFormat};
use deplens::graph::DependencyGraph;
use deplens::parser::types::PackageId;
use deplens::registry::{RegistryClient, ResponseCache};

#[derive(Parser)]
#[command(name = "deplens")]
#[command(author = "Zachary Woods <143150513+zach-fau@users.noreply.github.com>")]
#[command(version)]
#[command(about = "Multi-ecosystem dependency graph, update and vulnerability analyzer", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to deplens.toml in the project root)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Serve registry data from the cache only
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dependency graph of a project
    Graph {
        /// Project root (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format: tree, dot, json, markdown, csv, text
        #[arg(short, long, default_value = "tree")]
        format: ReportFormat,

        /// How deep to search for manifests
        #[arg(long, default_value_t = 6)]
        max_depth: usize,

        /// Query registries before rendering
        #[arg(short, long)]
        enrich: bool,

        /// Show only projects and the dependencies between them
        #[arg(long)]
        projects_only: bool,
    },
    /// Print projects in the order they have to be built
    Order {
        /// Project root (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Only order this project and the projects it needs
        #[arg(short, long)]
        project: Option<String>,

        /// How deep to search for manifests
        #[arg(long, default_value_t = 6)]
        max_depth: usize,
    },
    /// Check dependencies for updates and known vulnerabilities
    Updates {
        /// Project root (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format: tree, dot, json, markdown, csv, text
        #[arg(short, long, default_value = "text")]
        format: ReportFormat,

        /// Which packages to list: all, outdated, vulnerable
        #[arg(long, default_value = "all")]
        filter: ReportFilter,

        /// How deep to search for manifests
        #[arg(long, default_value_t = 6)]
        max_depth: usize,

        /// Maximum number of registry lookups in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Overall enrichment deadline in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Exit with status 2 when any package is outdated
        #[arg(long)]
        fail_on_outdated: bool,

        /// Exit with status 2 when any package is vulnerable
        #[arg(long)]
        fail_on_vulnerable: bool,
    },
    /// List npm dependencies that no source file imports
    Unused {
        /// Project root (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// How deep to search for manifests
        #[arg(long, default_value_t = 6)]
        max_depth: usize,
    },
    /// Show version information
    Version,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "deplens=debug" } else { "deplens=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Settings shared by every subcommand that talks to registries.
struct Session {
    config: EngineConfig,
    cancel: CancellationToken,
}

impl Session {
    fn new(cli: &Cli, root: &Path) -> Result<Self> {
        let mut config = EngineConfig::load(cli.config.as_deref(), root).context("Failed to load configuration")?;
        if cli.offline {
            config.enrich.offline = true;
        }

        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling pending lookups");
                on_signal.cancel();
            }
        });

        Ok(Self { config, cancel })
    }

    async fn enrich(&self, build: BuildOutput) -> Result<EnrichedGraph> {
        let cache = Arc::new(match &self.config.cache.path {
            Some(path) => ResponseCache::persistent(path, self.config.cache.ttl()),
            None => ResponseCache::in_memory(),
        });
        let client = RegistryClient::from_config(&self.config, Arc::clone(&cache))
            .context("Failed to create registry client")?;
        let enricher = Enricher::new(Arc::new(client), EnrichOptions::from(&self.config.enrich));

        let mut enriched = enricher.enrich(build.graph, &self.cancel).await;
        enriched.prepend_warnings(build.warnings);

        let stats = cache.stats();
        tracing::debug!(hits = stats.hits, misses = stats.misses, "registry cache");
        if let Err(e) = cache.persist() {
            tracing::warn!(error = %e, "failed to save registry cache");
        }
        Ok(enriched)
    }
}

fn build(root: &Path, max_depth: usize) -> Result<BuildOutput> {
    let candidates = discover_manifests(root, max_depth);
    build_graph(root, &candidates).with_context(|| format!("Failed to analyze {}", root.display()))
}

/// Resolves a project given as `name` or `ecosystem:name`.
fn find_project(graph: &DependencyGraph, name: &str) -> Result<PackageId> {
    let found: Vec<&PackageId> = graph
        .nodes()
        .into_iter()
        .filter(|n| n.is_project())
        .map(|n| &n.id)
        .filter(|id| id.name == name || id.to_string() == name)
        .collect();
    match found.as_slice() {
        [id] => Ok((*id).clone()),
        [] => anyhow::bail!("No project named {}", name),
        _ => {
            let candidates: Vec<String> = found.iter().map(ToString::to_string).collect();
            anyhow::bail!("Project name {} is ambiguous: {}", name, candidates.join(", "))
        }
    }
}

fn write_report(enriched: &EnrichedGraph, format: ReportFormat, filter: ReportFilter) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render(enriched, format, filter, &mut out).context("Failed to write report")?;
    out.flush().context("Failed to write report")
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match &cli.command {
        Some(Commands::Graph {
            path,
            format,
            max_depth,
            enrich,
            projects_only,
        }) => {
            let mut output = build(path, *max_depth)?;
            if *projects_only {
                output.graph = output.graph.projects_only();
            }
            let enriched = if *enrich {
                Session::new(&cli, path)?.enrich(output).await?
            } else {
                EnrichedGraph::unenriched(output.graph, output.warnings)
            };
            write_report(&enriched, *format, ReportFilter::All)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Updates {
            path,
            format,
            filter,
            max_depth,
            concurrency,
            timeout,
            fail_on_outdated,
            fail_on_vulnerable,
        }) => {
            let mut session = Session::new(&cli, path)?;
            if let Some(concurrency) = concurrency {
                anyhow::ensure!(*concurrency > 0, "--concurrency must be at least 1");
                session.config.enrich.concurrency = *concurrency;
            }
            if let Some(timeout) = timeout {
                session.config.enrich.timeout_secs = *timeout;
            }
            tracing::debug!(
                concurrency = session.config.enrich.concurrency,
                timeout = ?Duration::from_secs(session.config.enrich.timeout_secs),
                offline = session.config.enrich.offline,
                "enrichment settings"
            );

            let output = build(path, *max_depth)?;
            let enriched = session.enrich(output).await?;
            write_report(&enriched, *format, *filter)?;

            let failed = (*fail_on_outdated && enriched.has_outdated())
                || (*fail_on_vulnerable && enriched.has_vulnerable());
            Ok(if failed { ExitCode::from(2) } else { ExitCode::SUCCESS })
        }
        Some(Commands::Order {
            path,
            project,
            max_depth,
        }) => {
            let output = build(path, *max_depth)?;
            let target = project
                .as_deref()
                .map(|name| find_project(&output.graph, name))
                .transpose()?;
            let order = output
                .graph
                .build_order(target.as_ref())
                .context("Failed to order projects")?;
            for (position, node) in order.iter().enumerate() {
                println!("{:>3}. {}", position + 1, node.id);
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Unused { path, max_depth }) => {
            let output = build(path, *max_depth)?;
            let report = find_unused(&output.graph, path)
                .with_context(|| format!("Failed to scan sources in {}", path.display()))?;

            for warning in &report.warnings {
                tracing::warn!("{}", warning);
            }
            if report.declarations.is_empty() {
                println!(
                    "No unused dependencies ({} file(s) scanned, {} package(s) imported)",
                    report.files_scanned,
                    report.imported.len()
                );
            } else {
                println!("Unused dependencies ({}):", report.declarations.len());
                for declaration in &report.declarations {
                    println!(
                        "  {} {} ({})",
                        declaration.package.name,
                        declaration.requirement,
                        declaration.source.display()
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Version) => {
            println!("deplens v{}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("deplens - Dependency graph, update and vulnerability analyzer");
            println!("Run 'deplens updates' to check a project for outdated or vulnerable dependencies");
            println!("Run 'deplens --help' for more information");
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
