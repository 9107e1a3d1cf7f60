use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use console::style;
use indexmap::IndexMap;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use depscout_core::{
    build_dependency_graph, AdvisoryAdapter, DependencyType, HttpAdvisories, HttpOptions,
    HttpRegistry, Outcome, PackageInfo, RegistryAdapter, Resolver, ResolverConfig, SqliteStore,
    TieredCache, VulnerabilityThreshold,
};

const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";
const DEFAULT_NVD: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Root requirements as name@range (e.g. lodash@^4.17.0)
    #[arg(required = true, value_name = "PACKAGE")]
    pub packages: Vec<String>,

    /// Vulnerability threshold: CRITICAL, HIGH, MEDIUM, LOW, or
    /// CUSTOM:<c>,<h>,<m>,<l>. Anything else disables filtering.
    #[arg(short, long)]
    pub threshold: Option<String>,

    /// Dependency map to follow (runtime, dev, or peer)
    #[arg(long, default_value = "runtime")]
    pub dep_type: String,

    /// MCTS iterations
    #[arg(long, default_value_t = 1000)]
    pub iterations: u32,

    /// RNG seed for reproducible searches
    #[arg(long)]
    pub seed: Option<u64>,

    /// Record root ranges as constraints on their packages
    #[arg(long)]
    pub init_versions: bool,

    /// Registry base URL
    #[arg(long, default_value = DEFAULT_REGISTRY)]
    pub registry: String,

    /// Vulnerability database base URL
    #[arg(long, default_value = DEFAULT_NVD)]
    pub nvd: String,

    /// NVD API key (tightens the request rate limit)
    #[arg(long, env = "DEPSCOUT_NVD_API_KEY")]
    pub nvd_api_key: Option<String>,

    /// Cache database location
    #[arg(long, default_value = ".depscout/cache.db")]
    pub cache: PathBuf,

    /// Also print the dependency graph projection
    #[arg(long)]
    pub graph: bool,

    /// Output format (table or json)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

pub async fn execute(args: ResolveArgs) -> Result<i32> {
    let roots = parse_roots(&args.packages)?;

    let dep_type = DependencyType::parse(&args.dep_type)
        .with_context(|| format!("unknown dependency type \"{}\"", args.dep_type))?;
    let threshold = args
        .threshold
        .as_deref()
        .and_then(VulnerabilityThreshold::parse);

    if let Some(parent) = args.cache.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create cache directory {}", parent.display()))?;
    }

    let registry_store = Arc::new(
        SqliteStore::open(&args.cache, "registry_metadata").context("failed to open cache")?,
    );
    let vuln_store = Arc::new(
        SqliteStore::open(&args.cache, "vulnerabilities").context("failed to open cache")?,
    );

    let registry_transport =
        HttpRegistry::new(&args.registry, HttpOptions::default()).context("registry client")?;
    let registry = Arc::new(RegistryAdapter::new(
        Arc::new(registry_transport),
        TieredCache::new("metadata", registry_store, true),
    ));
    registry.warm_cache().await;

    let mut advisory_transport =
        HttpAdvisories::new(&args.nvd, HttpOptions::default()).context("advisory client")?;
    if let Some(key) = &args.nvd_api_key {
        advisory_transport = advisory_transport.with_api_key(key);
    }
    let advisories = Arc::new(AdvisoryAdapter::new(
        Arc::new(advisory_transport),
        TieredCache::new("vulnerabilities", vuln_store, true),
    ));
    advisories.warm_cache().await;

    let config = ResolverConfig {
        max_iterations: args.iterations,
        init_versions: args.init_versions,
        dependency_type: dep_type,
        threshold,
        seed: args.seed,
        ..ResolverConfig::default()
    };
    let resolver = Resolver::new(registry.clone(), advisories, config);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let report = resolver.resolve_report(&roots, cancel).await;

    match &report.outcome {
        Outcome::Success(assignment) => {
            if args.format == "json" {
                let mut output = json!({
                    "assignment": assignment,
                    "iterations": report.iterations,
                });
                if args.graph {
                    let infos = fetch_infos(registry.as_ref(), assignment).await;
                    let (nodes, edges) =
                        build_dependency_graph(&infos, &roots, &report.depth_overflow, dep_type);
                    output["graph"] = json!({"nodes": nodes, "edges": edges});
                }
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!(
                    "{} {} package{} resolved",
                    style("ok:").green().bold(),
                    assignment.len(),
                    if assignment.len() == 1 { "" } else { "s" }
                );
                for (name, version) in assignment {
                    println!("  {} {}", style(name).bold(), version);
                }
                if args.graph {
                    let infos = fetch_infos(registry.as_ref(), assignment).await;
                    let (nodes, edges) =
                        build_dependency_graph(&infos, &roots, &report.depth_overflow, dep_type);
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({"nodes": nodes, "edges": edges}))?
                    );
                }
            }
            Ok(0)
        }
        Outcome::PartialFailure(assignment, diagnostics) => {
            eprintln!(
                "{} {}",
                style("failed:").red().bold(),
                diagnostics.headline
            );
            for attempt in &diagnostics.attempts {
                eprintln!("  - {}", attempt);
            }
            eprintln!("{}", diagnostics.terminal_summary);
            eprintln!("best partial assignment:");
            for (name, version) in assignment {
                eprintln!("  {} {}", style(name).bold(), version);
            }
            Ok(1)
        }
        Outcome::Failure(diagnostics) => {
            eprintln!(
                "{} {}",
                style("failed:").red().bold(),
                diagnostics.headline
            );
            for attempt in &diagnostics.attempts {
                eprintln!("  - {}", attempt);
            }
            eprintln!("{}", diagnostics.terminal_summary);
            Ok(1)
        }
    }
}

/// Split `name@range` arguments into a roots map. A missing range means
/// any version. Scoped packages keep their leading `@`.
fn parse_roots(packages: &[String]) -> Result<IndexMap<String, String>> {
    let mut roots = IndexMap::new();
    for spec in packages {
        let (name, range) = match spec.rfind('@') {
            Some(0) | None => (spec.as_str(), "*"),
            Some(pos) => (&spec[..pos], &spec[pos + 1..]),
        };
        if name.trim_start_matches('@').is_empty() || range.is_empty() {
            bail!("invalid package spec \"{}\"", spec);
        }
        roots.insert(name.to_string(), range.to_string());
    }
    Ok(roots)
}

async fn fetch_infos(
    registry: &RegistryAdapter,
    assignment: &IndexMap<String, depscout_semver::Version>,
) -> Vec<PackageInfo> {
    let mut infos = Vec::with_capacity(assignment.len());
    for (name, version) in assignment {
        match registry.package_at(name, version).await {
            Ok(Some(info)) => infos.push(info),
            Ok(None) => log::warn!("no record for {}@{}", name, version),
            Err(err) => log::warn!("failed to load {}@{}: {}", name, version, err),
        }
    }
    infos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roots() {
        let roots = parse_roots(&[
            "lodash@^4.17.0".to_string(),
            "react".to_string(),
            "@types/node@>=18".to_string(),
        ])
        .unwrap();

        assert_eq!(roots["lodash"], "^4.17.0");
        assert_eq!(roots["react"], "*");
        assert_eq!(roots["@types/node"], ">=18");
    }

    #[test]
    fn test_parse_roots_rejects_empty() {
        assert!(parse_roots(&["@".to_string()]).is_err());
        assert!(parse_roots(&["pkg@".to_string()]).is_err());
    }
}
