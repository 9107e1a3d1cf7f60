//! Cache-first vulnerability adapter
//!
//! Remote lookups are keyword searches of the form `<ecosystem> <name>`,
//! spaced to stay inside the upstream quota: one request per 600 ms with an
//! API key, one per 6 s without. Transport and decode failures propagate;
//! the resolver's policy is to treat them as an empty list (fail-open).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use depscout_semver::Version;

use crate::cache::TieredCache;
use crate::error::Result;
use crate::registry::AdvisoryTransport;

use super::cve::{parse_nvd, SeverityCounts, VulnerabilityList};

const AUTHENTICATED_INTERVAL: Duration = Duration::from_millis(600);
const ANONYMOUS_INTERVAL: Duration = Duration::from_secs(6);

pub struct AdvisoryAdapter {
    transport: Arc<dyn AdvisoryTransport>,
    cache: TieredCache<VulnerabilityList>,
    /// Keyword prefix identifying the package ecosystem upstream.
    ecosystem: String,
    last_request: Mutex<Option<Instant>>,
}

impl AdvisoryAdapter {
    pub fn new(transport: Arc<dyn AdvisoryTransport>, cache: TieredCache<VulnerabilityList>) -> Self {
        AdvisoryAdapter {
            transport,
            cache,
            ecosystem: "npm".to_string(),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_ecosystem(mut self, ecosystem: impl Into<String>) -> Self {
        self.ecosystem = ecosystem.into();
        self
    }

    /// Sleep as needed so consecutive remote probes respect the quota.
    async fn throttle(&self) {
        let interval = if self.transport.is_authenticated() {
            AUTHENTICATED_INTERVAL
        } else {
            ANONYMOUS_INTERVAL
        };

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// The vulnerability list for one package version, cache-first.
    pub async fn vulnerabilities(&self, name: &str, version: &Version) -> Result<VulnerabilityList> {
        let version_key = version.to_string();
        if let Some(list) = self.cache.get(name, &version_key).await {
            return Ok(list);
        }

        self.throttle().await;

        let keyword = format!("{} {}", self.ecosystem, name);
        let payload = self.transport.fetch_cves(&keyword).await?;
        let list = parse_nvd(&payload)?;

        log::debug!("{} {}: {} known vulnerabilities", name, version_key, list.len());
        self.cache.put(name, &version_key, &list).await;
        Ok(list)
    }

    /// Per-severity counts for one package version.
    pub async fn severity_counts(&self, name: &str, version: &Version) -> Result<SeverityCounts> {
        Ok(self.vulnerabilities(name, version).await?.counts())
    }

    /// Rehydrate the vulnerability cache's memory tier.
    pub async fn warm_cache(&self) {
        self.cache.load_all().await;
    }
}
