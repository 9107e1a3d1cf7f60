//! Cache-first registry adapter
//!
//! Metadata lookups are tagged by the requested range string, so requests
//! typed differently (`"*"` vs `"^1.2"`) coexist in the cache; the
//! enumeration path always uses the `"*"` tag. Pre-release versions (any
//! key containing `-`) are rejected outright.

use std::sync::Arc;

use depscout_semver::{Range, Version};

use crate::cache::TieredCache;
use crate::error::{Error, Result};
use crate::resolver::is_bare_concrete;

use super::transport::RegistryTransport;
use super::types::{PackageInfo, RegistryDocument, VersionMap, VersionRecord};

pub struct RegistryAdapter {
    transport: Arc<dyn RegistryTransport>,
    cache: TieredCache<VersionMap>,
}

impl RegistryAdapter {
    pub fn new(transport: Arc<dyn RegistryTransport>, cache: TieredCache<VersionMap>) -> Self {
        RegistryAdapter { transport, cache }
    }

    /// Load the version map for `name`, consulting the cache under the
    /// given tag and falling through to the remote on a miss.
    async fn load_versions(&self, name: &str, tag: &str) -> Result<VersionMap> {
        if let Some(map) = self.cache.get(name, tag).await {
            return Ok(map);
        }

        let bytes = self.transport.fetch_raw(name).await?;
        let doc: RegistryDocument = serde_json::from_slice(&bytes)?;
        self.cache.put(name, tag, &doc.versions).await;
        Ok(doc.versions)
    }

    /// Published non-pre-release versions with their records, parsed and
    /// sorted newest-first.
    fn stable_versions(map: &VersionMap) -> Vec<(Version, &String, &VersionRecord)> {
        let mut versions: Vec<(Version, &String, &VersionRecord)> = map
            .iter()
            .filter(|(key, _)| !key.contains('-'))
            .filter_map(|(key, record)| Version::parse(key).ok().map(|v| (v, key, record)))
            .collect();
        versions.sort_by(|a, b| b.0.cmp(&a.0));
        versions
    }

    /// Resolve `(name, range)` to a concrete package.
    ///
    /// An exact concrete range selects that version directly when
    /// published; anything else goes through `best_match`. Returns
    /// `Ok(None)` when no published version satisfies the range.
    pub async fn fetch(&self, name: &str, range_str: &str) -> Result<Option<PackageInfo>> {
        let map = self.load_versions(name, range_str).await?;
        let stable = Self::stable_versions(&map);

        if is_bare_concrete(range_str) {
            if let Ok(target) = Version::parse(range_str) {
                if let Some((version, _, record)) = stable.iter().find(|(v, _, _)| *v == target) {
                    return Ok(Some(PackageInfo::from_record(name, *version, record)));
                }
            }
        }

        let range = Range::parse(range_str)?;
        let candidates: Vec<Version> = stable.iter().map(|(v, _, _)| *v).collect();
        let Some(best) = range.best_match(&candidates) else {
            log::debug!("no version of {} satisfies {}", name, range_str);
            return Ok(None);
        };

        let record = stable
            .iter()
            .find(|(v, _, _)| *v == best)
            .map(|(_, _, record)| *record);
        Ok(record.map(|record| PackageInfo::from_record(name, best, record)))
    }

    /// All published non-pre-release versions, newest first.
    pub async fn available_versions(&self, name: &str) -> Result<Vec<Version>> {
        let map = self.load_versions(name, "*").await?;
        Ok(Self::stable_versions(&map)
            .into_iter()
            .map(|(v, _, _)| v)
            .collect())
    }

    /// The record for an exact published version.
    pub async fn package_at(&self, name: &str, version: &Version) -> Result<Option<PackageInfo>> {
        // The enumeration tag usually has the record already.
        if let Some(map) = self.cache.get(name, "*").await {
            let stable = Self::stable_versions(&map);
            if let Some((v, _, record)) = stable.iter().find(|(v, _, _)| v == version) {
                return Ok(Some(PackageInfo::from_record(name, *v, record)));
            }
        }

        self.fetch(name, &version.to_string()).await
    }

    /// Rehydrate the metadata cache's memory tier.
    pub async fn warm_cache(&self) {
        self.cache.load_all().await;
    }
}
