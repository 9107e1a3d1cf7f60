//! Registry wire types and the resolved package record

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use depscout_semver::Version;

use crate::resolver::DependencyType;

/// One version record inside a registry document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: IndexMap<String, String>,
    #[serde(default, rename = "peerDependencies")]
    pub peer_dependencies: IndexMap<String, String>,
}

/// The registry payload for one package: a map of version → record.
/// This is the metadata cache's value type.
pub type VersionMap = IndexMap<String, VersionRecord>;

/// The registry's native document for a package.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub versions: VersionMap,
}

/// A package pinned to one concrete version, with its dependency maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: Version,
    pub dependencies: IndexMap<String, String>,
    pub dev_dependencies: IndexMap<String, String>,
    pub peer_dependencies: IndexMap<String, String>,
}

impl PackageInfo {
    pub fn from_record(name: &str, version: Version, record: &VersionRecord) -> Self {
        PackageInfo {
            name: name.to_string(),
            version,
            dependencies: record.dependencies.clone(),
            dev_dependencies: record.dev_dependencies.clone(),
            peer_dependencies: record.peer_dependencies.clone(),
        }
    }

    /// The dependency map for the given dependency type.
    pub fn deps_for(&self, dep_type: DependencyType) -> &IndexMap<String, String> {
        match dep_type {
            DependencyType::Runtime => &self.dependencies,
            DependencyType::Dev => &self.dev_dependencies,
            DependencyType::Peer => &self.peer_dependencies,
        }
    }
}
