//! Resolver configuration

use crate::advisory::VulnerabilityThreshold;

/// Which dependency map of a package the resolver follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyType {
    #[default]
    Runtime,
    Dev,
    Peer,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::Runtime => "runtime",
            DependencyType::Dev => "dev",
            DependencyType::Peer => "peer",
        }
    }

    pub fn parse(input: &str) -> Option<DependencyType> {
        match input.to_ascii_lowercase().as_str() {
            "runtime" | "prod" | "dependencies" => Some(DependencyType::Runtime),
            "dev" | "devdependencies" => Some(DependencyType::Dev),
            "peer" | "peerdependencies" => Some(DependencyType::Peer),
            _ => None,
        }
    }
}

impl std::fmt::Display for DependencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Search parameters. `Default` gives the documented defaults.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// MCTS iterations per resolve call.
    pub max_iterations: u32,
    /// Maximum steps in one rollout.
    pub max_simulation_depth: u32,
    /// Candidate versions considered per pending dependency.
    pub max_compare_versions: usize,
    /// Dependency levels fetched below the roots.
    pub max_depth: u32,
    /// Softmax sharpness for rollout sampling; larger favors newer versions.
    pub lambda: f64,
    /// Record the roots' own (normalized) ranges as constraints.
    pub init_versions: bool,
    pub dependency_type: DependencyType,
    /// When set, candidate versions must pass this vulnerability threshold.
    pub threshold: Option<VulnerabilityThreshold>,
    /// Fixed RNG seed for reproducible searches.
    pub seed: Option<u64>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            max_iterations: 1000,
            max_simulation_depth: 100,
            max_compare_versions: 20,
            max_depth: 5,
            lambda: 2.0,
            init_versions: false,
            dependency_type: DependencyType::Runtime,
            threshold: None,
            seed: None,
        }
    }
}
