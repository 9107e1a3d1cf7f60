//! depscout core: constraint- and vulnerability-aware dependency
//! resolution with Monte Carlo Tree Search
//!
//! The crate is organized around three subsystems: a dual-tier cache in
//! front of the remote registry and vulnerability database, adapters that
//! normalize both remotes, and the MCTS resolver that searches the
//! assignment space. Version and range semantics live in
//! `depscout-semver`.

pub mod advisory;
pub mod cache;
pub mod error;
pub mod graph;
pub mod registry;
pub mod resolver;

pub use advisory::{
    AdvisoryAdapter, CveItem, Severity, SeverityCounts, VulnerabilityList, VulnerabilityThreshold,
};
pub use cache::{DurableStore, SqliteStore, StoreError, TieredCache};
pub use error::{Error, Result};
pub use graph::{build_dependency_graph, GraphEdge, GraphNode};
pub use registry::{
    AdvisoryTransport, HttpAdvisories, HttpOptions, HttpRegistry, PackageInfo, RegistryAdapter,
    RegistryAuth, RegistryTransport, TransportError,
};
pub use resolver::{
    Assignment, DependencyType, Diagnostics, Outcome, ResolveReport, Resolver, ResolverConfig,
};
