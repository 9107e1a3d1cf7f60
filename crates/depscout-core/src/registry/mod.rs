//! Registry access: wire types, remote transport, and the cache-first
//! adapter the resolver talks to.

mod adapter;
mod transport;
mod types;

pub use adapter::RegistryAdapter;
pub use transport::{
    AdvisoryTransport, HttpAdvisories, HttpOptions, HttpRegistry, RegistryAuth, RegistryTransport,
    TransportError,
};
pub use types::{PackageInfo, RegistryDocument, VersionMap, VersionRecord};
