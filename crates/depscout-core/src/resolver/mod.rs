//! The MCTS decision engine: state model, search tree, rollout sampling,
//! and the resolve loop.

mod config;
mod mcts;
mod outcome;
mod sampler;
mod state;
mod tree;

pub use config::{DependencyType, ResolverConfig};
pub use mcts::Resolver;
pub use outcome::{Assignment, Diagnostics, Outcome, ResolveReport};
pub use state::{
    is_bare_concrete, normalize, Constraint, PendingDependency, ResolverState, INVALID_RANGE,
};
