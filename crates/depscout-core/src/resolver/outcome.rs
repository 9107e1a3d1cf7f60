//! Resolution outcomes and failure diagnostics

use indexmap::{IndexMap, IndexSet};

use depscout_semver::Version;

/// A concrete version assignment: package name → resolved version.
pub type Assignment = IndexMap<String, Version>;

/// What a failed (or partially failed) resolution can tell the caller.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// One-line summary of why resolution failed.
    pub headline: String,
    /// The last attempts recorded during search, most recent last.
    pub attempts: Vec<String>,
    /// Summary of the terminal nodes the extraction considered.
    pub terminal_summary: String,
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.headline)?;
        for attempt in &self.attempts {
            writeln!(f, "  - {}", attempt)?;
        }
        write!(f, "{}", self.terminal_summary)
    }
}

/// Result of a resolve call. The resolver never aborts the process; every
/// ending is one of these.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(Assignment),
    PartialFailure(Assignment, Diagnostics),
    Failure(Diagnostics),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The assignment, complete or partial, if one exists.
    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            Outcome::Success(assignment) => Some(assignment),
            Outcome::PartialFailure(assignment, _) => Some(assignment),
            Outcome::Failure(_) => None,
        }
    }

    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Outcome::Success(_) => None,
            Outcome::PartialFailure(_, diagnostics) => Some(diagnostics),
            Outcome::Failure(diagnostics) => Some(diagnostics),
        }
    }
}

/// Outcome plus search bookkeeping callers may want: the packages whose
/// dependencies were left unfetched at `max_depth`, and tree statistics.
#[derive(Debug, Clone)]
pub struct ResolveReport {
    pub outcome: Outcome,
    /// Dependency names recorded but not fetched because their parent sat
    /// at `max_depth`. Feed to `build_dependency_graph`.
    pub depth_overflow: IndexSet<String>,
    pub iterations: u32,
    pub tree_nodes: usize,
    pub terminal_nodes: usize,
}
