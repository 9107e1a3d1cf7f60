//! Resolver state: the resolved assignment, the FIFO of pending
//! dependencies, and accumulated constraints.

use std::collections::{HashMap, VecDeque};

use indexmap::{IndexMap, IndexSet};
use lazy_static::lazy_static;
use regex::Regex;

use depscout_semver::Version;

use super::config::DependencyType;

/// Sentinel range marking a known-unsatisfiable constraint.
pub const INVALID_RANGE: &str = "INVALID";

lazy_static! {
    /// A bare concrete version with no operators or wildcards.
    static ref BARE_CONCRETE_RE: Regex = Regex::new(r"^\d+(\.\d+){0,2}$").unwrap();
}

/// Whether a range string is a bare concrete version like `1.2.3`.
pub fn is_bare_concrete(range: &str) -> bool {
    BARE_CONCRETE_RE.is_match(range)
}

/// Normalize a dependency range: a bare concrete version becomes its caret
/// range; anything already carrying an operator or wildcard is kept
/// verbatim. Idempotent.
pub fn normalize(range: &str) -> String {
    let trimmed = range.trim();
    if is_bare_concrete(trimmed) {
        format!("^{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// A range requirement on a package, annotated with who imposed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub range: String,
    pub required_by: String,
    pub required_by_version: Option<Version>,
}

impl Constraint {
    pub fn new(range: impl Into<String>, required_by: impl Into<String>, required_by_version: Option<Version>) -> Self {
        Constraint {
            range: range.into(),
            required_by: required_by.into(),
            required_by_version,
        }
    }

    /// The sentinel constraint injected when resolution fails.
    pub fn invalid(required_by: impl Into<String>, required_by_version: Version) -> Self {
        Constraint {
            range: INVALID_RANGE.to_string(),
            required_by: required_by.into(),
            required_by_version: Some(required_by_version),
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.range == INVALID_RANGE
    }

    /// Human-readable form for diagnostics.
    pub fn describe(&self) -> String {
        match &self.required_by_version {
            Some(version) => format!("{} (required by {}@{})", self.range, self.required_by, version),
            None => format!("{} (required by {})", self.range, self.required_by),
        }
    }
}

/// A dependency queued for future resolution. FIFO order defines the
/// search's decision order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDependency {
    pub name: String,
    pub range: String,
    pub required_by: Option<String>,
}

/// One point in the search space.
///
/// Invariant: a name in `resolved` never also appears in `pending`.
#[derive(Debug, Clone, Default)]
pub struct ResolverState {
    pub resolved: IndexMap<String, Version>,
    pub pending: VecDeque<PendingDependency>,
    pub constraints: IndexMap<String, Vec<Constraint>>,
    /// Distance of each package from the roots, set when it is enqueued.
    pub depths: HashMap<String, u32>,
    /// Dependencies recorded but not enqueued because their parent sat at
    /// the depth limit. Never treated as resolved.
    pub depth_overflow: IndexSet<String>,
}

impl ResolverState {
    /// Initial state for a set of root requirements. Root ranges are
    /// normalized; with `init_versions` each root's range is also recorded
    /// as a constraint on that package.
    pub fn seed(roots: &IndexMap<String, String>, init_versions: bool) -> Self {
        let mut state = ResolverState::default();
        for (name, range) in roots {
            let normalized = normalize(range);
            state.pending.push_back(PendingDependency {
                name: name.clone(),
                range: normalized.clone(),
                required_by: None,
            });
            state.depths.insert(name.clone(), 0);
            if init_versions {
                state
                    .constraints
                    .entry(name.clone())
                    .or_default()
                    .push(Constraint::new(normalized, "root", None));
            }
        }
        state
    }

    /// A state is terminal when nothing is pending or a constraint is
    /// known-unsatisfiable.
    pub fn is_terminal(&self) -> bool {
        self.pending.is_empty() || self.violates_constraints()
    }

    pub fn violates_constraints(&self) -> bool {
        self.constraints
            .values()
            .any(|constraints| constraints.iter().any(Constraint::is_invalid))
    }

    /// Resolve the head of `pending` to `version` and fold in that
    /// version's dependency map.
    ///
    /// Constraint accumulation only happens for peer dependencies; for
    /// other types the first resolution wins and conflicts cannot arise.
    pub fn apply(
        &mut self,
        name: &str,
        version: Version,
        deps: &IndexMap<String, String>,
        dep_type: DependencyType,
        max_depth: u32,
    ) {
        self.resolved.insert(name.to_string(), version);

        let head = self.pending.pop_front();
        debug_assert!(head.map_or(true, |h| h.name == name), "pending head mismatch");

        let depth = self.depths.get(name).copied().unwrap_or(0);
        if depth >= max_depth {
            // The depth limit is reached: record the unfetched dependencies
            // so the graph can still show them, and stop descending.
            for dep_name in deps.keys() {
                if !self.resolved.contains_key(dep_name)
                    && !self.pending.iter().any(|p| &p.name == dep_name)
                {
                    self.depth_overflow.insert(dep_name.clone());
                }
            }
            return;
        }

        for (dep_name, dep_range_raw) in deps {
            let dep_range = normalize(dep_range_raw);

            let already_pending = self.pending.iter().any(|p| &p.name == dep_name);
            if !self.resolved.contains_key(dep_name) && !already_pending {
                self.pending.push_back(PendingDependency {
                    name: dep_name.clone(),
                    range: dep_range.clone(),
                    required_by: Some(name.to_string()),
                });
                self.depths.insert(dep_name.clone(), depth + 1);
            }

            if dep_type == DependencyType::Peer {
                match self.resolved.get(dep_name) {
                    None => {
                        self.constraints.entry(dep_name.clone()).or_default().push(
                            Constraint::new(dep_range, name, Some(version)),
                        );
                    }
                    Some(resolved_version) => {
                        if !depscout_semver::satisfies(&dep_range, &resolved_version.to_string()) {
                            log::debug!(
                                "peer conflict: {}@{} requires {} {}, but {} is resolved to {}",
                                name, version, dep_name, dep_range, dep_name, resolved_version
                            );
                            self.constraints.insert(
                                dep_name.clone(),
                                vec![Constraint::invalid(name, version)],
                            );
                        }
                    }
                }
            }
        }
    }
}
