//! The resolve loop: Select → Expand → Simulate → Backpropagate, then
//! solution extraction with a best-simulation fallback.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use indexmap::{IndexMap, IndexSet};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;

use depscout_semver::{Range, Version};

use crate::advisory::AdvisoryAdapter;
use crate::error::{Error, Result};
use crate::registry::RegistryAdapter;

use super::config::{DependencyType, ResolverConfig};
use super::outcome::{Assignment, Diagnostics, Outcome, ResolveReport};
use super::sampler::sample_index;
use super::state::{PendingDependency, ResolverState};
use super::tree::{SearchTree, ROOT};

/// UCB1 exploration constant.
const EXPLORATION: f64 = std::f64::consts::SQRT_2;

/// How many diagnostic attempts are retained for failure reports.
const MAX_DIAGNOSTICS: usize = 10;

/// Bounded ring of diagnostic messages; keeps the most recent entries.
struct DiagRing {
    entries: VecDeque<String>,
}

impl DiagRing {
    fn new() -> Self {
        DiagRing {
            entries: VecDeque::with_capacity(MAX_DIAGNOSTICS),
        }
    }

    fn push(&mut self, message: String) {
        log::debug!("{}", message);
        if self.entries.len() == MAX_DIAGNOSTICS {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

/// Constraint- and vulnerability-aware MCTS dependency resolver.
///
/// Single-threaded and cooperative: the search suspends only at remote
/// fetches, so the tree is never concurrently mutated.
pub struct Resolver {
    registry: Arc<RegistryAdapter>,
    advisories: Arc<AdvisoryAdapter>,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(
        registry: Arc<RegistryAdapter>,
        advisories: Arc<AdvisoryAdapter>,
        config: ResolverConfig,
    ) -> Self {
        Resolver {
            registry,
            advisories,
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve root requirements to a concrete assignment.
    pub async fn resolve(&self, roots: &IndexMap<String, String>) -> Outcome {
        self.resolve_report(roots, CancellationToken::new())
            .await
            .outcome
    }

    /// Resolve with cancellation and full search bookkeeping. The token is
    /// honored between iterations; on cancel the best complete rollout
    /// assignment is returned if one exists.
    pub async fn resolve_report(
        &self,
        roots: &IndexMap<String, String>,
        cancel: CancellationToken,
    ) -> ResolveReport {
        let start = Instant::now();
        let mut tree = SearchTree::new(ResolverState::seed(roots, self.config.init_versions));
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut diagnostics = DiagRing::new();
        let mut best_simulation: Option<(ResolverState, f64)> = None;
        let mut iterations = 0u32;
        let mut cancelled = false;

        for _ in 0..self.config.max_iterations {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let leaf = self.select(&tree);
            let node = self.expand(&mut tree, leaf, &mut diagnostics).await;
            let (reward, end_state) = self.simulate(&tree, node, &mut rng, &mut diagnostics).await;

            if reward > 0.0
                && best_simulation
                    .as_ref()
                    .map_or(true, |(_, best)| reward > *best)
            {
                best_simulation = Some((end_state, reward));
            }

            tree.backpropagate(node, reward);
            iterations += 1;

            // Nothing left to search once the root itself is terminal.
            if tree.is_terminal(ROOT) {
                break;
            }
        }

        log::info!(
            "MCTS finished in {:.3}s: {} iterations, {} nodes",
            start.elapsed().as_secs_f64(),
            iterations,
            tree.len()
        );

        self.extract(tree, best_simulation, diagnostics, iterations, cancelled)
    }

    /// Walk down from the root until a node that is terminal or still has
    /// untried candidates.
    fn select(&self, tree: &SearchTree) -> usize {
        let mut idx = ROOT;
        loop {
            if tree.is_terminal(idx) || !tree.is_fully_expanded(idx) {
                return idx;
            }
            match tree.best_child(idx, EXPLORATION) {
                Some(child) => idx = child,
                None => return idx,
            }
        }
    }

    /// Attach one new child for the head pending dependency, or mark the
    /// node a dead end when no candidate can make progress.
    async fn expand(&self, tree: &mut SearchTree, idx: usize, diagnostics: &mut DiagRing) -> usize {
        if tree.is_terminal(idx) {
            return idx;
        }

        let Some(pending) = tree.node(idx).state.pending.front().cloned() else {
            return idx;
        };

        if tree.node(idx).untried.is_none() {
            let state = tree.node(idx).state.clone();
            let candidates = self.candidate_versions(&state, &pending, diagnostics).await;
            if candidates.is_empty() {
                tree.node_mut(idx).dead_end = true;
                return idx;
            }
            tree.node_mut(idx).untried = Some(candidates);
        }

        // Take the next candidate in newest-first order, skipping any
        // decision already attached. An exhausted list means the node is
        // fully expanded; selection descends next iteration.
        let version = loop {
            let next = tree
                .node_mut(idx)
                .untried
                .as_mut()
                .filter(|untried| !untried.is_empty())
                .map(|untried| untried.remove(0));
            match next {
                Some(version)
                    if tree
                        .node(idx)
                        .expanded
                        .contains(&(pending.name.clone(), version)) => {}
                Some(version) => break version,
                None => return idx,
            }
        };

        let mut child_state = tree.node(idx).state.clone();
        match self.step(&mut child_state, &pending.name, version).await {
            Ok(()) => {
                tree.node_mut(idx)
                    .expanded
                    .insert((pending.name.clone(), version));
                tree.add_child(idx, child_state)
            }
            Err(err) => {
                diagnostics.push(format!(
                    "metadata unavailable for {}@{}: {}",
                    pending.name, version, err
                ));
                tree.node_mut(idx).dead_end = true;
                idx
            }
        }
    }

    /// Apply one resolution decision to a state.
    async fn step(&self, state: &mut ResolverState, name: &str, version: Version) -> Result<()> {
        let info = self
            .registry
            .package_at(name, &version)
            .await?
            .ok_or_else(|| Error::PackageNotFound {
                name: name.to_string(),
            })?;

        state.apply(
            name,
            version,
            info.deps_for(self.config.dependency_type),
            self.config.dependency_type,
            self.config.max_depth,
        );
        Ok(())
    }

    /// Candidate versions for a pending dependency, newest first:
    /// published versions satisfying the requested range (and, for peer
    /// resolution, every accumulated constraint), truncated, then filtered
    /// through the vulnerability threshold. Threshold probe failures
    /// fail open.
    async fn candidate_versions(
        &self,
        state: &ResolverState,
        pending: &PendingDependency,
        diagnostics: &mut DiagRing,
    ) -> Vec<Version> {
        let name = &pending.name;

        let available = match self.registry.available_versions(name).await {
            Ok(versions) => versions,
            Err(err) => {
                diagnostics.push(format!("could not list versions of {}: {}", name, err));
                return Vec::new();
            }
        };
        if available.is_empty() {
            diagnostics.push(format!("no published versions of {}", name));
            return Vec::new();
        }

        let range = match Range::parse(&pending.range) {
            Ok(range) => range,
            Err(err) => {
                diagnostics.push(format!("unparseable range for {}: {}", name, err));
                return Vec::new();
            }
        };
        let mut candidates: Vec<Version> = available
            .into_iter()
            .filter(|v| range.satisfies(v))
            .collect();

        if self.config.dependency_type == DependencyType::Peer {
            if let Some(constraints) = state.constraints.get(name) {
                let mut parsed = Vec::with_capacity(constraints.len());
                for constraint in constraints {
                    match Range::parse(&constraint.range) {
                        Ok(range) => parsed.push(range),
                        // The INVALID sentinel (or a malformed range)
                        // satisfies nothing.
                        Err(_) => {
                            diagnostics.push(format!(
                                "unsatisfiable constraint on {}: {}",
                                name,
                                constraint.describe()
                            ));
                            return Vec::new();
                        }
                    }
                }
                candidates.retain(|v| parsed.iter().all(|range| range.satisfies(v)));
            }
        }

        if candidates.is_empty() {
            let mut message = format!(
                "no candidate version of {} satisfies {}",
                name, pending.range
            );
            if let Some(constraints) = state.constraints.get(name) {
                if !constraints.is_empty() {
                    let described: Vec<String> =
                        constraints.iter().map(|c| c.describe()).collect();
                    message.push_str(&format!("; active constraints: {}", described.join(", ")));
                }
            }
            diagnostics.push(message);
            return Vec::new();
        }

        candidates.truncate(self.config.max_compare_versions);

        let Some(threshold) = &self.config.threshold else {
            return candidates;
        };

        let mut kept = Vec::with_capacity(candidates.len());
        for version in candidates {
            match self.advisories.vulnerabilities(name, &version).await {
                Ok(list) => {
                    if threshold.passes(&list) {
                        kept.push(version);
                    } else {
                        let counts = list.counts();
                        diagnostics.push(format!(
                            "{}@{} rejected by CVE filter (critical={}, high={}, medium={}, low={})",
                            name, version, counts.critical, counts.high, counts.medium, counts.low
                        ));
                    }
                }
                Err(err) => {
                    // fail open: a broken vulnerability probe never blocks
                    // resolution
                    log::warn!("vulnerability probe failed for {}@{}: {}", name, version, err);
                    kept.push(version);
                }
            }
        }

        if kept.is_empty() {
            diagnostics.push(format!(
                "all candidate versions of {} rejected by CVE filter",
                name
            ));
        }
        kept
    }

    /// Roll out from a node's state with softmax-over-rank sampling.
    /// Returns the rollout reward and the final state.
    async fn simulate(
        &self,
        tree: &SearchTree,
        idx: usize,
        rng: &mut StdRng,
        diagnostics: &mut DiagRing,
    ) -> (f64, ResolverState) {
        let mut state = tree.node(idx).state.clone();

        for _ in 0..self.config.max_simulation_depth {
            if state.is_terminal() {
                break;
            }
            let Some(pending) = state.pending.front().cloned() else {
                break;
            };

            let candidates = self.candidate_versions(&state, &pending, diagnostics).await;
            if candidates.is_empty() {
                return (0.0, state);
            }

            let pick = candidates[sample_index(candidates.len(), self.config.lambda, rng)];
            if self.step(&mut state, &pending.name, pick).await.is_err() {
                return (0.0, state);
            }
        }

        let reward = self.reward(&state).await;
        (reward, state)
    }

    /// Mean freshness of a complete assignment: each package scores
    /// `1 - rank/|versions|` with rank 0 for the newest version. Incomplete
    /// or constraint-violating states score zero; packages missing from
    /// the version list are skipped entirely.
    async fn reward(&self, state: &ResolverState) -> f64 {
        if state.violates_constraints() || !state.pending.is_empty() {
            return 0.0;
        }

        let mut total = 0.0;
        let mut counted = 0usize;
        for (name, version) in &state.resolved {
            let versions = match self.registry.available_versions(name).await {
                Ok(versions) => versions,
                Err(_) => continue,
            };
            let Some(rank) = versions.iter().position(|v| v == version) else {
                continue;
            };
            total += 1.0 - rank as f64 / versions.len() as f64;
            counted += 1;
        }

        if counted == 0 {
            0.0
        } else {
            total / counted as f64
        }
    }

    /// Pick the answer: best terminal node by mean reward, then the
    /// best-simulation fallback, then a failure report.
    fn extract(
        &self,
        tree: SearchTree,
        best_simulation: Option<(ResolverState, f64)>,
        diagnostics: DiagRing,
        iterations: u32,
        cancelled: bool,
    ) -> ResolveReport {
        let mut best_idx: Option<usize> = None;
        let mut best_mean = f64::NEG_INFINITY;
        let mut terminal_nodes = 0usize;

        for idx in 0..tree.len() {
            if !tree.is_terminal(idx) {
                continue;
            }
            terminal_nodes += 1;
            let node = tree.node(idx);
            if node.visits == 0 {
                continue;
            }
            let mean = node.reward_sum / node.visits as f64;
            // strict comparison: ties go to the first node encountered
            if mean > best_mean {
                best_mean = mean;
                best_idx = Some(idx);
            }
        }

        let report = |outcome: Outcome, overflow: IndexSet<String>| ResolveReport {
            outcome,
            depth_overflow: overflow,
            iterations,
            tree_nodes: tree.len(),
            terminal_nodes,
        };

        if cancelled {
            return match best_simulation {
                Some((state, _)) => {
                    log::info!("cancelled; returning best rollout assignment");
                    report(
                        Outcome::Success(state.resolved.clone()),
                        state.depth_overflow.clone(),
                    )
                }
                None => report(
                    Outcome::Failure(Diagnostics {
                        headline: "resolution cancelled before a complete assignment was found"
                            .to_string(),
                        attempts: diagnostics.to_vec(),
                        terminal_summary: format!(
                            "{} terminal nodes considered across {} tree nodes",
                            terminal_nodes,
                            tree.len()
                        ),
                    }),
                    IndexSet::new(),
                ),
            };
        }

        if let Some(idx) = best_idx {
            let state = &tree.node(idx).state;
            if state.pending.is_empty() && !state.violates_constraints() {
                return report(
                    Outcome::Success(state.resolved.clone()),
                    state.depth_overflow.clone(),
                );
            }
        }

        if let Some((state, reward)) = best_simulation {
            log::debug!(
                "best terminal node invalid; falling back to rollout assignment (reward {:.3})",
                reward
            );
            return report(
                Outcome::Success(state.resolved.clone()),
                state.depth_overflow.clone(),
            );
        }

        let partial: Option<Assignment> = best_idx
            .map(|idx| tree.node(idx).state.resolved.clone())
            .filter(|assignment| !assignment.is_empty());
        let overflow = best_idx
            .map(|idx| tree.node(idx).state.depth_overflow.clone())
            .unwrap_or_default();

        let failure = Diagnostics {
            headline: "no valid assignment satisfies the root requirements".to_string(),
            attempts: diagnostics.to_vec(),
            terminal_summary: format!(
                "{} terminal nodes considered across {} tree nodes",
                terminal_nodes,
                tree.len()
            ),
        };

        match partial {
            Some(assignment) => report(Outcome::PartialFailure(assignment, failure), overflow),
            None => report(Outcome::Failure(failure), overflow),
        }
    }
}
