//! Dependency-graph projection for external visualization
//!
//! A pure function from resolved packages to displayable nodes and edges.
//! Dependency ranges collapse to a resolved version when one of the given
//! packages satisfies them; otherwise the raw range is kept and the target
//! becomes a placeholder node.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use depscout_semver::Range;

use crate::registry::PackageInfo;
use crate::resolver::{normalize, DependencyType};

#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub version: String,
    pub is_root: bool,
    pub dep_count: usize,
    pub is_found: bool,
    pub reached_max_depth: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

/// Project packages onto `(nodes, edges)`. Edges are directed
/// parent → child. `max_depth_overflow` marks dependency names whose
/// fetch was cut off at the resolver's depth limit; they appear as
/// placeholder nodes with `reached_max_depth` set and are never presented
/// as resolved.
pub fn build_dependency_graph(
    package_infos: &[PackageInfo],
    roots: &IndexMap<String, String>,
    max_depth_overflow: &IndexSet<String>,
    dependency_type: DependencyType,
) -> (Vec<GraphNode>, Vec<GraphEdge>) {
    let mut nodes: IndexMap<String, GraphNode> = IndexMap::new();
    let mut edges: Vec<GraphEdge> = Vec::new();

    for info in package_infos {
        let id = format!("{}@{}", info.name, info.version);
        nodes.insert(
            id,
            GraphNode {
                id: format!("{}@{}", info.name, info.version),
                label: info.name.clone(),
                version: info.version.to_string(),
                is_root: roots.contains_key(&info.name),
                dep_count: info.deps_for(dependency_type).len(),
                is_found: true,
                reached_max_depth: false,
            },
        );
    }

    for info in package_infos {
        let from = format!("{}@{}", info.name, info.version);

        for (dep_name, dep_range) in info.deps_for(dependency_type) {
            let to = match collapse(package_infos, dep_name, dep_range) {
                Some(version_id) => version_id,
                None => {
                    let placeholder_id = format!("{}@{}", dep_name, dep_range);
                    nodes.entry(placeholder_id.clone()).or_insert_with(|| GraphNode {
                        id: placeholder_id.clone(),
                        label: dep_name.clone(),
                        version: dep_range.clone(),
                        is_root: roots.contains_key(dep_name),
                        dep_count: 0,
                        is_found: false,
                        reached_max_depth: max_depth_overflow.contains(dep_name),
                    });
                    placeholder_id
                }
            };

            let edge = GraphEdge {
                from: from.clone(),
                to,
            };
            if !edges.contains(&edge) {
                edges.push(edge);
            }
        }
    }

    (nodes.into_values().collect(), edges)
}

/// Collapse `(name, range)` to the id of a known package version that
/// satisfies it, newest first.
fn collapse(package_infos: &[PackageInfo], name: &str, range: &str) -> Option<String> {
    let range = Range::parse(&normalize(range)).ok()?;

    package_infos
        .iter()
        .filter(|info| info.name == name && range.satisfies(&info.version))
        .max_by_key(|info| info.version)
        .map(|info| format!("{}@{}", info.name, info.version))
}

#[cfg(test)]
mod tests {
    use depscout_semver::Version;
    use indexmap::IndexMap;

    use super::*;

    fn info(name: &str, version: (u64, u64, u64), deps: &[(&str, &str)]) -> PackageInfo {
        PackageInfo {
            name: name.to_string(),
            version: Version::new(version.0, version.1, version.2),
            dependencies: deps
                .iter()
                .map(|(n, r)| (n.to_string(), r.to_string()))
                .collect(),
            dev_dependencies: IndexMap::new(),
            peer_dependencies: IndexMap::new(),
        }
    }

    fn roots(names: &[&str]) -> IndexMap<String, String> {
        names.iter().map(|n| (n.to_string(), "*".to_string())).collect()
    }

    #[test]
    fn test_nodes_and_collapsed_edges() {
        let infos = vec![
            info("app", (1, 0, 0), &[("lib", "^2.0.0")]),
            info("lib", (2, 3, 0), &[]),
        ];
        let (nodes, edges) =
            build_dependency_graph(&infos, &roots(&["app"]), &IndexSet::new(), DependencyType::Runtime);

        assert_eq!(nodes.len(), 2);
        let app = nodes.iter().find(|n| n.label == "app").unwrap();
        assert!(app.is_root);
        assert_eq!(app.dep_count, 1);
        assert!(app.is_found);

        // the range collapsed to the resolved version
        assert_eq!(edges, vec![GraphEdge { from: "app@1.0.0".into(), to: "lib@2.3.0".into() }]);
    }

    #[test]
    fn test_unresolved_dep_becomes_placeholder() {
        let infos = vec![info("app", (1, 0, 0), &[("ghost", "^9.0.0")])];
        let (nodes, edges) =
            build_dependency_graph(&infos, &roots(&["app"]), &IndexSet::new(), DependencyType::Runtime);

        assert_eq!(nodes.len(), 2);
        let ghost = nodes.iter().find(|n| n.label == "ghost").unwrap();
        assert!(!ghost.is_found);
        assert!(!ghost.reached_max_depth);
        // the raw range is kept when nothing collapses
        assert_eq!(ghost.version, "^9.0.0");
        assert_eq!(edges[0].to, "ghost@^9.0.0");
    }

    #[test]
    fn test_max_depth_placeholder_flagged() {
        let infos = vec![info("app", (1, 0, 0), &[("deep", "^1.0.0")])];
        let overflow: IndexSet<String> = ["deep".to_string()].into_iter().collect();
        let (nodes, _) =
            build_dependency_graph(&infos, &roots(&["app"]), &overflow, DependencyType::Runtime);

        let deep = nodes.iter().find(|n| n.label == "deep").unwrap();
        assert!(deep.reached_max_depth);
        assert!(!deep.is_found);
    }

    #[test]
    fn test_collapse_prefers_newest_satisfying() {
        let infos = vec![
            info("app", (1, 0, 0), &[("lib", "^2.0.0")]),
            info("lib", (2, 1, 0), &[]),
            info("lib", (2, 9, 0), &[]),
            info("lib", (3, 0, 0), &[]),
        ];
        let (_, edges) =
            build_dependency_graph(&infos, &roots(&["app"]), &IndexSet::new(), DependencyType::Runtime);
        assert_eq!(edges[0].to, "lib@2.9.0");
    }

    #[test]
    fn test_bare_concrete_range_collapses_via_caret() {
        // dependency maps may carry bare versions; they collapse like ^X.Y.Z
        let infos = vec![
            info("app", (1, 0, 0), &[("lib", "2.0.0")]),
            info("lib", (2, 4, 0), &[]),
        ];
        let (_, edges) =
            build_dependency_graph(&infos, &roots(&["app"]), &IndexSet::new(), DependencyType::Runtime);
        assert_eq!(edges[0].to, "lib@2.4.0");
    }

    #[test]
    fn test_duplicate_edges_dropped() {
        let infos = vec![
            info("a", (1, 0, 0), &[("shared", "^1.0.0")]),
            info("b", (1, 0, 0), &[("shared", "^1.0.0")]),
            info("shared", (1, 2, 0), &[]),
        ];
        let (_, edges) =
            build_dependency_graph(&infos, &roots(&["a", "b"]), &IndexSet::new(), DependencyType::Runtime);
        assert_eq!(edges.len(), 2);
    }
}
