//! Target graph construction and focusing.

use crate::error::{EngineError, Result};
use crate::target::TargetSpec;
use regex::Regex;
use restamp_graph::{DAG, GraphError, NodeId};
use std::collections::HashMap;
use tracing::debug;

/// All declared targets with their dependency edges resolved.
#[derive(Debug, Clone)]
pub struct TargetGraph {
    dag: DAG<TargetSpec>,
    by_name: HashMap<String, NodeId>,
}

impl TargetGraph {
    /// Resolve dependency names into edges.
    ///
    /// Dependencies naming unknown targets are dropped.
    ///
    /// # Errors
    ///
    /// - `EngineError::DuplicateTarget` if a name occurs twice
    /// - `EngineError::CyclicGraph` if the dependencies form a cycle
    pub fn build(specs: impl IntoIterator<Item = TargetSpec>) -> Result<Self> {
        let mut dag = DAG::new();
        let mut by_name = HashMap::new();

        for spec in specs {
            if by_name.contains_key(&spec.name) {
                return Err(EngineError::DuplicateTarget(spec.name));
            }
            let name = spec.name.clone();
            let id = dag.add_node(spec);
            let _ = by_name.insert(name, id);
        }

        let ids: Vec<NodeId> = dag.node_ids().collect();
        for id in ids {
            let deps = dag.node(id)?.deps.clone();
            for dep in deps {
                let Some(&dep_id) = by_name.get(&dep) else {
                    debug!("dropping unknown dependency {} of {}", dep, dag.node(id)?.name);
                    continue;
                };

                match dag.add_edge(dep_id, id, ()) {
                    Ok(_) => {}
                    Err(GraphError::WouldCycle { from, to, path }) => {
                        let name = |node: NodeId| dag.node(node).map(|spec| spec.name.clone());
                        let mut cycle = path
                            .into_iter()
                            .map(name)
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        cycle.push(name(to)?);
                        return Err(EngineError::CyclicGraph {
                            from: name(from)?,
                            to: name(to)?,
                            cycle,
                        });
                    }
                    Err(other) => return Err(other.into()),
                }
            }
        }

        Ok(Self { dag, by_name })
    }

    /// Number of targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dag.node_count()
    }

    /// Whether no targets were declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dag.node_count() == 0
    }

    /// Look up a target by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TargetSpec> {
        self.by_name.get(name).and_then(|id| self.dag.node(*id).ok())
    }

    /// Targets in declaration order.
    pub fn specs(&self) -> impl Iterator<Item = &TargetSpec> {
        self.dag.node_ids().filter_map(|id| self.dag.node(id).ok())
    }

    /// Names of the resolved dependencies of `name`.
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.neighbours(name, |dag, id| dag.dependencies(id))
    }

    /// Names of the targets that depend on `name`.
    #[must_use]
    pub fn consumers_of(&self, name: &str) -> Vec<&str> {
        self.neighbours(name, |dag, id| dag.dependents(id))
    }

    fn neighbours<'a>(
        &'a self,
        name: &str,
        edges: impl Fn(&'a DAG<TargetSpec>, NodeId) -> restamp_graph::GraphResult<&'a [NodeId]>,
    ) -> Vec<&'a str> {
        let Some(&id) = self.by_name.get(name) else {
            return Vec::new();
        };
        edges(&self.dag, id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|n| self.dag.node(*n).ok())
                    .map(|spec| spec.name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Narrow the graph to the targets matching any pattern plus everything
    /// they transitively depend on.
    ///
    /// Each pattern must match the whole name. With no patterns the plan holds
    /// every target.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidPattern` if a pattern is not a valid regex.
    pub fn focus<S: AsRef<str>>(&self, patterns: &[S]) -> Result<ExecutionPlan> {
        let seeds: Vec<NodeId> = if patterns.is_empty() {
            self.dag.node_ids().collect()
        } else {
            let alternatives: Vec<String> = patterns
                .iter()
                .map(|p| format!("^(?:{})$", p.as_ref()))
                .collect();
            let regex = Regex::new(&alternatives.join("|"))?;
            self.dag
                .node_ids()
                .filter(|id| {
                    self.dag
                        .node(*id)
                        .is_ok_and(|spec| regex.is_match(&spec.name))
                })
                .collect()
        };

        let members = self.dag.closure(seeds.iter().copied());
        let order: Vec<NodeId> = self
            .dag
            .topological_sort()?
            .into_iter()
            .filter(|id| members.contains(id))
            .collect();
        let index: HashMap<NodeId, usize> = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut nodes = Vec::with_capacity(order.len());
        for id in &order {
            let in_plan = |ids: &[NodeId]| -> Vec<usize> {
                ids.iter().filter_map(|n| index.get(n).copied()).collect()
            };
            nodes.push(PlanNode {
                spec: self.dag.node(*id)?.clone(),
                deps: in_plan(self.dag.dependencies(*id)?),
                consumers: in_plan(self.dag.dependents(*id)?),
            });
        }

        let mut focus: Vec<usize> = seeds.iter().filter_map(|id| index.get(id).copied()).collect();
        focus.sort_unstable();

        debug!("plan holds {} of {} targets", nodes.len(), self.len());
        Ok(ExecutionPlan { nodes, focus })
    }
}

/// One target inside an [`ExecutionPlan`].
#[derive(Debug, Clone)]
pub struct PlanNode {
    /// The target
    pub spec: TargetSpec,
    /// Plan indices of its dependencies, in declaration order
    pub deps: Vec<usize>,
    /// Plan indices of the targets depending on it
    pub consumers: Vec<usize>,
}

/// Topologically ordered set of targets to evaluate in one run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    nodes: Vec<PlanNode>,
    focus: Vec<usize>,
}

impl ExecutionPlan {
    /// Plan nodes, dependencies before consumers.
    #[must_use]
    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    /// Indices of the targets that matched the focus patterns.
    #[must_use]
    pub fn focus(&self) -> &[usize] {
        &self.focus
    }

    /// Number of targets in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the plan is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Plan index of a target.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.spec.name == name)
    }

    /// Target names in plan order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.spec.name.as_str())
    }

    /// Dependency names of a plan node.
    #[must_use]
    pub fn dependency_names(&self, index: usize) -> Vec<&str> {
        self.nodes
            .get(index)
            .map(|node| {
                node.deps
                    .iter()
                    .map(|d| self.nodes[*d].spec.name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Command;

    fn spec(name: &str, deps: &[&str]) -> TargetSpec {
        TargetSpec::new(name, Command::Noop, ".").with_deps(deps.iter().copied())
    }

    #[test]
    fn test_consumers_are_inverse_of_dependencies() {
        let graph = TargetGraph::build(vec![
            spec("a", &[]),
            spec("b", &["a"]),
            spec("c", &["a", "b"]),
        ])
        .unwrap();

        assert_eq!(graph.dependencies_of("c"), vec!["a", "b"]);
        assert_eq!(graph.consumers_of("a"), vec!["b", "c"]);
        assert_eq!(graph.consumers_of("c"), Vec::<&str>::new());
    }

    #[test]
    fn test_unknown_dependency_dropped() {
        let graph = TargetGraph::build(vec![spec("a", &["ghost"])]).unwrap();
        assert!(graph.dependencies_of("a").is_empty());
        // Declared deps stay untouched on the TargetSpec itself
        assert_eq!(graph.get("a").unwrap().deps, vec!["ghost"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = TargetGraph::build(vec![spec("a", &[]), spec("a", &[])]).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateTarget(name) if name == "a"));
    }

    #[test]
    fn test_cycle_reports_path() {
        let err = TargetGraph::build(vec![
            spec("a", &["c"]),
            spec("b", &["a"]),
            spec("c", &["b"]),
        ])
        .unwrap_err();

        match err {
            EngineError::CyclicGraph { from, to, cycle } => {
                assert_eq!(cycle.first(), cycle.last());
                assert!(cycle.contains(&from));
                assert!(cycle.contains(&to));
                assert_eq!(cycle.len(), 4);
            }
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn test_focus_pulls_in_dependencies() {
        let graph = TargetGraph::build(vec![
            spec("build-a", &[]),
            spec("build-b", &["build-a"]),
            spec("test-b", &["build-b"]),
            spec("lint-b", &[]),
        ])
        .unwrap();

        let plan = graph.focus(&["test-.*"]).unwrap();
        assert_eq!(plan.names().collect::<Vec<_>>(), vec!["build-a", "build-b", "test-b"]);
        assert_eq!(plan.focus(), &[2]);
        assert_eq!(plan.nodes()[2].deps, vec![1]);
        assert_eq!(plan.nodes()[0].consumers, vec![1]);
    }

    #[test]
    fn test_focus_matches_whole_name() {
        let graph = TargetGraph::build(vec![spec("build-a", &[]), spec("rebuild-a", &[])]).unwrap();
        let plan = graph.focus(&["build-a"]).unwrap();
        assert_eq!(plan.names().collect::<Vec<_>>(), vec!["build-a"]);

        let plan = graph.focus(&["build-a", "rebuild-.*"]).unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_empty_focus_is_whole_graph() {
        let graph = TargetGraph::build(vec![spec("b", &["a"]), spec("a", &[])]).unwrap();
        let plan = graph.focus::<&str>(&[]).unwrap();
        assert_eq!(plan.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(plan.dependency_names(1), vec!["a"]);
    }

    #[test]
    fn test_invalid_pattern() {
        let graph = TargetGraph::build(vec![spec("a", &[])]).unwrap();
        assert!(matches!(graph.focus(&["("]), Err(EngineError::InvalidPattern(_))));
    }
}
