//! Dependency analysis: build the DAG from edges, detect cycles (spec §4.8
//! step 3).

use std::collections::{HashMap, HashSet};

use super::Graph;
use crate::error::{GraphError, GraphResult};
use crate::node::slot::SlotRole;

/// For each node, the set of nodes it directly depends on (edges whose
/// sink slot has [`SlotRole::Dependency`]; pure-data edges don't order
/// waves).
pub struct DependencyGraph {
    pub(crate) deps: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Direct predecessors of `node`.
    #[must_use]
    pub fn predecessors(&self, node: &str) -> &[String] {
        self.deps.get(node).map_or(&[], Vec::as_slice)
    }

    /// Full transitive dependency set of `node`.
    #[must_use]
    pub fn transitive_dependencies(&self, node: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack: Vec<String> = self.predecessors(node).to_vec();
        while let Some(current) = stack.pop() {
            if seen.insert(current.clone()) {
                stack.extend(self.predecessors(&current).iter().cloned());
            }
        }
        seen
    }
}

/// Build the dependency graph and fail with `InvalidGraph` on a cycle.
pub fn analyze(graph: &Graph) -> GraphResult<DependencyGraph> {
    let mut deps: HashMap<String, Vec<String>> = graph.node_names().map(|n| (n.to_string(), Vec::new())).collect();

    for edge in graph.edges() {
        let Some(sink_node) = graph.node(&edge.sink.node) else { continue };
        let Some(schema) = sink_node.node_type.input_schema.get(edge.sink.slot) else { continue };
        if schema.role == SlotRole::Dependency {
            deps.entry(edge.sink.node.clone()).or_default().push(edge.source.node.clone());
        }
    }

    detect_cycle(&deps)?;
    Ok(DependencyGraph { deps })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn detect_cycle(deps: &HashMap<String, Vec<String>>) -> GraphResult<()> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut path = Vec::new();

    for start in deps.keys() {
        if !marks.contains_key(start.as_str()) {
            visit(start, deps, &mut marks, &mut path)?;
        }
    }
    Ok(())
}

fn visit<'a>(
    node: &'a str,
    deps: &'a HashMap<String, Vec<String>>,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
) -> GraphResult<()> {
    marks.insert(node, Mark::Visiting);
    path.push(node);

    if let Some(predecessors) = deps.get(node) {
        for predecessor in predecessors {
            match marks.get(predecessor.as_str()) {
                Some(Mark::Visiting) => {
                    return Err(GraphError::InvalidGraph(format!("cycle detected through {predecessor}")));
                }
                Some(Mark::Done) => {}
                None => visit(predecessor, deps, marks, path)?,
            }
        }
    }

    path.pop();
    marks.insert(node, Mark::Done);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn acyclic_graph_passes() {
        let mut deps = HashMap::new();
        deps.insert("b".to_string(), vec!["a".to_string()]);
        deps.insert("a".to_string(), vec![]);
        assert!(detect_cycle(&deps).is_ok());
    }

    #[test]
    fn self_cycle_is_detected() {
        let mut deps = HashMap::new();
        deps.insert("a".to_string(), vec!["a".to_string()]);
        assert!(detect_cycle(&deps).is_err());
    }

    #[test]
    fn two_node_cycle_is_detected() {
        let mut deps = HashMap::new();
        deps.insert("a".to_string(), vec!["b".to_string()]);
        deps.insert("b".to_string(), vec!["a".to_string()]);
        assert!(detect_cycle(&deps).is_err());
    }
}
