use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// One calculated metric as seen by the resolver: its identifier and every
/// identifier it reads. Reads that are not calculated metrics are leaves and
/// do not constrain the order.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyNode<'a> {
    pub id: &'a str,
    pub depends_on: Vec<&'a str>,
}

/// Result of ordering the calculated metrics. Positions index the input slice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Safe evaluation order.
    pub order: Vec<usize>,
    /// Metrics that can never be evaluated: members of a cycle or downstream of one.
    pub unresolved: Vec<usize>,
    /// Each strongly connected cycle, members sorted by position.
    pub cycles: Vec<Vec<usize>>,
}

/// Orders metrics so every metric comes after the calculated metrics it reads.
///
/// Kahn's algorithm with a min-heap on definition position: among the metrics
/// whose dependencies are all satisfied, the one defined first is taken next,
/// so runs are reproducible. Whatever cannot be taken when the heap drains is
/// unresolvable.
pub fn resolve(nodes: &[DependencyNode<'_>]) -> Resolution {
    let graph = build_graph(nodes);

    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    let mut done = vec![false; nodes.len()];

    while let Some(Reverse(pos)) = ready.pop() {
        order.push(pos);
        done[pos] = true;
        for dependent in graph.neighbors_directed(NodeIndex::new(pos), Direction::Outgoing) {
            let d = &mut in_degree[dependent.index()];
            *d -= 1;
            if *d == 0 {
                ready.push(Reverse(dependent.index()));
            }
        }
    }

    let unresolved: Vec<usize> = (0..nodes.len()).filter(|&i| !done[i]).collect();
    let cycles = if unresolved.is_empty() { Vec::new() } else { find_cycles(&graph) };

    Resolution { order, unresolved, cycles }
}

/// Edges point from a dependency to the metric that reads it. Node `i` is
/// `nodes[i]`. With duplicate identifiers the first definition receives edges.
fn build_graph(nodes: &[DependencyNode<'_>]) -> DiGraph<usize, ()> {
    let mut graph = DiGraph::with_capacity(nodes.len(), nodes.len() * 2);
    let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(nodes.len());
    for (pos, node) in nodes.iter().enumerate() {
        let ix = graph.add_node(pos);
        index.entry(node.id).or_insert(ix);
    }
    for (pos, node) in nodes.iter().enumerate() {
        for dep in &node.depends_on {
            if let Some(&from) = index.get(dep) {
                // update_edge keeps one edge per (dependency, dependent) pair.
                graph.update_edge(from, NodeIndex::new(pos), ());
            }
        }
    }
    graph
}

fn find_cycles(graph: &DiGraph<usize, ()>) -> Vec<Vec<usize>> {
    let mut cycles: Vec<Vec<usize>> = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut members: Vec<usize> = scc.into_iter().map(|n| graph[n]).collect();
            members.sort_unstable();
            members
        })
        .collect();
    cycles.sort();
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node<'a>(id: &'a str, deps: &[&'a str]) -> DependencyNode<'a> {
        DependencyNode { id, depends_on: deps.to_vec() }
    }

    #[test]
    fn test_sort_diamond_dependency() {
        // a <- b, a <- c, (b, c) <- d, defined out of order.
        let nodes = vec![
            node("d", &["b", "c"]),
            node("b", &["a", "input_x"]),
            node("c", &["a"]),
            node("a", &["input_y"]),
        ];
        let res = resolve(&nodes);
        assert!(res.unresolved.is_empty());
        assert_eq!(res.order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_independent_metrics_keep_definition_order() {
        let nodes = vec![node("x", &["in1"]), node("y", &[]), node("z", &["in2", "in1"])];
        assert_eq!(resolve(&nodes).order, vec![0, 1, 2]);
    }

    #[test]
    fn test_stable_tie_break_after_release() {
        // "late" becomes ready only after "base"; "early" was ready from the start
        // but is defined after "late", so it waits for its turn by position.
        let nodes = vec![node("base", &[]), node("late", &["base"]), node("early", &[])];
        assert_eq!(resolve(&nodes).order, vec![0, 1, 2]);
    }

    #[test]
    fn test_cycle_is_unresolved_not_fatal() {
        let nodes = vec![
            node("ok", &["input"]),
            node("a", &["b"]),
            node("b", &["a"]),
            node("after_cycle", &["a", "ok"]),
        ];
        let res = resolve(&nodes);
        assert_eq!(res.order, vec![0]);
        assert_eq!(res.unresolved, vec![1, 2, 3]);
        assert_eq!(res.cycles, vec![vec![1, 2]]);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let nodes = vec![node("loop", &["loop"]), node("fine", &[])];
        let res = resolve(&nodes);
        assert_eq!(res.order, vec![1]);
        assert_eq!(res.unresolved, vec![0]);
        assert_eq!(res.cycles, vec![vec![0]]);
    }

    #[test]
    fn test_repeated_dependency_counts_once() {
        let nodes = vec![node("a", &[]), node("sq", &["a", "a"])];
        let res = resolve(&nodes);
        assert_eq!(res.order, vec![0, 1]);
    }
}
