use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use studio_core::workflow::GraphEdge;

/// Node box and spacing constants, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub node_width: f64,
    pub node_height: f64,
    pub h_gap: f64,
    pub v_gap: f64,
    pub top_padding: f64,
}

impl Layout {
    pub const DEFAULT: Layout = Layout {
        node_width: 260.0,
        node_height: 120.0,
        h_gap: 120.0,
        v_gap: 24.0,
        top_padding: 120.0,
    };

    pub fn x_for_layer(&self, layer: usize) -> f64 {
        layer as f64 * (self.node_width + self.h_gap)
    }

    pub fn y_for_index(&self, index: usize) -> f64 {
        self.top_padding + index as f64 * (self.node_height + self.v_gap)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Longest-path layer of every node.
///
/// Edges with an endpoint outside `node_ids` are ignored. Nodes that never
/// reach indegree zero (cycle members and their descendants) stay on layer 0.
pub fn compute_layers(node_ids: &[String], edges: &[GraphEdge]) -> HashMap<String, usize> {
    let ids = dedup(node_ids);
    let mut adjacency: HashMap<&str, Vec<&str>> = ids.iter().map(|id| (*id, Vec::new())).collect();
    let mut indegree: HashMap<&str, usize> = ids.iter().map(|id| (*id, 0)).collect();

    for edge in edges {
        let (from, to) = (edge.from_node.as_str(), edge.to_node.as_str());
        if !indegree.contains_key(to) {
            continue;
        }
        if let Some(next) = adjacency.get_mut(from) {
            next.push(to);
            *indegree.entry(to).or_default() += 1;
        }
    }

    let mut layer: HashMap<&str, usize> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    for &id in &ids {
        if indegree[id] == 0 {
            queue.push_back(id);
            layer.insert(id, 0);
        }
    }

    while let Some(current) = queue.pop_front() {
        let current_layer = layer.get(current).copied().unwrap_or(0);
        for &next in &adjacency[current] {
            let entry = layer.entry(next).or_insert(0);
            *entry = (*entry).max(current_layer + 1);
            if let Some(deg) = indegree.get_mut(next) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    ids.iter()
        .map(|id| (id.to_string(), layer.get(id).copied().unwrap_or(0)))
        .collect()
}

/// Position every node with the default [`Layout`].
pub fn compute_dag_positions(node_ids: &[String], edges: &[GraphEdge]) -> HashMap<String, Position> {
    compute_positions_with(node_ids, edges, &Layout::DEFAULT)
}

/// Layer index maps to x, order of first appearance in `node_ids` within a
/// layer maps to y.
pub fn compute_positions_with(
    node_ids: &[String],
    edges: &[GraphEdge],
    layout: &Layout,
) -> HashMap<String, Position> {
    let layers = compute_layers(node_ids, edges);
    let mut next_slot: HashMap<usize, usize> = HashMap::new();
    let mut positions = HashMap::with_capacity(layers.len());

    for id in dedup(node_ids) {
        let l = layers.get(id).copied().unwrap_or(0);
        let slot = next_slot.entry(l).or_insert(0);
        positions.insert(
            id.to_string(),
            Position {
                x: layout.x_for_layer(l),
                y: layout.y_for_index(*slot),
            },
        );
        *slot += 1;
    }

    positions
}

fn dedup(node_ids: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    node_ids
        .iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn chain_layers() {
        let layers = compute_layers(
            &ids(&["A", "B", "C"]),
            &[GraphEdge::new("A", "B"), GraphEdge::new("B", "C")],
        );
        assert_eq!(layers["A"], 0);
        assert_eq!(layers["B"], 1);
        assert_eq!(layers["C"], 2);
    }

    #[test]
    fn chain_positions() {
        let pos = compute_dag_positions(
            &ids(&["A", "B", "C"]),
            &[GraphEdge::new("A", "B"), GraphEdge::new("B", "C")],
        );
        assert!(pos["A"].x < pos["B"].x);
        assert!(pos["B"].x < pos["C"].x);
        assert_eq!(pos["A"].x, 0.0);
        assert_eq!(pos["B"].x, 380.0);
        assert_eq!(pos["A"].y, 120.0);
    }

    #[test]
    fn longest_path_wins() {
        // A -> B -> D and A -> D: D sits after B, not next to it.
        let layers = compute_layers(
            &ids(&["A", "B", "D"]),
            &[
                GraphEdge::new("A", "D"),
                GraphEdge::new("A", "B"),
                GraphEdge::new("B", "D"),
            ],
        );
        assert_eq!(layers["D"], 2);
    }

    #[test]
    fn siblings_stack_in_input_order() {
        let pos = compute_dag_positions(
            &ids(&["root", "left", "right"]),
            &[GraphEdge::new("root", "right"), GraphEdge::new("root", "left")],
        );
        assert_eq!(pos["left"].x, pos["right"].x);
        assert_eq!(pos["left"].y, 120.0);
        assert_eq!(pos["right"].y, 120.0 + 144.0);
    }

    #[test]
    fn cycle_defaults_to_layer_zero() {
        let layers = compute_layers(
            &ids(&["A", "B"]),
            &[GraphEdge::new("A", "B"), GraphEdge::new("B", "A")],
        );
        assert_eq!(layers["A"], 0);
        assert_eq!(layers["B"], 0);

        let pos = compute_dag_positions(
            &ids(&["A", "B"]),
            &[GraphEdge::new("A", "B"), GraphEdge::new("B", "A")],
        );
        assert_ne!(pos["A"].y, pos["B"].y);
    }

    #[test]
    fn dangling_edges_are_ignored() {
        let layers = compute_layers(
            &ids(&["A", "B"]),
            &[GraphEdge::new("A", "ghost"), GraphEdge::new("ghost", "B")],
        );
        assert_eq!(layers["A"], 0);
        assert_eq!(layers["B"], 0);
    }

    #[test]
    fn duplicate_ids_collapse() {
        let pos = compute_dag_positions(&ids(&["A", "A", "B"]), &[]);
        assert_eq!(pos.len(), 2);
        assert_eq!(pos["B"].y, 120.0 + 144.0);
    }

    #[test]
    fn empty_input() {
        assert!(compute_dag_positions(&[], &[]).is_empty());
    }

    #[test]
    fn custom_layout() {
        let layout = Layout {
            node_width: 100.0,
            node_height: 50.0,
            h_gap: 10.0,
            v_gap: 5.0,
            top_padding: 0.0,
        };
        let pos = compute_positions_with(&ids(&["A", "B"]), &[GraphEdge::new("A", "B")], &layout);
        assert_eq!(pos["B"].x, 110.0);
        assert_eq!(pos["A"].y, 0.0);
    }
}
