use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use studio_core::workflow::{AgentDetail, WorkflowSpec};

use crate::dag::{Position, compute_dag_positions};

// ---------------------------------------------------------------------------
// Canvas types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowNodeKind {
    Agent,
    Processor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FlowNodeKind,
    pub position: Position,
    pub data: Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub entry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl FlowGraph {
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

// ---------------------------------------------------------------------------
// WorkflowSpec → canvas
// ---------------------------------------------------------------------------

/// Convert a workflow spec into canvas nodes and edges.
///
/// Agents come first in declaration order, followed by every other spec node.
/// Edges whose endpoints are not both present are dropped.
pub fn workflow_to_flow(spec: &WorkflowSpec) -> FlowGraph {
    let mut seen = HashSet::new();
    let mut ids: Vec<String> = Vec::new();
    for id in spec
        .agents
        .iter()
        .map(|a| a.name.as_str())
        .chain(spec.nodes.iter().map(String::as_str))
    {
        if seen.insert(id) {
            ids.push(id.to_string());
        }
    }

    let positions = compute_dag_positions(&ids, &spec.edges);

    let nodes = ids
        .iter()
        .map(|id| {
            let agent = spec.agents.iter().find(|a| a.name == *id);
            let (kind, data) = match agent {
                Some(agent) => (FlowNodeKind::Agent, agent_data(agent)),
                None => (FlowNodeKind::Processor, json!({ "name": id })),
            };
            FlowNode {
                id: id.clone(),
                kind,
                position: positions.get(id).copied().unwrap_or(Position { x: 0.0, y: 0.0 }),
                data,
                entry: !spec.entry_point.is_empty() && spec.entry_point == *id,
            }
        })
        .collect();

    let edges = spec
        .edges
        .iter()
        .filter(|e| seen.contains(e.from_node.as_str()) && seen.contains(e.to_node.as_str()))
        .map(|e| FlowEdge {
            id: format!("{}->{}", e.from_node, e.to_node),
            source: e.from_node.clone(),
            target: e.to_node.clone(),
        })
        .collect();

    FlowGraph { nodes, edges }
}

fn agent_data(agent: &AgentDetail) -> Value {
    json!({
        "name": agent.name,
        "model": agent.model,
        "category": agent.category,
        "tools": agent.tools,
        "instruction": agent.instruction,
    })
}
