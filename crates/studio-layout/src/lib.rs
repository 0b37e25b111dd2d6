pub mod dag;
pub mod flow;

pub mod prelude {
    pub use crate::dag::{Layout, Position, compute_dag_positions, compute_layers};
    pub use crate::flow::{FlowEdge, FlowGraph, FlowNode, FlowNodeKind, workflow_to_flow};
}
