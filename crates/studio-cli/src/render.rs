//! Plain-text rendering of transcripts and graph layouts.

use std::fmt::Write;

use studio_core::message::{ChatHistory, MessageItem, Role};
use studio_core::stream::ToolStatus;
use studio_core::workflow::WorkflowDetail;
use studio_layout::flow::{FlowGraph, FlowNodeKind};

pub fn transcript(entries: &[ChatHistory]) -> String {
    let mut out = String::new();
    for entry in entries {
        let who = match entry.role {
            Role::User => "you",
            Role::Assistant => "studio",
        };
        let _ = writeln!(out, "[{who}]");
        for item in entry.visible_content() {
            let _ = writeln!(out, "{}", item_line(item));
        }
        if let Some(error) = &entry.error {
            let _ = writeln!(out, "  ! {error}");
        }
    }
    out
}

fn item_line(item: &MessageItem) -> String {
    match item {
        MessageItem::Text { text, .. } => format!("  {text}"),
        MessageItem::Reasoning { reasoning, .. } => format!("  ~ {reasoning}"),
        MessageItem::Progress { progress, .. } => format!("  [{progress:>3}%]"),
        MessageItem::Code { code, .. } => format!("  {} {}", code.kind.tag(), code.path),
        MessageItem::ToolUse { tool_use, .. } => {
            let status = match tool_use.status {
                Some(ToolStatus::Success) => "ok",
                Some(ToolStatus::Error) => "failed",
                None => "running",
            };
            format!("  > {} ({status})", tool_use.name)
        }
        MessageItem::Preview { preview, .. } => format!("  preview: {}", preview.url),
        MessageItem::Log { log, .. } => format!("  {log}"),
    }
}

pub fn graph(detail: &WorkflowDetail, flow: &FlowGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", detail.name, detail.id);
    for node in &flow.nodes {
        let kind = match node.kind {
            FlowNodeKind::Agent => "agent",
            FlowNodeKind::Processor => "processor",
        };
        let entry = if node.entry { " *entry" } else { "" };
        let _ = writeln!(
            out,
            "  {:<24} {:<9} x={:>6} y={:>6}{entry}",
            node.id, kind, node.position.x, node.position.y
        );
    }
    for edge in &flow.edges {
        let _ = writeln!(out, "  {} -> {}", edge.source, edge.target);
    }
    out
}
