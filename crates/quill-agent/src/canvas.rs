//! Wiring for the research canvas graph.
//!
//! ```text
//! chat ──route──▶ search ──▶ chat
//!   │                         ▲
//!   └──route──▶ delete ═╗     │
//!                       ║ (suspend)
//!               perform_delete ┘
//! ```

use std::sync::Arc;

use quill_core::config::{AppConfig, CheckpointBackend, ModelConfig};
use quill_core::error::Result;
use quill_core::event::EventBus;
use quill_core::traits::{LlmClient, ResourceFetcher, Searcher};

use crate::checkpoint::{Checkpointer, MemoryCheckpointer, SqliteCheckpointer};
use crate::graph::router::route_state;
use crate::graph::{Edge, GraphExecutor, Node, NodeName};
use crate::nodes::{ChatNode, DeleteNode, PerformDeleteNode, SearchNode};
use crate::state::StatePatch;

/// Collaborators the canvas nodes call out to.
pub struct CanvasDeps {
    pub llm: Arc<dyn LlmClient>,
    pub model: ModelConfig,
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub searcher: Option<Arc<dyn Searcher>>,
    /// Operator text prepended to the chat instruction.
    pub operator_prompt: Option<String>,
}

/// Build and validate the canvas graph. The run suspends after the delete node.
pub fn canvas_graph(
    deps: CanvasDeps,
    checkpointer: Arc<dyn Checkpointer>,
    event_bus: Arc<EventBus>,
    max_steps: usize,
) -> Result<GraphExecutor> {
    let chat = ChatNode::new(deps.llm, deps.model, deps.fetcher)
        .with_operator_prompt(deps.operator_prompt);

    let nodes: Vec<Arc<dyn Node>> = vec![
        Arc::new(chat),
        Arc::new(SearchNode::new(deps.searcher)),
        Arc::new(DeleteNode),
        Arc::new(PerformDeleteNode),
    ];
    let edges = vec![
        Edge::routed(
            NodeName::Chat,
            route_state,
            vec![NodeName::Search, NodeName::Delete, NodeName::Chat],
        ),
        Edge::always(NodeName::Search, NodeName::Chat),
        Edge::always(NodeName::Delete, NodeName::PerformDelete),
        Edge::always(NodeName::PerformDelete, NodeName::Chat),
    ];

    let graph = GraphExecutor::new(nodes, edges, NodeName::Chat, checkpointer)
        .with_interrupt_after(NodeName::Delete)
        .with_event_bus(event_bus)
        .with_max_steps(max_steps);
    graph.validate()?;
    Ok(graph)
}

/// Open the checkpoint backend named in config.
pub fn open_checkpointer(config: &AppConfig) -> Result<Arc<dyn Checkpointer>> {
    Ok(match config.checkpoint.backend {
        CheckpointBackend::Sqlite => Arc::new(SqliteCheckpointer::open(&config.checkpoint_path())?),
        CheckpointBackend::Memory => Arc::new(MemoryCheckpointer::new()),
    })
}

/// Resume patch for a deletion review: `keep` urls leave the pending list,
/// `keep_all` empties it.
pub fn deletion_review(pending: &[String], keep: &[String], keep_all: bool) -> Option<StatePatch> {
    if keep_all {
        return Some(StatePatch::new().with_pending_deletions(Vec::new()));
    }
    if keep.is_empty() {
        return None;
    }
    let remaining = pending
        .iter()
        .filter(|url| !keep.contains(url))
        .cloned()
        .collect();
    Some(StatePatch::new().with_pending_deletions(remaining))
}
