use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use quill_core::error::Result;
use quill_core::types::ThreadId;

use crate::state::{StatePatch, WorkState};

/// The fixed set of nodes in the canvas graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeName {
    #[serde(rename = "chat_node")]
    Chat,
    #[serde(rename = "search_node")]
    Search,
    #[serde(rename = "delete_node")]
    Delete,
    #[serde(rename = "perform_delete_node")]
    PerformDelete,
}

impl NodeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat_node",
            Self::Search => "search_node",
            Self::Delete => "delete_node",
            Self::PerformDelete => "perform_delete_node",
        }
    }
}

impl std::fmt::Display for NodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-invocation context handed to a node.
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub thread_id: ThreadId,
    /// Step number of this invocation within the thread.
    pub step: usize,
}

/// A unit of work in the graph.
///
/// A node reads the current state and returns a patch; it never mutates state
/// directly. An `Err` aborts the run and leaves the last checkpoint in place.
pub trait Node: Send + Sync + 'static {
    fn name(&self) -> NodeName;

    fn run<'a>(
        &'a self,
        state: &'a WorkState,
        ctx: &'a NodeContext,
    ) -> BoxFuture<'a, Result<StatePatch>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_wire_form() {
        for name in [
            NodeName::Chat,
            NodeName::Search,
            NodeName::Delete,
            NodeName::PerformDelete,
        ] {
            let json = serde_json::to_value(name).unwrap();
            assert_eq!(json, name.as_str());
        }
        assert_eq!(NodeName::PerformDelete.to_string(), "perform_delete_node");
    }
}
