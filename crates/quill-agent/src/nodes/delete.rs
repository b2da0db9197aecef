use futures::future::BoxFuture;
use tracing::{info, warn};

use quill_core::canvas::LogEntry;
use quill_core::error::Result;
use quill_core::types::ChatMessage;
use quill_tools::catalog::DELETE_RESOURCES;
use quill_tools::ToolCall;

use crate::graph::router::pending_invocations;
use crate::graph::{Node, NodeContext, NodeName};
use crate::state::{StatePatch, WorkState};

/// Records the resources the model wants removed. Nothing is removed here;
/// the graph suspends after this node so the user can confirm or edit the list.
pub struct DeleteNode;

impl Node for DeleteNode {
    fn name(&self) -> NodeName {
        NodeName::Delete
    }

    fn run<'a>(
        &'a self,
        state: &'a WorkState,
        ctx: &'a NodeContext,
    ) -> BoxFuture<'a, Result<StatePatch>> {
        Box::pin(async move {
            let invocations: Vec<_> = pending_invocations(&state.messages)
                .into_iter()
                .filter(|u| u.name == DELETE_RESOURCES)
                .collect();
            if invocations.is_empty() {
                warn!(thread_id = %ctx.thread_id, "Delete node reached with nothing to delete");
                return Ok(StatePatch::new());
            }

            let mut patch = StatePatch::new();
            let mut urls: Vec<String> = Vec::new();
            for invocation in invocations {
                if let ToolCall::DeleteResources { urls: requested } =
                    ToolCall::parse(invocation.name, invocation.input)?
                {
                    patch.messages.push(ChatMessage::tool_result(
                        invocation.id,
                        format!(
                            "Awaiting user confirmation to delete {} resource(s).",
                            requested.len()
                        ),
                        false,
                    ));
                    for url in requested {
                        if !urls.contains(&url) {
                            urls.push(url);
                        }
                    }
                }
            }

            info!(thread_id = %ctx.thread_id, count = urls.len(), "Proposed resource deletion");
            patch
                .logs
                .push(LogEntry::info(format!("Proposed deletion of {} resource(s)", urls.len())));
            Ok(patch.with_pending_deletions(urls))
        })
    }
}

/// Removes the confirmed resources and clears the pending list.
pub struct PerformDeleteNode;

impl Node for PerformDeleteNode {
    fn name(&self) -> NodeName {
        NodeName::PerformDelete
    }

    fn run<'a>(
        &'a self,
        state: &'a WorkState,
        ctx: &'a NodeContext,
    ) -> BoxFuture<'a, Result<StatePatch>> {
        Box::pin(async move {
            let pending = &state.pending_deletions;
            let removed = state
                .resources
                .iter()
                .filter(|r| pending.iter().any(|url| url == r.id()))
                .count();

            info!(thread_id = %ctx.thread_id, removed, "Deleting confirmed resources");
            Ok(StatePatch {
                resources_removed: pending.clone(),
                ..StatePatch::default()
            }
            .with_log(LogEntry::done(format!("Deleted {} resource(s)", removed)))
            .with_pending_deletions(Vec::new()))
        })
    }
}
