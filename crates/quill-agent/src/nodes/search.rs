use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use quill_core::canvas::LogEntry;
use quill_core::error::Result;
use quill_core::traits::Searcher;
use quill_core::types::ChatMessage;
use quill_tools::catalog::SEARCH;
use quill_tools::ToolCall;

use crate::graph::router::pending_invocations;
use crate::graph::{Node, NodeContext, NodeName};
use crate::state::{StatePatch, WorkState};

/// Answers pending `Search` invocations.
///
/// Each query is logged; with a searcher configured, hits are added to the
/// resource list. Every invocation gets exactly one acknowledgement.
pub struct SearchNode {
    searcher: Option<Arc<dyn Searcher>>,
}

impl SearchNode {
    pub fn new(searcher: Option<Arc<dyn Searcher>>) -> Self {
        Self { searcher }
    }
}

impl Node for SearchNode {
    fn name(&self) -> NodeName {
        NodeName::Search
    }

    fn run<'a>(
        &'a self,
        state: &'a WorkState,
        ctx: &'a NodeContext,
    ) -> BoxFuture<'a, Result<StatePatch>> {
        Box::pin(async move {
            let mut patch = StatePatch::new();

            let invocations: Vec<_> = pending_invocations(&state.messages)
                .into_iter()
                .filter(|u| u.name == SEARCH)
                .collect();
            if invocations.is_empty() {
                warn!(thread_id = %ctx.thread_id, "Search node reached with nothing to search");
                return Ok(patch);
            }

            for invocation in invocations {
                let ToolCall::Search { queries } = ToolCall::parse(invocation.name, invocation.input)?
                else {
                    continue;
                };

                let mut found = 0;
                let mut failed = 0;
                for query in &queries {
                    patch.logs.push(LogEntry::info(format!("Searching for {}", query)));
                    let Some(searcher) = &self.searcher else {
                        continue;
                    };
                    match searcher.search(query).await {
                        Ok(hits) => {
                            info!(thread_id = %ctx.thread_id, query = %query, hits = hits.len(), "Search complete");
                            patch
                                .logs
                                .push(LogEntry::done(format!("Found {} resources for {}", hits.len(), query)));
                            found += hits.len();
                            patch.resources_added.extend(hits);
                        }
                        Err(e) => {
                            warn!(thread_id = %ctx.thread_id, query = %query, error = %e, "Search failed");
                            patch
                                .logs
                                .push(LogEntry::info(format!("Search failed for {}: {}", query, e)));
                            failed += 1;
                        }
                    }
                }

                let (content, is_error) = match &self.searcher {
                    None => (format!("Search requested for: {}", queries.join(", ")), false),
                    Some(_) if failed > 0 && failed == queries.len() => {
                        (format!("All {} searches failed.", failed), true)
                    }
                    Some(_) => (
                        format!(
                            "Ran {} searches and added {} resources.",
                            queries.len(),
                            found
                        ),
                        false,
                    ),
                };
                patch
                    .messages
                    .push(ChatMessage::tool_result(invocation.id, content, is_error));
            }

            Ok(patch)
        })
    }
}
