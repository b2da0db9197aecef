use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use tracing::{debug, info, warn};

use quill_core::canvas::{LogEntry, ResolvedResource, Resource};
use quill_core::config::ModelConfig;
use quill_core::error::Result;
use quill_core::traits::{LlmClient, ResourceFetcher};
use quill_core::types::{ChatMessage, ToolDefinition};
use quill_tools::{canvas_tools, Capability, ToolCall};

use crate::graph::{Node, NodeContext, NodeName};
use crate::state::{StatePatch, WorkState};
use crate::{prompt, response};

/// Asks the model for the next turn and folds inline tool calls into state.
pub struct ChatNode {
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    fetcher: Arc<dyn ResourceFetcher>,
    tools: Vec<ToolDefinition>,
    operator_prompt: Option<String>,
}

impl ChatNode {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: ModelConfig,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Self {
        Self {
            llm,
            model,
            fetcher,
            tools: canvas_tools(),
            operator_prompt: None,
        }
    }

    pub fn with_operator_prompt(mut self, prompt: Option<String>) -> Self {
        self.operator_prompt = prompt;
        self
    }
}

impl Node for ChatNode {
    fn name(&self) -> NodeName {
        NodeName::Chat
    }

    fn run<'a>(
        &'a self,
        state: &'a WorkState,
        ctx: &'a NodeContext,
    ) -> BoxFuture<'a, Result<StatePatch>> {
        Box::pin(async move {
            let resolved = resolve_resources(self.fetcher.as_ref(), &state.resources).await;
            debug!(
                thread_id = %ctx.thread_id,
                resources = state.resources.len(),
                resolved = resolved.len(),
                "Resolved resources for prompt"
            );

            let system =
                prompt::system_prompt(self.operator_prompt.as_deref(), state, &resolved);
            let mut messages = Vec::with_capacity(state.messages.len() + 1);
            messages.push(ChatMessage::system(system));
            messages.extend(state.messages.iter().cloned());

            let stream = self
                .llm
                .chat_stream(&self.model, messages, &self.tools)
                .await?;
            let reply = response::collect(stream).await?;
            info!(
                thread_id = %ctx.thread_id,
                input_tokens = reply.input_tokens,
                output_tokens = reply.output_tokens,
                tool_calls = reply.message.tool_uses().len(),
                "Model replied"
            );

            fold_tool_calls(reply.message)
        })
    }
}

/// Fetch every resource concurrently, keeping the ones that succeeded.
pub async fn resolve_resources(
    fetcher: &dyn ResourceFetcher,
    resources: &[Resource],
) -> Vec<ResolvedResource> {
    let outcomes = join_all(resources.iter().map(|r| fetcher.fetch(r.id()))).await;
    resources
        .iter()
        .zip(outcomes)
        .filter_map(|(resource, outcome)| {
            outcome.into_content().map(|content| ResolvedResource {
                resource: resource.clone(),
                content,
            })
        })
        .collect()
}

/// Turn a model reply into a patch.
///
/// The reply is appended, then every inline or unknown invocation gets an
/// acknowledgement in emission order. Invocations of the first routed
/// capability stay unanswered for the routed node; invocations of any other
/// routed capability are answered as deferred. A malformed payload fails the
/// whole turn.
pub fn fold_tool_calls(reply: ChatMessage) -> Result<StatePatch> {
    let calls = reply
        .tool_uses()
        .iter()
        .map(|u| Ok((u.id.to_string(), u.name.to_string(), ToolCall::parse(u.name, u.input)?)))
        .collect::<Result<Vec<_>>>()?;

    let routed = calls
        .iter()
        .map(|(_, _, call)| call.capability())
        .find(Capability::is_routed);

    let mut patch = StatePatch::new().with_message(reply);

    for (id, name, call) in calls {
        match call {
            ToolCall::WriteBlogPost(document) => {
                patch.logs.push(LogEntry::done(format!("Updated document: {}", document.title)));
                patch
                    .messages
                    .push(ChatMessage::tool_result(id, "Blog post updated.", false));
                patch.document = Some(document);
            }
            ToolCall::GenerateArtifact(artifact) => {
                let kind = artifact.kind();
                patch.logs.push(LogEntry::done(format!("Generated {} artifact", kind)));
                patch.messages.push(ChatMessage::tool_result(
                    id,
                    format!("Generated {} infographic.", kind),
                    false,
                ));
                patch.artifact_history.push(artifact.clone());
                patch.artifacts.push(artifact);
            }
            ToolCall::Unknown { name } => {
                warn!(tool = %name, "Model called an unknown tool");
                patch.messages.push(ChatMessage::tool_result(
                    id,
                    format!("Unknown tool: {}", name),
                    true,
                ));
            }
            call @ (ToolCall::Search { .. } | ToolCall::DeleteResources { .. }) => {
                if Some(call.capability()) != routed {
                    debug!(tool = %name, "Deferring second routed capability");
                    patch.messages.push(ChatMessage::tool_result(
                        id,
                        format!(
                            "Deferred: {} was not run in this turn. Call it again after the current request completes.",
                            name
                        ),
                        true,
                    ));
                }
            }
        }
    }

    Ok(patch)
}
