use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::canvas::Resource;
use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::*;

/// Streaming LLM client.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// Outcome of fetching one resource. `Failed` is the skip sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Content(String),
    Failed,
}

impl FetchOutcome {
    pub fn into_content(self) -> Option<String> {
        match self {
            Self::Content(text) => Some(text),
            Self::Failed => None,
        }
    }
}

/// Resource fetcher: URL to extracted text. Never errors; failures map to
/// [`FetchOutcome::Failed`].
pub trait ResourceFetcher: Send + Sync + 'static {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FetchOutcome>;
}

/// Search provider used by the search node to discover new resources.
pub trait Searcher: Send + Sync + 'static {
    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Vec<Resource>>>;
}
