use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::StreamExt;

use quill_core::canvas::Resource;
use quill_core::config::ModelConfig;
use quill_core::error::{QuillError, Result};
use quill_core::traits::{FetchOutcome, LlmClient, ResourceFetcher, Searcher};
use quill_core::types::{ChatMessage, ContentBlock, StopReason, StreamDelta, ToolDefinition};

/// An LLM that replays queued replies, one per request, as delta streams.
///
/// Every request is recorded so tests can inspect what the model was shown.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<std::result::Result<ChatMessage, String>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<ChatMessage>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply.
    pub fn push(&self, reply: ChatMessage) {
        self.replies.lock().unwrap().push_back(Ok(reply));
    }

    /// Queue a request failure.
    pub fn push_error(&self, message: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Err(message.into()));
    }

    /// Messages sent with each request so far.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

/// Split a message into the deltas a provider would stream for it.
pub fn to_deltas(reply: &ChatMessage) -> Vec<StreamDelta> {
    let mut deltas = vec![StreamDelta::MessageId("msg_scripted".into())];
    let mut has_tools = false;

    for (index, block) in reply.content.iter().enumerate() {
        match block {
            ContentBlock::Text { text } => {
                // Two chunks so consumers see real accumulation.
                let mid = text.char_indices().nth(text.chars().count() / 2).map_or(0, |(i, _)| i);
                deltas.push(StreamDelta::TextDelta(text[..mid].to_string()));
                deltas.push(StreamDelta::TextDelta(text[mid..].to_string()));
            }
            ContentBlock::Thinking { thinking } => {
                deltas.push(StreamDelta::ThinkingDelta(thinking.clone()));
            }
            ContentBlock::ToolUse { id, name, input } => {
                has_tools = true;
                deltas.push(StreamDelta::ToolUseStart {
                    index,
                    id: id.clone(),
                    name: name.clone(),
                });
                deltas.push(StreamDelta::ToolInputDelta {
                    index,
                    delta: input.to_string(),
                });
            }
            ContentBlock::ToolResult { .. } => {}
        }
    }

    deltas.push(StreamDelta::Usage {
        input_tokens: 100,
        output_tokens: 20,
    });
    deltas.push(StreamDelta::Stop(if has_tools {
        StopReason::ToolUse
    } else {
        StopReason::EndTurn
    }));
    deltas
}

impl LlmClient for ScriptedLlm {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
        _tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(messages);
            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some(Ok(reply)) => {
                    let deltas = to_deltas(&reply).into_iter().map(Ok);
                    Ok(futures::stream::iter(deltas).boxed())
                }
                Some(Err(message)) => Err(QuillError::LlmRequest(message)),
                None => Err(QuillError::LlmRequest("script exhausted".into())),
            }
        })
    }
}

/// Serves canned page text; unknown urls fail.
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.pages.insert(url.into(), text.into());
        self
    }

    /// Every url requested so far, in request order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

impl ResourceFetcher for StaticFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FetchOutcome> {
        Box::pin(async move {
            self.fetched.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(text) => FetchOutcome::Content(text.clone()),
                None => FetchOutcome::Failed,
            }
        })
    }
}

/// Returns canned hits per query; unknown queries find nothing.
#[derive(Default)]
pub struct StaticSearcher {
    hits: HashMap<String, Vec<Resource>>,
    failing: Vec<String>,
}

impl StaticSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(mut self, query: impl Into<String>, hits: Vec<Resource>) -> Self {
        self.hits.insert(query.into(), hits);
        self
    }

    pub fn failing_on(mut self, query: impl Into<String>) -> Self {
        self.failing.push(query.into());
        self
    }
}

impl Searcher for StaticSearcher {
    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Vec<Resource>>> {
        Box::pin(async move {
            if self.failing.iter().any(|q| q == query) {
                return Err(QuillError::Search(format!("no route to search for '{}'", query)));
            }
            Ok(self.hits.get(query).cloned().unwrap_or_default())
        })
    }
}
