use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::warn;

use quill_core::error::{QuillError, Result};
use quill_core::types::{ChatMessage, ContentBlock, Role, StopReason, StreamDelta};

/// One model reply, assembled from its delta stream.
#[derive(Debug, Clone)]
pub struct CollectedResponse {
    pub message: ChatMessage,
    pub stop_reason: Option<StopReason>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    input_json: String,
}

/// Drain a delta stream into a single assistant message.
///
/// Tool input arrives as JSON fragments per block index; a block whose
/// concatenated input does not parse is an error.
pub async fn collect(mut stream: BoxStream<'_, Result<StreamDelta>>) -> Result<CollectedResponse> {
    let mut text = String::new();
    let mut thinking = String::new();
    let mut tool_calls: Vec<ToolCallAccumulator> = Vec::new();
    let mut stop_reason = None;
    let mut input_tokens = 0;
    let mut output_tokens = 0;

    while let Some(delta) = stream.next().await {
        match delta? {
            StreamDelta::TextDelta(t) => text.push_str(&t),
            StreamDelta::ThinkingDelta(t) => thinking.push_str(&t),
            StreamDelta::ToolUseStart { index, id, name } => {
                while tool_calls.len() <= index {
                    tool_calls.push(ToolCallAccumulator::default());
                }
                tool_calls[index].id = id;
                tool_calls[index].name = name;
            }
            StreamDelta::ToolInputDelta { index, delta } => match tool_calls.get_mut(index) {
                Some(tc) => tc.input_json.push_str(&delta),
                None => warn!(index, "Tool input delta for unknown block"),
            },
            StreamDelta::Stop(reason) => stop_reason = Some(reason),
            StreamDelta::Usage {
                input_tokens: i,
                output_tokens: o,
            } => {
                input_tokens += i;
                output_tokens += o;
            }
            StreamDelta::MessageId(_) => {}
        }
    }

    if stop_reason == Some(StopReason::MaxTokens) {
        warn!("LLM hit max tokens");
    }

    let mut content = Vec::new();
    if !thinking.is_empty() {
        content.push(ContentBlock::Thinking { thinking });
    }
    if !text.is_empty() {
        content.push(ContentBlock::Text { text });
    }
    // Indices can skip numbers when text blocks sit between tool blocks.
    for tc in tool_calls.into_iter().filter(|tc| !tc.id.is_empty()) {
        let input = if tc.input_json.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_str(&tc.input_json).map_err(|e| {
                QuillError::LlmParse(format!("tool '{}' input is not valid JSON: {}", tc.name, e))
            })?
        };
        content.push(ContentBlock::ToolUse {
            id: tc.id,
            name: tc.name,
            input,
        });
    }

    Ok(CollectedResponse {
        message: ChatMessage {
            role: Role::Assistant,
            content,
            timestamp: Some(Utc::now()),
        },
        stop_reason,
        input_tokens,
        output_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(deltas: Vec<StreamDelta>) -> BoxStream<'static, Result<StreamDelta>> {
        futures::stream::iter(deltas.into_iter().map(Ok)).boxed()
    }

    #[tokio::test]
    async fn assembles_text_and_tool_calls() {
        let collected = collect(stream(vec![
            StreamDelta::MessageId("m1".into()),
            StreamDelta::TextDelta("Let me ".into()),
            StreamDelta::TextDelta("look.".into()),
            StreamDelta::ToolUseStart {
                index: 1,
                id: "t1".into(),
                name: "Search".into(),
            },
            StreamDelta::ToolInputDelta {
                index: 1,
                delta: "{\"queries\":".into(),
            },
            StreamDelta::ToolInputDelta {
                index: 1,
                delta: "[\"rust\"]}".into(),
            },
            StreamDelta::Usage {
                input_tokens: 10,
                output_tokens: 4,
            },
            StreamDelta::Stop(StopReason::ToolUse),
        ]))
        .await
        .unwrap();

        let msg = &collected.message;
        assert!(msg.is_assistant());
        assert_eq!(msg.text(), "Let me look.");
        let uses = msg.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].id, "t1");
        assert_eq!(uses[0].input["queries"][0], "rust");
        assert_eq!(collected.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(collected.input_tokens, 10);
    }

    #[tokio::test]
    async fn empty_tool_input_becomes_empty_object() {
        let collected = collect(stream(vec![StreamDelta::ToolUseStart {
            index: 0,
            id: "t1".into(),
            name: "Teleport".into(),
        }]))
        .await
        .unwrap();
        assert!(collected.message.tool_uses()[0].input.is_object());
    }

    #[tokio::test]
    async fn broken_tool_json_is_an_error() {
        let err = collect(stream(vec![
            StreamDelta::ToolUseStart {
                index: 0,
                id: "t1".into(),
                name: "Search".into(),
            },
            StreamDelta::ToolInputDelta {
                index: 0,
                delta: "{\"queries\": [".into(),
            },
        ]))
        .await
        .unwrap_err();
        assert!(matches!(err, QuillError::LlmParse(_)));
    }

    #[tokio::test]
    async fn stream_error_propagates() {
        let items: Vec<Result<StreamDelta>> = vec![
            Ok(StreamDelta::TextDelta("x".into())),
            Err(QuillError::LlmStream("reset".into())),
        ];
        let err = collect(futures::stream::iter(items).boxed()).await.unwrap_err();
        assert!(matches!(err, QuillError::LlmStream(_)));
    }
}
