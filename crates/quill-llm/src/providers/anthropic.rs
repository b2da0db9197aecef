use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use quill_core::config::ModelConfig;
use quill_core::error::{QuillError, Result};
use quill_core::traits::LlmClient;
use quill_core::types::*;

use crate::streaming::{SseEvent, SseStream};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    http: Client,
}

impl AnthropicClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for AnthropicClient {
    fn default() -> Self {
        Self::new()
    }
}

// Anthropic API request types
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
}

#[derive(Serialize, Debug)]
struct ApiMessage {
    role: &'static str,
    content: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

// Anthropic API response types
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
#[allow(dead_code)]
enum SseData {
    #[serde(rename = "message_start")]
    MessageStart { message: MessageInfo },
    #[serde(rename = "content_block_start")]
    ContentBlockStart { index: usize, content_block: ContentBlockInfo },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { index: usize, delta: DeltaInfo },
    #[serde(rename = "content_block_stop")]
    ContentBlockStop { index: usize },
    #[serde(rename = "message_delta")]
    MessageDelta { delta: MessageDeltaInfo, usage: Option<UsageInfo> },
    #[serde(rename = "message_stop")]
    MessageStop {},
    #[serde(rename = "ping")]
    Ping {},
    #[serde(rename = "error")]
    Error { error: ApiError },
}

#[derive(Deserialize, Debug)]
struct MessageInfo {
    id: String,
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct UsageInfo {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
#[allow(dead_code)]
enum ContentBlockInfo {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
    #[serde(rename = "thinking")]
    Thinking { thinking: String },
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
enum DeltaInfo {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
    #[serde(rename = "thinking_delta")]
    ThinkingDelta { thinking: String },
}

#[derive(Deserialize, Debug)]
struct MessageDeltaInfo {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

/// Split out the system prompt and fold the history into API turns.
///
/// Tool acknowledgements are stored one per message but the API wants every
/// result for an assistant turn inside a single user turn, so consecutive
/// messages mapping to the same API role are merged.
fn convert_messages(messages: Vec<ChatMessage>) -> (Option<String>, Vec<ApiMessage>) {
    let mut system: Option<String> = None;
    let mut api_msgs: Vec<ApiMessage> = Vec::new();

    for msg in messages {
        let role = match msg.role {
            Role::System => {
                let text = msg.text();
                system = Some(match system.take() {
                    Some(prev) => format!("{}\n\n{}", prev, text),
                    None => text,
                });
                continue;
            }
            Role::Assistant => "assistant",
            // Tool results are sent as user messages in Anthropic API
            Role::User | Role::Tool => "user",
        };

        let blocks = convert_content_blocks(&msg.content);
        if blocks.is_empty() {
            continue;
        }
        match api_msgs.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => api_msgs.push(ApiMessage {
                role,
                content: blocks,
            }),
        }
    }

    (system, api_msgs)
}

fn convert_content_blocks(blocks: &[ContentBlock]) -> Vec<serde_json::Value> {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } if text.is_empty() => None,
            ContentBlock::Text { text } => Some(serde_json::json!({
                "type": "text",
                "text": text,
            })),
            ContentBlock::ToolUse { id, name, input } => Some(serde_json::json!({
                "type": "tool_use",
                "id": id,
                "name": name,
                "input": input,
            })),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => Some(serde_json::json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content,
                "is_error": is_error,
            })),
            // Thinking blocks need a provider signature to be replayed.
            ContentBlock::Thinking { .. } => None,
        })
        .collect()
}

fn parse_sse_to_deltas(event: SseEvent) -> Vec<Result<StreamDelta>> {
    if event.data.trim() == "[DONE]" {
        return Vec::new();
    }

    let data: SseData = match serde_json::from_str(&event.data) {
        Ok(data) => data,
        Err(e) => {
            warn!(data = %event.data, error = %e, "Failed to parse SSE data");
            return Vec::new();
        }
    };

    match data {
        SseData::MessageStart { message } => {
            let mut deltas = vec![Ok(StreamDelta::MessageId(message.id))];
            if let Some(usage) = message.usage {
                deltas.push(Ok(StreamDelta::Usage {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                }));
            }
            deltas
        }
        SseData::ContentBlockStart {
            index,
            content_block: ContentBlockInfo::ToolUse { id, name },
        } => vec![Ok(StreamDelta::ToolUseStart { index, id, name })],
        SseData::ContentBlockStart { .. } => Vec::new(),
        SseData::ContentBlockDelta { index, delta } => vec![Ok(match delta {
            DeltaInfo::TextDelta { text } => StreamDelta::TextDelta(text),
            DeltaInfo::InputJsonDelta { partial_json } => StreamDelta::ToolInputDelta {
                index,
                delta: partial_json,
            },
            DeltaInfo::ThinkingDelta { thinking } => StreamDelta::ThinkingDelta(thinking),
        })],
        SseData::MessageDelta { delta, usage } => {
            let mut deltas = Vec::new();
            if let Some(usage) = usage {
                debug!(
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "Token usage"
                );
                deltas.push(Ok(StreamDelta::Usage {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                }));
            }
            let stop = match delta.stop_reason.as_deref() {
                Some("end_turn") => Some(StopReason::EndTurn),
                Some("tool_use") => Some(StopReason::ToolUse),
                Some("max_tokens") => Some(StopReason::MaxTokens),
                Some("stop_sequence") => Some(StopReason::StopSequence),
                _ => None,
            };
            if let Some(stop) = stop {
                deltas.push(Ok(StreamDelta::Stop(stop)));
            }
            deltas
        }
        SseData::ContentBlockStop { .. } | SseData::MessageStop {} | SseData::Ping {} => {
            Vec::new()
        }
        SseData::Error { error } => vec![Err(QuillError::LlmStream(error.message))],
    }
}

impl LlmClient for AnthropicClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();
        let tools = tools.to_vec();

        Box::pin(async move {
            let api_key = config
                .api_key
                .as_deref()
                .ok_or_else(|| QuillError::Config("Anthropic API key not set".into()))?;

            let base_url = config.base_url.as_deref().unwrap_or(ANTHROPIC_API_URL);

            let (system, api_messages) = convert_messages(messages);

            let api_tools: Vec<ApiTool> = tools
                .into_iter()
                .map(|t| ApiTool {
                    name: t.name,
                    description: t.description,
                    input_schema: t.input_schema,
                })
                .collect();

            let body = AnthropicRequest {
                model: config.model_id.clone(),
                max_tokens: config.max_tokens,
                temperature: (config.temperature > 0.0).then_some(config.temperature),
                messages: api_messages,
                system,
                stream: true,
                tools: api_tools,
            };

            let response = self
                .http
                .post(base_url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| QuillError::LlmRequest(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                return Err(QuillError::LlmRequest(format!("HTTP {}: {}", status, body)));
            }

            let sse_stream = SseStream::new(response.bytes_stream());
            let delta_stream =
                sse_stream.flat_map(|event| stream::iter(parse_sse_to_deltas(event)));

            Ok(Box::pin(delta_stream) as BoxStream<'_, Result<StreamDelta>>)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(data: &str) -> SseEvent {
        SseEvent {
            event_type: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn consecutive_tool_results_merge_into_one_user_turn() {
        let assistant = ChatMessage {
            role: Role::Assistant,
            content: vec![
                ContentBlock::ToolUse {
                    id: "a".into(),
                    name: "WriteBlogPost".into(),
                    input: serde_json::json!({}),
                },
                ContentBlock::ToolUse {
                    id: "b".into(),
                    name: "GenerateQuote".into(),
                    input: serde_json::json!({}),
                },
            ],
            timestamp: None,
        };
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("write"),
            assistant,
            ChatMessage::tool_result("a", "ok", false),
            ChatMessage::tool_result("b", "ok", false),
        ];

        let (system, api) = convert_messages(messages);
        assert_eq!(system.as_deref(), Some("be brief"));
        assert_eq!(api.len(), 3);
        assert_eq!(api[2].role, "user");
        assert_eq!(api[2].content.len(), 2);
        assert_eq!(api[2].content[1]["tool_use_id"], "b");
    }

    #[test]
    fn message_start_emits_id_and_usage() {
        let deltas = parse_sse_to_deltas(event(
            r#"{"type":"message_start","message":{"id":"msg_1","usage":{"input_tokens":12,"output_tokens":1}}}"#,
        ));
        assert_eq!(deltas.len(), 2);
        assert!(matches!(deltas[0], Ok(StreamDelta::MessageId(ref id)) if id == "msg_1"));
        assert!(matches!(
            deltas[1],
            Ok(StreamDelta::Usage { input_tokens: 12, .. })
        ));
    }

    #[test]
    fn tool_use_start_and_input_delta() {
        let start = parse_sse_to_deltas(event(
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"tu_1","name":"Search"}}"#,
        ));
        assert!(matches!(
            start[0],
            Ok(StreamDelta::ToolUseStart { index: 1, ref name, .. }) if name == "Search"
        ));

        let delta = parse_sse_to_deltas(event(
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"q"}}"#,
        ));
        assert!(matches!(
            delta[0],
            Ok(StreamDelta::ToolInputDelta { index: 1, .. })
        ));
    }

    #[test]
    fn message_delta_maps_stop_reason() {
        let deltas = parse_sse_to_deltas(event(
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":5}}"#,
        ));
        assert_eq!(deltas.len(), 2);
        assert!(matches!(deltas[1], Ok(StreamDelta::Stop(StopReason::ToolUse))));
    }

    #[test]
    fn error_event_becomes_stream_error() {
        let deltas = parse_sse_to_deltas(event(
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        ));
        assert!(matches!(deltas[0], Err(QuillError::LlmStream(ref m)) if m == "Overloaded"));
    }

    #[test]
    fn garbage_is_skipped() {
        assert!(parse_sse_to_deltas(event("not json")).is_empty());
        assert!(parse_sse_to_deltas(event("[DONE]")).is_empty());
    }
}
