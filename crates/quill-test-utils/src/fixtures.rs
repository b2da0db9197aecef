use std::path::Path;

use serde_json::Value;

use quill_core::canvas::Resource;
use quill_core::config::{AppConfig, ModelConfig};
use quill_core::types::{ChatMessage, ContentBlock, Role};

/// A model config that never reaches the network.
pub fn test_model() -> ModelConfig {
    ModelConfig {
        provider: "anthropic".into(),
        model_id: "test-model".into(),
        api_key: Some("test-key".into()),
        base_url: None,
        max_tokens: 1024,
        temperature: 0.0,
        retry: None,
    }
}

/// Minimal config whose workspace and checkpoint file live under `dir`.
pub fn test_config(dir: &Path) -> AppConfig {
    let toml_src = format!(
        r#"
[agent]
workspace = "{ws}"
max_steps = 10

[model]
model_id = "test-model"
api_key = "test-key"

[checkpoint]
path = "{ws}/checkpoints.db"
"#,
        ws = dir.display()
    );
    toml::from_str(&toml_src).expect("test config parses")
}

/// A temporary directory removed on drop.
pub fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("temp dir")
}

pub fn resource(url: &str) -> Resource {
    Resource::new(url, format!("Title of {}", url), format!("About {}", url))
}

/// An assistant reply carrying only text.
pub fn reply_text(text: &str) -> ChatMessage {
    ChatMessage::assistant_text(text)
}

/// An assistant reply with optional text followed by tool invocations.
pub fn reply_tools(text: Option<&str>, calls: &[(&str, &str, Value)]) -> ChatMessage {
    let mut content = Vec::new();
    if let Some(text) = text {
        content.push(ContentBlock::Text {
            text: text.to_string(),
        });
    }
    for (id, name, input) in calls {
        content.push(ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input: input.clone(),
        });
    }
    ChatMessage {
        role: Role::Assistant,
        content,
        timestamp: None,
    }
}
