//! The tools the chat node offers the model.

use serde_json::{json, Value};

use quill_core::canvas::ArtifactKind;
use quill_core::types::ToolDefinition;

pub const SEARCH: &str = "Search";
pub const DELETE_RESOURCES: &str = "DeleteResources";
pub const WRITE_BLOG_POST: &str = "WriteBlogPost";

/// Name of the generate tool for one artifact kind.
pub fn generate_tool_name(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Quote => "GenerateQuote",
        ArtifactKind::Steps => "GenerateSteps",
        ArtifactKind::Comparison => "GenerateComparison",
        ArtifactKind::Statistics => "GenerateStatistics",
        ArtifactKind::BarChart => "GenerateBarChart",
    }
}

/// Inverse of [`generate_tool_name`].
pub fn kind_for_tool(name: &str) -> Option<ArtifactKind> {
    ArtifactKind::ALL
        .into_iter()
        .find(|kind| generate_tool_name(*kind) == name)
}

/// Argument key carrying the payload for one artifact kind.
pub fn slot_key(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Quote => "quote_info",
        ArtifactKind::Steps => "steps_info",
        ArtifactKind::Comparison => "comparison_info",
        ArtifactKind::Statistics => "stats_info",
        ArtifactKind::BarChart => "bars_info",
    }
}

/// Full catalog: search, delete, write, and one generate tool per kind.
pub fn canvas_tools() -> Vec<ToolDefinition> {
    let mut tools = vec![
        ToolDefinition {
            name: SEARCH.to_string(),
            description: "Search for references and inspiration for the blog post.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "queries": string_list("Search queries to run")
                },
                "required": ["queries"]
            }),
        },
        ToolDefinition {
            name: DELETE_RESOURCES.to_string(),
            description: "Propose removing resources from the reference list. \
                          The user confirms before anything is deleted."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "urls": string_list("URLs of the resources to delete")
                },
                "required": ["urls"]
            }),
        },
        ToolDefinition {
            name: WRITE_BLOG_POST.to_string(),
            description: "Write or update the blog post with title and content.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "blog_post": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "content": { "type": "string", "description": "Markdown body" }
                        },
                        "required": ["title", "content"]
                    }
                },
                "required": ["blog_post"]
            }),
        },
    ];

    tools.extend(ArtifactKind::ALL.into_iter().map(generate_tool));
    tools
}

fn generate_tool(kind: ArtifactKind) -> ToolDefinition {
    let key = slot_key(kind);
    let mut properties = serde_json::Map::new();
    properties.insert(key.to_string(), payload_schema(kind));

    ToolDefinition {
        name: generate_tool_name(kind).to_string(),
        description: format!("Generate a {} infographic based on the blog content.", kind),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": [key]
        }),
    }
}

fn payload_schema(kind: ArtifactKind) -> Value {
    match kind {
        ArtifactKind::Quote => json!({
            "type": "object",
            "properties": {
                "quote": { "type": "string" },
                "source": { "type": "string" },
                "context": { "type": "string" }
            },
            "required": ["quote", "source"]
        }),
        ArtifactKind::Steps => json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "steps": string_list("Ordered steps"),
                "description": { "type": "string" }
            },
            "required": ["title", "steps"]
        }),
        ArtifactKind::Comparison => json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "left_title": { "type": "string" },
                "left_side": string_list("Points for the left side"),
                "right_title": { "type": "string" },
                "right_side": string_list("Points for the right side"),
                "comparison_aspect": { "type": "string" },
                "description": { "type": "string" },
                "conclusion": { "type": "string" }
            },
            "required": ["title", "left_title", "left_side", "right_title", "right_side", "comparison_aspect"]
        }),
        ArtifactKind::Statistics => json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "description": { "type": "string" },
                "stats": metric_list(json!({ "type": "string" }))
            },
            "required": ["title", "stats"]
        }),
        ArtifactKind::BarChart => json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "stats": metric_list(json!({ "type": "integer" }))
            },
            "required": ["title", "stats"]
        }),
    }
}

fn string_list(description: &str) -> Value {
    json!({
        "type": "array",
        "items": { "type": "string" },
        "description": description
    })
}

fn metric_list(value_schema: Value) -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "value": value_schema,
                "label": { "type": "string" }
            },
            "required": ["value", "label"]
        }
    })
}
