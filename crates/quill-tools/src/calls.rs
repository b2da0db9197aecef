//! Typed view over the tool invocations the model emits.

use serde::Deserialize;
use serde_json::Value;

use quill_core::canvas::{Artifact, Document};
use quill_core::error::{QuillError, Result};

use crate::catalog::{self, DELETE_RESOURCES, SEARCH, WRITE_BLOG_POST};

/// How the graph treats an invocation, decided by tool name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Routed to the search node.
    Search,
    /// Routed to the delete node (and the interrupt after it).
    Delete,
    /// Folded into state by the chat node itself.
    Inline,
    /// Not in the catalog; acknowledged with an error by the chat node.
    Unknown,
}

impl Capability {
    pub fn of(name: &str) -> Self {
        match name {
            SEARCH => Self::Search,
            DELETE_RESOURCES => Self::Delete,
            WRITE_BLOG_POST => Self::Inline,
            other if catalog::kind_for_tool(other).is_some() => Self::Inline,
            _ => Self::Unknown,
        }
    }

    pub fn is_routed(&self) -> bool {
        matches!(self, Self::Search | Self::Delete)
    }
}

/// A parsed tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    Search { queries: Vec<String> },
    DeleteResources { urls: Vec<String> },
    WriteBlogPost(Document),
    GenerateArtifact(Artifact),
    Unknown { name: String },
}

#[derive(Deserialize)]
struct SearchArgs {
    queries: Vec<String>,
}

#[derive(Deserialize)]
struct DeleteArgs {
    urls: Vec<String>,
}

#[derive(Deserialize)]
struct WriteArgs {
    blog_post: Document,
}

impl ToolCall {
    pub fn capability(&self) -> Capability {
        match self {
            Self::Search { .. } => Capability::Search,
            Self::DeleteResources { .. } => Capability::Delete,
            Self::WriteBlogPost(_) | Self::GenerateArtifact(_) => Capability::Inline,
            Self::Unknown { .. } => Capability::Unknown,
        }
    }

    /// Parse an invocation's arguments against its tool's schema.
    ///
    /// Structural mismatches are fatal; unknown tool names are not.
    pub fn parse(name: &str, input: &Value) -> Result<Self> {
        let invalid = |e: serde_json::Error| QuillError::tool_validation(name, e.to_string());

        match Capability::of(name) {
            Capability::Search => {
                let args: SearchArgs = serde_json::from_value(input.clone()).map_err(invalid)?;
                Ok(Self::Search {
                    queries: args.queries,
                })
            }
            Capability::Delete => {
                let args: DeleteArgs = serde_json::from_value(input.clone()).map_err(invalid)?;
                Ok(Self::DeleteResources { urls: args.urls })
            }
            Capability::Inline if name == WRITE_BLOG_POST => {
                let args: WriteArgs = serde_json::from_value(input.clone()).map_err(invalid)?;
                Ok(Self::WriteBlogPost(args.blog_post))
            }
            Capability::Inline => {
                let kind = catalog::kind_for_tool(name)
                    .ok_or_else(|| QuillError::tool_validation(name, "not a generate tool"))?;
                let key = catalog::slot_key(kind);
                let payload = input.get(key).cloned().ok_or_else(|| {
                    QuillError::tool_validation(name, format!("missing '{}' argument", key))
                })?;
                let artifact = Artifact::from_payload(kind, payload).map_err(invalid)?;
                Ok(Self::GenerateArtifact(artifact))
            }
            Capability::Unknown => Ok(Self::Unknown {
                name: name.to_string(),
            }),
        }
    }
}
