use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuillError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    #[error("LLM provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Tool errors
    #[error("Tool input validation failed: {tool}: {message}")]
    ToolValidation { tool: String, message: String },

    #[error("Search failed: {0}")]
    Search(String),

    // Graph errors
    #[error("Node '{0}' is not registered in the graph")]
    UnknownNode(String),

    #[error("Router chose '{target}' after '{from}', which is not a declared edge target")]
    UndeclaredRoute { from: String, target: String },

    #[error("Graph exceeded max steps ({0})")]
    StepLimitExceeded(usize),

    #[error("Thread {thread_id} is suspended after '{node}'; resume it first")]
    ThreadSuspended { thread_id: String, node: String },

    #[error("Thread {thread_id} stopped before '{node}' ran; resume it first")]
    ThreadInterrupted { thread_id: String, node: String },

    #[error("Thread {0} has no pending node to resume")]
    NotSuspended(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QuillError {
    pub fn tool_validation(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolValidation {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QuillError>;
