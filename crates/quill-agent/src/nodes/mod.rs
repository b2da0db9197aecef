pub mod chat;
pub mod delete;
pub mod search;

pub use chat::{fold_tool_calls, ChatNode};
pub use delete::{DeleteNode, PerformDeleteNode};
pub use search::SearchNode;
