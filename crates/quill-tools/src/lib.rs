pub mod calls;
pub mod catalog;
pub mod fetch;
pub mod search;

pub use calls::{Capability, ToolCall};
pub use catalog::canvas_tools;
pub use fetch::HttpFetcher;
pub use search::TavilySearcher;
