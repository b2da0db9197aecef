//! The Quill canvas agent: a checkpointed graph of chat, search and delete
//! nodes over a shared work state, with a confirmation interrupt before any
//! resource is removed.

pub mod canvas;
pub mod checkpoint;
pub mod graph;
pub mod nodes;
pub mod prompt;
pub mod response;
pub mod state;

pub use canvas::{canvas_graph, deletion_review, open_checkpointer, CanvasDeps};
pub use checkpoint::{Checkpoint, Checkpointer, Cursor, MemoryCheckpointer, SqliteCheckpointer};
pub use graph::{ExecutionResult, GraphExecutor, NodeName, RunStatus};
pub use state::{ArtifactSlots, StatePatch, WorkState};
