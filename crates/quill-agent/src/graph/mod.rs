//! Checkpointed state-graph execution.
//!
//! A graph is a set of [`Node`]s joined by [`Edge`]s. Each node returns a
//! [`StatePatch`](crate::state::StatePatch) that the executor merges into the
//! thread's [`WorkState`](crate::state::WorkState). Edges are either fixed or
//! resolved by a router over the merged state. After every node the executor
//! writes a checkpoint, and it can suspend after designated nodes until the
//! caller resumes the thread.

pub mod edge;
pub mod executor;
pub mod node;
pub mod router;

pub use edge::{Edge, EdgeCondition, Next, Router};
pub use executor::{ExecutionResult, GraphExecutor, NodeResult, RunStatus};
pub use node::{Node, NodeContext, NodeName};
