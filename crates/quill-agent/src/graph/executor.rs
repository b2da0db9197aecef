use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use quill_core::error::{QuillError, Result};
use quill_core::event::{EventBus, GraphEvent};
use quill_core::types::{ChatMessage, ThreadId};

use super::edge::{Edge, Next};
use super::node::{Node, NodeContext, NodeName};
use crate::checkpoint::{Checkpoint, Checkpointer, Cursor};
use crate::state::{StatePatch, WorkState};

/// Result of executing a single node.
#[derive(Debug, Clone)]
pub struct NodeResult {
    pub node: NodeName,
    /// Thread-wide step number.
    pub step: usize,
    pub elapsed_ms: u64,
}

/// How a `run` or `resume` call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// The graph reached its terminal state.
    Completed,
    /// Execution stopped at an interrupt point and waits for `resume`.
    Suspended { after: NodeName, next: NodeName },
}

/// Result of one `run` or `resume` call.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: RunStatus,
    /// Merged state after the last executed node.
    pub state: WorkState,
    /// Per-node results in execution order.
    pub node_results: Vec<NodeResult>,
    pub total_elapsed_ms: u64,
}

impl ExecutionResult {
    pub fn is_suspended(&self) -> bool {
        matches!(self.status, RunStatus::Suspended { .. })
    }
}

/// Drives a state graph with checkpoints and interrupts.
///
/// Starting from `entry_node`, each node reads the current state and returns a
/// patch. The executor merges the patch, resolves the node's outgoing edge,
/// and writes a checkpoint before moving on. Nodes listed as interrupt points
/// suspend the run after their checkpoint; `resume` picks it up from there.
/// Calls on one thread are serialized; different threads run independently.
pub struct GraphExecutor {
    nodes: HashMap<NodeName, Arc<dyn Node>>,
    edges: Vec<Edge>,
    entry_node: NodeName,
    interrupt_after: Vec<NodeName>,
    checkpointer: Arc<dyn Checkpointer>,
    event_bus: Arc<EventBus>,
    max_steps: usize,
    locks: std::sync::Mutex<HashMap<ThreadId, Arc<tokio::sync::Mutex<()>>>>,
}

impl GraphExecutor {
    pub fn new(
        nodes: Vec<Arc<dyn Node>>,
        edges: Vec<Edge>,
        entry_node: NodeName,
        checkpointer: Arc<dyn Checkpointer>,
    ) -> Self {
        let nodes = nodes.into_iter().map(|n| (n.name(), n)).collect();
        Self {
            nodes,
            edges,
            entry_node,
            interrupt_after: Vec::new(),
            checkpointer,
            event_bus: Arc::new(EventBus::default()),
            max_steps: 25,
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Suspend after this node completes.
    pub fn with_interrupt_after(mut self, node: NodeName) -> Self {
        if !self.interrupt_after.contains(&node) {
            self.interrupt_after.push(node);
        }
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Bound on node executions per `run`/`resume` call.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Check that the entry node, every edge endpoint and every route target is
    /// registered, and that no node has more than one outgoing edge.
    pub fn validate(&self) -> Result<()> {
        let known = |name: &NodeName| -> Result<()> {
            if self.nodes.contains_key(name) {
                Ok(())
            } else {
                Err(QuillError::UnknownNode(name.to_string()))
            }
        };

        known(&self.entry_node)?;
        for node in &self.interrupt_after {
            known(node)?;
        }
        for (i, edge) in self.edges.iter().enumerate() {
            known(&edge.from)?;
            for target in edge.targets() {
                known(&target)?;
            }
            if self.edges[..i].iter().any(|e| e.from == edge.from) {
                return Err(QuillError::Config(format!(
                    "Node '{}' has more than one outgoing edge",
                    edge.from
                )));
            }
        }
        Ok(())
    }

    /// Append a user message and run from the entry node.
    pub async fn run(&self, thread_id: &ThreadId, user_message: &str) -> Result<ExecutionResult> {
        let lock = self.thread_lock(thread_id);
        let _guard = lock.lock().await;

        let (mut state, step) = match self.checkpointer.load(thread_id)? {
            Some(cp) if cp.cursor.suspended => {
                return Err(QuillError::ThreadSuspended {
                    thread_id: thread_id.to_string(),
                    node: cp
                        .cursor
                        .last_node
                        .map(|n| n.to_string())
                        .unwrap_or_default(),
                });
            }
            // A chain that stopped early would leave tool calls unanswered.
            Some(Checkpoint {
                cursor: Cursor { next: Some(n), .. },
                ..
            }) => {
                return Err(QuillError::ThreadInterrupted {
                    thread_id: thread_id.to_string(),
                    node: n.to_string(),
                });
            }
            Some(cp) => (cp.state, cp.step),
            None => (WorkState::default(), 0),
        };

        state.apply(StatePatch::new().with_message(ChatMessage::user(user_message)));

        info!(thread_id = %thread_id, step, "Starting canvas run");
        self.event_bus.publish(GraphEvent::RunStarted {
            thread_id: thread_id.clone(),
        });

        self.drive(thread_id, state, step, self.entry_node).await
    }

    /// Continue a thread from its checkpointed next node, optionally patching
    /// state first. Covers both interrupt suspensions and chains that stopped
    /// early (step limit, node failure, dropped call).
    pub async fn resume(
        &self,
        thread_id: &ThreadId,
        patch: Option<StatePatch>,
    ) -> Result<ExecutionResult> {
        let lock = self.thread_lock(thread_id);
        let _guard = lock.lock().await;

        let not_suspended = || QuillError::NotSuspended(thread_id.to_string());
        let cp = self.checkpointer.load(thread_id)?.ok_or_else(not_suspended)?;
        let next = cp.cursor.next.ok_or_else(not_suspended)?;
        if !cp.cursor.suspended {
            warn!(thread_id = %thread_id, node = %next, "Resuming an interrupted chain");
        }

        let mut state = cp.state;
        if let Some(patch) = patch {
            debug!(thread_id = %thread_id, "Applying resume patch");
            state.apply(patch);
        }

        info!(thread_id = %thread_id, node = %next, step = cp.step, "Resuming canvas run");
        self.event_bus.publish(GraphEvent::Resumed {
            thread_id: thread_id.clone(),
            node: next.to_string(),
        });

        self.drive(thread_id, state, cp.step, next).await
    }

    /// Latest persisted state and cursor for a thread.
    pub fn snapshot(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>> {
        self.checkpointer.load(thread_id)
    }

    /// Drop a thread's checkpoint and its lock entry.
    pub fn forget(&self, thread_id: &ThreadId) -> Result<bool> {
        let removed = self.checkpointer.delete(thread_id)?;
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.get(thread_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(thread_id);
        }
        Ok(removed)
    }

    async fn drive(
        &self,
        thread_id: &ThreadId,
        mut state: WorkState,
        mut step: usize,
        start_node: NodeName,
    ) -> Result<ExecutionResult> {
        let start = Instant::now();
        let mut node_results = Vec::new();
        let mut current = start_node;

        loop {
            if node_results.len() >= self.max_steps {
                warn!(
                    thread_id = %thread_id,
                    node = %current,
                    max_steps = self.max_steps,
                    "Step limit reached, stopping graph"
                );
                return Err(QuillError::StepLimitExceeded(self.max_steps));
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| QuillError::UnknownNode(current.to_string()))?;

            step += 1;
            info!(thread_id = %thread_id, node = %current, step, "Executing graph node");
            self.event_bus.publish(GraphEvent::NodeStarted {
                thread_id: thread_id.clone(),
                node: current.to_string(),
                step,
            });

            let ctx = NodeContext {
                thread_id: thread_id.clone(),
                step,
            };
            let node_start = Instant::now();
            let patch = match node.run(&state, &ctx).await {
                Ok(patch) => patch,
                Err(e) => {
                    error!(thread_id = %thread_id, node = %current, error = %e, "Graph node failed");
                    self.event_bus.publish(GraphEvent::Failed {
                        thread_id: thread_id.clone(),
                        node: current.to_string(),
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            };
            state.apply(patch);

            let elapsed_ms = node_start.elapsed().as_millis() as u64;
            node_results.push(NodeResult {
                node: current,
                step,
                elapsed_ms,
            });
            debug!(thread_id = %thread_id, node = %current, elapsed_ms, "Node execution complete");
            self.event_bus.publish(GraphEvent::NodeCompleted {
                thread_id: thread_id.clone(),
                node: current.to_string(),
                step,
                elapsed_ms,
            });

            let next = self.next_after(current, &state)?;
            let interrupt = self.interrupt_after.contains(&current);
            let cursor = match next {
                Next::Node(n) => Cursor {
                    next: Some(n),
                    suspended: interrupt,
                    last_node: Some(current),
                },
                Next::End => Cursor::finished(current),
            };

            self.checkpointer
                .save(&Checkpoint::new(thread_id.clone(), step, state.clone(), cursor))?;
            self.event_bus.publish(GraphEvent::CheckpointSaved {
                thread_id: thread_id.clone(),
                step,
            });

            match next {
                Next::Node(n) if interrupt => {
                    info!(thread_id = %thread_id, after = %current, next = %n, "Suspending for confirmation");
                    self.event_bus.publish(GraphEvent::Suspended {
                        thread_id: thread_id.clone(),
                        after: current.to_string(),
                        next: n.to_string(),
                    });
                    return Ok(ExecutionResult {
                        status: RunStatus::Suspended {
                            after: current,
                            next: n,
                        },
                        state,
                        node_results,
                        total_elapsed_ms: start.elapsed().as_millis() as u64,
                    });
                }
                Next::Node(n) => current = n,
                Next::End => {
                    info!(thread_id = %thread_id, steps = node_results.len(), "Canvas run complete");
                    self.event_bus.publish(GraphEvent::Completed {
                        thread_id: thread_id.clone(),
                        steps: node_results.len(),
                    });
                    return Ok(ExecutionResult {
                        status: RunStatus::Completed,
                        state,
                        node_results,
                        total_elapsed_ms: start.elapsed().as_millis() as u64,
                    });
                }
            }
        }
    }

    fn next_after(&self, node: NodeName, state: &WorkState) -> Result<Next> {
        match self.edges.iter().find(|e| e.from == node) {
            Some(edge) => edge.resolve(state),
            None => {
                debug!(node = %node, "No outgoing edge, graph complete");
                Ok(Next::End)
            }
        }
    }

    fn thread_lock(&self, thread_id: &ThreadId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Entries nobody holds or waits on are idle.
        locks.retain(|_, l| Arc::strong_count(l) > 1);
        locks.entry(thread_id.clone()).or_default().clone()
    }
}
