use crate::types::ThreadId;

/// Lifecycle events published by the graph executor.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    /// A `run` call started from the entry node.
    RunStarted { thread_id: ThreadId },
    /// A suspended run was resumed.
    Resumed { thread_id: ThreadId, node: String },
    /// A node began executing.
    NodeStarted { thread_id: ThreadId, node: String, step: usize },
    /// A node finished and its patch was merged.
    NodeCompleted {
        thread_id: ThreadId,
        node: String,
        step: usize,
        elapsed_ms: u64,
    },
    /// A checkpoint was written.
    CheckpointSaved { thread_id: ThreadId, step: usize },
    /// Execution stopped at an interrupt point.
    Suspended { thread_id: ThreadId, after: String, next: String },
    /// The graph reached its terminal state.
    Completed { thread_id: ThreadId, steps: usize },
    /// A node failed; the last checkpoint stands.
    Failed { thread_id: ThreadId, node: String, error: String },
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<GraphEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: GraphEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<GraphEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(GraphEvent::RunStarted {
            thread_id: ThreadId::from_str("t1"),
        });
        match rx.recv().await.unwrap() {
            GraphEvent::RunStarted { thread_id } => assert_eq!(thread_id.as_str(), "t1"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.publish(GraphEvent::Completed {
            thread_id: ThreadId::from_str("t"),
            steps: 1,
        });
    }
}
