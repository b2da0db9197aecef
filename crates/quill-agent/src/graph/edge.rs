use quill_core::error::{QuillError, Result};

use super::node::NodeName;
use crate::state::WorkState;

/// Where execution goes after a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Node(NodeName),
    End,
}

/// A routing function over the merged state.
pub type Router = fn(&WorkState) -> Next;

/// An outgoing edge from one node.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: NodeName,
    pub condition: EdgeCondition,
}

/// How an edge picks its target.
#[derive(Debug, Clone)]
pub enum EdgeCondition {
    /// Always continue to this node.
    Always(NodeName),
    /// Ask the router. Any node it returns must be one of `targets`.
    Routed {
        router: Router,
        targets: Vec<NodeName>,
    },
}

impl Edge {
    /// Create an unconditional edge.
    pub fn always(from: NodeName, to: NodeName) -> Self {
        Self {
            from,
            condition: EdgeCondition::Always(to),
        }
    }

    /// Create a conditional edge resolved by `router`.
    pub fn routed(from: NodeName, router: Router, targets: Vec<NodeName>) -> Self {
        Self {
            from,
            condition: EdgeCondition::Routed { router, targets },
        }
    }

    /// Every node this edge can lead to.
    pub fn targets(&self) -> Vec<NodeName> {
        match &self.condition {
            EdgeCondition::Always(to) => vec![*to],
            EdgeCondition::Routed { targets, .. } => targets.clone(),
        }
    }

    /// Pick the next step for the given state.
    pub fn resolve(&self, state: &WorkState) -> Result<Next> {
        match &self.condition {
            EdgeCondition::Always(to) => Ok(Next::Node(*to)),
            EdgeCondition::Routed { router, targets } => match router(state) {
                Next::Node(target) if !targets.contains(&target) => {
                    Err(QuillError::UndeclaredRoute {
                        from: self.from.to_string(),
                        target: target.to_string(),
                    })
                }
                next => Ok(next),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_search(_: &WorkState) -> Next {
        Next::Node(NodeName::Search)
    }

    fn to_end(_: &WorkState) -> Next {
        Next::End
    }

    #[test]
    fn always_edge_resolves_to_target() {
        let edge = Edge::always(NodeName::Search, NodeName::Chat);
        assert_eq!(
            edge.resolve(&WorkState::default()).unwrap(),
            Next::Node(NodeName::Chat)
        );
    }

    #[test]
    fn routed_edge_accepts_declared_targets_and_end() {
        let edge = Edge::routed(NodeName::Chat, to_search, vec![NodeName::Search]);
        assert_eq!(
            edge.resolve(&WorkState::default()).unwrap(),
            Next::Node(NodeName::Search)
        );

        let edge = Edge::routed(NodeName::Chat, to_end, vec![]);
        assert_eq!(edge.resolve(&WorkState::default()).unwrap(), Next::End);
    }

    #[test]
    fn routed_edge_rejects_undeclared_target() {
        let edge = Edge::routed(NodeName::Chat, to_search, vec![NodeName::Delete]);
        let err = edge.resolve(&WorkState::default()).unwrap_err();
        assert!(matches!(
            err,
            QuillError::UndeclaredRoute { ref from, ref target }
                if from == "chat_node" && target == "search_node"
        ));
    }
}
