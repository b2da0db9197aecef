//! Picks the node that follows the chat node.
//!
//! Routing reads only the message log. An assistant message routes on its
//! first invocation. A tool-result tail is traced back to the assistant
//! message it answers: unanswered invocations there still get their node;
//! once everything is answered, results for a routed capability go back to
//! the chat node and inline-only results end the turn.

use std::collections::HashSet;

use quill_core::types::{ChatMessage, ToolUse};
use quill_tools::Capability;

use super::edge::Next;
use super::node::NodeName;
use crate::state::WorkState;

/// Router bound to the chat node's conditional edge.
pub fn route_state(state: &WorkState) -> Next {
    route(&state.messages)
}

pub fn route(messages: &[ChatMessage]) -> Next {
    let Some(last) = messages.last() else {
        return Next::End;
    };

    if last.is_assistant() {
        return match last.tool_uses().first() {
            Some(first) => by_capability(first.name),
            None => Next::End,
        };
    }

    if last.is_tool_result() {
        let Some((issuing, _)) = last_assistant(messages) else {
            return Next::End;
        };
        if let Some(first) = pending_invocations(messages).first() {
            return by_capability(first.name);
        }
        let answered_routed = issuing
            .tool_uses()
            .iter()
            .any(|u| Capability::of(u.name).is_routed());
        return if answered_routed {
            Next::Node(NodeName::Chat)
        } else {
            Next::End
        };
    }

    Next::End
}

/// Invocations of the latest assistant message that no later message answers,
/// in emission order.
pub fn pending_invocations(messages: &[ChatMessage]) -> Vec<ToolUse<'_>> {
    let Some((issuing, idx)) = last_assistant(messages) else {
        return Vec::new();
    };
    let answered: HashSet<&str> = messages[idx + 1..]
        .iter()
        .flat_map(|m| m.answered_ids())
        .collect();
    issuing
        .tool_uses()
        .into_iter()
        .filter(|u| !answered.contains(u.id))
        .collect()
}

fn last_assistant(messages: &[ChatMessage]) -> Option<(&ChatMessage, usize)> {
    messages
        .iter()
        .rposition(|m| m.is_assistant())
        .map(|idx| (&messages[idx], idx))
}

fn by_capability(tool_name: &str) -> Next {
    match Capability::of(tool_name) {
        Capability::Search => Next::Node(NodeName::Search),
        Capability::Delete => Next::Node(NodeName::Delete),
        Capability::Inline | Capability::Unknown => Next::End,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::types::{ContentBlock, Role};
    use serde_json::json;

    fn assistant(calls: &[(&str, &str)]) -> ChatMessage {
        ChatMessage {
            role: Role::Assistant,
            content: calls
                .iter()
                .map(|(id, name)| ContentBlock::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: json!({}),
                })
                .collect(),
            timestamp: None,
        }
    }

    fn ack(id: &str) -> ChatMessage {
        ChatMessage::tool_result(id, "ok", false)
    }

    #[test]
    fn empty_log_ends() {
        assert_eq!(route(&[]), Next::End);
    }

    #[test]
    fn plain_assistant_reply_ends() {
        let messages = vec![ChatMessage::user("hi"), ChatMessage::assistant_text("hello")];
        assert_eq!(route(&messages), Next::End);
    }

    #[test]
    fn assistant_routes_on_first_invocation() {
        assert_eq!(
            route(&[assistant(&[("t1", "Search")])]),
            Next::Node(NodeName::Search)
        );
        assert_eq!(
            route(&[assistant(&[("t1", "DeleteResources"), ("t2", "Search")])]),
            Next::Node(NodeName::Delete)
        );
        assert_eq!(
            route(&[assistant(&[("t1", "WriteBlogPost"), ("t2", "Search")])]),
            Next::End
        );
        assert_eq!(route(&[assistant(&[("t1", "Teleport")])]), Next::End);
    }

    #[test]
    fn inline_acks_end_the_turn() {
        let messages = vec![
            ChatMessage::user("write"),
            assistant(&[("t1", "WriteBlogPost")]),
            ack("t1"),
        ];
        assert_eq!(route(&messages), Next::End);
    }

    #[test]
    fn unanswered_routed_invocation_still_routes() {
        let messages = vec![
            assistant(&[("t1", "Search"), ("t2", "WriteBlogPost")]),
            ack("t2"),
        ];
        assert_eq!(route(&messages), Next::Node(NodeName::Search));
        let pending = pending_invocations(&messages);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "t1");
    }

    #[test]
    fn answered_routed_invocation_returns_to_chat() {
        let messages = vec![assistant(&[("t1", "Search")]), ack("t1")];
        assert_eq!(route(&messages), Next::Node(NodeName::Chat));

        let messages = vec![assistant(&[("t1", "DeleteResources")]), ack("t1")];
        assert_eq!(route(&messages), Next::Node(NodeName::Chat));
    }

    #[test]
    fn user_message_ends() {
        let messages = vec![assistant(&[("t1", "Search")]), ack("t1"), ChatMessage::user("thanks")];
        assert_eq!(route(&messages), Next::End);
    }

    #[test]
    fn tool_result_without_assistant_ends() {
        assert_eq!(route(&[ack("t1")]), Next::End);
        assert!(pending_invocations(&[ack("t1")]).is_empty());
    }
}
