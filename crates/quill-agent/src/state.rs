//! The shared work state threaded through every graph node, and the
//! per-field merge rules applied to node patches.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use quill_core::canvas::{Artifact, ArtifactKind, Document, LogEntry, Resource};
use quill_core::types::ChatMessage;

/// Latest artifact per kind. Writing a kind replaces only that kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactSlots(BTreeMap<ArtifactKind, Artifact>);

impl ArtifactSlots {
    pub fn set(&mut self, artifact: Artifact) {
        self.0.insert(artifact.kind(), artifact);
    }

    pub fn get(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.0.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything one canvas thread knows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkState {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub document: Document,
    #[serde(default)]
    pub artifacts: ArtifactSlots,
    #[serde(default)]
    pub artifact_history: Vec<Artifact>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Urls proposed for removal and awaiting confirmation.
    #[serde(default)]
    pub pending_deletions: Vec<String>,
}

/// Partial update returned by a node.
///
/// Each field carries its own merge rule, applied by [`WorkState::apply`]:
/// messages, logs and artifact history append; the document, artifact slots
/// and pending deletions replace; resources are added and removed by url.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub messages: Vec<ChatMessage>,
    pub logs: Vec<LogEntry>,
    pub document: Option<Document>,
    pub artifacts: Vec<Artifact>,
    pub artifact_history: Vec<Artifact>,
    pub resources_added: Vec<Resource>,
    pub resources_removed: Vec<String>,
    pub pending_deletions: Option<Vec<String>>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_log(mut self, entry: LogEntry) -> Self {
        self.logs.push(entry);
        self
    }

    pub fn with_pending_deletions(mut self, urls: Vec<String>) -> Self {
        self.pending_deletions = Some(urls);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.logs.is_empty()
            && self.document.is_none()
            && self.artifacts.is_empty()
            && self.artifact_history.is_empty()
            && self.resources_added.is_empty()
            && self.resources_removed.is_empty()
            && self.pending_deletions.is_none()
    }
}

impl WorkState {
    /// Merge a node's patch into the state.
    pub fn apply(&mut self, patch: StatePatch) {
        self.messages.extend(patch.messages);
        self.logs.extend(patch.logs);

        if let Some(document) = patch.document {
            self.document = document;
        }

        for artifact in patch.artifacts {
            self.artifacts.set(artifact);
        }
        self.artifact_history.extend(patch.artifact_history);

        if !patch.resources_removed.is_empty() {
            self.resources
                .retain(|r| !patch.resources_removed.iter().any(|url| url == r.id()));
        }
        self.resources.extend(patch.resources_added);

        if let Some(pending) = patch.pending_deletions {
            self.pending_deletions = pending;
        }
    }

    pub fn resource(&self, url: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id() == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::canvas::{QuoteArtifact, StepsArtifact};

    fn quote(text: &str) -> Artifact {
        Artifact::Quote(QuoteArtifact {
            quote: text.into(),
            source: "s".into(),
            context: String::new(),
        })
    }

    #[test]
    fn messages_and_logs_append() {
        let mut state = WorkState::default();
        state.apply(
            StatePatch::new()
                .with_message(ChatMessage::user("one"))
                .with_log(LogEntry::info("first")),
        );
        state.apply(
            StatePatch::new()
                .with_message(ChatMessage::user("two"))
                .with_log(LogEntry::done("second")),
        );
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].text(), "two");
        assert_eq!(state.logs, vec![LogEntry::info("first"), LogEntry::done("second")]);
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut state = WorkState::default();
        state.resources.push(Resource::new("https://a", "A", ""));
        state.pending_deletions = vec!["https://a".into()];
        state.apply(StatePatch::new());
        assert_eq!(state.resources.len(), 1);
        assert_eq!(state.pending_deletions, vec!["https://a".to_string()]);
        assert!(StatePatch::new().is_empty());
    }

    #[test]
    fn artifact_slot_replaces_only_its_kind() {
        let mut state = WorkState::default();
        let steps = Artifact::Steps(StepsArtifact {
            title: "How".into(),
            steps: vec!["a".into()],
            description: String::new(),
        });
        state.apply(StatePatch {
            artifacts: vec![quote("first"), steps.clone()],
            artifact_history: vec![quote("first"), steps.clone()],
            ..StatePatch::default()
        });
        state.apply(StatePatch {
            artifacts: vec![quote("second")],
            artifact_history: vec![quote("second")],
            ..StatePatch::default()
        });

        assert_eq!(state.artifacts.len(), 2);
        assert_eq!(state.artifacts.get(ArtifactKind::Quote), Some(&quote("second")));
        assert_eq!(state.artifacts.get(ArtifactKind::Steps), Some(&steps));
        assert_eq!(state.artifact_history.len(), 3);
    }

    #[test]
    fn resources_are_removed_by_url() {
        let mut state = WorkState::default();
        state.apply(StatePatch {
            resources_added: vec![
                Resource::new("https://a", "A", ""),
                Resource::new("https://b", "B", ""),
            ],
            ..StatePatch::default()
        });
        state.apply(StatePatch {
            resources_removed: vec!["https://a".into(), "https://missing".into()],
            ..StatePatch::default()
        });
        assert_eq!(state.resources.len(), 1);
        assert!(state.resource("https://b").is_some());
        assert!(state.resource("https://a").is_none());
    }

    #[test]
    fn document_replaces() {
        let mut state = WorkState::default();
        state.apply(StatePatch {
            document: Some(Document {
                title: "Draft".into(),
                content: "v1".into(),
            }),
            ..StatePatch::default()
        });
        state.apply(StatePatch {
            document: Some(Document {
                title: "Final".into(),
                content: "v2".into(),
            }),
            ..StatePatch::default()
        });
        assert_eq!(state.document.title, "Final");
    }

    #[test]
    fn state_survives_json() {
        let mut state = WorkState::default();
        state.apply(StatePatch {
            messages: vec![ChatMessage::user("hi")],
            artifacts: vec![quote("q")],
            ..StatePatch::default()
        });
        let json = serde_json::to_string(&state).unwrap();
        let back: WorkState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.messages.len(), 1);
        assert_eq!(back.artifacts, state.artifacts);
    }
}
