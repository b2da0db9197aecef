//! Business records the canvas graph reads and writes: reference resources,
//! the blog document, audit log entries, and the typed artifact payloads.

use serde::{Deserialize, Serialize};

/// A reference item the model can cite. Identified by its `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Resource {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.url
    }
}

/// A resource paired with the text fetched for it during one chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedResource {
    #[serde(flatten)]
    pub resource: Resource,
    pub content: String,
}

/// The blog post being written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub content: String,
}

/// One audit entry. `done = false` is informational or in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub done: bool,
}

impl LogEntry {
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            done: true,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            done: false,
        }
    }
}

/// Discriminator for the artifact slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Quote,
    Steps,
    Comparison,
    Statistics,
    BarChart,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Quote,
        ArtifactKind::Steps,
        ArtifactKind::Comparison,
        ArtifactKind::Statistics,
        ArtifactKind::BarChart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Steps => "steps",
            Self::Comparison => "comparison",
            Self::Statistics => "statistics",
            Self::BarChart => "bar-chart",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteArtifact {
    pub quote: String,
    pub source: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepsArtifact {
    pub title: String,
    pub steps: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonArtifact {
    pub title: String,
    pub left_title: String,
    pub left_side: Vec<String>,
    pub right_title: String,
    pub right_side: Vec<String>,
    pub comparison_aspect: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conclusion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticMetric {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsArtifact {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub stats: Vec<StatisticMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarMetric {
    pub value: i64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarChartArtifact {
    pub title: String,
    pub stats: Vec<BarMetric>,
}

/// A typed infographic payload, tagged with its kind on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    Quote(QuoteArtifact),
    Steps(StepsArtifact),
    Comparison(ComparisonArtifact),
    Statistics(StatisticsArtifact),
    BarChart(BarChartArtifact),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Quote(_) => ArtifactKind::Quote,
            Self::Steps(_) => ArtifactKind::Steps,
            Self::Comparison(_) => ArtifactKind::Comparison,
            Self::Statistics(_) => ArtifactKind::Statistics,
            Self::BarChart(_) => ArtifactKind::BarChart,
        }
    }

    /// Parse an untagged payload as the given kind.
    pub fn from_payload(
        kind: ArtifactKind,
        payload: serde_json::Value,
    ) -> serde_json::Result<Self> {
        Ok(match kind {
            ArtifactKind::Quote => Self::Quote(serde_json::from_value(payload)?),
            ArtifactKind::Steps => Self::Steps(serde_json::from_value(payload)?),
            ArtifactKind::Comparison => Self::Comparison(serde_json::from_value(payload)?),
            ArtifactKind::Statistics => Self::Statistics(serde_json::from_value(payload)?),
            ArtifactKind::BarChart => Self::BarChart(serde_json::from_value(payload)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn artifact_is_tagged_by_kind() {
        let artifact = Artifact::Quote(QuoteArtifact {
            quote: "Less is more".into(),
            source: "Mies".into(),
            context: String::new(),
        });
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["type"], "quote");
        assert_eq!(value["quote"], "Less is more");
    }

    #[test]
    fn bar_chart_tag_is_snake_case() {
        let value = json!({
            "type": "bar_chart",
            "title": "Adoption",
            "stats": [{"value": 40, "label": "2023"}]
        });
        let artifact: Artifact = serde_json::from_value(value).unwrap();
        assert_eq!(artifact.kind(), ArtifactKind::BarChart);
        assert_eq!(serde_json::to_value(ArtifactKind::BarChart).unwrap(), "bar_chart");
    }

    #[test]
    fn kind_display_names_are_hyphenated() {
        assert_eq!(ArtifactKind::BarChart.to_string(), "bar-chart");
        assert_eq!(ArtifactKind::Quote.to_string(), "quote");
    }

    #[test]
    fn from_payload_rejects_wrong_shape() {
        let err = Artifact::from_payload(ArtifactKind::Steps, json!({"title": "x"}));
        assert!(err.is_err());

        let ok = Artifact::from_payload(
            ArtifactKind::Steps,
            json!({"title": "Setup", "steps": ["install", "run"]}),
        )
        .unwrap();
        match ok {
            Artifact::Steps(s) => {
                assert_eq!(s.steps.len(), 2);
                assert!(s.description.is_empty());
            }
            other => panic!("expected steps, got {:?}", other.kind()),
        }
    }

    #[test]
    fn log_entry_constructors() {
        assert!(LogEntry::done("x").done);
        assert!(!LogEntry::info("x").done);
    }
}
