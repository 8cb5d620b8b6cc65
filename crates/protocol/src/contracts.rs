//! Wire contracts for the two external capabilities: text structuring and
//! file selection. Both are consumed as black-box request/response pairs.

use crate::TaskPriority;
use serde::{Deserialize, Serialize};

/// Request sent to the structuring capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuringRequest {
    /// The unprocessed portion of the note buffer.
    pub delta: String,
    /// Assembled project-file context, possibly empty.
    pub context: String,
    /// When true the capability is asked to be lenient about transcription
    /// artifacts (filler words, missing punctuation).
    pub voice_input: bool,
}

/// A dependency reference in a structuring response: either a textual title
/// or a zero-based index into the current batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyRef {
    Index(usize),
    Title(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTask {
    pub text: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub blocked_by: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<DependencyRef>,
    #[serde(default)]
    pub related_to: Vec<DependencyRef>,
    #[serde(default)]
    pub needs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort_estimate: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<RawTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSection {
    pub category: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub tasks: Vec<RawTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextUsed {
    pub file: String,
    #[serde(default)]
    pub reason: String,
}

/// Strict-JSON payload extracted from a structuring reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuringResponse {
    pub sections: Vec<ResponseSection>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_used: Option<Vec<ContextUsed>>,
}

impl StructuringResponse {
    pub fn total_tasks(&self) -> usize {
        self.sections.iter().map(|s| s.tasks.len()).sum()
    }
}

/// One file proposed by the file-selection capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredFile {
    pub file: String,
    #[serde(rename = "readFully", default)]
    pub read_fully: bool,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// File-selection response. `explicit` files were mentioned in the note
/// text and must always be included; `discovered` files are the
/// capability's own suggestions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionResponse {
    pub explicit: Vec<String>,
    pub discovered: Vec<DiscoveredFile>,
    #[serde(default)]
    pub reasoning: String,
}

impl SelectionResponse {
    /// Empty result carrying the reason discovery degraded. Used when the
    /// selection capability misbehaves; never an error.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            explicit: Vec::new(),
            discovered: Vec::new(),
            reasoning: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dependency_ref_accepts_titles_and_indexes() {
        let refs: Vec<DependencyRef> =
            serde_json::from_str(r#"["Fix login", 0, 2]"#).unwrap();
        assert_eq!(
            refs,
            vec![
                DependencyRef::Title("Fix login".to_string()),
                DependencyRef::Index(0),
                DependencyRef::Index(2),
            ]
        );
    }

    #[test]
    fn selection_response_parses_read_fully_camel_case() {
        let raw = r#"{
            "explicit": ["src/auth.ts"],
            "discovered": [
                {"file": "src/token.ts", "readFully": true},
                {"file": "src/session.ts", "keywords": ["refresh", "expiry"]}
            ],
            "reasoning": "auth work"
        }"#;
        let parsed: SelectionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.explicit, vec!["src/auth.ts"]);
        assert!(parsed.discovered[0].read_fully);
        assert!(!parsed.discovered[1].read_fully);
        assert_eq!(parsed.discovered[1].keywords, vec!["refresh", "expiry"]);
    }

    #[test]
    fn structuring_response_counts_tasks_across_sections() {
        let raw = r#"{
            "sections": [
                {"category": "Bugs", "priority": "high", "tasks": [
                    {"text": "fix login bug", "title": "Fix login", "notes": [],
                     "blocked_by": [], "needs": []}
                ]},
                {"category": "Features", "priority": "medium", "tasks": [
                    {"text": "add dark mode", "title": "Dark mode", "notes": [],
                     "blocked_by": [], "needs": [], "tags": ["ui"]}
                ]}
            ],
            "warnings": []
        }"#;
        let parsed: StructuringResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.total_tasks(), 2);
        assert_eq!(parsed.sections[0].priority, TaskPriority::High);
    }
}
