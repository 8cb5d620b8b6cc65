use serde::{Deserialize, Serialize};

pub mod contracts;
pub mod json;

pub const NOTES_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    #[default]
    Medium,
    Low,
}

/// Provenance: which file informed a task, and whether it was grep-extracted
/// rather than read whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFileRef {
    pub path: String,
    #[serde(default)]
    pub grepped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TaskMetadata {
    /// Title assigned by the structuring capability. Retained so later
    /// batches can resolve textual dependency references against tasks
    /// that already exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    /// The capability's first suggestion, kept even after user edits.
    #[serde(default)]
    pub original_priority: TaskPriority,
    #[serde(default)]
    pub priority_edited: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Legacy dependency field, kept for older structuring responses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effort_estimate: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,
    /// True once the task was produced or confirmed by the structuring
    /// capability.
    #[serde(default)]
    pub formatted: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_files: Vec<ContextFileRef>,
    /// Explicit nested tasks from the structuring response. Distinct from
    /// `TaskNode::children`, which is the display tree.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<TaskNode>,
}

/// A unit of work. Created only by the synthesizer; mutated afterwards by
/// user edits outside this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    /// Opaque, generated at creation, never reused.
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub indent: u32,
    /// Ordered, owned sub-nodes for hierarchical display.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TaskNode>,
    #[serde(default)]
    pub metadata: TaskMetadata,
}

/// Persisted aggregate for one project.
///
/// `last_formatted_raw` is the diff baseline: always the full buffer text
/// most recently passed through the synthesis pipeline, not a running log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotesFile {
    pub version: u32,
    pub project_path: String,
    /// Unix milliseconds of the last successful merge.
    pub last_modified: u64,
    #[serde(default)]
    pub tasks: Vec<TaskNode>,
    #[serde(default)]
    pub last_formatted_raw: String,
}

impl NotesFile {
    pub fn new(project_path: impl Into<String>) -> Self {
        Self {
            version: NOTES_FILE_VERSION,
            project_path: project_path.into(),
            last_modified: 0,
            tasks: Vec::new(),
            last_formatted_raw: String::new(),
        }
    }
}

/// One file's worth of assembled context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContext {
    pub path: String,
    pub content: String,
    pub line_count: usize,
    #[serde(default)]
    pub was_grepped: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_keywords: Vec<String>,
}

/// Everything the discovery stage hands to the structuring call, plus
/// counters for budget accounting and diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatheredContext {
    pub files: Vec<FileContext>,
    pub total_lines: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    #[serde(default)]
    pub reasoning: String,
}

impl GatheredContext {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Render the gathered files as one prompt-ready text block.
    pub fn as_prompt_text(&self) -> String {
        let mut out = String::new();
        for file in &self.files {
            if !out.is_empty() {
                out.push('\n');
            }
            let marker = if file.was_grepped {
                " (relevant excerpts)"
            } else {
                ""
            };
            out.push_str(&format!("=== {}{} ===\n", file.path, marker));
            out.push_str(&file.content);
            if !file.content.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}
