//! Conversion of a validated structuring response into task nodes, with
//! dependency reference resolution and strictly additive merge.

use noteflow_context::unix_ms_now;
use noteflow_protocol::contracts::{DependencyRef, RawTask, StructuringResponse};
use noteflow_protocol::{ContextFileRef, TaskMetadata, TaskNode, TaskPriority};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct MergeOutcome {
    pub tasks: Vec<TaskNode>,
    pub appended: usize,
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Opaque task id: unique per creation, never reused.
fn fresh_task_id(text: &str) -> String {
    let nonce = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(unix_ms_now().to_le_bytes());
    hasher.update(nonce.to_le_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in &digest[..8] {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("task-{hex}")
}

/// Merge the response into `existing`. Strictly additive: existing tasks are
/// never reordered, mutated, or removed; new tasks are appended in response
/// order (section order, then task order within section).
pub fn merge(
    existing: &[TaskNode],
    response: &StructuringResponse,
    provenance: &[ContextFileRef],
) -> MergeOutcome {
    let batch: Vec<(TaskPriority, &RawTask)> = response
        .sections
        .iter()
        .flat_map(|section| section.tasks.iter().map(move |task| (section.priority, task)))
        .collect();

    let mut new_nodes: Vec<TaskNode> = batch
        .iter()
        .map(|(priority, raw)| build_node(raw, *priority, 0, provenance))
        .collect();

    let resolver = RefResolver::new(existing, &batch, &new_nodes);
    for ((_, raw), node) in batch.iter().zip(new_nodes.iter_mut()) {
        resolver.assign(raw, node);
    }

    let mut tasks = existing.to_vec();
    let appended = new_nodes.len();
    tasks.extend(new_nodes);

    log::info!(
        "Merged {appended} new tasks into collection of {} (now {})",
        existing.len(),
        tasks.len()
    );
    MergeOutcome { tasks, appended }
}

fn build_node(
    raw: &RawTask,
    priority: TaskPriority,
    indent: u32,
    provenance: &[ContextFileRef],
) -> TaskNode {
    let subtasks = raw
        .subtasks
        .iter()
        .map(|sub| build_node(sub, priority, indent + 1, provenance))
        .collect();

    TaskNode {
        id: fresh_task_id(&raw.text),
        text: raw.text.clone(),
        checked: false,
        indent,
        children: Vec::new(),
        metadata: TaskMetadata {
            title: (!raw.title.trim().is_empty()).then(|| raw.title.clone()),
            priority,
            original_priority: priority,
            priority_edited: false,
            depends_on: Vec::new(),
            blocked_by: Vec::new(),
            related_to: Vec::new(),
            notes: raw.notes.clone(),
            deadline: raw.deadline.clone(),
            effort_estimate: raw.effort_estimate.clone(),
            tags: raw.tags.clone(),
            needs: raw.needs.clone(),
            formatted: true,
            context_files: provenance.to_vec(),
            subtasks,
        },
    }
}

/// Resolves dependency references against existing tasks first, then batch
/// siblings. Integer indexes resolve only against the current batch.
/// Anything unresolved is preserved verbatim so information is never lost.
struct RefResolver {
    existing_titles: HashMap<String, String>,
    existing_texts: HashMap<String, String>,
    batch_titles: HashMap<String, String>,
    batch_ids: Vec<String>,
}

impl RefResolver {
    fn new(existing: &[TaskNode], batch: &[(TaskPriority, &RawTask)], nodes: &[TaskNode]) -> Self {
        let mut existing_titles = HashMap::new();
        let mut existing_texts = HashMap::new();
        for task in existing {
            if let Some(title) = task.metadata.title.as_deref() {
                existing_titles
                    .entry(title.trim().to_lowercase())
                    .or_insert_with(|| task.id.clone());
            }
            existing_texts
                .entry(task.text.trim().to_lowercase())
                .or_insert_with(|| task.id.clone());
        }

        let mut batch_titles = HashMap::new();
        for ((_, raw), node) in batch.iter().zip(nodes.iter()) {
            let title = raw.title.trim().to_lowercase();
            if !title.is_empty() {
                batch_titles.entry(title).or_insert_with(|| node.id.clone());
            }
        }

        Self {
            existing_titles,
            existing_texts,
            batch_titles,
            batch_ids: nodes.iter().map(|node| node.id.clone()).collect(),
        }
    }

    fn assign(&self, raw: &RawTask, node: &mut TaskNode) {
        node.metadata.depends_on = raw
            .depends_on
            .iter()
            .map(|dep| self.resolve(dep))
            .collect();
        node.metadata.related_to = raw
            .related_to
            .iter()
            .map(|dep| self.resolve(dep))
            .collect();
        // Legacy field carries titles only.
        node.metadata.blocked_by = raw
            .blocked_by
            .iter()
            .map(|title| self.resolve_title(title))
            .collect();

        for (sub_raw, sub_node) in raw.subtasks.iter().zip(node.metadata.subtasks.iter_mut()) {
            self.assign(sub_raw, sub_node);
        }
    }

    fn resolve(&self, dep: &DependencyRef) -> String {
        match dep {
            // Indexes are zero-based positions within the current batch,
            // never offsets into the existing collection.
            DependencyRef::Index(idx) => self
                .batch_ids
                .get(*idx)
                .cloned()
                .unwrap_or_else(|| idx.to_string()),
            DependencyRef::Title(title) => self.resolve_title(title),
        }
    }

    fn resolve_title(&self, title: &str) -> String {
        let key = title.trim().to_lowercase();
        self.existing_titles
            .get(&key)
            .or_else(|| self.existing_texts.get(&key))
            .or_else(|| self.batch_titles.get(&key))
            .cloned()
            .unwrap_or_else(|| title.to_string())
    }
}
