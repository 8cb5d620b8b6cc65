//! One synthesis cycle: diff → discover → structure → merge → persist.
//!
//! The full sequence is a single logical unit of work per invocation. The
//! caller must guarantee at most one in-flight cycle per project; two
//! concurrent cycles would diff against a stale baseline and one append
//! would be lost when the other's merge result is persisted.

use async_trait::async_trait;
use noteflow_context::ContextDiscoveryService;
use noteflow_protocol::contracts::{StructuringRequest, StructuringResponse};
use noteflow_protocol::json::parse_embedded;
use noteflow_protocol::ContextFileRef;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::diff::diff;
use crate::error::{PipelineError, Result};
use crate::store::NotesStore;
use crate::synthesizer::merge;

/// External text-structuring capability. The reply is free text; the first
/// balanced JSON object span carries the structured payload.
#[async_trait]
pub trait StructuringCapability: Send + Sync {
    async fn structure(&self, request: &StructuringRequest) -> anyhow::Result<String>;
}

/// Identity of one formatting session. The surrounding application flips
/// `cancel()` when the user switches projects mid-flight so a late-arriving
/// result is discarded instead of applied.
#[derive(Clone)]
pub struct SynthesisSession {
    project_root: PathBuf,
    active: Arc<AtomicBool>,
}

impl SynthesisSession {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Outcome of one successful cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub appended: usize,
    pub total_tasks: usize,
    pub context_files: Vec<ContextFileRef>,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub warnings: Vec<String>,
}

pub struct Pipeline {
    structuring: Arc<dyn StructuringCapability>,
    discovery: ContextDiscoveryService,
    store: NotesStore,
}

impl Pipeline {
    pub fn new(
        structuring: Arc<dyn StructuringCapability>,
        discovery: ContextDiscoveryService,
        store: NotesStore,
    ) -> Self {
        Self {
            structuring,
            discovery,
            store,
        }
    }

    /// Run one cycle over `raw_text`, the full current buffer.
    ///
    /// On success the persisted collection grows by the response's tasks and
    /// the diff baseline advances to the full buffer. On any error past the
    /// diff stage the collection is left untouched.
    pub async fn run_cycle(
        &self,
        session: &SynthesisSession,
        raw_text: &str,
        voice_input: bool,
    ) -> Result<CycleReport> {
        let mut notes = self.store.load_or_init()?;

        let delta = diff(raw_text, &notes.last_formatted_raw)?;
        log::debug!("Delta is {} lines", delta.lines().count());

        // Discovery never blocks formatting; it degrades to empty context.
        let gathered = self
            .discovery
            .discover(&delta, session.project_root())
            .await;
        let provenance: Vec<ContextFileRef> = gathered
            .files
            .iter()
            .map(|file| ContextFileRef {
                path: file.path.clone(),
                grepped: file.was_grepped,
            })
            .collect();

        let request = StructuringRequest {
            delta,
            context: gathered.as_prompt_text(),
            voice_input,
        };
        let reply = self
            .structuring
            .structure(&request)
            .await
            .map_err(|err| PipelineError::Capability(err.to_string()))?;
        let response: StructuringResponse =
            parse_embedded(&reply).map_err(|err| PipelineError::Validation(err.to_string()))?;

        // The target may have changed while the calls were in flight;
        // re-validate immediately before the merge/write step.
        if !session.is_active() {
            log::info!(
                "Discarding structuring result for inactive project {}",
                session.project_root().display()
            );
            return Err(PipelineError::StaleSession);
        }

        let outcome = merge(&notes.tasks, &response, &provenance);
        notes.tasks = outcome.tasks;
        notes.last_formatted_raw = raw_text.to_string();
        notes.last_modified = noteflow_context::unix_ms_now();
        self.store.save(&notes)?;

        Ok(CycleReport {
            appended: outcome.appended,
            total_tasks: notes.tasks.len(),
            context_files: provenance,
            cache_hits: gathered.cache_hits,
            cache_misses: gathered.cache_misses,
            warnings: response.warnings,
        })
    }
}
