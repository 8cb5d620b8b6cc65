//! Incremental task synthesis: whole-line diffing of the note buffer,
//! conversion of structuring responses into task nodes, additive merge into
//! the persisted collection, and cycle orchestration.

pub mod diff;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod synthesizer;

pub use diff::diff;
pub use error::{PipelineError, Result};
pub use pipeline::{CycleReport, Pipeline, StructuringCapability, SynthesisSession};
pub use store::NotesStore;
pub use synthesizer::{merge, MergeOutcome};
