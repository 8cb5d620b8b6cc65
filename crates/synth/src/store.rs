//! Persistence for the per-project task collection. Reads at cycle start,
//! writes atomically (temp file then rename) at cycle end so a crash
//! mid-cycle cannot leave a partially written collection.

use noteflow_protocol::{NotesFile, NOTES_FILE_VERSION};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

pub const NOTEFLOW_DIR_NAME: &str = ".noteflow";
const NOTES_FILE_NAME: &str = "notes_v1.json";
const CACHE_DIR_NAME: &str = "cache";

pub struct NotesStore {
    root: PathBuf,
}

impl NotesStore {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root: project_root.as_ref().to_path_buf(),
        }
    }

    pub fn notes_path(&self) -> PathBuf {
        self.root.join(NOTEFLOW_DIR_NAME).join(NOTES_FILE_NAME)
    }

    /// Content-cache directory shared with the discovery stage.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(NOTEFLOW_DIR_NAME).join(CACHE_DIR_NAME)
    }

    pub fn load_or_init(&self) -> Result<NotesFile> {
        let path = self.notes_path();
        if !path.exists() {
            return Ok(NotesFile::new(self.root.to_string_lossy()));
        }
        let raw = std::fs::read_to_string(&path)?;
        let mut notes: NotesFile = serde_json::from_str(&raw)
            .map_err(|err| PipelineError::Validation(format!("corrupt notes file: {err}")))?;
        notes.version = NOTES_FILE_VERSION;
        Ok(notes)
    }

    pub fn save(&self, notes: &NotesFile) -> Result<()> {
        let path = self.notes_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(notes)?;
        write_atomic(&path, &bytes)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("notes path has no parent"))?;
    let tmp = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|s| s.to_str()).unwrap_or("notes"),
        std::process::id()
    ));

    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    std::fs::rename(&tmp, path)?;
    Ok(())
}
