//! Bounded-depth project file listing, cached per project root with a
//! 5-minute TTL measured from generation time.

use std::path::Path;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::error::Result;
use crate::limits::{parse_secs, DEFAULT_TREE_TTL};
use crate::scanner::FileScanner;

pub const DEFAULT_TREE_MAX_DEPTH: usize = 4;

pub struct FileTreeCache {
    cache: TtlCache<String>,
    max_depth: usize,
}

impl Default for FileTreeCache {
    fn default() -> Self {
        let ttl = parse_secs(
            std::env::var("NOTEFLOW_TREE_TTL_SECS").ok().as_deref(),
            DEFAULT_TREE_TTL,
        );
        Self::with_ttl(ttl, DEFAULT_TREE_MAX_DEPTH)
    }
}

impl FileTreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration, max_depth: usize) -> Self {
        Self {
            cache: TtlCache::new(ttl),
            max_depth,
        }
    }

    /// Produce the tree text for `project_root`, serving the cached copy
    /// when it is still fresh. The primary indented listing and the flat
    /// fallback populate the same cache slot.
    pub async fn generate(&self, project_root: &Path) -> Result<String> {
        let key = project_root.to_string_lossy().into_owned();
        if let Some(tree) = self.cache.get(&key) {
            log::debug!("File tree cache hit for {key}");
            return Ok(tree);
        }

        let root = project_root.to_path_buf();
        let max_depth = self.max_depth;
        let tree = tokio::task::spawn_blocking(move || {
            let rendered = render_tree(&root, max_depth);
            if rendered.trim().is_empty() {
                log::warn!(
                    "Tree listing unavailable for {}; falling back to flat enumeration",
                    root.display()
                );
                render_flat(&root, max_depth)
            } else {
                rendered
            }
        })
        .await
        .map_err(|err| std::io::Error::other(err.to_string()))?;

        self.cache.put(&key, tree.clone());
        Ok(tree)
    }
}

fn render_tree(root: &Path, max_depth: usize) -> String {
    let scanner = FileScanner::new(root, max_depth);
    let mut out = String::new();
    for entry in scanner.scan() {
        let Some(name) = entry.path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        out.push_str(&"  ".repeat(entry.depth.saturating_sub(1)));
        out.push_str(name);
        if entry.is_dir {
            out.push('/');
        }
        out.push('\n');
    }
    out
}

fn render_flat(root: &Path, max_depth: usize) -> String {
    let scanner = FileScanner::new(root, max_depth);
    let mut out = String::new();
    for path in scanner.scan_flat() {
        let rel = path.strip_prefix(root).unwrap_or(&path);
        out.push_str(&rel.to_string_lossy().replace('\\', "/"));
        out.push('\n');
    }
    out
}
