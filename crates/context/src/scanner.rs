use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One entry produced by a project walk, relative-depth included so callers
/// can render an indented tree without re-deriving it from the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub path: PathBuf,
    pub depth: usize,
    pub is_dir: bool,
}

/// Bounded-depth project walker used for tree listing and candidate
/// enumeration. Skips build/dependency/VCS directories on both walk paths.
pub struct FileScanner {
    root: PathBuf,
    max_depth: usize,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>, max_depth: usize) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_depth,
        }
    }

    /// Primary walk: gitignore-aware, directories included, sorted so the
    /// rendered tree is stable across runs.
    pub fn scan(&self) -> Vec<ScanEntry> {
        let mut entries = Vec::new();

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .max_depth(Some(self.max_depth))
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .sort_by_file_name(|a, b| a.cmp(b));
        builder.filter_entry(|entry| !is_excluded_name(entry.file_name().to_string_lossy().as_ref()));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    if entry.depth() == 0 {
                        continue;
                    }
                    let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                    entries.push(ScanEntry {
                        path: entry.path().to_path_buf(),
                        depth: entry.depth(),
                        is_dir,
                    });
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        entries
    }

    /// Fallback walk: flat recursive file enumeration under the same
    /// exclusions and depth bound, used when the primary walk produces
    /// nothing usable.
    pub fn scan_flat(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .max_depth(self.max_depth)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !is_excluded_name(entry.file_name().to_string_lossy().as_ref())
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        files
    }
}

fn is_excluded_name(name: &str) -> bool {
    let lowered = name.to_lowercase();
    EXCLUDED_DIRS.iter().any(|candidate| candidate == &lowered)
}

/// Package-manager caches, VCS metadata, and build output. Never worth
/// sending to the structuring capability.
const EXCLUDED_DIRS: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    ".noteflow",
    // caches / builds
    ".cache",
    "node_modules",
    ".next",
    ".turbo",
    "build",
    "dist",
    "out",
    "coverage",
    "target",
    ".venv",
    "venv",
    "__pycache__",
    // vendored dependencies
    "vendor",
    "third_party",
    "third-party",
];

#[cfg(test)]
mod tests {
    use super::FileScanner;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn skips_dependency_directories() {
        let temp = tempdir().unwrap();
        let deps = temp.path().join("node_modules").join("left-pad");
        fs::create_dir_all(&deps).unwrap();
        fs::write(deps.join("index.js"), b"module.exports = {}").unwrap();
        fs::write(temp.path().join("main.rs"), b"fn main() {}").unwrap();

        let scanner = FileScanner::new(temp.path(), 4);
        let entries = scanner.scan();

        assert!(entries
            .iter()
            .all(|e| !e.path.to_string_lossy().contains("node_modules")));
        assert!(entries.iter().any(|e| e.path.ends_with("main.rs")));
    }

    #[test]
    fn respects_depth_bound() {
        let temp = tempdir().unwrap();
        let deep = temp.path().join("a").join("b").join("c").join("d");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("too_deep.txt"), b"x").unwrap();
        fs::write(temp.path().join("shallow.txt"), b"x").unwrap();

        let scanner = FileScanner::new(temp.path(), 2);
        let entries = scanner.scan();

        assert!(entries
            .iter()
            .all(|e| !e.path.to_string_lossy().contains("too_deep")));
        assert!(entries.iter().any(|e| e.path.ends_with("shallow.txt")));
    }

    #[test]
    fn flat_scan_lists_files_only() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src").join("lib.rs"), b"").unwrap();
        fs::create_dir_all(temp.path().join("target")).unwrap();
        fs::write(temp.path().join("target").join("junk.o"), b"").unwrap();

        let scanner = FileScanner::new(temp.path(), 4);
        let files = scanner.scan_flat();

        assert!(files.iter().any(|p| p.ends_with("lib.rs")));
        assert!(files.iter().all(|p| !p.to_string_lossy().contains("target")));
        assert!(files.iter().all(|p| p.is_file()));
    }
}
