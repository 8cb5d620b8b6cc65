//! Context assembly for the synthesis pipeline: bounded-depth file tree
//! listing, age/mtime-bounded content caching, keyword-windowed extraction
//! for large files, and budget-enforced discovery orchestration.

pub mod cache;
pub mod discovery;
pub mod error;
pub mod grep;
pub mod limits;
pub mod scanner;
pub mod tree;

pub use cache::{file_mtime_ms, unix_ms_now, ContentCache, TtlCache};
pub use discovery::{ContextDiscoveryService, FileSelector};
pub use error::{ContextError, Result};
pub use grep::GrepExtractor;
pub use limits::DiscoveryLimits;
pub use scanner::FileScanner;
pub use tree::FileTreeCache;
