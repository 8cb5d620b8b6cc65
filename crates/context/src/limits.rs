//! Discovery budgets. The file-selection capability is asked to self-limit,
//! but every limit here is enforced locally as well because an external
//! capability's adherence is not guaranteed.

use std::time::Duration;

const MAX_DISCOVERED_FILES_CEILING: usize = 32;
const LINE_BUDGET_CEILING: usize = 20_000;

pub const DEFAULT_MAX_DISCOVERED_FILES: usize = 8;
pub const DEFAULT_TOTAL_LINE_BUDGET: usize = 2_000;
pub const DEFAULT_MAX_FULL_READ_LINES: usize = 400;
pub const DEFAULT_HEAD_FALLBACK_LINES: usize = 100;

pub const DEFAULT_TREE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CONTENT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryLimits {
    /// Hard cap on capability-discovered files per request.
    pub max_discovered_files: usize,
    /// Approximate per-request content budget across all files.
    pub total_line_budget: usize,
    /// Per-file cap for `readFully` loads.
    pub max_full_read_lines: usize,
    /// Head-truncated read size for files with no keywords and no full flag.
    pub head_fallback_lines: usize,
}

impl Default for DiscoveryLimits {
    fn default() -> Self {
        Self {
            max_discovered_files: DEFAULT_MAX_DISCOVERED_FILES,
            total_line_budget: DEFAULT_TOTAL_LINE_BUDGET,
            max_full_read_lines: DEFAULT_MAX_FULL_READ_LINES,
            head_fallback_lines: DEFAULT_HEAD_FALLBACK_LINES,
        }
    }
}

impl DiscoveryLimits {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_discovered_files: parse_limit(
                std::env::var("NOTEFLOW_MAX_DISCOVERED_FILES").ok().as_deref(),
                defaults.max_discovered_files,
                MAX_DISCOVERED_FILES_CEILING,
            ),
            total_line_budget: parse_limit(
                std::env::var("NOTEFLOW_LINE_BUDGET").ok().as_deref(),
                defaults.total_line_budget,
                LINE_BUDGET_CEILING,
            ),
            max_full_read_lines: parse_limit(
                std::env::var("NOTEFLOW_MAX_FULL_READ_LINES").ok().as_deref(),
                defaults.max_full_read_lines,
                LINE_BUDGET_CEILING,
            ),
            head_fallback_lines: parse_limit(
                std::env::var("NOTEFLOW_HEAD_FALLBACK_LINES").ok().as_deref(),
                defaults.head_fallback_lines,
                LINE_BUDGET_CEILING,
            ),
        }
    }
}

pub(crate) fn parse_limit(raw: Option<&str>, default_value: usize, ceiling: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(1, ceiling)
}

pub(crate) fn parse_secs(raw: Option<&str>, default_value: Duration) -> Duration {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default_value)
}
