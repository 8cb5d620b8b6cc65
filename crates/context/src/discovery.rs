//! Orchestrates explicit + AI-discovered file selection under a budget.
//!
//! Discovery is best-effort by contract: a misbehaving selection capability,
//! a missing file, or an unreadable file degrades the result instead of
//! failing the cycle. The budgets in [`DiscoveryLimits`] are enforced here
//! regardless of what the selection response requests.

use async_trait::async_trait;
use noteflow_protocol::contracts::SelectionResponse;
use noteflow_protocol::json::parse_embedded;
use noteflow_protocol::{FileContext, GatheredContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{file_mtime_ms, ContentCache};
use crate::grep::GrepExtractor;
use crate::limits::DiscoveryLimits;
use crate::tree::FileTreeCache;

pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// External file-selection capability: given the project tree and the raw
/// note text, propose which files matter. Consumed as a black box; the
/// reply is free text carrying a JSON object.
#[async_trait]
pub trait FileSelector: Send + Sync {
    async fn select(&self, tree: &str, raw_text: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
enum LoadMode {
    Full,
    Grep(Vec<String>),
    Head,
}

#[derive(Debug, Clone)]
struct PlannedLoad {
    rel_path: String,
    mode: LoadMode,
}

pub struct ContextDiscoveryService {
    selector: Arc<dyn FileSelector>,
    tree_cache: FileTreeCache,
    content_cache: ContentCache,
    limits: DiscoveryLimits,
}

impl ContextDiscoveryService {
    pub fn new(selector: Arc<dyn FileSelector>, cache_dir: Option<PathBuf>) -> Self {
        Self {
            selector,
            tree_cache: FileTreeCache::new(),
            content_cache: ContentCache::new(cache_dir),
            limits: DiscoveryLimits::from_env(),
        }
    }

    pub fn with_limits(mut self, limits: DiscoveryLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Assemble context for `raw_text`. Never fails: every degradation path
    /// ends in a (possibly empty) result whose `reasoning` explains itself.
    pub async fn discover(&self, raw_text: &str, project_root: &Path) -> GatheredContext {
        let tree = match self.tree_cache.generate(project_root).await {
            Ok(tree) => tree,
            Err(err) => {
                log::warn!("File tree generation failed: {err}");
                String::new()
            }
        };

        let selection = match self.selector.select(&tree, raw_text).await {
            Ok(reply) => match parse_embedded::<SelectionResponse>(&reply) {
                Ok(selection) => selection,
                Err(err) => {
                    log::warn!("File selection response malformed: {err}");
                    SelectionResponse::degraded(format!("Error: {err}"))
                }
            },
            Err(err) => {
                log::warn!("File selection call failed: {err}");
                SelectionResponse::degraded(format!("Error: {err}"))
            }
        };

        self.load_selection(project_root, selection).await
    }

    async fn load_selection(
        &self,
        project_root: &Path,
        selection: SelectionResponse,
    ) -> GatheredContext {
        let plan = self.plan_loads(&selection);

        let mut gathered = GatheredContext {
            reasoning: selection.reasoning,
            ..GatheredContext::default()
        };
        let mut missing: Vec<String> = Vec::new();

        for load in plan {
            if gathered.total_lines >= self.limits.total_line_budget {
                log::debug!(
                    "Line budget exhausted ({} lines); skipping remaining files",
                    gathered.total_lines
                );
                break;
            }

            let Some(abs) = resolve_in_root(project_root, &load.rel_path) else {
                log::debug!("Skipping missing or out-of-root file {}", load.rel_path);
                missing.push(load.rel_path);
                continue;
            };

            match self.load_one(&abs, &load).await {
                Some((file, cache_hit)) => {
                    if cache_hit {
                        gathered.cache_hits += 1;
                    } else {
                        gathered.cache_misses += 1;
                    }
                    gathered.total_lines += file.line_count;
                    gathered.files.push(file);
                }
                None => missing.push(load.rel_path),
            }
        }

        if !missing.is_empty() {
            if !gathered.reasoning.is_empty() {
                gathered.reasoning.push_str("; ");
            }
            gathered
                .reasoning
                .push_str(&format!("skipped missing files: {}", missing.join(", ")));
        }

        let (hits, misses) = (gathered.cache_hits, gathered.cache_misses);
        log::info!(
            "Gathered {} files, {} lines ({hits} cache hits, {misses} misses)",
            gathered.files.len(),
            gathered.total_lines
        );
        gathered
    }

    /// Explicit files always come first and are read whole; discovered files
    /// follow, capped at the configured count.
    fn plan_loads(&self, selection: &SelectionResponse) -> Vec<PlannedLoad> {
        let mut plan: Vec<PlannedLoad> = selection
            .explicit
            .iter()
            .map(|path| PlannedLoad {
                rel_path: path.clone(),
                mode: LoadMode::Full,
            })
            .collect();

        if selection.discovered.len() > self.limits.max_discovered_files {
            log::warn!(
                "Selection proposed {} files; capping at {}",
                selection.discovered.len(),
                self.limits.max_discovered_files
            );
        }
        for discovered in selection
            .discovered
            .iter()
            .take(self.limits.max_discovered_files)
        {
            if plan.iter().any(|p| p.rel_path == discovered.file) {
                continue;
            }
            let keywords: Vec<String> = discovered
                .keywords
                .iter()
                .map(|kw| kw.trim().to_string())
                .filter(|kw| !kw.is_empty())
                .collect();
            let mode = if discovered.read_fully {
                LoadMode::Full
            } else if keywords.is_empty() {
                LoadMode::Head
            } else {
                LoadMode::Grep(keywords)
            };
            plan.push(PlannedLoad {
                rel_path: discovered.file.clone(),
                mode,
            });
        }
        plan
    }

    async fn load_one(&self, abs: &Path, load: &PlannedLoad) -> Option<(FileContext, bool)> {
        let mtime_ms = file_mtime_ms(abs);
        let variant = match &load.mode {
            LoadMode::Full => "full".to_string(),
            LoadMode::Head => "head".to_string(),
            LoadMode::Grep(keywords) => format!("grep:{}", keywords.join(",")),
        };
        let cache_key = ContentCache::key(&abs.to_string_lossy(), &variant, mtime_ms);

        let (content, cache_hit) = match self.content_cache.get(&cache_key).await {
            Some(content) => (content, true),
            None => {
                let content = match &load.mode {
                    LoadMode::Full => {
                        read_capped(abs, self.limits.max_full_read_lines).await.ok()?
                    }
                    LoadMode::Head => {
                        read_capped(abs, self.limits.head_fallback_lines).await.ok()?
                    }
                    LoadMode::Grep(keywords) => match GrepExtractor::extract(abs, keywords).await {
                        Ok(text) => text,
                        Err(err) => {
                            log::warn!("Extraction failed for {}: {err}", load.rel_path);
                            return None;
                        }
                    },
                };
                self.content_cache.put(&cache_key, &content).await;
                (content, false)
            }
        };

        let (was_grepped, matched_keywords) = match &load.mode {
            LoadMode::Grep(keywords) => (true, keywords.clone()),
            _ => (false, Vec::new()),
        };

        let file = FileContext {
            path: load.rel_path.clone(),
            line_count: content.lines().count(),
            content,
            was_grepped,
            matched_keywords,
        };
        Some((file, cache_hit))
    }
}

/// Resolve `rel` under `root`, rejecting escapes and missing files.
fn resolve_in_root(root: &Path, rel: &str) -> Option<PathBuf> {
    let root = root.canonicalize().ok()?;
    let candidate = root.join(rel.trim_start_matches('/'));
    let canonical = candidate.canonicalize().ok()?;
    if !canonical.starts_with(&root) {
        log::warn!("Rejecting file outside project root: {rel}");
        return None;
    }
    canonical.is_file().then_some(canonical)
}

async fn read_capped(path: &Path, max_lines: usize) -> std::io::Result<String> {
    let content = tokio::fs::read_to_string(path).await?;
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= max_lines {
        return Ok(content);
    }
    let mut out = lines[..max_lines].join("\n");
    out.push('\n');
    out.push_str(TRUNCATION_MARKER);
    Ok(out)
}
