//! Keyword-windowed partial file content for large files: every keyword
//! match is returned with surrounding context, overlapping windows merged,
//! under a fixed output-line cap.

use regex::RegexBuilder;
use std::path::Path;

use crate::error::{ContextError, Result};

pub const CONTEXT_LINES: usize = 5;
pub const MAX_OUTPUT_LINES: usize = 300;

const HUNK_SEPARATOR: &str = "---";

#[derive(Debug, Clone)]
struct LineRange {
    start: usize,
    end: usize,
}

pub struct GrepExtractor;

impl GrepExtractor {
    /// Search `path` for any of `keywords`, returning each match with
    /// context. No matches is not an error: an explicit marker string is
    /// returned, distinguishable from an extraction failure.
    pub async fn extract(path: &Path, keywords: &[String]) -> Result<String> {
        let content = tokio::fs::read_to_string(path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ContextError::NotFound(path.display().to_string())
            } else {
                ContextError::Io(err)
            }
        })?;

        let pattern = keywords
            .iter()
            .map(|kw| regex::escape(kw.trim()))
            .filter(|kw| !kw.is_empty())
            .collect::<Vec<_>>()
            .join("|");
        if pattern.is_empty() {
            return Ok(no_matches_marker(keywords));
        }
        let regex = RegexBuilder::new(&pattern).case_insensitive(true).build()?;

        let lines: Vec<&str> = content.lines().collect();
        let match_lines: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| regex.is_match(line))
            .map(|(idx, _)| idx)
            .collect();

        if match_lines.is_empty() {
            return Ok(no_matches_marker(keywords));
        }

        let ranges = merge_ranges(&match_lines, lines.len());
        Ok(render_hunks(&lines, &ranges))
    }
}

fn no_matches_marker(keywords: &[String]) -> String {
    format!("No matches found for keywords: {}", keywords.join(", "))
}

/// Expand each match to ±CONTEXT_LINES and merge windows that touch or
/// overlap, preserving file order.
fn merge_ranges(match_lines: &[usize], total_lines: usize) -> Vec<LineRange> {
    let mut merged: Vec<LineRange> = Vec::new();
    for &line in match_lines {
        let start = line.saturating_sub(CONTEXT_LINES);
        let end = (line + CONTEXT_LINES).min(total_lines.saturating_sub(1));
        match merged.last_mut() {
            Some(last) if start <= last.end + 1 => {
                last.end = last.end.max(end);
            }
            _ => merged.push(LineRange { start, end }),
        }
    }
    merged
}

fn render_hunks(lines: &[&str], ranges: &[LineRange]) -> String {
    let mut out: Vec<String> = Vec::new();
    'ranges: for (idx, range) in ranges.iter().enumerate() {
        if idx > 0 {
            if out.len() + 1 >= MAX_OUTPUT_LINES {
                break;
            }
            out.push(HUNK_SEPARATOR.to_string());
        }
        for line_idx in range.start..=range.end {
            if out.len() >= MAX_OUTPUT_LINES {
                break 'ranges;
            }
            // 1-based line numbers, matching what editors display.
            out.push(format!("{}: {}", line_idx + 1, lines[line_idx]));
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn write_numbered(dir: &tempfile::TempDir, name: &str, total: usize) -> std::path::PathBuf {
        let body: String = (1..=total).map(|n| format!("line {n}\n")).collect();
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn returns_match_with_surrounding_context() {
        let temp = tempdir().unwrap();
        let mut body = String::new();
        for n in 1..=30 {
            if n == 15 {
                body.push_str("fn refresh_token() {\n");
            } else {
                body.push_str(&format!("line {n}\n"));
            }
        }
        let path = temp.path().join("auth.ts");
        fs::write(&path, body).unwrap();

        let text = GrepExtractor::extract(&path, &["refresh_token".to_string()])
            .await
            .unwrap();

        assert!(text.contains("15: fn refresh_token() {"));
        // ±5 lines of context around the match.
        assert!(text.contains("10: line 10"));
        assert!(text.contains("20: line 20"));
        assert!(!text.contains("9: line 9"));
        assert!(!text.contains("21: line 21"));
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("f.txt");
        fs::write(&path, "TokenRefresh here\n").unwrap();

        let text = GrepExtractor::extract(&path, &["tokenrefresh".to_string()])
            .await
            .unwrap();
        assert!(text.contains("TokenRefresh here"));
    }

    #[tokio::test]
    async fn overlapping_windows_are_merged() {
        let temp = tempdir().unwrap();
        let mut body = String::new();
        for n in 1..=20 {
            if n == 8 || n == 11 {
                body.push_str(&format!("match on {n}\n"));
            } else {
                body.push_str(&format!("line {n}\n"));
            }
        }
        let path = temp.path().join("f.txt");
        fs::write(&path, body).unwrap();

        let text = GrepExtractor::extract(&path, &["match".to_string()])
            .await
            .unwrap();
        assert!(!text.contains(HUNK_SEPARATOR));
        assert!(text.contains("8: match on 8"));
        assert!(text.contains("11: match on 11"));
    }

    #[tokio::test]
    async fn no_matches_returns_marker_not_error() {
        let temp = tempdir().unwrap();
        let path = write_numbered(&temp, "f.txt", 5);

        let text = GrepExtractor::extract(&path, &["absent".to_string(), "gone".to_string()])
            .await
            .unwrap();
        assert_eq!(text, "No matches found for keywords: absent, gone");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("nope.txt");
        let err = GrepExtractor::extract(&missing, &["x".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::NotFound(_)));
    }

    #[tokio::test]
    async fn output_is_capped_at_max_lines() {
        let temp = tempdir().unwrap();
        // Every line matches, so the uncapped output would be 1000 lines.
        let body: String = (1..=1000).map(|n| format!("match {n}\n")).collect();
        let path = temp.path().join("big.txt");
        fs::write(&path, body).unwrap();

        let text = GrepExtractor::extract(&path, &["match".to_string()])
            .await
            .unwrap();
        assert_eq!(text.lines().count(), MAX_OUTPUT_LINES);
    }
}
