//! Whole-line, set-based diff of the note buffer against the last formatted
//! baseline. Not a positional diff: editing a line produces a "new" line,
//! and the old line's text permanently leaves consideration.

use std::collections::HashSet;

use crate::error::{PipelineError, Result};

/// Lines present in `current_raw` but absent from the line set of
/// `last_processed_raw`, in their order of appearance. Blank lines are
/// ignored on both sides. An empty result is [`PipelineError::NoChanges`].
pub fn diff(current_raw: &str, last_processed_raw: &str) -> Result<String> {
    let processed: HashSet<&str> = non_blank_lines(last_processed_raw).collect();

    let new_lines: Vec<&str> = non_blank_lines(current_raw)
        .filter(|line| !processed.contains(line))
        .collect();

    if new_lines.is_empty() {
        return Err(PipelineError::NoChanges);
    }
    Ok(new_lines.join("\n"))
}

fn non_blank_lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.lines().map(str::trim).filter(|line| !line.is_empty())
}
