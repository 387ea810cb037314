use std::path::Path;

use serde::{Deserialize, Serialize};

/// A 1-indexed, inclusive start/end pair (line or column bounds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub start: usize,
    pub end: usize,
}

/// A span inside a source file, 1-indexed and inclusive on both axes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePosition {
    pub line: Position,
    pub column: Position,
    pub filename: String,
}

impl FilePosition {
    /// A position is only trustworthy if every bound is positive and the
    /// filename is set. Anything else must be treated as absent, never as a
    /// span at line/column zero.
    pub fn is_extracted_successfully(&self) -> bool {
        self.line.start > 0
            && self.line.end > 0
            && self.column.start > 0
            && self.column.end > 0
            && !self.filename.is_empty()
    }
}

/// Convert a 0-indexed row/column (as produced by the syntax-tree parsers)
/// to the 1-indexed convention used by [`FilePosition`].
pub fn to_one_based(zero_based: usize) -> usize {
    zero_based.saturating_add(1)
}

/// Rewrite `path` relative to `root`. Paths outside `root` are returned
/// unchanged.
pub fn to_relative_path(root: &Path, path: &str) -> String {
    match Path::new(path).strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.display().to_string(),
        _ => path.to_string(),
    }
}
