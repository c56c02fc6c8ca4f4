//! # redline-diff — Deterministic Line Diffs
//!
//! Pure, deterministic comparison of two texts. A single call to [`diff`]
//! yields the edit script, a unified patch, and a side-by-side table, all
//! derived from the same Myers edit script so they always agree.
//!
//! ## Guarantees
//!
//! - `diff(a, a)` has no changes and an empty unified patch.
//! - `apply_unified(a, diff(a, b).unified) == b`, byte for byte, including
//!   line terminators and a missing final newline.
//! - The same inputs always produce the same output.
//!
//! ## Crate Policy
//!
//! - No I/O and no shared state. Every function here is a pure function of
//!   its inputs.
//! - Only applying a patch can fail; computing a diff cannot.

pub mod error;
pub mod line;
pub mod script;
pub mod side_by_side;
pub mod unified;

use serde::{Deserialize, Serialize};

pub use error::PatchError;
pub use line::{split_lines, Line, LineEnding};
pub use script::{edit_script, EditOp, OpKind};
pub use side_by_side::{Cell, CellKind, SideBySide};
pub use unified::{apply_unified, render_unified, NO_NEWLINE_MARKER};

/// Context lines around each change in a unified patch.
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Line counts of an edit script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub inserted: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl DiffStats {
    pub fn of(ops: &[EditOp]) -> Self {
        ops.iter().fold(Self::default(), |mut stats, op| {
            match op.kind {
                OpKind::Equal => stats.unchanged += 1,
                OpKind::Insert => stats.inserted += 1,
                OpKind::Delete => stats.deleted += 1,
            }
            stats
        })
    }
}

/// All renderings of one comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// The edit script.
    pub ops: Vec<EditOp>,
    /// Unified patch, empty when the texts are identical.
    pub unified: String,
    /// Two-column table.
    pub side_by_side: SideBySide,
    pub stats: DiffStats,
}

impl DiffResult {
    /// Whether the compared texts differ.
    pub fn has_changes(&self) -> bool {
        self.ops.iter().any(EditOp::is_change)
    }
}

/// Diff computation with configurable context and patch labels.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    context_lines: usize,
    old_label: String,
    new_label: String,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_LINES)
    }
}

impl DiffEngine {
    pub fn new(context_lines: usize) -> Self {
        Self {
            context_lines,
            old_label: "before".to_string(),
            new_label: "after".to_string(),
        }
    }

    /// Use `old` and `new` as the `---` / `+++` labels of the patch.
    pub fn with_labels(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.old_label = old.into();
        self.new_label = new.into();
        self
    }

    pub fn context_lines(&self) -> usize {
        self.context_lines
    }

    /// Compare `before` with `after`.
    pub fn diff(&self, before: &str, after: &str) -> DiffResult {
        let ops = edit_script(&split_lines(before), &split_lines(after));
        let unified = render_unified(&ops, self.context_lines, &self.old_label, &self.new_label);
        let side_by_side = SideBySide::from_ops(&ops);
        let stats = DiffStats::of(&ops);
        DiffResult {
            ops,
            unified,
            side_by_side,
            stats,
        }
    }
}

/// Compare two texts with the default engine.
pub fn diff(before: &str, after: &str) -> DiffResult {
    DiffEngine::default().diff(before, after)
}
