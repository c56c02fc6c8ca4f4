//! # Edit Script
//!
//! A minimal sequence of `equal` / `delete` / `insert` line operations
//! transforming the old line list into the new one, computed with Myers'
//! algorithm from `similar`. The implementation strips the common prefix
//! and suffix before searching, so among equally short scripts the one
//! with the longest leading and trailing equal runs wins.
//!
//! Replacements are flattened into all deletions followed by all
//! insertions, which is the order both renderers expect.

use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices, Algorithm, DiffOp};

use crate::line::Line;

/// Kind of a line operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Line present in both texts.
    Equal,
    /// Line only in the new text.
    Insert,
    /// Line only in the old text.
    Delete,
}

/// One line operation. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOp {
    /// What happens to the line.
    pub kind: OpKind,
    /// Position in the old text, absent for insertions.
    pub old_line: Option<usize>,
    /// Position in the new text, absent for deletions.
    pub new_line: Option<usize>,
    /// The line itself.
    pub line: Line,
}

impl EditOp {
    fn equal(old: usize, new: usize, line: &Line) -> Self {
        Self {
            kind: OpKind::Equal,
            old_line: Some(old + 1),
            new_line: Some(new + 1),
            line: line.clone(),
        }
    }

    fn delete(old: usize, line: &Line) -> Self {
        Self {
            kind: OpKind::Delete,
            old_line: Some(old + 1),
            new_line: None,
            line: line.clone(),
        }
    }

    fn insert(new: usize, line: &Line) -> Self {
        Self {
            kind: OpKind::Insert,
            old_line: None,
            new_line: Some(new + 1),
            line: line.clone(),
        }
    }

    /// Whether the operation changes the text.
    pub fn is_change(&self) -> bool {
        self.kind != OpKind::Equal
    }
}

/// Compute the edit script between two line lists.
pub fn edit_script(old: &[Line], new: &[Line]) -> Vec<EditOp> {
    let mut ops = Vec::with_capacity(old.len().max(new.len()));
    for op in capture_diff_slices(Algorithm::Myers, old, new) {
        match op {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => {
                for k in 0..len {
                    ops.push(EditOp::equal(old_index + k, new_index + k, &old[old_index + k]));
                }
            }
            DiffOp::Delete {
                old_index, old_len, ..
            } => {
                for k in old_index..old_index + old_len {
                    ops.push(EditOp::delete(k, &old[k]));
                }
            }
            DiffOp::Insert {
                new_index, new_len, ..
            } => {
                for k in new_index..new_index + new_len {
                    ops.push(EditOp::insert(k, &new[k]));
                }
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                for k in old_index..old_index + old_len {
                    ops.push(EditOp::delete(k, &old[k]));
                }
                for k in new_index..new_index + new_len {
                    ops.push(EditOp::insert(k, &new[k]));
                }
            }
        }
    }
    ops
}
