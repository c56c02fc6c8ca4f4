//! # Side-by-Side Table
//!
//! Two equally long columns of cells. Unchanged lines sit on the same row
//! in both columns. Within a block of changes the i-th removed line is
//! paired with the i-th added line; when one side runs out, the other
//! side's remaining lines face [`CellKind::Empty`] cells.

use serde::{Deserialize, Serialize};

use crate::script::{EditOp, OpKind};

/// Role of a cell in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Line present on both sides.
    Unchanged,
    /// Line only in the left (old) text.
    Removed,
    /// Line only in the right (new) text.
    Added,
    /// Padding opposite a line that has no counterpart.
    Empty,
}

/// One cell of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// 1-based line number on this side, absent for padding.
    pub line_number: Option<usize>,
    /// Line content without the terminator.
    pub text: String,
    /// Role of the cell.
    pub kind: CellKind,
}

impl Cell {
    fn empty() -> Self {
        Self {
            line_number: None,
            text: String::new(),
            kind: CellKind::Empty,
        }
    }

    fn from_op(op: &EditOp, kind: CellKind) -> Self {
        let line_number = match kind {
            CellKind::Added => op.new_line,
            _ => op.old_line,
        };
        Self {
            line_number,
            text: op.line.content.clone(),
            kind,
        }
    }
}

/// Left and right columns, always the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideBySide {
    pub left_lines: Vec<Cell>,
    pub right_lines: Vec<Cell>,
}

impl SideBySide {
    /// Build the table from an edit script.
    pub fn from_ops(ops: &[EditOp]) -> Self {
        let mut table = Self::default();
        let mut i = 0;
        while i < ops.len() {
            let op = &ops[i];
            if op.kind == OpKind::Equal {
                table.left_lines.push(Cell::from_op(op, CellKind::Unchanged));
                table.right_lines.push(Cell {
                    line_number: op.new_line,
                    text: op.line.content.clone(),
                    kind: CellKind::Unchanged,
                });
                i += 1;
                continue;
            }

            let block_end = ops[i..]
                .iter()
                .position(|op| op.kind == OpKind::Equal)
                .map_or(ops.len(), |offset| i + offset);
            let block = &ops[i..block_end];
            let removed: Vec<&EditOp> = block.iter().filter(|op| op.kind == OpKind::Delete).collect();
            let added: Vec<&EditOp> = block.iter().filter(|op| op.kind == OpKind::Insert).collect();
            for row in 0..removed.len().max(added.len()) {
                table.left_lines.push(
                    removed
                        .get(row)
                        .map_or_else(Cell::empty, |op| Cell::from_op(op, CellKind::Removed)),
                );
                table.right_lines.push(
                    added
                        .get(row)
                        .map_or_else(Cell::empty, |op| Cell::from_op(op, CellKind::Added)),
                );
            }
            i = block_end;
        }
        table
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.left_lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left_lines.is_empty()
    }

    /// Render as a two-column text table, `width` characters per column.
    pub fn render(&self, width: usize) -> String {
        let mut out = String::new();
        for (left, right) in self.left_lines.iter().zip(&self.right_lines) {
            let marker = match (left.kind, right.kind) {
                (CellKind::Unchanged, _) => ' ',
                (CellKind::Removed, CellKind::Added) => '|',
                (CellKind::Removed, _) => '<',
                _ => '>',
            };
            let left_text: String = left.text.chars().take(width).collect();
            let right_text: String = right.text.chars().take(width).collect();
            let pad = width.saturating_sub(left_text.chars().count());
            out.push_str(&left_text);
            out.extend(std::iter::repeat(' ').take(pad));
            out.push(' ');
            out.push(marker);
            out.push(' ');
            out.push_str(right_text.trim_end());
            // Trim padding when the right cell is blank.
            let trimmed = out.trim_end_matches(' ').len();
            out.truncate(trimmed);
            out.push('\n');
        }
        out
    }
}
