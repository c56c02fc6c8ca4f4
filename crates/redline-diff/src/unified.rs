//! # Unified Patch Format
//!
//! Renders an edit script as a unified diff and applies such a diff back
//! onto the original text.
//!
//! ## Format
//!
//! ```text
//! --- before
//! +++ after
//! @@ -1,3 +1,3 @@
//!  a
//! -b
//! +x
//!  c
//! \ No newline at end of file
//! ```
//!
//! Hunk headers follow the GNU conventions: a length of one is omitted and
//! an empty range names the line *after which* the hunk applies. A line
//! that does not end in a newline is followed by the
//! `\ No newline at end of file` marker, and line terminators (`\n` or
//! `\r\n`) are emitted verbatim. Together these make
//! `apply_unified(before, render(diff(before, after))) == after` hold
//! byte for byte.

use std::fmt::Write as _;
use std::ops::Range;

use crate::error::PatchError;
use crate::line::{split_lines, Line, LineEnding};
use crate::script::{EditOp, OpKind};

/// Marker line following a line that has no terminator.
pub const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// Render `ops` as a unified diff with `context` lines around each change.
///
/// Returns an empty string when the script contains no changes.
pub fn render_unified(ops: &[EditOp], context: usize, old_label: &str, new_label: &str) -> String {
    let ranges = hunk_ranges(ops, context);
    let mut out = String::new();
    if ranges.is_empty() {
        return out;
    }

    // Number of old/new lines consumed before each op.
    let mut old_before = Vec::with_capacity(ops.len());
    let mut new_before = Vec::with_capacity(ops.len());
    let (mut old_seen, mut new_seen) = (0usize, 0usize);
    for op in ops {
        old_before.push(old_seen);
        new_before.push(new_seen);
        match op.kind {
            OpKind::Equal => {
                old_seen += 1;
                new_seen += 1;
            }
            OpKind::Delete => old_seen += 1,
            OpKind::Insert => new_seen += 1,
        }
    }

    let _ = writeln!(out, "--- {old_label}");
    let _ = writeln!(out, "+++ {new_label}");
    for range in ranges {
        let hunk = &ops[range.clone()];
        let old_len = hunk.iter().filter(|op| op.kind != OpKind::Insert).count();
        let new_len = hunk.iter().filter(|op| op.kind != OpKind::Delete).count();
        let _ = writeln!(
            out,
            "@@ -{} +{} @@",
            format_range(old_before[range.start], old_len),
            format_range(new_before[range.start], new_len)
        );
        for op in hunk {
            out.push(match op.kind {
                OpKind::Equal => ' ',
                OpKind::Delete => '-',
                OpKind::Insert => '+',
            });
            out.push_str(&op.line.content);
            match op.line.ending {
                LineEnding::None => {
                    out.push('\n');
                    out.push_str(NO_NEWLINE_MARKER);
                    out.push('\n');
                }
                ending => out.push_str(ending.as_str()),
            }
        }
    }
    out
}

/// Apply a unified diff produced by [`render_unified`] to `original`.
pub fn apply_unified(original: &str, patch: &str) -> Result<String, PatchError> {
    let old = split_lines(original);
    let patch_lines: Vec<&str> = patch.split_inclusive('\n').collect();
    let mut out = String::with_capacity(original.len());
    let mut cursor = 0usize;
    let mut i = 0usize;

    while i < patch_lines.len() {
        let header_line = i + 1;
        let raw = patch_lines[i];
        if raw.starts_with("---") || raw.starts_with("+++") {
            i += 1;
            continue;
        }
        if !raw.starts_with("@@") {
            return Err(PatchError::UnexpectedLine {
                line: header_line,
                content: raw.trim_end().to_string(),
            });
        }
        let header = parse_header(raw, header_line)?;
        i += 1;

        let begin = if header.old_len == 0 {
            header.old_start
        } else {
            header
                .old_start
                .checked_sub(1)
                .ok_or(PatchError::HunkOutOfRange { line: header_line })?
        };
        if begin < cursor || begin > old.len() {
            return Err(PatchError::HunkOutOfRange { line: header_line });
        }
        for line in &old[cursor..begin] {
            out.push_str(&line.raw());
        }
        cursor = begin;

        let (mut old_seen, mut new_seen) = (0usize, 0usize);
        while old_seen < header.old_len || new_seen < header.new_len {
            let Some(raw) = patch_lines.get(i) else {
                return Err(PatchError::TruncatedHunk { line: header_line });
            };
            let line_no = i + 1;
            i += 1;

            let tag = raw.as_bytes()[0];
            if !matches!(tag, b' ' | b'-' | b'+') {
                return Err(PatchError::UnexpectedLine {
                    line: line_no,
                    content: raw.trim_end().to_string(),
                });
            }
            let mut body = &raw[1..];
            if patch_lines.get(i).is_some_and(|next| next.starts_with('\\')) {
                body = body.strip_suffix('\n').unwrap_or(body);
                i += 1;
            }

            match tag {
                b'+' => {
                    out.push_str(body);
                    new_seen += 1;
                }
                _ => {
                    let matches = old.get(cursor).map(Line::raw).as_deref() == Some(body);
                    if !matches {
                        return Err(PatchError::ContextMismatch { line: cursor + 1 });
                    }
                    if tag == b' ' {
                        out.push_str(body);
                        new_seen += 1;
                    }
                    old_seen += 1;
                    cursor += 1;
                }
            }
        }
        if old_seen != header.old_len || new_seen != header.new_len {
            return Err(PatchError::TruncatedHunk { line: header_line });
        }
    }

    for line in &old[cursor..] {
        out.push_str(&line.raw());
    }
    Ok(out)
}

// ─── Hunks ───────────────────────────────────────────────────────────

/// Op-index ranges of the hunks. Changes closer than `2 * context` lines
/// share a hunk.
fn hunk_ranges(ops: &[EditOp], context: usize) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = Vec::new();
    for (i, _) in ops.iter().enumerate().filter(|(_, op)| op.is_change()) {
        let start = i.saturating_sub(context);
        let end = (i + context + 1).min(ops.len());
        match ranges.last_mut() {
            Some(last) if start <= last.end => last.end = end,
            _ => ranges.push(start..end),
        }
    }
    ranges
}

fn format_range(lines_before: usize, len: usize) -> String {
    let start = if len == 0 { lines_before } else { lines_before + 1 };
    if len == 1 {
        start.to_string()
    } else {
        format!("{start},{len}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HunkHeader {
    old_start: usize,
    old_len: usize,
    new_start: usize,
    new_len: usize,
}

fn parse_header(raw: &str, line: usize) -> Result<HunkHeader, PatchError> {
    let malformed = || PatchError::MalformedHeader {
        line,
        header: raw.trim_end().to_string(),
    };
    let mut parts = raw.split_whitespace();
    if parts.next() != Some("@@") {
        return Err(malformed());
    }
    let old = parts
        .next()
        .and_then(|p| p.strip_prefix('-'))
        .and_then(parse_range)
        .ok_or_else(malformed)?;
    let new = parts
        .next()
        .and_then(|p| p.strip_prefix('+'))
        .and_then(parse_range)
        .ok_or_else(malformed)?;
    if parts.next() != Some("@@") {
        return Err(malformed());
    }
    Ok(HunkHeader {
        old_start: old.0,
        old_len: old.1,
        new_start: new.0,
        new_len: new.1,
    })
}

fn parse_range(s: &str) -> Option<(usize, usize)> {
    match s.split_once(',') {
        Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}
