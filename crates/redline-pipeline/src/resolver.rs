//! # Target Resolver
//!
//! Turns raw instruction text into edit targets:
//!
//! 1. The injected [`InstructionGrouping`] splits the text into groups.
//!    The groups must hold the whole input, in order; a grouping that
//!    drops or repeats text fails resolution.
//! 2. Each group's article reference is normalized (`"статья 6.1"`,
//!    `"ст. 6.1"` and `"6.1"` all become `6.1`).
//! 3. Groups with the same normalized reference are merged in input order,
//!    joined by a blank line. Groups without a usable reference stay
//!    separate.
//! 4. A target whose article exists starts `Pending`; any other target
//!    starts in `Review`. Unresolved references are never dropped.
//!
//! The result depends only on the grouping output and the article store.

use std::collections::HashMap;
use std::sync::Arc;

use redline_core::{parse_article_reference, ArticleNumber, ArticleStore, OwnerId, SourceFileId};
use redline_state::EditTarget;

use crate::capability::{InstructionGroup, InstructionGrouping};
use crate::error::GroupingError;

/// Separator between merged instruction blocks.
const MERGE_SEPARATOR: &str = "\n\n";

pub struct TargetResolver {
    grouping: Arc<dyn InstructionGrouping>,
}

impl TargetResolver {
    pub fn new(grouping: Arc<dyn InstructionGrouping>) -> Self {
        Self { grouping }
    }

    /// Group `raw_text` and build the targets of `source_file`.
    pub async fn resolve(
        &self,
        owner: OwnerId,
        source_file: SourceFileId,
        raw_text: &str,
        articles: &dyn ArticleStore,
    ) -> Result<Vec<EditTarget>, GroupingError> {
        if raw_text.trim().is_empty() {
            return Err(GroupingError::EmptyInput);
        }
        let groups = self.grouping.group(raw_text).await?;
        if !covers(raw_text, &groups) {
            return Err(GroupingError::IncompleteCoverage);
        }
        let targets = build_targets(owner, source_file, groups, articles);
        if targets.is_empty() {
            return Err(GroupingError::NoGroups);
        }
        Ok(targets)
    }
}

/// Whether the groups, in order, hold every non-whitespace character of
/// `raw_text` exactly once. Whitespace may be trimmed or re-joined.
fn covers(raw_text: &str, groups: &[InstructionGroup]) -> bool {
    let expected = raw_text.chars().filter(|c| !c.is_whitespace());
    let actual = groups
        .iter()
        .flat_map(|g| g.instruction_text.chars())
        .filter(|c| !c.is_whitespace());
    expected.eq(actual)
}

struct Pending {
    article_ref: Option<String>,
    number: Option<ArticleNumber>,
    text: String,
}

/// Merge groups by normalized reference and bind them to articles.
pub fn build_targets(
    owner: OwnerId,
    source_file: SourceFileId,
    groups: Vec<InstructionGroup>,
    articles: &dyn ArticleStore,
) -> Vec<EditTarget> {
    let mut merged: Vec<Pending> = Vec::new();
    let mut by_number: HashMap<ArticleNumber, usize> = HashMap::new();

    for group in groups {
        let text = group.instruction_text.trim();
        if text.is_empty() {
            continue;
        }
        let article_ref = group
            .article_ref
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let number = article_ref.as_deref().and_then(parse_article_reference);

        let existing = number.as_ref().and_then(|n| by_number.get(n).copied());
        match existing {
            Some(pos) => {
                let entry = &mut merged[pos];
                entry.text.push_str(MERGE_SEPARATOR);
                entry.text.push_str(text);
            }
            None => {
                if let Some(n) = &number {
                    by_number.insert(n.clone(), merged.len());
                }
                merged.push(Pending {
                    article_ref,
                    number,
                    text: text.to_string(),
                });
            }
        }
    }

    merged
        .into_iter()
        .enumerate()
        .map(|(ordinal, entry)| {
            let resolved = entry.number.filter(|n| articles.contains(n));
            EditTarget::new(owner, source_file, ordinal, entry.text, entry.article_ref, resolved)
        })
        .collect()
}
