//! # Article-Heading Grouping
//!
//! Deterministic [`InstructionGrouping`]: a new group starts at every line
//! that opens with an article reference (`Статья 5`, `1) В статье 6.1`,
//! `в пункте 2 статьи 11`, `ст. 7`). Text before the first such line is
//! kept with the first group, and text without any heading becomes a
//! single group with no reference. Concatenating the group texts gives back
//! the input exactly.

use async_trait::async_trait;

use redline_core::heading_references;

use crate::capability::{InstructionGroup, InstructionGrouping};
use crate::error::GroupingError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ArticleHeadingGrouping;

impl ArticleHeadingGrouping {
    /// Split `raw_text` into groups. Synchronous core of the capability.
    pub fn split(&self, raw_text: &str) -> Vec<InstructionGroup> {
        let headings = heading_references(raw_text);
        if headings.is_empty() {
            return vec![InstructionGroup::new(None, raw_text)];
        }

        let mut groups = Vec::with_capacity(headings.len());
        for (i, heading) in headings.iter().enumerate() {
            let start = if i == 0 { 0 } else { heading.line_start };
            let end = headings
                .get(i + 1)
                .map_or(raw_text.len(), |next| next.line_start);
            groups.push(InstructionGroup::new(
                Some(heading.number.as_str()),
                &raw_text[start..end],
            ));
        }
        groups
    }
}

#[async_trait]
impl InstructionGrouping for ArticleHeadingGrouping {
    async fn group(&self, raw_text: &str) -> Result<Vec<InstructionGroup>, GroupingError> {
        if raw_text.trim().is_empty() {
            return Err(GroupingError::EmptyInput);
        }
        Ok(self.split(raw_text))
    }
}
