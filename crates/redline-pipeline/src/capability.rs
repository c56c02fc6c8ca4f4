//! # Injected Capabilities
//!
//! The pipeline does not understand instruction language. Two async
//! capabilities are injected by the caller:
//!
//! - [`TextTransform`] turns (current article text, instruction) into the
//!   new article text.
//! - [`InstructionGrouping`] splits raw instruction text into blocks, each
//!   optionally naming the article it addresses.
//!
//! Both are trait objects so tests can stub them and the CLI can back the
//! transform with an external command.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GroupingError, TransformError};

/// Produces new article text from the current text and an instruction.
#[async_trait]
pub trait TextTransform: Send + Sync {
    async fn transform(&self, current_text: &str, instruction: &str)
        -> Result<String, TransformError>;
}

/// One block of instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionGroup {
    /// Article reference as written (`"Статья 6.1"`, `"6.1"`), if any.
    pub article_ref: Option<String>,
    pub instruction_text: String,
}

impl InstructionGroup {
    pub fn new(article_ref: Option<&str>, instruction_text: impl Into<String>) -> Self {
        Self {
            article_ref: article_ref.map(str::to_string),
            instruction_text: instruction_text.into(),
        }
    }
}

/// Splits raw instruction text into [`InstructionGroup`]s.
#[async_trait]
pub trait InstructionGrouping: Send + Sync {
    async fn group(&self, raw_text: &str) -> Result<Vec<InstructionGroup>, GroupingError>;
}
