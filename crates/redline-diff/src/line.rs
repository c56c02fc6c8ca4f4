//! # Line Tokenization
//!
//! Text is split on `\n` only. The terminator is kept on each [`Line`] so
//! that `"a\n"`, `"a\r\n"`, and a final `"a"` are three distinct lines and
//! joining the lines back reproduces the input byte for byte.

use serde::{Deserialize, Serialize};

/// How a line is terminated in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
    /// Last line of a text that does not end in a newline.
    None,
}

impl LineEnding {
    /// The terminator bytes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::None => "",
        }
    }
}

/// One line of text and its terminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Line {
    /// Line content without the terminator.
    pub content: String,
    /// The terminator that followed the content.
    pub ending: LineEnding,
}

impl Line {
    /// Content followed by its terminator, exactly as it appeared.
    pub fn raw(&self) -> String {
        let mut s = String::with_capacity(self.content.len() + 2);
        s.push_str(&self.content);
        s.push_str(self.ending.as_str());
        s
    }
}

/// Split `text` into lines. The empty string has no lines.
pub fn split_lines(text: &str) -> Vec<Line> {
    text.split_inclusive('\n')
        .map(|piece| {
            if let Some(content) = piece.strip_suffix("\r\n") {
                Line {
                    content: content.to_string(),
                    ending: LineEnding::CrLf,
                }
            } else if let Some(content) = piece.strip_suffix('\n') {
                Line {
                    content: content.to_string(),
                    ending: LineEnding::Lf,
                }
            } else {
                Line {
                    content: piece.to_string(),
                    ending: LineEnding::None,
                }
            }
        })
        .collect()
}
