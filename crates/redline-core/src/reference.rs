//! # Article References
//!
//! Recognizes article references in instruction text ("Статья 6.1",
//! "в статье 11", "в пункте 7 статьи 6.1", "ст. 25") in every grammatical
//! case and in any letter case, and normalizes them to an [`ArticleNumber`].
//!
//! Two matchers are exposed:
//!
//! - [`parse_article_reference`] finds the first reference anywhere in a
//!   short address string, or accepts a bare number.
//! - [`heading_references`] finds lines that *open* with a reference. These
//!   are the boundaries the deterministic instruction grouping splits on.
//!   A mid-sentence mention ("as defined in статьи 5") is not a heading.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::identity::ArticleNumber;

/// Article noun in all declensions, or the `ст.` abbreviation.
const ARTICLE_NOUN: &str = r"(?:стать(?:ями|ях|ям|ей|я|и|е|ю)|статей|ст\.)";

/// Dotted article number: `1`, `6.1`, `11.3.2`.
const NUMBER: &str = r"(\d+(?:\.\d+)*)";

static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+(?:\.\d+)*\.?$").expect("valid bare number pattern")
});

static ANY_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(r"(?i)\b{ARTICLE_NOUN}\s*{NUMBER}");
    Regex::new(&pattern).expect("valid reference pattern")
});

static HEADING_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    // Optional "1)" / "1." enumerator, optional "в", optional
    // "пункте/подпункте/абзаце/части X", then the article noun and number.
    let pattern = format!(
        r"(?im)^[ \t]*(?:\d+[).][ \t]*)?(?:в[ \t]+)?(?:(?:пункте|подпункте|абзаце|части)[ \t]+\S+[ \t]+)?{ARTICLE_NOUN}[ \t]*{NUMBER}"
    );
    Regex::new(&pattern).expect("valid heading pattern")
});

/// A line that opens with an article reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingReference {
    /// Byte offset of the start of the line within the scanned text.
    pub line_start: usize,
    /// The referenced article.
    pub number: ArticleNumber,
}

/// Extract the article number an address refers to.
///
/// Accepts a bare number (`"6.1"`) or free text containing a reference
/// (`"в статье 6.1"`). Returns the first reference found.
pub fn parse_article_reference(address: &str) -> Option<ArticleNumber> {
    let trimmed = address.trim();
    if BARE_NUMBER.is_match(trimmed) {
        return ArticleNumber::new(trimmed).ok();
    }
    ANY_REFERENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .and_then(|m| ArticleNumber::new(m.as_str()).ok())
}

/// Find every line of `text` that opens with an article reference, in order.
pub fn heading_references(text: &str) -> Vec<HeadingReference> {
    HEADING_REFERENCE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = ArticleNumber::new(caps.get(1)?.as_str()).ok()?;
            Some(HeadingReference {
                line_start: whole.start(),
                number,
            })
        })
        .collect()
}
