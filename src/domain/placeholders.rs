//! Image placeholder tokens embedded in generated markdown.
//!
//! Generated content carries tokens such as `[IMAGE_HERO]` and `[IMAGE_1]`.
//! The stored `content` is never rewritten; [`resolve`] substitutes bound
//! image URLs at read time so a different image can be bound later without
//! regenerating the post.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

const TOKEN_PREFIX: &str = "[IMAGE_";
const HERO_ID: &str = "HERO";
const HERO_KEY: &str = "hero";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Placeholder {
    Hero,
    Numbered(u32),
}

/// What to do with a token that has no bound image when resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnboundPolicy {
    /// Strip the token from the output.
    #[default]
    Remove,
    /// Leave the literal token in place (admin previews).
    Keep,
}

impl Placeholder {
    /// Key used in a post's `images` map.
    pub fn key(self) -> String {
        match self {
            Placeholder::Hero => HERO_KEY.to_string(),
            Placeholder::Numbered(index) => index.to_string(),
        }
    }

    /// Literal markdown token.
    pub fn token(self) -> String {
        match self {
            Placeholder::Hero => format!("{TOKEN_PREFIX}{HERO_ID}]"),
            Placeholder::Numbered(index) => format!("{TOKEN_PREFIX}{index}]"),
        }
    }

    /// Parse an `images` map key. Accepts the token identifier spelling too
    /// (`HERO`, `IMAGE_HERO`, `IMAGE_2`).
    pub fn from_key(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let id = trimmed
            .strip_prefix("IMAGE_")
            .or_else(|| trimmed.strip_prefix("image_"))
            .unwrap_or(trimmed);
        Self::from_identifier(id)
    }

    fn from_identifier(id: &str) -> Option<Self> {
        if id.eq_ignore_ascii_case(HERO_ID) {
            return Some(Placeholder::Hero);
        }
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        id.parse::<u32>()
            .ok()
            .filter(|index| *index > 0)
            .map(Placeholder::Numbered)
    }

    pub fn alt_text(self) -> String {
        match self {
            Placeholder::Hero => "hero image".to_string(),
            Placeholder::Numbered(index) => format!("image {index}"),
        }
    }

    /// Distinct placeholders in `content`, in order of first appearance.
    pub fn scan(content: &str) -> Vec<Self> {
        let mut seen = BTreeSet::new();
        tokens(content)
            .into_iter()
            .filter_map(|(_, _, placeholder)| seen.insert(placeholder).then_some(placeholder))
            .collect()
    }

    /// Number of `[IMAGE_HERO]` occurrences, counting repeats.
    pub fn hero_count(content: &str) -> usize {
        tokens(content)
            .into_iter()
            .filter(|(_, _, placeholder)| *placeholder == Placeholder::Hero)
            .count()
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// Byte ranges of every well-formed token in `content`.
fn tokens(content: &str) -> Vec<(usize, usize, Placeholder)> {
    let mut found = Vec::new();
    let mut offset = 0;

    while let Some(relative) = content[offset..].find(TOKEN_PREFIX) {
        let start = offset + relative;
        let id_start = start + TOKEN_PREFIX.len();
        match content[id_start..].find(']') {
            Some(close) => {
                let end = id_start + close + 1;
                if let Some(placeholder) = Placeholder::from_identifier(&content[id_start..end - 1]) {
                    found.push((start, end, placeholder));
                    offset = end;
                } else {
                    offset = id_start;
                }
            }
            None => break,
        }
    }

    found
}

/// Substitute bound images into `content`.
///
/// Bound tokens become `![alt](url)`; unbound tokens follow `policy`.
pub fn resolve(content: &str, images: &BTreeMap<String, String>, policy: UnboundPolicy) -> String {
    let mut output = String::with_capacity(content.len());
    let mut cursor = 0;

    for (start, end, placeholder) in tokens(content) {
        output.push_str(&content[cursor..start]);
        match images.get(&placeholder.key()) {
            Some(url) => {
                output.push_str("![");
                output.push_str(&placeholder.alt_text());
                output.push_str("](");
                output.push_str(url);
                output.push(')');
            }
            None => {
                if policy == UnboundPolicy::Keep {
                    output.push_str(&content[start..end]);
                }
            }
        }
        cursor = end;
    }

    output.push_str(&content[cursor..]);
    output
}
