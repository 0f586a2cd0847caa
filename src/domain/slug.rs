//! Utilities for generating deterministic, human-friendly slugs.
//!
//! Slugification goes through the `slug` crate, which transliterates
//! non-ASCII text (kana, kanji, accents) before lowercasing and hyphenating.
//! Callers supply their own uniqueness predicate so slug generation stays pure.

use slug::slugify;
use thiserror::Error;

const MAX_SUFFIX_ATTEMPTS: usize = 32;
/// Longest base slug kept before suffixing.
pub const MAX_SLUG_LEN: usize = 60;

/// Errors that can occur while generating a slug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
    #[error("`{input}` is not a valid slug")]
    Invalid { input: String },
}

/// Derive a base slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = truncate_at_boundary(&slugify(input), MAX_SLUG_LEN);

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Produce a slug that does not collide according to the supplied predicate.
///
/// The `is_unique` closure must return `true` when the provided slug does not
/// already exist. The helper retries by suffixing a counter (`-2`, `-3`, …).
pub fn generate_unique_slug<F>(input: &str, mut is_unique: F) -> Result<String, SlugError>
where
    F: FnMut(&str) -> bool,
{
    let base = derive_slug(input)?;

    if is_unique(&base) {
        return Ok(base);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = format!("{base}-{attempt}");
        if is_unique(&candidate) {
            return Ok(candidate);
        }
    }

    Err(SlugError::Exhausted { base })
}

/// Accept a caller-chosen slug only if it is already in canonical form.
pub fn validate_slug(input: &str) -> Result<(), SlugError> {
    let canonical = !input.is_empty()
        && input.len() <= MAX_SLUG_LEN + 4
        && slugify(input) == input;
    if canonical {
        Ok(())
    } else {
        Err(SlugError::Invalid {
            input: input.to_string(),
        })
    }
}

fn truncate_at_boundary(slug: &str, max: usize) -> String {
    if slug.len() <= max {
        return slug.to_string();
    }
    let head = &slug[..max];
    let cut = head.rfind('-').filter(|index| *index > 0).unwrap_or(max);
    head[..cut].trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_lowercases_and_hyphenates() {
        let slug = derive_slug("PDF Compression: 5 Tips!").expect("slug");
        assert_eq!(slug, "pdf-compression-5-tips");
    }

    #[test]
    fn derive_slug_transliterates_kana() {
        let slug = derive_slug("すし tips").expect("slug");
        assert!(slug.is_ascii());
        assert!(slug.ends_with("tips"));
    }

    #[test]
    fn derive_slug_truncates_on_word_boundary() {
        let long = "word ".repeat(30);
        let slug = derive_slug(&long).expect("slug");
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
        assert!(slug.ends_with("word"));
    }

    #[test]
    fn generate_unique_slug_appends_counter() {
        let mut existing = vec!["pattern-library".to_string()];
        let slug = generate_unique_slug("Pattern Library", |candidate| {
            if existing.contains(&candidate.to_string()) {
                false
            } else {
                existing.push(candidate.to_string());
                true
            }
        })
        .expect("unique slug");

        assert_eq!(slug, "pattern-library-2");
        assert!(existing.contains(&slug));
    }

    #[test]
    fn generate_unique_slug_exhausted() {
        let result =
            generate_unique_slug("Example", |_| false).expect_err("should exhaust attempts");
        assert_eq!(
            result,
            SlugError::Exhausted {
                base: "example".to_string()
            }
        );
    }

    #[test]
    fn validate_slug_rejects_non_canonical_input() {
        assert!(validate_slug("blog-test").is_ok());
        assert!(validate_slug("Blog Test").is_err());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("trailing-").is_err());
    }
}
