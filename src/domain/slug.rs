//! Utilities for generating deterministic, URL-safe slugs.
//!
//! ASCII slugification (`slug` crate) is combined with Chinese transliteration
//! (`pinyin` crate) so inputs like “基线对齐” become `ji-xian-dui-qi`. Uniqueness is
//! decided by a caller-supplied predicate, which keeps the allocator pure: the
//! persistence layer loads the taken slugs inside its transaction and hands the
//! lookup in as a closure.

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;

/// Upper bound on numeric suffixes probed for a single base slug.
pub const MAX_SUFFIX_ATTEMPTS: usize = 256;

/// Errors that can occur while generating a slug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

/// Derive a base slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let transliterated = transliterate_to_ascii(input);
    let candidate = slugify(&transliterated);

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Produce a slug for `input` that does not collide according to `is_unique`.
///
/// The base slug is tried first, then `base-1`, `base-2`, … in order.
pub fn generate_unique_slug<F>(input: &str, is_unique: F) -> Result<String, SlugError>
where
    F: FnMut(&str) -> bool,
{
    let base = derive_slug(input)?;
    generate_unique_slug_from_base(&base, is_unique)
}

/// Same as [`generate_unique_slug`] for an already-derived base slug.
pub fn generate_unique_slug_from_base<F>(base: &str, mut is_unique: F) -> Result<String, SlugError>
where
    F: FnMut(&str) -> bool,
{
    if is_unique(base) {
        return Ok(base.to_string());
    }

    for attempt in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = format!("{base}-{attempt}");
        if is_unique(&candidate) {
            return Ok(candidate);
        }
    }

    Err(SlugError::Exhausted {
        base: base.to_string(),
    })
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            // slugify's own transliteration handles the rest (Cyrillic, accents, ...)
            None => output.push(ch),
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn derive_slug_lowercases_and_hyphenates() {
        assert_eq!(derive_slug("Hello World").expect("slug"), "hello-world");
        assert_eq!(derive_slug("  Hi   There!  ").expect("slug"), "hi-there");
    }

    #[test]
    fn derive_slug_transliterates_non_ascii() {
        assert_eq!(
            derive_slug("Rust 基础教程").expect("slug"),
            "rust-ji-chu-jiao-cheng"
        );
        assert_eq!(derive_slug("Привет мир").expect("slug"), "privet-mir");
        assert_eq!(derive_slug("Crème brûlée").expect("slug"), "creme-brulee");
    }

    #[test]
    fn derive_slug_rejects_blank_and_symbol_only_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
        assert!(matches!(
            derive_slug("!!!"),
            Err(SlugError::Unrepresentable { .. })
        ));
    }

    #[test]
    fn unused_base_is_returned_verbatim() {
        let slug = generate_unique_slug("Hello World", |_| true).expect("slug");
        assert_eq!(slug, "hello-world");
    }

    #[test]
    fn collisions_probe_numeric_suffixes_from_one() {
        let taken: HashSet<String> = ["hello-world", "hello-world-1"]
            .into_iter()
            .map(String::from)
            .collect();

        let slug =
            generate_unique_slug("Hello World", |candidate| !taken.contains(candidate))
                .expect("slug");
        assert_eq!(slug, "hello-world-2");
    }

    #[test]
    fn second_identical_title_gets_first_suffix() {
        let mut taken = HashSet::new();
        for _ in 0..2 {
            let slug = generate_unique_slug("Hello World", |candidate| !taken.contains(candidate))
                .expect("slug");
            taken.insert(slug);
        }
        assert!(taken.contains("hello-world"));
        assert!(taken.contains("hello-world-1"));
    }

    #[test]
    fn exhausted_probing_reports_base() {
        let result = generate_unique_slug("Example", |_| false).expect_err("should exhaust");
        assert_eq!(
            result,
            SlugError::Exhausted {
                base: "example".to_string()
            }
        );
    }
}
