//! Normalisation half of tag resolution.
//!
//! Incoming names are trimmed, blanks and missing entries are dropped and
//! duplicates collapse to a single draft. Drafts come back sorted by name so the
//! persisted outcome does not depend on the order the caller listed them in.

use std::collections::BTreeMap;

use crate::domain::error::DomainError;
use crate::domain::slug::{SlugError, derive_slug, generate_unique_slug_from_base};

pub const MAX_TAG_NAME_CHARS: usize = 50;

/// A tag name ready for lookup or insertion, with its base slug precomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDraft {
    pub name: String,
    pub base_slug: String,
}

impl TagDraft {
    /// Pick a slug for a tag that does not exist yet.
    pub fn allocate_slug<F>(&self, is_unique: F) -> Result<String, SlugError>
    where
        F: FnMut(&str) -> bool,
    {
        generate_unique_slug_from_base(&self.base_slug, is_unique)
    }
}

pub fn normalize_tag_names<I, S>(names: I) -> Result<Vec<TagDraft>, DomainError>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let mut drafts = BTreeMap::new();

    for name in names.into_iter().flatten() {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() || drafts.contains_key(trimmed) {
            continue;
        }
        if trimmed.chars().count() > MAX_TAG_NAME_CHARS {
            return Err(DomainError::validation(format!(
                "tag `{trimmed}` exceeds {MAX_TAG_NAME_CHARS} characters"
            )));
        }
        let base_slug = derive_slug(trimmed).map_err(|err| {
            DomainError::validation(format!("tag `{trimmed}` has no usable slug: {err}"))
        })?;
        drafts.insert(trimmed.to_string(), base_slug);
    }

    Ok(drafts
        .into_iter()
        .map(|(name, base_slug)| TagDraft { name, base_slug })
        .collect())
}
