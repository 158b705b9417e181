//! Resolve a canonical base name to tags.
//!
//! Exact (case-insensitive) key first; otherwise the first key in index order
//! that contains the name or is contained by it.

use crate::tag_index::TagIndex;

/// How a base name was resolved against the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMatch<'a> {
    Exact(&'a [String]),
    Partial { key: &'a str, tags: &'a [String] },
    Unmatched,
}

impl<'a> TagMatch<'a> {
    /// Tags in index order; empty when unmatched.
    pub fn tags(&self) -> &'a [String] {
        match *self {
            TagMatch::Exact(tags) => tags,
            TagMatch::Partial { tags, .. } => tags,
            TagMatch::Unmatched => &[],
        }
    }
}

pub fn resolve<'a>(index: &'a TagIndex, base_name: &str) -> TagMatch<'a> {
    let needle = base_name.to_lowercase();
    if needle.is_empty() {
        return TagMatch::Unmatched;
    }
    if let Some(tags) = index.get(&needle) {
        return TagMatch::Exact(tags);
    }
    index
        .iter()
        .find(|(key, _)| needle.contains(key) || key.contains(needle.as_str()))
        .map(|(key, tags)| TagMatch::Partial { key, tags })
        .unwrap_or(TagMatch::Unmatched)
}
