//! Document segmentation.
//!
//! All sizes are measured in characters, not bytes.

pub mod html;
pub mod text;

/// Upper bound for a refined chunk (an irreducible sentence may exceed it).
pub const MAX_CHUNK_SIZE: usize = 2_000;
/// Chunks at or below this many characters are dropped.
pub const MIN_CHUNK_SIZE: usize = 10;

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub(crate) fn non_empty<'a>(parts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn keep_significant(chunks: Vec<String>) -> Vec<String> {
    chunks
        .into_iter()
        .filter(|c| char_len(c) > MIN_CHUNK_SIZE)
        .collect()
}
