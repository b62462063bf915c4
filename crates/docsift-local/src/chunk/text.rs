//! Hierarchical splitter for Markdown and plain text.
//!
//! Primary boundaries are tried in order (headers, horizontal rules, blank-line paragraphs) and
//! the first that yields more than one part is used alone. Oversized parts are then subdivided
//! by paragraph and finally by sentence, packing greedily left to right.

use super::{char_len, keep_significant, non_empty, MAX_CHUNK_SIZE};
use crate::patterns;

pub fn split(document: &str) -> Vec<String> {
    let mut out = Vec::new();
    for part in split_primary(document) {
        out.extend(refine(&part));
    }
    keep_significant(out)
}

fn split_primary(document: &str) -> Vec<String> {
    let by_headers = non_empty(patterns::split_before(&patterns::MD_HEADER_START, document));
    if by_headers.len() > 1 {
        return by_headers;
    }
    let by_rules = non_empty(patterns::MD_HORIZONTAL_RULE.split(document));
    if by_rules.len() > 1 {
        return by_rules;
    }
    non_empty(patterns::BLANK_LINE.split(document))
}

fn refine(part: &str) -> Vec<String> {
    let part = part.trim();
    if char_len(part) <= MAX_CHUNK_SIZE {
        return vec![part.to_string()];
    }
    subdivide(part)
}

/// Break an oversized block by paragraphs, or by sentences when it is a single paragraph.
pub(crate) fn subdivide(block: &str) -> Vec<String> {
    let paragraphs = non_empty(patterns::BLANK_LINE.split(block));
    if paragraphs.len() > 1 {
        return pack(paragraphs);
    }
    pack_sentences(block)
}

/// Greedy left-to-right packing of blocks under [`MAX_CHUNK_SIZE`], joined by blank lines.
/// A block that is too large on its own is flushed separately and subdivided.
pub(crate) fn pack(units: Vec<String>) -> Vec<String> {
    let mut packer = Packer::new("\n\n");
    for unit in units {
        if char_len(&unit) > MAX_CHUNK_SIZE {
            packer.flush();
            packer.out.extend(subdivide(&unit));
        } else {
            packer.push(&unit);
        }
    }
    packer.finish()
}

/// Sentence-level packing. Never recurses: a sentence longer than the cap is kept whole.
fn pack_sentences(text: &str) -> Vec<String> {
    let mut packer = Packer::new(" ");
    for sentence in sentences(text) {
        if char_len(&sentence) > MAX_CHUNK_SIZE {
            packer.flush();
            packer.out.push(sentence);
        } else {
            packer.push(&sentence);
        }
    }
    packer.finish()
}

struct Packer {
    sep: &'static str,
    out: Vec<String>,
    cur: String,
    cur_len: usize,
}

impl Packer {
    fn new(sep: &'static str) -> Self {
        Self {
            sep,
            out: Vec::new(),
            cur: String::new(),
            cur_len: 0,
        }
    }

    fn push(&mut self, unit: &str) {
        let unit_len = char_len(unit);
        let sep_len = char_len(self.sep);
        if !self.cur.is_empty() && self.cur_len + sep_len + unit_len > MAX_CHUNK_SIZE {
            self.flush();
        }
        if !self.cur.is_empty() {
            self.cur.push_str(self.sep);
            self.cur_len += sep_len;
        }
        self.cur.push_str(unit);
        self.cur_len += unit_len;
    }

    fn flush(&mut self) {
        if !self.cur.is_empty() {
            self.out.push(std::mem::take(&mut self.cur));
            self.cur_len = 0;
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.out
    }
}

/// Sentences end at `.`, `!` or `?` followed by whitespace; the punctuation stays with the
/// sentence it closes.
fn sentences(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    for m in patterns::SENTENCE_END.find_iter(text) {
        // Terminal punctuation is ASCII, so +1 is a char boundary.
        parts.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }
    non_empty(parts)
}
