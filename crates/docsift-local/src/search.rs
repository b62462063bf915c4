//! Query a single document: chunk it by format, score every chunk, and pick non-overlapping
//! results with neighbouring context.

use crate::chunk::{char_len, html, text, MAX_CHUNK_SIZE};
use crate::{format, score};
use docsift_core::{Chunk, DocumentFormat, SearchResult};
use serde_json::Value;
use std::collections::BTreeSet;

pub const DEFAULT_MAX_RESULTS: usize = 3;
/// Upper bound for one expanded result, separators included.
pub const CONTEXT_SIZE: usize = 3_000;
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Fields that usually carry prose in JSON documentation payloads, in probe order.
const DOC_FIELDS: &[&str] = &[
    "content",
    "text",
    "body",
    "description",
    "summary",
    "documentation",
    "docs",
    "readme",
    "markdown",
    "html",
    "title",
    "name",
];
const MAX_JSON_DEPTH: usize = 10;

pub fn search(document: &str, query: &str, max_results: usize) -> SearchResult {
    let chunks = score_chunks(chunk_document(document), query);
    let total_chunks = chunks.len();

    let mut ranked: Vec<&Chunk> = chunks.iter().filter(|c| c.score > 0.0).collect();
    // Stable: equal scores keep document order.
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    let matched_chunks = ranked.len();

    let results = select(&ranked, max_results)
        .into_iter()
        .map(|i| expand_context(&chunks, i))
        .collect();
    tracing::debug!(total_chunks, matched_chunks, "search complete");

    SearchResult {
        results,
        total_chunks,
        matched_chunks,
    }
}

/// Split a document with the strategy its detected format calls for.
pub fn chunk_document(document: &str) -> Vec<String> {
    let detected = format::detect(document);
    tracing::debug!(
        format = detected.format.as_str(),
        confidence = detected.confidence,
        "detected document format"
    );
    match detected.format {
        DocumentFormat::Json => match serde_json::from_str::<Value>(document.trim()) {
            Ok(v) => text::split(&json_text(&v)),
            Err(_) => text::split(document),
        },
        DocumentFormat::Html => {
            let chunks = html::split(document);
            if chunks.len() <= 1 && char_len(document) > MAX_CHUNK_SIZE {
                // No exploitable structure: go through Markdown instead.
                tracing::debug!("html chunking found no structure; retrying via markdown");
                text::split(&html::html_to_markdown(document))
            } else {
                chunks
            }
        }
        DocumentFormat::Markdown | DocumentFormat::Text => text::split(document),
    }
}

pub fn score_chunks(contents: Vec<String>, query: &str) -> Vec<Chunk> {
    let terms = score::extract_search_terms(query);
    contents
        .into_iter()
        .enumerate()
        .map(|(index, content)| {
            let score = score::score(&content, &terms);
            Chunk {
                content,
                index,
                score,
            }
        })
        .collect()
}

/// Walk `ranked` best-first, claiming each winner and its immediate neighbours.
fn select(ranked: &[&Chunk], max_results: usize) -> Vec<usize> {
    let mut claimed = BTreeSet::new();
    let mut picked = Vec::new();
    for c in ranked {
        if picked.len() >= max_results {
            break;
        }
        if claimed.contains(&c.index) {
            continue;
        }
        claimed.insert(c.index);
        claimed.insert(c.index + 1);
        if let Some(prev) = c.index.checked_sub(1) {
            claimed.insert(prev);
        }
        picked.push(c.index);
    }
    picked
}

/// The chunk at `index` plus as much of its left, then right, neighbour as fits in
/// [`CONTEXT_SIZE`]. An out-of-range index yields an empty string.
pub fn expand_context(chunks: &[Chunk], index: usize) -> String {
    let Some(own) = chunks.get(index) else {
        return String::new();
    };
    let mut remaining = CONTEXT_SIZE.saturating_sub(char_len(&own.content));
    let left = index
        .checked_sub(1)
        .and_then(|i| chunks.get(i))
        .and_then(|c| fit(&c.content, &mut remaining, true));
    let right = chunks
        .get(index + 1)
        .and_then(|c| fit(&c.content, &mut remaining, false));

    let mut parts: Vec<&str> = Vec::with_capacity(3);
    if let Some(l) = left.as_deref() {
        parts.push(l);
    }
    parts.push(&own.content);
    if let Some(r) = right.as_deref() {
        parts.push(r);
    }
    parts.join(CONTEXT_SEPARATOR)
}

/// Take what fits of a neighbour. The left neighbour keeps its tail (the text adjacent to the
/// hit), the right neighbour its head.
fn fit(neighbour: &str, remaining: &mut usize, keep_tail: bool) -> Option<String> {
    let sep = char_len(CONTEXT_SEPARATOR);
    let room = remaining.checked_sub(sep).filter(|r| *r > 0)?;
    let n = char_len(neighbour);
    let piece: String = if n <= room {
        neighbour.to_string()
    } else if keep_tail {
        neighbour.chars().skip(n - room).collect()
    } else {
        neighbour.chars().take(room).collect()
    };
    let piece = piece.trim().to_string();
    if piece.is_empty() {
        return None;
    }
    *remaining -= sep + char_len(&piece);
    Some(piece)
}

/// Prose extracted from a JSON document: known documentation fields first, otherwise every
/// scalar value.
fn json_text(v: &Value) -> String {
    let mut found = Vec::new();
    probe_doc_fields(v, 0, &mut found);
    if found.is_empty() {
        collect_scalars(v, 0, &mut found);
        return found.join("\n");
    }
    found.join("\n\n")
}

fn probe_doc_fields(v: &Value, depth: usize, out: &mut Vec<String>) {
    if depth > MAX_JSON_DEPTH {
        return;
    }
    match v {
        Value::Object(map) => {
            for (k, val) in map {
                match val {
                    Value::String(s) if is_doc_field(k) => {
                        if !s.trim().is_empty() {
                            out.push(s.clone());
                        }
                    }
                    Value::Object(_) | Value::Array(_) => probe_doc_fields(val, depth + 1, out),
                    _ => {}
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                probe_doc_fields(item, depth + 1, out);
            }
        }
        _ => {}
    }
}

fn is_doc_field(key: &str) -> bool {
    DOC_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(key))
}

fn collect_scalars(v: &Value, depth: usize, out: &mut Vec<String>) {
    if depth > MAX_JSON_DEPTH {
        return;
    }
    match v {
        Value::String(s) => {
            if !s.trim().is_empty() {
                out.push(s.clone());
            }
        }
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Null => {}
        Value::Array(items) => items
            .iter()
            .for_each(|item| collect_scalars(item, depth + 1, out)),
        Value::Object(map) => map
            .values()
            .for_each(|item| collect_scalars(item, depth + 1, out)),
    }
}
