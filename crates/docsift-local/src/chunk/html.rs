//! HTML-aware segmentation.
//!
//! Output contract (what tests pin down, independent of how tags are matched):
//! - script/style/noscript blocks and comments never reach the output
//! - header tags start a new section when there is more than one section
//! - otherwise `<pre>`/multi-line `<code>` blocks become fenced code with internal whitespace
//!   kept, and `<p>` blocks become plain-text units, in document order
//! - entities are decoded; block tags and `<br>` become newlines; runs of spaces collapse

use super::{keep_significant, text};
use crate::patterns;
use std::ops::Range;

pub fn split(html: &str) -> Vec<String> {
    let cleaned = clean(html);
    keep_significant(text::pack(semantic_units(&cleaned)))
}

/// Remove script/style/noscript blocks and comments.
pub fn clean(html: &str) -> String {
    let s = patterns::HTML_COMMENT.replace_all(html, "");
    let s = patterns::HTML_SCRIPT_BLOCK.replace_all(&s, "");
    let s = patterns::HTML_STYLE_BLOCK.replace_all(&s, "");
    patterns::HTML_NOSCRIPT_BLOCK
        .replace_all(&s, "")
        .into_owned()
}

fn semantic_units(cleaned: &str) -> Vec<String> {
    let sections = patterns::split_before(&patterns::HTML_HEADER_OPEN, cleaned);
    if sections.len() > 1 {
        return sections
            .into_iter()
            .map(html_to_text)
            .filter(|s| !s.is_empty())
            .collect();
    }

    let mut found: Vec<(usize, String)> = Vec::new();
    let mut code_spans: Vec<Range<usize>> = Vec::new();

    for caps in patterns::HTML_PRE_BLOCK.captures_iter(cleaned) {
        let Some(whole) = caps.get(0) else { continue };
        code_spans.push(whole.range());
        if let Some(code) = code_block_text(&caps[1]) {
            found.push((whole.start(), code));
        }
    }
    for caps in patterns::HTML_CODE_BLOCK.captures_iter(cleaned) {
        let Some(whole) = caps.get(0) else { continue };
        // Inline code stays part of its paragraph.
        if inside(&code_spans, whole.start()) || !caps[1].contains('\n') {
            continue;
        }
        code_spans.push(whole.range());
        if let Some(code) = code_block_text(&caps[1]) {
            found.push((whole.start(), code));
        }
    }
    for caps in patterns::HTML_P_BLOCK.captures_iter(cleaned) {
        let Some(whole) = caps.get(0) else { continue };
        if inside(&code_spans, whole.start()) {
            continue;
        }
        let t = html_to_text(&caps[1]);
        if !t.is_empty() {
            found.push((whole.start(), t));
        }
    }

    if found.is_empty() {
        let whole = html_to_text(cleaned);
        return if whole.is_empty() {
            Vec::new()
        } else {
            vec![whole]
        };
    }
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, t)| t).collect()
}

fn inside(spans: &[Range<usize>], pos: usize) -> bool {
    spans.iter().any(|r| r.contains(&pos))
}

fn code_block_text(inner: &str) -> Option<String> {
    let code = strip_tags_keep_whitespace(inner);
    let code = code.trim_matches(|c| c == '\n' || c == '\r');
    if code.trim().is_empty() {
        return None;
    }
    Some(format!("```\n{code}\n```"))
}

fn strip_tags_keep_whitespace(s: &str) -> String {
    patterns::decode_entities(&patterns::HTML_TAG.replace_all(s, ""))
}

/// Convert an HTML fragment to plain text.
pub fn html_to_text(fragment: &str) -> String {
    let s = patterns::HTML_BR.replace_all(fragment, "\n");
    let s = patterns::HTML_BLOCK_TAG.replace_all(&s, "\n");
    let s = patterns::HTML_TAG.replace_all(&s, "");
    normalize_whitespace(&patterns::decode_entities(&s))
}

/// Collapse inline whitespace, trim every line, and allow at most one blank line in a row.
pub fn normalize_whitespace(s: &str) -> String {
    let s = patterns::INLINE_WS.replace_all(s, " ");
    let lines: Vec<&str> = s.split('\n').map(str::trim).collect();
    let joined = lines.join("\n");
    patterns::MULTI_BLANK_LINES
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

/// Render a whole HTML document as Markdown: headers, emphasis, code, lists and links map to
/// Markdown syntax, other tags are stripped and entities decoded.
pub fn html_to_markdown(html: &str) -> String {
    let cleaned = clean(html);

    // Code blocks are swapped for placeholders so later passes leave their whitespace alone.
    let mut blocks: Vec<String> = Vec::new();
    let s = patterns::HTML_PRE_BLOCK.replace_all(&cleaned, |caps: &regex::Captures<'_>| {
        let code = strip_tags_keep_whitespace(&caps[1]);
        blocks.push(format!(
            "```\n{}\n```",
            code.trim_matches(|c| c == '\n' || c == '\r')
        ));
        format!("\n\n\u{0}CODE{}\u{0}\n\n", blocks.len() - 1)
    });

    let s = patterns::HTML_MD_HEADER.replace_all(&s, |caps: &regex::Captures<'_>| {
        let level: usize = caps[1].parse().unwrap_or(1);
        let title = inline_text(&caps[2]);
        format!("\n\n{} {}\n\n", "#".repeat(level), title)
    });
    let s = patterns::HTML_CODE_BLOCK.replace_all(&s, |caps: &regex::Captures<'_>| {
        format!("`{}`", inline_text(&caps[1]))
    });
    let s = patterns::HTML_MD_STRONG.replace_all(&s, |caps: &regex::Captures<'_>| {
        format!("**{}**", inline_text(&caps[1]))
    });
    let s = patterns::HTML_MD_EM.replace_all(&s, |caps: &regex::Captures<'_>| {
        format!("*{}*", inline_text(&caps[1]))
    });
    let s = patterns::HTML_MD_LINK.replace_all(&s, |caps: &regex::Captures<'_>| {
        let text = inline_text(&caps[2]);
        let href = caps[1].trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            text
        } else {
            format!("[{text}]({href})")
        }
    });
    let s = patterns::HTML_MD_LI.replace_all(&s, |caps: &regex::Captures<'_>| {
        format!("- {}\n", inline_text(&caps[1]))
    });
    let s = patterns::HTML_BR.replace_all(&s, "\n");
    let s = patterns::HTML_BLOCK_TAG.replace_all(&s, "\n\n");
    let s = patterns::HTML_TAG.replace_all(&s, "");
    let mut out = normalize_whitespace(&patterns::decode_entities(&s));

    for (i, block) in blocks.iter().enumerate() {
        out = out.replace(&format!("\u{0}CODE{i}\u{0}"), block);
    }
    out
}

/// Tag-free single-line text for inline Markdown constructs.
fn inline_text(fragment: &str) -> String {
    let s = patterns::HTML_TAG.replace_all(fragment, "");
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
