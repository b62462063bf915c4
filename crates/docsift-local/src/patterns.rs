//! Shared regular expressions and marker lists.
//!
//! The `regex` crate has no lookaround, so "split before a boundary" is done by callers via
//! [`split_before`] on match start offsets rather than a zero-width lookahead.

use regex::Regex;
use std::sync::LazyLock;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        pub static $name: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new($pat)
                .unwrap_or_else(|err| panic!(concat!("invalid ", stringify!($name), ": {}"), err))
        });
    };
}

// ---- Markdown ----

re!(MD_HEADER_LINE, r"(?m)^#{1,6}[ \t]+\S");
re!(MD_HEADER_START, r"(?m)^#{1,6}[ \t]");
re!(MD_HORIZONTAL_RULE, r"(?m)^[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*$");
re!(MD_FENCED_CODE, r"(?m)^[ \t]*```");
re!(MD_INDENTED_CODE, r"(?m)^(?: {4}|\t)\S");
re!(MD_LIST_ITEM, r"(?m)^[ \t]*(?:[-*+]|\d+\.)[ \t]+\S");
re!(MD_LINK, r"\[[^\]\n]+\]\([^)\s]+\)");
re!(
    MD_EMPHASIS,
    r"\*\*[^*\n]+\*\*|__[^_\n]+__|\*[^*\s][^*\n]*\*|\b_[^_\s][^_\n]*_\b"
);

// ---- Plain text ----

re!(BLANK_LINE, r"\n[ \t]*\n");
re!(SENTENCE_END, r"[.!?][ \t\r\n]+");
re!(MULTI_BLANK_LINES, r"\n{3,}");
re!(INLINE_WS, r"[ \t\x0B\x0C\r]+");

// ---- HTML ----

re!(HTML_DOCTYPE_OR_ROOT, r"(?i)<!doctype\s+html|<html[\s>]");
re!(HTML_ANY_TAG, r"<[a-zA-Z][a-zA-Z0-9]*(?:\s[^<>]*)?/?>");
re!(HTML_HEADER_TAG, r"(?i)<h[1-6][\s>]");
re!(HTML_PARAGRAPH_TAG, r"(?i)<p[\s>]");
re!(HTML_SCRIPT_BLOCK, r"(?is)<script\b[^>]*>.*?</script\s*>");
re!(HTML_STYLE_BLOCK, r"(?is)<style\b[^>]*>.*?</style\s*>");
re!(HTML_NOSCRIPT_BLOCK, r"(?is)<noscript\b[^>]*>.*?</noscript\s*>");
re!(HTML_COMMENT, r"(?s)<!--.*?-->");
re!(HTML_HEADER_OPEN, r"(?i)<h[1-6](?:\s[^>]*)?>");
re!(HTML_PRE_BLOCK, r"(?is)<pre\b[^>]*>(.*?)</pre\s*>");
re!(HTML_CODE_BLOCK, r"(?is)<code\b[^>]*>(.*?)</code\s*>");
re!(HTML_P_BLOCK, r"(?is)<p(?:\s[^>]*)?>(.*?)</p\s*>");
re!(HTML_BR, r"(?i)<br\s*/?>");
re!(
    HTML_BLOCK_TAG,
    r"(?i)</?(?:p|div|section|article|header|footer|nav|aside|main|h[1-6]|li|ul|ol|dl|dt|dd|tr|table|thead|tbody|blockquote|pre|figure|figcaption|hr)(?:\s[^>]*)?/?>"
);
re!(HTML_TAG, r"(?s)<[^>]+>");

// HTML -> Markdown element patterns.
re!(HTML_MD_HEADER, r"(?is)<h([1-6])(?:\s[^>]*)?>(.*?)</h[1-6]\s*>");
re!(HTML_MD_STRONG, r"(?is)<(?:strong|b)(?:\s[^>]*)?>(.*?)</(?:strong|b)\s*>");
re!(HTML_MD_EM, r"(?is)<(?:em|i)(?:\s[^>]*)?>(.*?)</(?:em|i)\s*>");
re!(HTML_MD_LINK, r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#);
re!(HTML_MD_LI, r"(?is)<li(?:\s[^>]*)?>(.*?)</li\s*>");

// ---- Swagger / SPA markers ----

re!(
    SWAGGER_UI_MARKER,
    r#"(?i)swagger-ui|SwaggerUIBundle|SwaggerUIStandalonePreset|id=["']swagger-ui["']"#
);
re!(REDOC_MARKER, r"(?i)<redoc[\s>]|redoc\.standalone|Redoc\.init|redoc-container");
re!(STOPLIGHT_MARKER, r"(?i)<elements-api[\s>]|@stoplight/elements|stoplight");

/// Spec-URL patterns, tried in order; the first capture group is the URL.
pub static SPEC_URL_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        (
            "bundle_url",
            r#"(?is)SwaggerUIBundle\s*\(\s*\{.*?\burl\s*:\s*["'`]([^"'`]+)["'`]"#,
        ),
        (
            "swagger_ui_url_param",
            r#"(?i)swagger-ui[^"'\s]*[?&]url=([^"'&\s>]+)"#,
        ),
        ("spec_key", r#"(?i)\bspec(?:-url|Url)?\s*[:=]\s*["'`]([^"'`]+)["'`]"#),
        ("config_url", r#"(?i)\bconfigUrl\s*:\s*["'`]([^"'`]+)["'`]"#),
        (
            "generic_url",
            r#"(?i)["']?url["']?\s*:\s*["']([^"']+\.(?:json|yaml|yml))["']"#,
        ),
        ("data_url", r#"(?i)\bdata-url\s*=\s*["']([^"']+)["']"#),
    ]
    .into_iter()
    .map(|(name, pat)| {
        let re = Regex::new(pat)
            .unwrap_or_else(|err| panic!("invalid spec url pattern {name}: {err}"));
        (name, re)
    })
    .collect()
});

/// Markers of a client-rendered page whose static HTML is a scaffold.
pub const SPA_SIGNATURES: &[&str] = &[
    r#"<div id="root"></div>"#,
    r#"<div id="app"></div>"#,
    r#"<div id="__next">"#,
    "__NEXT_DATA__",
    "__NUXT__",
    "ng-version",
    "data-reactroot",
    "window.__INITIAL_STATE__",
    "SwaggerUIBundle",
    "swagger-ui",
    "<redoc",
    "Redoc.init",
    "<elements-api",
];

/// Decode named and numeric entities in one pass (so `&amp;lt;` becomes `&lt;`, not `<`).
/// Unknown entities are left as-is. Non-breaking spaces become plain spaces and soft hyphens
/// are dropped, so decoded text tokenizes like the visible page.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    html_escape::decode_html_entities(s)
        .chars()
        .filter(|&c| c != '\u{ad}')
        .map(|c| if c == '\u{a0}' { ' ' } else { c })
        .collect()
}

/// Split `text` so every match of `re` starts a new piece. The boundary stays attached to the
/// content that follows it; a match at offset 0 does not produce an empty leading piece.
pub fn split_before<'a>(re: &Regex, text: &'a str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    for m in re.find_iter(text) {
        if m.start() > start {
            out.push(&text[start..m.start()]);
            start = m.start();
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}
