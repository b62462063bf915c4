//! Document format detection (JSON / HTML / Markdown / text).
//!
//! Checks run in a fixed order because JSON payloads routinely embed HTML-looking strings.

use crate::patterns;
use docsift_core::{DocumentFormat, FormatDetectionResult};

const JSON_THRESHOLD: f64 = 0.8;
const HTML_THRESHOLD: f64 = 0.6;
const MARKDOWN_THRESHOLD: f64 = 0.5;
const FALLBACK_CONFIDENCE: f64 = 0.5;

struct Check {
    confidence: f64,
    indicators: Vec<String>,
}

pub fn detect(document: &str) -> FormatDetectionResult {
    let json = check_json(document);
    if json.confidence > JSON_THRESHOLD {
        return result(DocumentFormat::Json, json);
    }
    let html = check_html(document);
    if html.confidence > HTML_THRESHOLD {
        return result(DocumentFormat::Html, html);
    }
    let md = check_markdown(document);
    if md.confidence > MARKDOWN_THRESHOLD {
        return result(DocumentFormat::Markdown, md);
    }
    FormatDetectionResult {
        format: DocumentFormat::Text,
        confidence: FALLBACK_CONFIDENCE,
        indicators: vec!["No strong structural indicators".to_string()],
    }
}

fn result(format: DocumentFormat, c: Check) -> FormatDetectionResult {
    FormatDetectionResult {
        format,
        confidence: c.confidence.min(1.0),
        indicators: c.indicators,
    }
}

fn check_json(document: &str) -> Check {
    let mut confidence = 0.0;
    let mut indicators = Vec::new();
    let trimmed = document.trim();
    let looks_json = trimmed.starts_with('{') || trimmed.starts_with('[');
    if looks_json {
        confidence += 0.3;
        indicators.push("Starts with JSON delimiter".to_string());
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(_) => {
            confidence += 0.6;
            indicators.push("Valid JSON syntax".to_string());
        }
        Err(_) if looks_json => {
            // Malformed JSON, not "not JSON".
            confidence = 0.2;
            indicators.push("Invalid JSON syntax".to_string());
        }
        Err(_) => {}
    }
    Check {
        confidence,
        indicators,
    }
}

fn check_html(document: &str) -> Check {
    let mut confidence: f64 = 0.0;
    let mut indicators = Vec::new();
    if patterns::HTML_DOCTYPE_OR_ROOT.is_match(document) {
        confidence += 0.5;
        indicators.push("HTML doctype or root tag".to_string());
    }
    let tags = patterns::HTML_ANY_TAG.find_iter(document).count();
    if tags > 10 {
        confidence += 0.3;
        indicators.push(format!("Many HTML tags ({tags})"));
    } else if tags >= 4 {
        confidence += 0.15;
        indicators.push(format!("Some HTML tags ({tags})"));
    }
    if patterns::HTML_HEADER_TAG.is_match(document) {
        confidence += 0.1;
        indicators.push("HTML header tags".to_string());
    }
    if patterns::HTML_PARAGRAPH_TAG.is_match(document) {
        confidence += 0.1;
        indicators.push("HTML paragraph tags".to_string());
    }
    Check {
        confidence: confidence.min(1.0),
        indicators,
    }
}

fn check_markdown(document: &str) -> Check {
    let mut confidence: f64 = 0.0;
    let mut indicators = Vec::new();
    if patterns::MD_HEADER_LINE.is_match(document) {
        confidence += 0.3;
        indicators.push("Markdown headers".to_string());
    }
    if patterns::MD_FENCED_CODE.is_match(document) {
        confidence += 0.25;
        indicators.push("Fenced code blocks".to_string());
    }
    let items = patterns::MD_LIST_ITEM.find_iter(document).count();
    if items > 2 {
        confidence += 0.15;
        indicators.push(format!("List items ({items})"));
    }
    if patterns::MD_LINK.is_match(document) {
        confidence += 0.15;
        indicators.push("Markdown links".to_string());
    }
    if patterns::MD_EMPHASIS.is_match(document) {
        confidence += 0.1;
        indicators.push("Bold/italic emphasis".to_string());
    }
    if patterns::MD_HORIZONTAL_RULE.is_match(document) {
        confidence += 0.1;
        indicators.push("Horizontal rules".to_string());
    }
    Check {
        confidence: confidence.min(1.0),
        indicators,
    }
}
