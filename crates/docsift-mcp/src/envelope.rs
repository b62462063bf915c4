use docsift_core::SmartFetchResult;
use serde::Serialize;

pub(crate) const SCHEMA_VERSION: u64 = 1;

/// Stands in for an empty result list so callers always get at least one excerpt.
pub(crate) const NO_MATCH: &str = "No matching content found.";

pub(crate) const MAX_RESULTS_CAP: usize = 10;

pub(crate) fn clamp_max_results(n: usize) -> usize {
    n.clamp(1, MAX_RESULTS_CAP)
}

pub(crate) fn error_hint(code: &str) -> &'static str {
    match code {
        "invalid_url" => "Check DOCSIFT_URL (or --url): it must be an absolute http(s) URL.",
        "connect" => "The documentation host refused the connection or could not be resolved.",
        "timeout" => "The documentation host did not answer in time. Raise DOCSIFT_TIMEOUT_MS.",
        "http_status" => {
            "The documentation URL returned a non-success status. If it needs authentication, set DOCSIFT_HEADER (\"Authorization: Bearer ...\")."
        }
        "not_configured" => "Set DOCSIFT_URL (or pass --url) to the documentation page to search.",
        "invalid_params" => "Check the tool arguments against the tool schema.",
        _ => "Fetching the documentation failed.",
    }
}

pub(crate) fn retryable(code: &str) -> bool {
    matches!(code, "connect" | "timeout" | "fetch_failed")
}

pub(crate) fn error_obj(code: &str, message: impl ToString) -> serde_json::Value {
    #[derive(Serialize)]
    struct ErrorObject<'a> {
        code: &'a str,
        message: String,
        hint: &'static str,
        retryable: bool,
    }

    let e = ErrorObject {
        code,
        message: message.to_string(),
        hint: error_hint(code),
        retryable: retryable(code),
    };
    serde_json::to_value(e).unwrap_or_else(|_| {
        serde_json::json!({
            "code": code,
            "message": message.to_string(),
            "hint": error_hint(code),
            "retryable": retryable(code),
        })
    })
}

pub(crate) fn add_envelope_fields(payload: &mut serde_json::Value, kind: &str, elapsed_ms: u128) {
    payload["schema_version"] = serde_json::json!(SCHEMA_VERSION);
    payload["kind"] = serde_json::json!(kind);
    payload["elapsed_ms"] = serde_json::json!(elapsed_ms);
}

/// Run the ranked search over a fetched document and shape the caller-facing payload.
pub(crate) fn search_payload(
    fetched: &SmartFetchResult,
    query: &str,
    max_results: usize,
) -> serde_json::Value {
    let content = match fetched.content.as_deref() {
        Some(c) if fetched.success => c,
        _ => {
            let code = fetched.error_code.as_deref().unwrap_or("fetch_failed");
            return serde_json::json!({
                "ok": false,
                "url": fetched.url,
                "error": error_obj(code, fetched.error.as_deref().unwrap_or("fetch failed")),
            });
        }
    };

    let found = docsift_local::search(content, query, clamp_max_results(max_results));
    let results = if found.results.is_empty() {
        vec![NO_MATCH.to_string()]
    } else {
        found.results
    };
    let mut payload = serde_json::json!({
        "ok": true,
        "url": fetched.url,
        "method": fetched.method,
        "content_type": fetched.content_type,
        "total_chunks": found.total_chunks,
        "matched_chunks": found.matched_chunks,
        "results": results,
    });
    if let Some(spec_url) = &fetched.spec_url {
        payload["spec_url"] = serde_json::json!(spec_url);
    }
    payload
}

/// Keep a short prefix of a secret so users can tell which one is configured.
pub(crate) fn mask_secret(v: &str) -> String {
    let v = v.trim();
    if v.chars().count() < 8 {
        return "***".to_string();
    }
    let head: String = v.chars().take(4).collect();
    format!("{head}***")
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsift_core::{ContentType, Error, FetchMethod};

    fn fetched(content: &str, content_type: ContentType) -> SmartFetchResult {
        SmartFetchResult {
            success: true,
            content: Some(content.to_string()),
            content_type,
            method: FetchMethod::Direct,
            error: None,
            error_code: None,
            url: "https://docs.example/guide".to_string(),
            spec_url: None,
        }
    }

    #[test]
    fn bearer_token_markdown_scenario() {
        let doc = "# Intro\nHello world.\n\n# Authentication\nSend a bearer token in the Authorization header.";
        let v = search_payload(&fetched(doc, ContentType::Markdown), "bearer token", 3);
        assert_eq!(v["ok"].as_bool(), Some(true));
        assert_eq!(v["total_chunks"].as_u64(), Some(2));
        assert_eq!(v["matched_chunks"].as_u64(), Some(1));
        assert_eq!(v["method"].as_str(), Some("direct"));
        assert_eq!(v["content_type"].as_str(), Some("markdown"));
        let results = v["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].as_str().unwrap().contains("bearer token"));
        assert!(v.get("spec_url").is_none());
    }

    #[test]
    fn empty_query_yields_sentinel() {
        let v = search_payload(&fetched("# A\nSome words here.", ContentType::Markdown), "", 3);
        assert_eq!(v["results"], serde_json::json!([NO_MATCH]));
        assert_eq!(v["matched_chunks"].as_u64(), Some(0));
    }

    #[test]
    fn failed_fetch_carries_error_code() {
        let r = SmartFetchResult::failed(
            "https://docs.example/missing",
            &Error::HttpStatus {
                status: 404,
                url: "https://docs.example/missing".to_string(),
            },
        );
        let v = search_payload(&r, "anything", 3);
        assert_eq!(v["ok"].as_bool(), Some(false));
        assert_eq!(v["error"]["code"].as_str(), Some("http_status"));
        assert_eq!(v["error"]["retryable"].as_bool(), Some(false));
        assert!(v.get("results").is_none());
    }

    #[test]
    fn max_results_is_clamped() {
        assert_eq!(clamp_max_results(0), 1);
        assert_eq!(clamp_max_results(3), 3);
        assert_eq!(clamp_max_results(50), MAX_RESULTS_CAP);
    }

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask_secret("Bearer abcdef123"), "Bear***");
        assert_eq!(mask_secret("short"), "***");
    }
}
