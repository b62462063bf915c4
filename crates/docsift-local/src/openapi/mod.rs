//! Swagger/OpenAPI UI detection, spec discovery and retrieval.

pub mod model;
pub mod render;

pub use model::{is_valid_spec, ApiSpec, RawSpec};
pub use render::{to_compact_markdown, to_markdown};

use crate::patterns;
use docsift_core::{
    resolve_url, Error, GetRequest, HeadRequest, HttpBody, HttpTransport, Result, SpecType,
    SwaggerDetectionResult,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// Suffixes probed relative to the page's directory and its parent.
const RELATIVE_SUFFIXES: &[&str] = &[
    "swagger.json",
    "openapi.json",
    "swagger.yaml",
    "openapi.yaml",
    "api-docs",
    "v3/api-docs",
    "v2/api-docs",
    "swagger/v1/swagger.json",
];

/// Filenames substituted for the last or second path segment.
const SPEC_FILENAMES: &[&str] = &["swagger.json", "openapi.json", "swagger.yaml", "openapi.yaml"];

const ROOT_ENDPOINTS: &[&str] = &[
    "/swagger.json",
    "/openapi.json",
    "/swagger.yaml",
    "/openapi.yaml",
    "/v3/api-docs",
    "/v2/api-docs",
    "/api-docs",
    "/swagger/v1/swagger.json",
    "/api/swagger.json",
    "/api/openapi.json",
    "/docs/openapi.json",
];

pub fn detect_swagger(html: &str, page_url: &str) -> SwaggerDetectionResult {
    let marker = if patterns::SWAGGER_UI_MARKER.is_match(html) {
        "swagger_ui"
    } else if patterns::REDOC_MARKER.is_match(html) {
        "redoc"
    } else if patterns::STOPLIGHT_MARKER.is_match(html) {
        "stoplight"
    } else {
        return SwaggerDetectionResult::default();
    };

    for (name, re) in patterns::SPEC_URL_PATTERNS.iter() {
        let Some(raw) = re.captures(html).and_then(|c| c.get(1)) else {
            continue;
        };
        let candidate = patterns::decode_entities(raw.as_str().trim());
        if candidate.is_empty() {
            continue;
        }
        match resolve_url(page_url, &candidate) {
            Ok(spec_url) => {
                let spec_type = spec_type_for(&spec_url);
                return SwaggerDetectionResult {
                    is_swagger: true,
                    spec_url: Some(spec_url),
                    spec_type: Some(spec_type),
                    detection_method: Some(format!("{marker}:{name}")),
                };
            }
            Err(e) => {
                tracing::debug!(pattern = name, error = %e, "unresolvable spec url");
            }
        }
    }

    SwaggerDetectionResult {
        is_swagger: true,
        spec_url: None,
        spec_type: None,
        detection_method: Some(marker.to_string()),
    }
}

fn spec_type_for(url: &str) -> SpecType {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .to_ascii_lowercase();
    if path.ends_with(".yaml") || path.ends_with(".yml") {
        SpecType::Yaml
    } else {
        SpecType::Json
    }
}

/// Probe order: next to the page, its parent, segment substitutions, then the root.
pub fn candidate_spec_urls(page_url: &str) -> Vec<String> {
    let Ok(url) = url::Url::parse(page_url) else {
        return Vec::new();
    };
    let origin = url.origin().ascii_serialization();
    let path = url.path();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // Directory of the page: everything up to the last '/'.
    let dir = match path.rfind('/') {
        Some(i) => &path[..=i],
        None => "/",
    };
    let dir_segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    let parent = match dir_segments.split_last() {
        Some((_, rest)) if !rest.is_empty() => format!("/{}/", rest.join("/")),
        _ => "/".to_string(),
    };

    let mut out: Vec<String> = Vec::new();
    for suffix in RELATIVE_SUFFIXES {
        out.push(format!("{origin}{dir}{suffix}"));
    }
    for suffix in RELATIVE_SUFFIXES {
        out.push(format!("{origin}{parent}{suffix}"));
    }
    if let Some((_, head)) = segments.split_last() {
        let prefix = if head.is_empty() {
            String::new()
        } else {
            format!("/{}", head.join("/"))
        };
        for f in SPEC_FILENAMES {
            out.push(format!("{origin}{prefix}/{f}"));
        }
    }
    if let Some(first) = segments.first() {
        for f in SPEC_FILENAMES {
            out.push(format!("{origin}/{first}/{f}"));
        }
    }
    for ep in ROOT_ENDPOINTS {
        out.push(format!("{origin}{ep}"));
    }

    let mut seen = std::collections::HashSet::new();
    out.retain(|u| seen.insert(u.clone()));
    out
}

/// HEAD each candidate; the first 200 whose content type or filename says JSON/YAML wins.
pub async fn discover_spec_url(
    transport: &dyn HttpTransport,
    page_url: &str,
    timeout_ms: u64,
    headers: &BTreeMap<String, String>,
) -> Option<String> {
    for candidate in candidate_spec_urls(page_url) {
        let req = HeadRequest {
            url: candidate.clone(),
            timeout_ms: Some(timeout_ms),
            headers: headers.clone(),
            accept_only_200: true,
        };
        match transport.head(&req).await {
            Ok(resp) if resp.status == 200 && looks_like_spec(&candidate, resp.content_type()) => {
                tracing::debug!(url = %candidate, "discovered spec endpoint");
                return Some(candidate);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(url = %candidate, error = %e, "spec probe failed"),
        }
    }
    None
}

fn looks_like_spec(url: &str, content_type: Option<&str>) -> bool {
    let ct = content_type.unwrap_or("").to_ascii_lowercase();
    if ct.contains("json") || ct.contains("yaml") {
        return true;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    path.ends_with(".json") || path.ends_with(".yaml") || path.ends_with(".yml")
}

/// GET a spec and check it is one.
pub async fn fetch_spec(
    transport: &dyn HttpTransport,
    spec_url: &str,
    timeout_ms: u64,
    headers: &BTreeMap<String, String>,
) -> Result<Value> {
    let req = GetRequest {
        url: spec_url.to_string(),
        timeout_ms: Some(timeout_ms),
        headers: headers.clone(),
    };
    let raw = match transport.get(&req).await? {
        HttpBody::Json(v) => RawSpec::Structured(v),
        HttpBody::Text(s) => RawSpec::from_text(&s),
    };
    let v = raw.into_value()?;
    if is_valid_spec(&v) {
        Ok(v)
    } else {
        Err(Error::Parse(format!("{spec_url} is not an OpenAPI/Swagger document")))
    }
}

/// Render a validated spec as full or compact Markdown.
pub fn render(spec: &Value, compact: bool) -> String {
    let api = ApiSpec::from_value(spec);
    if compact {
        to_compact_markdown(&api)
    } else {
        to_markdown(&api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_url_is_resolved_against_page() {
        let html = r#"<div id="swagger-ui"></div><script>
            window.ui = SwaggerUIBundle({ url: "/v3/api-docs", dom_id: '#swagger-ui' });
        </script>"#;
        let r = detect_swagger(html, "https://api.example.com/docs/index.html");
        assert!(r.is_swagger);
        assert_eq!(r.spec_url.as_deref(), Some("https://api.example.com/v3/api-docs"));
        assert_eq!(r.spec_type, Some(SpecType::Json));
        assert_eq!(r.detection_method.as_deref(), Some("swagger_ui:bundle_url"));
    }

    #[test]
    fn redoc_spec_url_yaml() {
        let html = r#"<redoc spec-url="specs/api.yaml"></redoc><script src="redoc.standalone.js"></script>"#;
        let r = detect_swagger(html, "https://example.com/reference/");
        assert!(r.is_swagger);
        assert_eq!(r.spec_url.as_deref(), Some("https://example.com/reference/specs/api.yaml"));
        assert_eq!(r.spec_type, Some(SpecType::Yaml));
    }

    #[test]
    fn marker_without_url() {
        let r = detect_swagger("<div id=\"swagger-ui\"></div>", "https://example.com/");
        assert!(r.is_swagger);
        assert!(r.spec_url.is_none());
        assert_eq!(r.detection_method.as_deref(), Some("swagger_ui"));
    }

    #[test]
    fn plain_page_is_not_swagger() {
        let r = detect_swagger("<html><body><p>Hello</p></body></html>", "https://example.com/");
        assert_eq!(r, SwaggerDetectionResult::default());
    }

    #[test]
    fn candidates_prefer_colocated_over_root() {
        let c = candidate_spec_urls("https://h.example/api/v1/docs/index.html");
        let pos = |u: &str| c.iter().position(|x| x == u).unwrap();
        assert_eq!(c[0], "https://h.example/api/v1/docs/swagger.json");
        assert!(pos("https://h.example/api/v1/docs/openapi.json") < pos("https://h.example/api/v1/openapi.json"));
        assert!(pos("https://h.example/api/v1/swagger.json") < pos("https://h.example/api/swagger.json"));
        assert!(pos("https://h.example/api/swagger.json") < pos("https://h.example/swagger.json"));
        let mut dedup = c.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), c.len());
    }

    #[test]
    fn candidates_for_root_page() {
        let c = candidate_spec_urls("https://h.example/");
        assert_eq!(c[0], "https://h.example/swagger.json");
        assert!(c.contains(&"https://h.example/v3/api-docs".to_string()));
        assert!(candidate_spec_urls("not a url").is_empty());
    }

    #[test]
    fn spec_detection_by_content_type_or_extension() {
        assert!(looks_like_spec("https://h/v3/api-docs", Some("application/json; charset=utf-8")));
        assert!(looks_like_spec("https://h/openapi.yml?x=1", Some("text/plain")));
        assert!(!looks_like_spec("https://h/api-docs", Some("text/html")));
    }
}
