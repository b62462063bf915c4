//! Decide how to get usable text out of a documentation URL.
//!
//! Strategies, first success wins:
//! 1. direct GET (JSON, OpenAPI, Markdown, text and ordinary HTML end here)
//! 2. Swagger/OpenAPI UI: embedded spec URL, then endpoint probing
//! 3. headless render, when a renderer is available
//! 4. the direct HTML as-is
//!
//! Only a failure of the direct GET produces `success = false`; everything after it degrades.

use crate::chunk::html;
use crate::openapi;
use crate::patterns;
use crate::render_playwright::PlaywrightRenderer;
use crate::transport::{is_sensitive_header, LocalTransport};
use docsift_core::{
    ContentType, FetchMethod, GetRequest, HeadlessRenderer, HttpBody, HttpTransport,
    RenderRequest, Result, SmartFetchResult, DEFAULT_HEADLESS_TIMEOUT_MS, DEFAULT_HTTP_TIMEOUT_MS,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Visible text below this share of the raw HTML marks a client-rendered shell.
const SPA_TEXT_RATIO: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct SmartFetchOptions {
    pub timeout_ms: u64,
    /// Sent on every request to the page's origin (e.g. `Authorization`).
    pub headers: BTreeMap<String, String>,
    pub use_headless: bool,
    pub headless_timeout_ms: u64,
    pub wait_for_selector: Option<String>,
    /// Render specs as a flat endpoint list instead of the full document.
    pub compact_openapi: bool,
}

impl Default for SmartFetchOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            headers: BTreeMap::new(),
            use_headless: true,
            headless_timeout_ms: DEFAULT_HEADLESS_TIMEOUT_MS,
            wait_for_selector: None,
            compact_openapi: false,
        }
    }
}

impl SmartFetchOptions {
    fn probe_timeout_ms(&self) -> u64 {
        (self.timeout_ms / 2).max(1)
    }
}

#[derive(Clone)]
pub struct SmartFetcher {
    transport: Arc<dyn HttpTransport>,
    renderer: Arc<dyn HeadlessRenderer>,
}

impl SmartFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, renderer: Arc<dyn HeadlessRenderer>) -> Self {
        Self {
            transport,
            renderer,
        }
    }

    /// reqwest transport + Playwright renderer.
    pub fn local() -> Result<Self> {
        Ok(Self::new(
            Arc::new(LocalTransport::new()?),
            Arc::new(PlaywrightRenderer::new()),
        ))
    }

    pub fn renderer(&self) -> &dyn HeadlessRenderer {
        self.renderer.as_ref()
    }

    pub async fn fetch(&self, url: &str, opts: &SmartFetchOptions) -> SmartFetchResult {
        let req = GetRequest {
            url: url.to_string(),
            timeout_ms: Some(opts.timeout_ms),
            headers: opts.headers.clone(),
        };
        let body = match self.transport.get(&req).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(%url, code = e.code(), error = %e, "direct fetch failed");
                return SmartFetchResult::failed(url, &e);
            }
        };

        let page = match body {
            HttpBody::Json(v) => return direct_json(url, v, opts),
            HttpBody::Text(s) => s,
        };
        if let Some(spec) = inline_spec(&page) {
            tracing::debug!(%url, "direct body is an OpenAPI document");
            return openapi_result(url, &spec, opts, FetchMethod::Direct, Some(url.to_string()));
        }

        let content_type = classify_text(&page);
        if content_type != ContentType::Html || !looks_like_spa(&page) {
            return success(url, page, content_type, FetchMethod::Direct, None);
        }
        tracing::debug!(%url, "page looks client-rendered");

        if let Some(result) = self.try_openapi(url, &page, opts).await {
            return result;
        }
        if let Some(result) = self.try_headless(url, opts).await {
            return result;
        }
        tracing::debug!(%url, "falling back to raw html");
        success(url, page, ContentType::Html, FetchMethod::HtmlExtract, None)
    }

    async fn try_openapi(
        &self,
        url: &str,
        page: &str,
        opts: &SmartFetchOptions,
    ) -> Option<SmartFetchResult> {
        let detection = openapi::detect_swagger(page, url);
        if !detection.is_swagger {
            return None;
        }
        tracing::debug!(
            %url,
            method = detection.detection_method.as_deref().unwrap_or(""),
            spec_url = detection.spec_url.as_deref().unwrap_or(""),
            "swagger ui detected"
        );

        if let Some(spec_url) = detection.spec_url.as_deref() {
            match self.fetch_spec(url, spec_url, opts).await {
                Ok(spec) => {
                    return Some(openapi_result(
                        url,
                        &spec,
                        opts,
                        FetchMethod::OpenapiSpec,
                        Some(spec_url.to_string()),
                    ))
                }
                Err(e) => tracing::warn!(%spec_url, error = %e, "embedded spec url failed"),
            }
        }

        let discovered = openapi::discover_spec_url(
            self.transport.as_ref(),
            url,
            opts.probe_timeout_ms(),
            &opts.headers,
        )
        .await?;
        match self.fetch_spec(url, &discovered, opts).await {
            Ok(spec) => Some(openapi_result(
                url,
                &spec,
                opts,
                FetchMethod::OpenapiSpec,
                Some(discovered),
            )),
            Err(e) => {
                tracing::warn!(spec_url = %discovered, error = %e, "discovered spec failed");
                None
            }
        }
    }

    async fn fetch_spec(&self, page_url: &str, spec_url: &str, opts: &SmartFetchOptions) -> Result<Value> {
        let headers = headers_for(page_url, spec_url, &opts.headers);
        openapi::fetch_spec(self.transport.as_ref(), spec_url, opts.timeout_ms, &headers).await
    }

    async fn try_headless(&self, url: &str, opts: &SmartFetchOptions) -> Option<SmartFetchResult> {
        if !opts.use_headless {
            return None;
        }
        if !self.renderer.available().await {
            tracing::debug!("no headless renderer available");
            return None;
        }
        let mut req = RenderRequest::new(url, opts.headless_timeout_ms);
        req.wait_for_selector = opts.wait_for_selector.clone();
        req.headers = opts.headers.clone();

        let outcome = match self.renderer.render(&req).await {
            Ok(o) if o.success => o,
            Ok(o) => {
                tracing::warn!(%url, error = o.error.as_deref().unwrap_or(""), "headless render failed");
                return None;
            }
            Err(e) => {
                tracing::warn!(%url, code = e.code(), error = %e, "headless render failed");
                return None;
            }
        };

        if let Some(spec) = outcome.spec.as_ref().filter(|s| openapi::is_valid_spec(s)) {
            tracing::debug!(
                %url,
                source = outcome.spec_source.as_deref().unwrap_or(""),
                "spec recovered from rendered page"
            );
            return Some(openapi_result(url, spec, opts, FetchMethod::Headless, None));
        }

        let text = outcome
            .text
            .as_deref()
            .map(clean_rendered_text)
            .filter(|t| !t.is_empty())?;
        Some(success(url, text, ContentType::Text, FetchMethod::Headless, None))
    }
}

fn success(
    url: &str,
    content: String,
    content_type: ContentType,
    method: FetchMethod,
    spec_url: Option<String>,
) -> SmartFetchResult {
    SmartFetchResult {
        success: true,
        content: Some(content),
        content_type,
        method,
        error: None,
        error_code: None,
        url: url.to_string(),
        spec_url,
    }
}

fn openapi_result(
    url: &str,
    spec: &Value,
    opts: &SmartFetchOptions,
    method: FetchMethod,
    spec_url: Option<String>,
) -> SmartFetchResult {
    let md = openapi::render(spec, opts.compact_openapi);
    success(url, md, ContentType::Openapi, method, spec_url)
}

fn direct_json(url: &str, v: Value, opts: &SmartFetchOptions) -> SmartFetchResult {
    if openapi::is_valid_spec(&v) {
        return openapi_result(url, &v, opts, FetchMethod::Direct, Some(url.to_string()));
    }
    let pretty = serde_json::to_string_pretty(&v).unwrap_or_else(|_| v.to_string());
    success(url, pretty, ContentType::Json, FetchMethod::Direct, None)
}

/// A spec served with a non-JSON content type: a JSON object, or YAML starting with a
/// version key.
fn inline_spec(body: &str) -> Option<Value> {
    let trimmed = body.trim_start();
    let raw = if trimmed.starts_with('{') {
        openapi::RawSpec::from_text(trimmed)
    } else if trimmed.starts_with("openapi:") || trimmed.starts_with("swagger:") {
        openapi::RawSpec::RawYaml(trimmed.to_string())
    } else {
        return None;
    };
    let v = raw.into_value().ok()?;
    openapi::is_valid_spec(&v).then_some(v)
}

/// Cheap classification of a text body.
pub fn classify_text(body: &str) -> ContentType {
    let t = body.trim();
    if (t.starts_with('{') || t.starts_with('['))
        && serde_json::from_str::<Value>(t).is_ok()
    {
        return ContentType::Json;
    }
    if patterns::HTML_DOCTYPE_OR_ROOT.is_match(t)
        || (t.starts_with('<') && patterns::HTML_BLOCK_TAG.is_match(t))
    {
        return ContentType::Html;
    }
    if patterns::MD_HEADER_LINE.is_match(t)
        || patterns::MD_FENCED_CODE.is_match(t)
        || patterns::MD_LINK.is_match(t)
    {
        return ContentType::Markdown;
    }
    ContentType::Text
}

/// A static scaffold whose content is rendered client-side: almost no visible text, or a known
/// framework/documentation-UI signature.
pub fn looks_like_spa(page: &str) -> bool {
    if patterns::SPA_SIGNATURES.iter().any(|sig| page.contains(sig)) {
        return true;
    }
    let raw_len = page.chars().count();
    if raw_len == 0 {
        return false;
    }
    visible_text_chars(page) as f64 / (raw_len as f64) < SPA_TEXT_RATIO
}

fn visible_text_chars(page: &str) -> usize {
    let doc = html_scraper::Html::parse_document(&html::clean(page));
    doc.root_element()
        .text()
        .flat_map(|t| t.split_whitespace())
        .map(|w| w.chars().count() + 1)
        .sum()
}

/// Strip control characters, trim each line, and collapse runs of blank lines.
pub fn clean_rendered_text(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    html::normalize_whitespace(&stripped)
}

/// Drop credentials when a request leaves the page's origin.
fn headers_for(
    page_url: &str,
    target_url: &str,
    headers: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let same_origin = match (url::Url::parse(page_url), url::Url::parse(target_url)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    };
    if same_origin {
        return headers.clone();
    }
    headers
        .iter()
        .filter(|(k, _)| !is_sensitive_header(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
