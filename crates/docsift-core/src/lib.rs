//! Backend-agnostic types for docsift.
//!
//! Everything here is transient per-call data: nothing is persisted, and nothing in this crate
//! performs IO. Concrete transports and renderers live in `docsift-local`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("parse failed: {0}")]
    Parse(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("render failed: {0}")]
    Render(String),
}

impl Error {
    /// Stable machine-readable code for error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidUrl(_) => "invalid_url",
            Error::Connect(_) => "connect",
            Error::Timeout(_) => "timeout",
            Error::HttpStatus { .. } => "http_status",
            Error::Fetch(_) => "fetch_failed",
            Error::Parse(_) => "parse_failed",
            Error::NotConfigured(_) => "not_configured",
            Error::Render(_) => "render_failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Default budget for a direct HTTP fetch.
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;
/// Default budget for a headless render.
pub const DEFAULT_HEADLESS_TIMEOUT_MS: u64 = 30_000;

// ---- Format detection ----

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Json,
    Html,
    Markdown,
    Text,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Json => "json",
            DocumentFormat::Html => "html",
            DocumentFormat::Markdown => "markdown",
            DocumentFormat::Text => "text",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormatDetectionResult {
    pub format: DocumentFormat,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// Human-readable evidence, in the order it was gathered.
    pub indicators: Vec<String>,
}

// ---- Chunks and search ----

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub content: String,
    /// Zero-based position in the document's chunk sequence.
    pub index: usize,
    /// Non-negative relevance score.
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Expanded-context excerpts, best first.
    pub results: Vec<String>,
    pub total_chunks: usize,
    /// Chunks with score > 0.
    pub matched_chunks: usize,
}

// ---- Swagger / OpenAPI detection ----

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpecType {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SwaggerDetectionResult {
    pub is_swagger: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_type: Option<SpecType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_method: Option<String>,
}

// ---- Smart fetch ----

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Markdown,
    Html,
    Json,
    Openapi,
    Text,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FetchMethod {
    Direct,
    OpenapiSpec,
    Headless,
    HtmlExtract,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmartFetchResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub content_type: ContentType,
    pub method: FetchMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// [`Error::code`] of the failure, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_url: Option<String>,
}

impl SmartFetchResult {
    pub fn failed(url: &str, err: &Error) -> Self {
        Self {
            success: false,
            content: None,
            content_type: ContentType::Unknown,
            method: FetchMethod::Direct,
            error: Some(err.to_string()),
            error_code: Some(err.code().to_string()),
            url: url.to_string(),
            spec_url: None,
        }
    }
}

// ---- HTTP transport ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRequest {
    pub url: String,
    pub timeout_ms: Option<u64>,
    pub headers: BTreeMap<String, String>,
}

impl GetRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadRequest {
    pub url: String,
    pub timeout_ms: Option<u64>,
    pub headers: BTreeMap<String, String>,
    /// When true, any status other than 200 is reported as `Error::HttpStatus`.
    pub accept_only_200: bool,
}

impl HeadRequest {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// A response body. `Json` is used when the server declared a JSON content type and the
/// body parsed; everything else arrives as `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpBody {
    Text(String),
    Json(serde_json::Value),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeadResponse {
    pub status: u16,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
}

impl HeadResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }
}

#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, req: &GetRequest) -> Result<HttpBody>;
    async fn head(&self, req: &HeadRequest) -> Result<HeadResponse>;
}

// ---- Headless rendering ----

/// Version of the JSON message exchanged with a headless renderer.
pub const RENDER_PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    pub protocol_version: u32,
    pub url: String,
    pub timeout_ms: u64,
    /// Best-effort: a missing selector is not an error.
    pub wait_for_selector: Option<String>,
    /// Extra pause after network idle, for client-side rendering to settle.
    pub settle_ms: u64,
    pub headers: BTreeMap<String, String>,
}

impl RenderRequest {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            protocol_version: RENDER_PROTOCOL_VERSION,
            url: url.into(),
            timeout_ms,
            wait_for_selector: None,
            settle_ms: 2_000,
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RenderOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Visible text of the rendered page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// A spec object recovered from the page's in-memory state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<serde_json::Value>,
    /// Where the spec came from (e.g. `ui.spec`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait::async_trait]
pub trait HeadlessRenderer: Send + Sync {
    /// Cheap and cacheable: whether rendering can be attempted at all.
    async fn available(&self) -> bool;
    async fn render(&self, req: &RenderRequest) -> Result<RenderOutcome>;
}

/// Renderer for environments without a browser. Always unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenderer;

#[async_trait::async_trait]
impl HeadlessRenderer for NoRenderer {
    async fn available(&self) -> bool {
        false
    }

    async fn render(&self, _req: &RenderRequest) -> Result<RenderOutcome> {
        Err(Error::NotConfigured("no headless renderer".to_string()))
    }
}

/// Resolve `reference` against `base`, returning an absolute URL string.
pub fn resolve_url(base: &str, reference: &str) -> Result<String> {
    let base = url::Url::parse(base).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let joined = base
        .join(reference.trim())
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;
    Ok(joined.to_string())
}
