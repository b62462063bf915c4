use axum::{http::header, http::StatusCode, routing::get, Router};
use docsift_core::{
    ContentType, FetchMethod, HeadlessRenderer, NoRenderer, RenderOutcome, RenderRequest, Result,
};
use docsift_local::{search, LocalTransport, SmartFetchOptions, SmartFetcher};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn fetcher(renderer: Arc<dyn HeadlessRenderer>) -> SmartFetcher {
    SmartFetcher::new(Arc::new(LocalTransport::new().unwrap()), renderer)
}

fn opts() -> SmartFetchOptions {
    SmartFetchOptions {
        timeout_ms: 2_000,
        ..SmartFetchOptions::default()
    }
}

const PETSTORE: &str = r#"{
  "openapi": "3.0.3",
  "info": {"title": "Petstore", "version": "1.0.0"},
  "paths": {"/pets": {"get": {"summary": "List pets", "responses": {"200": {"description": "OK"}}}}}
}"#;

const SWAGGER_SHELL: &str = r##"<!DOCTYPE html><html><head><title>API</title>
<script src="swagger-ui-bundle.js"></script></head>
<body><div id="swagger-ui"></div>
<script>window.ui = SwaggerUIBundle({url:"/v3/api-docs", dom_id: "#swagger-ui"});</script>
</body></html>"##;

const BARE_SHELL: &str = r#"<!DOCTYPE html><html><head><title>Docs</title></head><body><div id="root"></div><script src="/app.js"></script></body></html>"#;

/// Renderer stand-in that records calls and returns a canned outcome.
struct FakeRenderer {
    available: bool,
    outcome: RenderOutcome,
    calls: AtomicUsize,
    last_selector: Mutex<Option<String>>,
}

impl FakeRenderer {
    fn new(available: bool, outcome: RenderOutcome) -> Arc<Self> {
        Arc::new(Self {
            available,
            outcome,
            calls: AtomicUsize::new(0),
            last_selector: Mutex::new(None),
        })
    }
}

#[async_trait::async_trait]
impl HeadlessRenderer for FakeRenderer {
    async fn available(&self) -> bool {
        self.available
    }

    async fn render(&self, req: &RenderRequest) -> Result<RenderOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_selector.lock().unwrap() = req.wait_for_selector.clone();
        Ok(self.outcome.clone())
    }
}

#[tokio::test]
async fn swagger_bundle_url_is_followed_to_the_spec() {
    let app = Router::new()
        .route(
            "/docs",
            get(|| async { ([(header::CONTENT_TYPE, "text/html")], SWAGGER_SHELL) }),
        )
        .route(
            "/v3/api-docs",
            get(|| async { ([(header::CONTENT_TYPE, "application/json")], PETSTORE) }),
        );
    let addr = serve(app).await;

    let renderer = FakeRenderer::new(true, RenderOutcome::default());
    let r = fetcher(renderer.clone())
        .fetch(&format!("http://{addr}/docs"), &opts())
        .await;

    assert!(r.success, "{r:?}");
    assert_eq!(r.method, FetchMethod::OpenapiSpec);
    assert_eq!(r.content_type, ContentType::Openapi);
    assert_eq!(r.spec_url, Some(format!("http://{addr}/v3/api-docs")));
    let content = r.content.unwrap();
    assert!(content.starts_with("# Petstore"));
    assert!(content.contains("#### `GET /pets`"));
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn spec_is_discovered_by_probing_when_not_embedded() {
    let shell = r#"<html><body><div id="swagger-ui"></div><script src="bundle.js"></script></body></html>"#;
    let app = Router::new()
        .route(
            "/api/docs/",
            get(move || async move { ([(header::CONTENT_TYPE, "text/html")], shell) }),
        )
        .route(
            "/api/openapi.json",
            get(|| async { ([(header::CONTENT_TYPE, "application/json")], PETSTORE) }),
        );
    let addr = serve(app).await;

    let r = fetcher(Arc::new(NoRenderer))
        .fetch(&format!("http://{addr}/api/docs/"), &opts())
        .await;
    assert_eq!(r.method, FetchMethod::OpenapiSpec, "{r:?}");
    assert_eq!(r.spec_url, Some(format!("http://{addr}/api/openapi.json")));
}

#[tokio::test]
async fn direct_json_spec_is_rendered_compactly_on_request() {
    let app = Router::new().route(
        "/openapi.json",
        get(|| async { ([(header::CONTENT_TYPE, "application/json")], PETSTORE) }),
    );
    let addr = serve(app).await;
    let url = format!("http://{addr}/openapi.json");

    let compact = SmartFetchOptions {
        compact_openapi: true,
        ..opts()
    };
    let r = fetcher(Arc::new(NoRenderer)).fetch(&url, &compact).await;
    assert_eq!(r.method, FetchMethod::Direct);
    assert_eq!(r.content_type, ContentType::Openapi);
    assert_eq!(
        r.content.as_deref(),
        Some("# Petstore (v1.0.0)\n\n- `GET /pets` - List pets")
    );
}

#[tokio::test]
async fn ordinary_pages_and_markdown_are_returned_directly() {
    let article = format!(
        "<html><body><h1>Guide</h1><p>{}</p></body></html>",
        "Authentication uses bearer tokens in the header. ".repeat(10)
    );
    let app = Router::new()
        .route(
            "/guide",
            get(move || async move { ([(header::CONTENT_TYPE, "text/html")], article) }),
        )
        .route(
            "/README.md",
            get(|| async { ([(header::CONTENT_TYPE, "text/markdown")], "# Intro\nHello world.\n\n# Auth\nUse a bearer token.") }),
        )
        .route(
            "/data",
            get(|| async { ([(header::CONTENT_TYPE, "application/json")], r#"{"description":"Rate limits apply."}"#) }),
        );
    let addr = serve(app).await;
    let f = fetcher(Arc::new(NoRenderer));

    let r = f.fetch(&format!("http://{addr}/guide"), &opts()).await;
    assert_eq!((r.method, r.content_type), (FetchMethod::Direct, ContentType::Html));

    let r = f.fetch(&format!("http://{addr}/README.md"), &opts()).await;
    assert_eq!((r.method, r.content_type), (FetchMethod::Direct, ContentType::Markdown));
    let found = search(r.content.as_deref().unwrap(), "bearer token", 3);
    assert_eq!(found.results.len(), 1);

    let r = f.fetch(&format!("http://{addr}/data"), &opts()).await;
    assert_eq!(r.content_type, ContentType::Json);
    let found = search(r.content.as_deref().unwrap(), "rate limit", 3);
    assert_eq!(found.matched_chunks, 1);
}

#[tokio::test]
async fn headless_text_is_used_for_client_rendered_shells() {
    let app = Router::new().route(
        "/app",
        get(|| async { ([(header::CONTENT_TYPE, "text/html")], BARE_SHELL) }),
    );
    let addr = serve(app).await;
    let renderer = FakeRenderer::new(
        true,
        RenderOutcome {
            success: true,
            text: Some("  Webhooks\u{0007}\n\n\n\n  Retries use exponential backoff.  ".to_string()),
            ..RenderOutcome::default()
        },
    );
    let o = SmartFetchOptions {
        wait_for_selector: Some("#content".to_string()),
        ..opts()
    };
    let r = fetcher(renderer.clone())
        .fetch(&format!("http://{addr}/app"), &o)
        .await;

    assert_eq!(r.method, FetchMethod::Headless, "{r:?}");
    assert_eq!(r.content_type, ContentType::Text);
    assert_eq!(
        r.content.as_deref(),
        Some("Webhooks\n\nRetries use exponential backoff.")
    );
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        renderer.last_selector.lock().unwrap().as_deref(),
        Some("#content")
    );
}

#[tokio::test]
async fn headless_recovered_spec_is_rendered() {
    let app = Router::new().route(
        "/app",
        get(|| async { ([(header::CONTENT_TYPE, "text/html")], BARE_SHELL) }),
    );
    let addr = serve(app).await;
    let renderer = FakeRenderer::new(
        true,
        RenderOutcome {
            success: true,
            spec: Some(serde_json::from_str(PETSTORE).unwrap()),
            spec_source: Some("ui.spec".to_string()),
            text: Some("ignored".to_string()),
            ..RenderOutcome::default()
        },
    );
    let r = fetcher(renderer).fetch(&format!("http://{addr}/app"), &opts()).await;
    assert_eq!(r.method, FetchMethod::Headless);
    assert_eq!(r.content_type, ContentType::Openapi);
    assert!(r.content.unwrap().contains("List pets"));
}

#[tokio::test]
async fn unavailable_or_disabled_renderer_falls_back_to_html() {
    let app = Router::new().route(
        "/app",
        get(|| async { ([(header::CONTENT_TYPE, "text/html")], BARE_SHELL) }),
    );
    let addr = serve(app).await;
    let url = format!("http://{addr}/app");

    let r = fetcher(Arc::new(NoRenderer)).fetch(&url, &opts()).await;
    assert!(r.success);
    assert_eq!((r.method, r.content_type), (FetchMethod::HtmlExtract, ContentType::Html));
    assert_eq!(r.content.as_deref(), Some(BARE_SHELL));

    let renderer = FakeRenderer::new(true, RenderOutcome::default());
    let no_headless = SmartFetchOptions {
        use_headless: false,
        ..opts()
    };
    let r = fetcher(renderer.clone()).fetch(&url, &no_headless).await;
    assert_eq!(r.method, FetchMethod::HtmlExtract);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);

    // A failed render is a skipped strategy, not a failed fetch.
    let r = fetcher(renderer.clone()).fetch(&url, &opts()).await;
    assert_eq!(r.method, FetchMethod::HtmlExtract);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn only_a_failed_direct_fetch_is_unsuccessful() {
    let app = Router::new().route("/gone", get(|| async { (StatusCode::NOT_FOUND, "nope") }));
    let addr = serve(app).await;
    let r = fetcher(Arc::new(NoRenderer))
        .fetch(&format!("http://{addr}/gone"), &opts())
        .await;
    assert!(!r.success);
    assert!(r.content.is_none());
    assert_eq!(r.error_code.as_deref(), Some("http_status"));
    assert!(r.error.unwrap().contains("404"));
}
