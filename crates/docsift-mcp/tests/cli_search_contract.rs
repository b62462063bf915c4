use axum::{http::header, http::HeaderMap, http::StatusCode, routing::get, Router};
use std::net::SocketAddr;

const PETSTORE: &str = r#"{
  "openapi": "3.0.3",
  "info": {"title": "Petstore", "version": "1.0.0"},
  "paths": {
    "/pets": {"get": {"summary": "List pets", "tags": ["pets"], "responses": {"200": {"description": "OK"}}}},
    "/orders": {"post": {"summary": "Place an order", "tags": ["store"], "responses": {"201": {"description": "Created"}}}}
  }
}"#;

async fn fixture() -> SocketAddr {
    let app = Router::new()
        .route(
            "/guide.md",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/markdown")],
                    "# Intro\nWelcome to the API.\n\n# Authentication\nSend a bearer token in the Authorization header.\n",
                )
            }),
        )
        .route(
            "/meta.json",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/json")],
                    r#"{"name":"billing","description":"Invoices are generated monthly and can be paginated."}"#,
                )
            }),
        )
        .route(
            "/docs",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/html")],
                    r##"<!DOCTYPE html><html><head><script src="swagger-ui-bundle.js"></script></head>
<body><div id="swagger-ui"></div>
<script>window.ui = SwaggerUIBundle({url:"/v3/api-docs", dom_id: "#swagger-ui"});</script></body></html>"##,
                )
            }),
        )
        .route(
            "/v3/api-docs",
            get(|| async { ([(header::CONTENT_TYPE, "application/json")], PETSTORE) }),
        )
        .route(
            "/private.md",
            get(|headers: HeaderMap| async move {
                match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
                    Some("Bearer docs-token") => (
                        StatusCode::OK,
                        "# Private\nInternal rate limits are documented here.".to_string(),
                    ),
                    _ => (StatusCode::UNAUTHORIZED, "no".to_string()),
                }
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("axum serve");
    });
    addr
}

async fn docsift(args: &[&str], envs: &[(&str, &str)]) -> (bool, String) {
    let bin = assert_cmd::cargo::cargo_bin!("docsift");
    let mut cmd = tokio::process::Command::new(bin);
    cmd.args(args)
        // Hermetic: no browser, no inherited configuration.
        .env("DOCSIFT_RENDER_DISABLE", "1")
        .env_remove("DOCSIFT_URL")
        .env_remove("DOCSIFT_HEADER")
        .env_remove("DOCSIFT_ENV_FILE")
        .env_remove("DOCSIFT_MAX_RESULTS");
    for (k, v) in envs {
        cmd.env(k, v);
    }
    let out = cmd.output().await.expect("run docsift");
    (
        out.status.success(),
        String::from_utf8_lossy(&out.stdout).to_string(),
    )
}

fn json(s: &str) -> serde_json::Value {
    serde_json::from_str(s).unwrap_or_else(|e| panic!("parse json ({e}): {s}"))
}

#[tokio::test(flavor = "multi_thread")]
async fn search_markdown_bearer_token() {
    let addr = fixture().await;
    let url = format!("http://{addr}/guide.md");
    let (ok, out) = docsift(&["search", "--url", &url, "--query", "bearer token"], &[]).await;
    assert!(ok, "{out}");
    let v = json(&out);
    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("search_docs"));
    assert_eq!(v["method"].as_str(), Some("direct"));
    assert_eq!(v["content_type"].as_str(), Some("markdown"));
    assert_eq!(v["total_chunks"].as_u64(), Some(2));
    assert_eq!(v["matched_chunks"].as_u64(), Some(1));
    let results = v["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].as_str().unwrap().contains("bearer token"));
}

#[tokio::test(flavor = "multi_thread")]
async fn search_json_description() {
    let addr = fixture().await;
    let url = format!("http://{addr}/meta.json");
    let (ok, out) = docsift(&["search", "--url", &url, "--query", "paginated"], &[]).await;
    assert!(ok, "{out}");
    let v = json(&out);
    assert_eq!(v["content_type"].as_str(), Some("json"));
    assert_eq!(v["matched_chunks"].as_u64(), Some(1));
    assert!(v["results"][0]
        .as_str()
        .unwrap()
        .contains("Invoices are generated monthly"));
}

#[tokio::test(flavor = "multi_thread")]
async fn search_follows_swagger_ui_to_the_spec() {
    let addr = fixture().await;
    let url = format!("http://{addr}/docs");
    let (ok, out) = docsift(&["search", "--url", &url, "--query", "list pets"], &[]).await;
    assert!(ok, "{out}");
    let v = json(&out);
    assert_eq!(v["method"].as_str(), Some("openapi_spec"));
    assert_eq!(v["content_type"].as_str(), Some("openapi"));
    let spec_url = format!("http://{addr}/v3/api-docs");
    assert_eq!(v["spec_url"].as_str(), Some(spec_url.as_str()));
    assert!(v["results"][0].as_str().unwrap().contains("GET /pets"));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_query_returns_sentinel() {
    let addr = fixture().await;
    let url = format!("http://{addr}/guide.md");
    let (ok, out) = docsift(&["search", "--url", &url, "--query", ""], &[]).await;
    assert!(ok, "{out}");
    let v = json(&out);
    assert_eq!(v["results"], serde_json::json!(["No matching content found."]));
    assert_eq!(v["matched_chunks"].as_u64(), Some(0));
}

#[tokio::test(flavor = "multi_thread")]
async fn failures_exit_nonzero_with_error_codes() {
    let addr = fixture().await;

    let url = format!("http://{addr}/missing");
    let (ok, out) = docsift(&["search", "--url", &url, "--query", "x"], &[]).await;
    assert!(!ok);
    let v = json(&out);
    assert_eq!(v["ok"].as_bool(), Some(false));
    assert_eq!(v["error"]["code"].as_str(), Some("http_status"));

    let (ok, out) = docsift(&["search", "--query", "x"], &[]).await;
    assert!(!ok);
    assert_eq!(json(&out)["error"]["code"].as_str(), Some("not_configured"));
}

#[tokio::test(flavor = "multi_thread")]
async fn configuration_comes_from_env_and_env_file() {
    let addr = fixture().await;
    let url = format!("http://{addr}/private.md");

    let (ok, out) = docsift(
        &["search", "--query", "rate limits"],
        &[
            ("DOCSIFT_URL", url.as_str()),
            ("DOCSIFT_HEADER", "Authorization: Bearer docs-token"),
        ],
    )
    .await;
    assert!(ok, "{out}");
    assert_eq!(json(&out)["matched_chunks"].as_u64(), Some(1));

    let dir = tempfile::tempdir().unwrap();
    let env_file = dir.path().join("docsift.env");
    std::fs::write(
        &env_file,
        format!("# docs\nDOCSIFT_URL={url}\nDOCSIFT_HEADER=Authorization: Bearer docs-token\n"),
    )
    .unwrap();
    let (ok, out) = docsift(
        &["search", "--query", "rate limits", "--output", "text"],
        &[("DOCSIFT_ENV_FILE", env_file.to_str().unwrap())],
    )
    .await;
    assert!(ok, "{out}");
    assert!(out.contains("Internal rate limits"));
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_reports_strategy_and_content() {
    let addr = fixture().await;
    let url = format!("http://{addr}/v3/api-docs");
    let (ok, out) = docsift(&["fetch", "--url", &url, "--compact-openapi", "true"], &[]).await;
    assert!(ok, "{out}");
    let v = json(&out);
    assert_eq!(v["kind"].as_str(), Some("fetch"));
    assert_eq!(v["success"].as_bool(), Some(true));
    assert_eq!(v["method"].as_str(), Some("direct"));
    let content = v["content"].as_str().unwrap();
    assert!(content.starts_with("# Petstore (v1.0.0)"));
    assert!(content.contains("- `POST /orders` - Place an order"));
}
