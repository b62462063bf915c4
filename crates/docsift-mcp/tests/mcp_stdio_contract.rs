#![cfg(feature = "stdio")]

use std::collections::BTreeSet;

fn text_payload(r: &rmcp::model::CallToolResult) -> serde_json::Value {
    let s = r
        .content
        .first()
        .and_then(|c| c.as_text())
        .map(|t| t.text.clone())
        .unwrap_or_default();
    serde_json::from_str(&s).unwrap_or_else(|_| serde_json::json!({}))
}

#[test]
fn docsift_mcp_stdio_contract() {
    // Spawns the server as a child process against a local fixture; no network, no browser.
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    rt.block_on(async {
        use axum::{http::header, routing::get, Router};
        use rmcp::{
            model::CallToolRequestParam,
            service::ServiceExt,
            transport::{ConfigureCommandExt, TokioChildProcess},
        };
        use std::net::SocketAddr;

        let app = Router::new().route(
            "/guide.md",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/markdown")],
                    "# Intro\nWelcome to the API.\n\n# Webhooks\nFailed deliveries are retried with exponential backoff.\n\n# Errors\nErrors use RFC 7807 problem documents.\n",
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("axum serve");
        });
        let url = format!("http://{addr}/guide.md");

        let bin = assert_cmd::cargo::cargo_bin!("docsift");
        let service = ()
            .serve(TokioChildProcess::new(
                tokio::process::Command::new(bin).configure(|cmd| {
                    cmd.args(["mcp-stdio"]);
                    cmd.env("DOCSIFT_URL", &url);
                    cmd.env("DOCSIFT_HEADER", "X-Docs-Token: abcdefgh12345");
                    cmd.env("DOCSIFT_RENDER_DISABLE", "1");
                    cmd.env_remove("DOCSIFT_ENV_FILE");
                    cmd.env_remove("DOCSIFT_MAX_RESULTS");
                }),
            )?)
            .await?;

        let tools = service.list_tools(Default::default()).await?;
        let names: BTreeSet<String> = tools
            .tools
            .iter()
            .map(|t| t.name.clone().into_owned())
            .collect();
        for must_have in ["search_docs", "docsift_meta"] {
            assert!(names.contains(must_have), "missing tool {must_have}");
        }

        let meta = service
            .call_tool(CallToolRequestParam {
                name: "docsift_meta".into(),
                arguments: Some(serde_json::json!({}).as_object().cloned().unwrap()),
            })
            .await?;
        let meta_v = text_payload(&meta);
        assert_eq!(meta_v["kind"].as_str(), Some("docsift_meta"));
        assert_eq!(meta_v["configured"]["url"].as_str(), Some(url.as_str()));
        assert_eq!(
            meta_v["configured"]["headers"]["X-Docs-Token"].as_str(),
            Some("abcd***")
        );
        assert_eq!(meta_v["renderer"]["disabled"].as_bool(), Some(true));

        let search = service
            .call_tool(CallToolRequestParam {
                name: "search_docs".into(),
                arguments: Some(
                    serde_json::json!({"query": "retry backoff", "max_results": 2})
                        .as_object()
                        .cloned()
                        .unwrap(),
                ),
            })
            .await?;
        let v = text_payload(&search);
        assert_eq!(v["schema_version"].as_u64(), Some(1));
        assert_eq!(v["ok"].as_bool(), Some(true));
        assert_eq!(v["total_chunks"].as_u64(), Some(3));
        let results = v["results"].as_array().expect("results");
        assert_eq!(results.len(), 1);
        assert!(results[0].as_str().unwrap().contains("exponential backoff"));

        let empty = service
            .call_tool(CallToolRequestParam {
                name: "search_docs".into(),
                arguments: Some(serde_json::json!({"query": ""}).as_object().cloned().unwrap()),
            })
            .await?;
        assert_eq!(
            text_payload(&empty)["results"],
            serde_json::json!(["No matching content found."])
        );

        service.cancel().await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
    .expect("mcp stdio contract");
}
