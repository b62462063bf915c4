use anyhow::Result;
use clap::{Parser, Subcommand};
use docsift_core::{HeadlessRenderer, DEFAULT_HEADLESS_TIMEOUT_MS, DEFAULT_HTTP_TIMEOUT_MS};
use docsift_local::{PlaywrightRenderer, SmartFetchOptions, SmartFetcher, DEFAULT_MAX_RESULTS};
use std::collections::BTreeMap;

mod envelope;
use envelope::*;

#[derive(Parser, Debug)]
#[command(name = "docsift")]
#[command(about = "Search remote API documentation by query (CLI + MCP stdio server)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch the documentation URL and print the best-matching excerpts (json).
    Search(SearchCmd),
    /// Fetch the documentation URL and print what smart fetch produced (json).
    Fetch(FetchCmd),
    /// Run as an MCP stdio server exposing `search_docs` over the configured URL.
    #[cfg(feature = "stdio")]
    McpStdio(McpStdioCmd),
    /// Diagnose configuration/launch issues (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

/// Where the documentation lives and how to fetch it.
#[derive(clap::Args, Debug, Clone)]
struct SourceArgs {
    /// Documentation URL: an HTML page, Markdown/text, JSON, or an OpenAPI/Swagger spec.
    #[arg(long, env = "DOCSIFT_URL")]
    url: Option<String>,
    /// Budget for the direct fetch (ms). Spec-endpoint probes get half of it.
    #[arg(long, env = "DOCSIFT_TIMEOUT_MS", default_value_t = DEFAULT_HTTP_TIMEOUT_MS)]
    timeout_ms: u64,
    /// Allow the headless-browser fallback for client-rendered pages.
    #[arg(
        long,
        env = "DOCSIFT_HEADLESS",
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new(),
        default_value_t = true
    )]
    headless: bool,
    #[arg(long, env = "DOCSIFT_HEADLESS_TIMEOUT_MS", default_value_t = DEFAULT_HEADLESS_TIMEOUT_MS)]
    headless_timeout_ms: u64,
    /// CSS selector the headless renderer waits for before reading the page.
    #[arg(long, env = "DOCSIFT_WAIT_FOR_SELECTOR")]
    wait_for_selector: Option<String>,
    /// Extra request header as `Name: value` (repeatable; newline-separated in the env var).
    #[arg(long = "header", env = "DOCSIFT_HEADER", value_delimiter = '\n')]
    headers: Vec<String>,
    /// Render OpenAPI specs as a flat endpoint list.
    #[arg(
        long,
        env = "DOCSIFT_COMPACT_OPENAPI",
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new(),
        default_value_t = false
    )]
    compact_openapi: bool,
}

#[derive(clap::Args, Debug)]
struct SearchCmd {
    #[command(flatten)]
    source: SourceArgs,
    /// What to look for. An empty query matches nothing.
    #[arg(long, default_value = "")]
    query: String,
    /// Number of excerpts (clamped to 1..=10).
    #[arg(long, env = "DOCSIFT_MAX_RESULTS", default_value_t = DEFAULT_MAX_RESULTS)]
    max_results: usize,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct FetchCmd {
    #[command(flatten)]
    source: SourceArgs,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[cfg(feature = "stdio")]
#[derive(clap::Args, Debug)]
struct McpStdioCmd {
    #[command(flatten)]
    source: SourceArgs,
    /// Default number of excerpts when a call omits `max_results`.
    #[arg(long, env = "DOCSIFT_MAX_RESULTS", default_value_t = DEFAULT_MAX_RESULTS)]
    max_results: usize,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    #[command(flatten)]
    source: SourceArgs,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
    /// Spawn `docsift mcp-stdio` and call `list_tools` to prove an MCP client can start it.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    check_stdio: bool,
    /// Probe for a working Node.js + Playwright install.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    check_renderer: bool,
    /// Timeout for the stdio handshake (ms).
    #[arg(long, default_value_t = 3000)]
    handshake_timeout_ms: u64,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

/// Resolved runtime configuration shared by the CLI and the MCP server.
#[derive(Debug, Clone)]
struct Config {
    url: Option<String>,
    options: SmartFetchOptions,
    max_results: usize,
}

impl Config {
    fn from_args(source: &SourceArgs, max_results: usize) -> Result<Self> {
        let url = source
            .url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let options = SmartFetchOptions {
            timeout_ms: source.timeout_ms,
            headers: parse_headers(&source.headers)?,
            use_headless: source.headless,
            headless_timeout_ms: source.headless_timeout_ms,
            wait_for_selector: source
                .wait_for_selector
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            compact_openapi: source.compact_openapi,
        };
        Ok(Self {
            url,
            options,
            max_results: clamp_max_results(max_results),
        })
    }

    /// Configuration as reported by `doctor` and `docsift_meta`. Header values are masked.
    fn summary(&self) -> serde_json::Value {
        let headers: BTreeMap<&str, String> = self
            .options
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), mask_secret(v)))
            .collect();
        serde_json::json!({
            "url": self.url,
            "timeout_ms": self.options.timeout_ms,
            "headless": self.options.use_headless,
            "headless_timeout_ms": self.options.headless_timeout_ms,
            "wait_for_selector": self.options.wait_for_selector,
            "compact_openapi": self.options.compact_openapi,
            "max_results": self.max_results,
            "headers": headers,
        })
    }
}

/// Parse `Name: value` header specs. Blank entries are skipped.
fn parse_headers(raw: &[String]) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for spec in raw {
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }
        let Some((name, value)) = spec.split_once(':') else {
            anyhow::bail!("invalid header {spec:?}: expected `Name: value`");
        };
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("invalid header {spec:?}: empty name");
        }
        out.insert(name.to_string(), value.trim().to_string());
    }
    Ok(out)
}

/// Fetch the configured URL and rank its excerpts for `query`.
async fn search_docs(
    fetcher: &SmartFetcher,
    config: &Config,
    query: &str,
    max_results: Option<usize>,
) -> serde_json::Value {
    let t0 = std::time::Instant::now();
    let mut payload = match config.url.as_deref() {
        None => serde_json::json!({
            "ok": false,
            "error": error_obj("not_configured", "no documentation URL configured"),
        }),
        Some(url) => {
            let fetched = fetcher.fetch(url, &config.options).await;
            search_payload(&fetched, query, max_results.unwrap_or(config.max_results))
        }
    };
    payload["query"] = serde_json::json!(query);
    add_envelope_fields(&mut payload, "search_docs", t0.elapsed().as_millis());
    payload
}

fn load_env_file() {
    // Opt-in; never overrides the process environment and never logs values.
    let Ok(p) = std::env::var("DOCSIFT_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v.trim());
        }
    }
}

fn init_tracing() {
    // stdout belongs to the JSON output and the MCP transport.
    let directives = ["DOCSIFT_LOG", "RUST_LOG"]
        .iter()
        .filter_map(|k| std::env::var(k).ok())
        .find(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "warn".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(directives))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(feature = "stdio")]
mod mcp {
    use super::*;
    use rmcp::{
        handler::server::router::tool::ToolRouter as RmcpToolRouter,
        handler::server::wrapper::Parameters,
        model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
        tool, tool_handler, tool_router,
        transport::stdio,
        ErrorData as McpError, ServiceExt,
    };
    use schemars::JsonSchema;
    use serde::Deserialize;
    use std::sync::Arc;

    fn tool_result(payload: serde_json::Value) -> CallToolResult {
        // Structured content for machine consumers, plus a text copy for clients that only
        // read `content[0].text`.
        let mut r = CallToolResult::structured(payload.clone());
        r.content = vec![Content::text(payload.to_string())];
        r
    }

    #[derive(Debug, Deserialize, JsonSchema, Default)]
    pub(crate) struct SearchDocsArgs {
        /// What to look for in the documentation.
        #[serde(default)]
        pub(crate) query: Option<String>,
        /// Number of excerpts to return (1-10; default from DOCSIFT_MAX_RESULTS, else 3).
        #[serde(default)]
        pub(crate) max_results: Option<usize>,
    }

    #[derive(Clone)]
    pub(crate) struct DocsiftMcp {
        tool_router: RmcpToolRouter<Self>,
        fetcher: Arc<SmartFetcher>,
        config: Arc<Config>,
    }

    #[tool_router]
    impl DocsiftMcp {
        pub(crate) fn new(config: Config, fetcher: SmartFetcher) -> Self {
            Self {
                tool_router: Self::tool_router(),
                fetcher: Arc::new(fetcher),
                config: Arc::new(config),
            }
        }

        #[tool(
            description = "Search the configured API documentation (HTML, Markdown, JSON or OpenAPI/Swagger) and return the most relevant excerpts with surrounding context"
        )]
        async fn search_docs(
            &self,
            params: Parameters<Option<SearchDocsArgs>>,
        ) -> Result<CallToolResult, McpError> {
            let args = params.0.unwrap_or_default();
            let query = args.query.unwrap_or_default();
            tracing::debug!(query = %query, max_results = ?args.max_results, "search_docs");
            let payload = search_docs(&self.fetcher, &self.config, &query, args.max_results).await;
            Ok(tool_result(payload))
        }

        #[tool(description = "Report docsift configuration + version (no secrets)")]
        async fn docsift_meta(&self) -> Result<CallToolResult, McpError> {
            let t0 = std::time::Instant::now();
            let mut payload = serde_json::json!({
                "ok": true,
                "name": "docsift",
                "version": env!("CARGO_PKG_VERSION"),
                "configured": self.config.summary(),
                "renderer": {
                    "disabled": PlaywrightRenderer::disabled(),
                },
            });
            add_envelope_fields(&mut payload, "docsift_meta", t0.elapsed().as_millis());
            Ok(tool_result(payload))
        }
    }

    #[tool_handler]
    impl rmcp::ServerHandler for DocsiftMcp {
        fn get_info(&self) -> ServerInfo {
            ServerInfo {
                instructions: Some(
                    "Searches one configured API documentation source. Call search_docs with a query; outputs are JSON and schema-versioned."
                        .to_string(),
                ),
                capabilities: ServerCapabilities::builder().enable_tools().build(),
                ..Default::default()
            }
        }
    }

    pub(crate) async fn serve_stdio(config: Config) -> Result<(), McpError> {
        let fetcher =
            SmartFetcher::local().map_err(|e| McpError::internal_error(e.to_string(), None))?;
        let svc = DocsiftMcp::new(config, fetcher);
        let running = svc
            .serve(stdio())
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        running
            .waiting()
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(())
    }

}

async fn doctor(args: DoctorCmd) -> Result<()> {
    let t0 = std::time::Instant::now();
    let config = Config::from_args(&args.source, DEFAULT_MAX_RESULTS)?;
    let mut checks: Vec<serde_json::Value> = Vec::new();

    let url_ok = config
        .url
        .as_deref()
        .is_some_and(|u| url::Url::parse(u).is_ok_and(|u| matches!(u.scheme(), "http" | "https")));
    checks.push(serde_json::json!({
        "name": "url_configured",
        "ok": url_ok,
        "message": if url_ok { "documentation URL is configured" } else { "documentation URL is missing or invalid" },
        "hint": if url_ok { "" } else { error_hint("not_configured") },
    }));

    // A missing renderer only disables the headless fallback, so it never fails the report.
    let renderer_disabled = PlaywrightRenderer::disabled();
    let renderer_available = if args.check_renderer && !renderer_disabled {
        Some(PlaywrightRenderer::new().available().await)
    } else {
        None
    };
    checks.push(serde_json::json!({
        "name": "headless_renderer",
        "ok": true,
        "skipped": renderer_available.is_none(),
        "available": renderer_available,
        "message": match renderer_available {
            Some(true) => "node + playwright found",
            Some(false) => "node + playwright not found; client-rendered pages fall back to raw HTML",
            None => "renderer check skipped",
        },
        "hint": if renderer_available == Some(false) {
            "Install Node.js and `npm i -g playwright && npx playwright install chromium`, or set DOCSIFT_NODE_PATH."
        } else {
            ""
        },
    }));

    let mut stdio_ok: Option<bool> = None;
    let mut stdio_tool_count: Option<usize> = None;
    let mut stdio_error: Option<serde_json::Value> = None;

    #[cfg(feature = "stdio")]
    if args.check_stdio {
        use rmcp::service::ServiceExt;
        use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
        use tokio::process::Command;

        let exe = std::env::current_exe().unwrap_or_else(|_| std::path::PathBuf::from("docsift"));
        let child = TokioChildProcess::new(Command::new(exe).configure(|cmd| {
            cmd.args(["mcp-stdio"]);
            cmd.env("DOCSIFT_RENDER_DISABLE", "1");
            cmd.env("DOCSIFT_LOG", "error");
        }))?;
        let service = ().serve(child).await?;
        let res = tokio::time::timeout(
            std::time::Duration::from_millis(args.handshake_timeout_ms),
            service.list_tools(Default::default()),
        )
        .await;
        match res {
            Ok(Ok(tools)) => {
                stdio_ok = Some(true);
                stdio_tool_count = Some(tools.tools.len());
            }
            Ok(Err(e)) => {
                stdio_ok = Some(false);
                stdio_error = Some(serde_json::json!({
                    "code": "handshake_failed",
                    "message": e.to_string(),
                    "hint": "The child closed the stdio transport early. Check that nothing prints to stdout in mcp-stdio mode.",
                }));
            }
            Err(_elapsed) => {
                stdio_ok = Some(false);
                stdio_error = Some(serde_json::json!({
                    "code": "timeout",
                    "message": format!("stdio handshake timed out after {}ms", args.handshake_timeout_ms),
                    "hint": "The child did not answer list_tools in time.",
                }));
            }
        }
        let _ = service.cancel().await;
    }

    #[cfg(not(feature = "stdio"))]
    if args.check_stdio {
        stdio_ok = Some(false);
    }

    checks.push(serde_json::json!({
        "name": "mcp_stdio_handshake",
        "ok": if args.check_stdio { stdio_ok.unwrap_or(false) } else { true },
        "skipped": !args.check_stdio,
        "tool_count": stdio_tool_count,
        "error": stdio_error,
    }));

    let ok = checks.iter().all(|c| c["ok"].as_bool().unwrap_or(false));
    let mut payload = serde_json::json!({
        "ok": ok,
        "name": "docsift",
        "version": env!("CARGO_PKG_VERSION"),
        "features": {
            "stdio": cfg!(feature = "stdio"),
        },
        "configured": config.summary(),
        "renderer": {
            "disabled": renderer_disabled,
            "available": renderer_available,
        },
        "checks": checks,
    });
    add_envelope_fields(&mut payload, "doctor", t0.elapsed().as_millis());

    match args.output.to_ascii_lowercase().as_str() {
        "text" => {
            println!("docsift {} (ok={})", env!("CARGO_PKG_VERSION"), ok);
            println!("url: {}", config.url.as_deref().unwrap_or("(not set)"));
            println!("checks:");
            if let Some(arr) = payload["checks"].as_array() {
                for c in arr {
                    let name = c["name"].as_str().unwrap_or("?");
                    if c["skipped"].as_bool().unwrap_or(false) {
                        println!("- {name}: skipped");
                    } else if c["ok"].as_bool().unwrap_or(false) {
                        println!("- {name}: ok");
                    } else {
                        println!("- {name}: fail");
                    }
                }
            }
        }
        _ => println!("{payload}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Search(args) => {
            let config = Config::from_args(&args.source, args.max_results)?;
            let fetcher = SmartFetcher::local()?;
            let payload = search_docs(&fetcher, &config, &args.query, None).await;
            let ok = payload["ok"].as_bool().unwrap_or(false);
            match args.output.to_ascii_lowercase().as_str() {
                "text" if ok => {
                    let results = payload["results"].as_array().cloned().unwrap_or_default();
                    let texts: Vec<&str> = results.iter().filter_map(|r| r.as_str()).collect();
                    println!("{}", texts.join("\n\n==========\n\n"));
                }
                _ => println!("{payload}"),
            }
            if !ok {
                std::process::exit(1);
            }
        }
        Commands::Fetch(args) => {
            let t0 = std::time::Instant::now();
            let config = Config::from_args(&args.source, DEFAULT_MAX_RESULTS)?;
            let Some(url) = config.url.as_deref() else {
                let mut payload = serde_json::json!({
                    "ok": false,
                    "error": error_obj("not_configured", "no documentation URL configured"),
                });
                add_envelope_fields(&mut payload, "fetch", t0.elapsed().as_millis());
                println!("{payload}");
                std::process::exit(1);
            };
            let fetched = SmartFetcher::local()?.fetch(url, &config.options).await;
            match args.output.to_ascii_lowercase().as_str() {
                "text" if fetched.success => {
                    println!("{}", fetched.content.as_deref().unwrap_or(""));
                }
                _ => {
                    let mut payload = serde_json::to_value(&fetched)?;
                    payload["ok"] = serde_json::json!(fetched.success);
                    add_envelope_fields(&mut payload, "fetch", t0.elapsed().as_millis());
                    println!("{payload}");
                }
            }
            if !fetched.success {
                std::process::exit(1);
            }
        }
        #[cfg(feature = "stdio")]
        Commands::McpStdio(args) => {
            let config = Config::from_args(&args.source, args.max_results)?;
            mcp::serve_stdio(config)
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        }
        Commands::Doctor(args) => doctor(args).await?,
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "kind": "version",
                "ok": true,
                "name": "docsift",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("docsift {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
    }
    Ok(())
}
