//! Headless rendering through Node.js + Playwright.
//!
//! The browser runs in a separate Node process. Requests and results cross the process
//! boundary as one JSON message each way (stdin in, JSON-only stdout out), versioned by
//! [`RENDER_PROTOCOL_VERSION`].

use docsift_core::{
    Error, HeadlessRenderer, RenderOutcome, RenderRequest, Result, RENDER_PROTOCOL_VERSION,
};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;

fn env_truthy(k: &str) -> bool {
    matches!(
        std::env::var(k)
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(k: &str) -> Option<u64> {
    std::env::var(k).ok().and_then(|s| s.trim().parse::<u64>().ok())
}

fn node_bin() -> String {
    std::env::var("DOCSIFT_NODE")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "node".to_string())
}

fn node_path_candidates() -> Vec<String> {
    // Common global module roots; `npm root -g` is tried first by the caller.
    let mut out: Vec<String> = Vec::new();
    if let Some(home) = std::env::var_os("HOME").map(std::path::PathBuf::from) {
        out.push(
            home.join(".npm-global")
                .join("lib")
                .join("node_modules")
                .to_string_lossy()
                .to_string(),
        );
    }
    out.push("/opt/homebrew/lib/node_modules".to_string());
    out.push("/usr/local/lib/node_modules".to_string());
    out.push("/usr/lib/node_modules".to_string());
    out
}

fn has_playwright(root: &str) -> bool {
    root.split(':')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .any(|p| std::path::Path::new(p).join("playwright").is_dir())
}

/// NODE_PATH that lets `require('playwright')` find a global install, if one is needed.
fn detect_node_path_for_playwright() -> Option<String> {
    fn npm_root_g() -> Option<String> {
        let out = std::process::Command::new("npm")
            .args(["root", "-g"])
            .output()
            .ok()?;
        if !out.status.success() {
            return None;
        }
        let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
        (!s.is_empty() && has_playwright(&s)).then_some(s)
    }

    if let Ok(v) = std::env::var("DOCSIFT_NODE_PATH") {
        let v = v.trim();
        if !v.is_empty() {
            return Some(v.to_string());
        }
    }

    let existing = std::env::var("NODE_PATH").unwrap_or_default();
    if has_playwright(&existing) {
        return None;
    }

    let found = npm_root_g().or_else(|| {
        node_path_candidates()
            .into_iter()
            .find(|root| has_playwright(root))
    })?;

    if existing.trim().is_empty() {
        Some(found)
    } else {
        Some(format!("{existing}:{found}"))
    }
}

/// Node script: load the page, wait, pull a spec out of the page's in-memory state, return
/// html + visible text. The browser is closed in `finally` on every path.
const JS: &str = r#"
const fs = require('fs');

function ok(obj) { process.stdout.write(JSON.stringify(obj)); }
function bad(code, message) { ok({ ok: false, error: { code, message } }); }

async function main() {
  let arg = '';
  try { arg = fs.readFileSync(0, 'utf8'); } catch (_) {}
  let req;
  try { req = JSON.parse(arg); } catch (e) { return bad('invalid_params', 'bad JSON args'); }
  if (req.protocol_version !== 1) return bad('invalid_params', 'unsupported protocol_version ' + req.protocol_version);

  if (req.probe) {
    try { require.resolve('playwright'); return ok({ ok: true }); }
    catch (_) { return bad('not_configured', 'playwright is not installed for Node.js'); }
  }

  let pw;
  try { pw = require('playwright'); } catch (e) {
    return bad('not_configured', 'playwright is not installed for Node.js (npm i -g playwright && npx playwright install chromium)');
  }

  const url = String(req.url || '').trim();
  if (!url) return bad('invalid_params', 'url must be non-empty');
  const timeoutMs = Number(req.timeout_ms || 30000);

  let browser;
  try {
    browser = await pw.chromium.launch({ headless: true });
    const context = await browser.newContext({ extraHTTPHeaders: req.headers || {} });
    const page = await context.newPage();

    await page.goto(url, { waitUntil: 'domcontentloaded', timeout: timeoutMs });
    try { await page.waitForLoadState('networkidle', { timeout: timeoutMs }); } catch (_) {}
    if (req.wait_for_selector) {
      try { await page.waitForSelector(req.wait_for_selector, { timeout: Math.min(10000, timeoutMs) }); } catch (_) {}
    }
    try { await page.waitForTimeout(Number(req.settle_ms || 0)); } catch (_) {}

    const found = await page.evaluate(() => {
      const isSpec = (o) => !!o && typeof o === 'object' && (o.openapi || o.swagger) && o.paths;
      const plain = (o) => {
        if (!o) return null;
        if (typeof o.toJS === 'function') o = o.toJS();
        if (typeof o === 'string') { try { o = JSON.parse(o); } catch (_) { return null; } }
        return isSpec(o) ? o : null;
      };
      const tries = [
        ['ui.spec', () => { const s = window.ui && window.ui.spec && window.ui.spec(); return s && (s.toJS ? s.toJS().json : s.json); }],
        ['ui.specSelectors.specJson', () => window.ui && window.ui.specSelectors && window.ui.specSelectors.specJson()],
        ['ui.specSelectors.specStr', () => window.ui && window.ui.specSelectors && window.ui.specSelectors.specStr()],
        ['ui.getSpec', () => window.ui && window.ui.getSpec && window.ui.getSpec()],
        ['window.spec', () => window.spec],
        ['SwaggerUIBundle.api', () => window.SwaggerUIBundle && window.SwaggerUIBundle.api && window.SwaggerUIBundle.api.spec],
      ];
      for (const [source, f] of tries) {
        try { const s = plain(f()); if (s) return { spec: s, source }; } catch (_) {}
      }
      for (const key of Object.keys(window)) {
        try { const s = plain(window[key]); if (s) return { spec: s, source: 'window.' + key }; } catch (_) {}
      }
      return null;
    });

    const html = await page.content();
    const text = await page.evaluate(() => document.body ? document.body.innerText : '');
    ok({ ok: true, html, text, spec: found ? found.spec : null, spec_source: found ? found.source : null });
  } catch (e) {
    bad('render_failed', String(e && e.message ? e.message : e));
  } finally {
    try { if (browser) await browser.close(); } catch (_) {}
  }
}

main().catch((e) => bad('render_failed', String(e && e.message ? e.message : e)));
"#;

/// [`HeadlessRenderer`] backed by a Node.js Playwright process per render.
///
/// Env knobs (read at call time): `DOCSIFT_RENDER_DISABLE`, `DOCSIFT_NODE`,
/// `DOCSIFT_NODE_PATH`, `DOCSIFT_RENDER_HARD_TIMEOUT_MS`, `DOCSIFT_RENDER_SETTLE_MS`.
#[derive(Debug, Default)]
pub struct PlaywrightRenderer {
    available: OnceCell<bool>,
}

impl PlaywrightRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `DOCSIFT_RENDER_DISABLE` is set.
    pub fn disabled() -> bool {
        env_truthy("DOCSIFT_RENDER_DISABLE")
    }

    async fn probe(&self) -> bool {
        let args = serde_json::json!({ "protocol_version": RENDER_PROTOCOL_VERSION, "probe": true });
        match run_node(&args, 10_000).await {
            Ok(v) => v.get("ok").and_then(|x| x.as_bool()) == Some(true),
            Err(e) => {
                tracing::debug!(error = %e, "headless renderer unavailable");
                false
            }
        }
    }
}

#[async_trait::async_trait]
impl HeadlessRenderer for PlaywrightRenderer {
    async fn available(&self) -> bool {
        if Self::disabled() {
            return false;
        }
        *self.available.get_or_init(|| self.probe()).await
    }

    async fn render(&self, req: &RenderRequest) -> Result<RenderOutcome> {
        if Self::disabled() {
            return Err(Error::NotConfigured(
                "render backend disabled (DOCSIFT_RENDER_DISABLE)".to_string(),
            ));
        }
        let mut req = req.clone();
        if let Some(settle) = env_u64("DOCSIFT_RENDER_SETTLE_MS") {
            req.settle_ms = settle;
        }
        let args = serde_json::to_value(&req).map_err(|e| Error::Render(e.to_string()))?;
        let hard_timeout_ms = env_u64("DOCSIFT_RENDER_HARD_TIMEOUT_MS")
            .unwrap_or(req.timeout_ms.saturating_add(req.settle_ms).saturating_add(10_000));

        let v = run_node(&args, hard_timeout_ms).await?;
        if v.get("ok").and_then(|x| x.as_bool()) != Some(true) {
            return Err(outcome_error(&v));
        }
        let mut outcome: RenderOutcome =
            serde_json::from_value(v).map_err(|e| Error::Render(e.to_string()))?;
        outcome.success = true;
        if outcome.text.as_deref().map_or(true, |t| t.trim().is_empty()) {
            // innerText can be empty for canvas-heavy pages; fall back to a text rendering.
            if let Some(html) = &outcome.html {
                outcome.text = html2text::from_read(std::io::Cursor::new(html.as_bytes()), 100).ok();
            }
        }
        Ok(outcome)
    }
}

fn outcome_error(v: &serde_json::Value) -> Error {
    let code = v
        .pointer("/error/code")
        .and_then(|x| x.as_str())
        .unwrap_or("render_failed");
    let message = v
        .pointer("/error/message")
        .and_then(|x| x.as_str())
        .unwrap_or("Playwright render failed")
        .to_string();
    match code {
        "not_configured" => Error::NotConfigured(message),
        "invalid_params" => Error::InvalidUrl(message),
        _ => Error::Render(message),
    }
}

/// Spawn the script, send `args` on stdin, and parse its JSON stdout. The child is killed if it
/// outlives `hard_timeout_ms` (and on drop).
async fn run_node(args: &serde_json::Value, hard_timeout_ms: u64) -> Result<serde_json::Value> {
    let mut cmd = tokio::process::Command::new(node_bin());
    if let Some(node_path) = detect_node_path_for_playwright() {
        cmd.env("NODE_PATH", node_path);
    }
    let mut child = cmd
        .arg("-e")
        .arg(JS)
        .kill_on_drop(true)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| {
            Error::NotConfigured(format!(
                "headless rendering requires Node.js (`node`) and the Playwright npm package: {e}"
            ))
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        // A failed write surfaces as a JSON error from the script.
        let _ = stdin.write_all(args.to_string().as_bytes()).await;
        let _ = stdin.shutdown().await;
    }

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Render("missing stdout pipe".to_string()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Render("missing stderr pipe".to_string()))?;
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = tokio::io::AsyncReadExt::read_to_end(&mut stdout, &mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = tokio::io::AsyncReadExt::read_to_end(&mut stderr, &mut buf).await;
        buf
    });

    match tokio::time::timeout(Duration::from_millis(hard_timeout_ms), child.wait()).await {
        Ok(r) => {
            r.map_err(|e| Error::Render(format!("waiting for node failed: {e}")))?;
        }
        Err(_) => {
            let _ = child.kill().await;
            let _ = child.wait().await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(Error::Timeout(format!(
                "headless render hard timeout after {hard_timeout_ms}ms"
            )));
        }
    }

    let out_stdout = stdout_task.await.unwrap_or_default();
    let out_stderr = stderr_task.await.unwrap_or_default();
    let stdout = String::from_utf8_lossy(&out_stdout).trim().to_string();
    serde_json::from_str(&stdout).map_err(|e| {
        let stderr = String::from_utf8_lossy(&out_stderr).trim().to_string();
        if stderr.is_empty() {
            Error::Render(format!("renderer returned invalid JSON: {e}"))
        } else {
            Error::Render(format!("renderer returned invalid JSON: {e}. stderr: {stderr}"))
        }
    })
}
