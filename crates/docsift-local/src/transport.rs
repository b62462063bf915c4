use docsift_core::{
    Error, GetRequest, HeadRequest, HeadResponse, HttpBody, HttpTransport, Result,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// reqwest-backed [`HttpTransport`]. Build once and share; the client pools connections.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    client: reqwest::Client,
}

impl LocalTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("docsift/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(10))
            // Per-request timeouts override these; they only stop a request with no budget from
            // hanging forever.
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self { client })
    }

    fn apply_headers(
        mut rb: reqwest::RequestBuilder,
        headers: &BTreeMap<String, String>,
    ) -> reqwest::RequestBuilder {
        for (k, v) in headers {
            match (
                reqwest::header::HeaderName::from_bytes(k.trim().as_bytes()),
                reqwest::header::HeaderValue::from_str(v.trim()),
            ) {
                (Ok(name), Ok(value)) => rb = rb.header(name, value),
                _ => tracing::warn!(header = %k, "skipping invalid request header"),
            }
        }
        rb
    }
}

/// Credentials-bearing headers. Callers strip these before following links off the
/// configured origin.
pub fn is_sensitive_header(name: &str) -> bool {
    matches!(
        name.trim().to_ascii_lowercase().as_str(),
        "authorization" | "cookie" | "proxy-authorization" | "x-api-key" | "api-key"
    )
}

fn send_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else if e.is_connect() {
        Error::Connect(e.to_string())
    } else {
        Error::Fetch(e.to_string())
    }
}

fn parse_url(s: &str) -> Result<url::Url> {
    url::Url::parse(s).map_err(|e| Error::InvalidUrl(format!("{s}: {e}")))
}

#[async_trait::async_trait]
impl HttpTransport for LocalTransport {
    async fn get(&self, req: &GetRequest) -> Result<HttpBody> {
        let url = parse_url(&req.url)?;
        let mut rb = self.client.get(url);
        if let Some(to) = req.timeout() {
            rb = rb.timeout(to);
        }
        rb = Self::apply_headers(rb, &req.headers);
        let resp = rb.send().await.map_err(send_error)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: req.url.clone(),
            });
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();
        let text = resp.text().await.map_err(send_error)?;
        if content_type.contains("json") {
            if let Ok(v) = serde_json::from_str::<serde_json::Value>(&text) {
                return Ok(HttpBody::Json(v));
            }
        }
        Ok(HttpBody::Text(text))
    }

    async fn head(&self, req: &HeadRequest) -> Result<HeadResponse> {
        let url = parse_url(&req.url)?;
        let mut rb = self.client.head(url);
        if let Some(to) = req.timeout() {
            rb = rb.timeout(to);
        }
        rb = Self::apply_headers(rb, &req.headers);
        let resp = rb.send().await.map_err(send_error)?;
        let status = resp.status().as_u16();
        if req.accept_only_200 && status != 200 {
            return Err(Error::HttpStatus {
                status,
                url: req.url.clone(),
            });
        }
        let mut headers = BTreeMap::new();
        for (k, v) in resp.headers().iter() {
            if let Ok(s) = v.to_str() {
                headers.insert(k.as_str().to_ascii_lowercase(), s.to_string());
            }
        }
        Ok(HeadResponse { status, headers })
    }
}
