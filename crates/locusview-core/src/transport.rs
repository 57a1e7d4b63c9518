use crate::{Error, Result};
use futures::future::BoxFuture;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single request issued by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
            timeout: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The network boundary. Implementations resolve with the response body on a 2xx status and with
/// [`Error::Http`] otherwise.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<String>>;
}

/// A transport for plots that only use in-memory sources; every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransport;

impl Transport for NoTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            Err(Error::Transport {
                url: request.url,
                message: "no transport configured".to_string(),
            })
        })
    }
}

/// Sends `request` and parses the body as JSON.
pub async fn fetch_json(
    transport: &dyn Transport,
    request: HttpRequest,
) -> Result<serde_json::Value> {
    let url = request.url.clone();
    tracing::debug!(%url, method = ?request.method, "sending request");
    let text = transport.send(request).await?;
    serde_json::from_str(&text).map_err(|err| {
        tracing::warn!(%url, error = %err, "response is not valid JSON");
        Error::Json(err)
    })
}
