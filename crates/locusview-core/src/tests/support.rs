use crate::*;
use futures::future::BoxFuture;
use std::sync::Mutex;

/// Serves canned bodies keyed by URL prefix and records every URL it was asked for.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    responses: Vec<(String, String)>,
    pub(crate) requests: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(mut self, url_prefix: &str, body: serde_json::Value) -> Self {
        self.responses.push((url_prefix.to_string(), body.to_string()));
        self
    }

    /// Like [`Self::respond`] for bodies that are not strict JSON.
    pub(crate) fn respond_text(mut self, url_prefix: &str, body: &str) -> Self {
        self.responses.push((url_prefix.to_string(), body.to_string()));
        self
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<String>> {
        self.requests.lock().unwrap().push(request.url.clone());
        let body = self
            .responses
            .iter()
            .find(|(prefix, _)| request.url.starts_with(prefix.as_str()))
            .map(|(_, body)| body.clone());
        Box::pin(async move {
            body.ok_or(Error::Http {
                status: 404,
                url: request.url,
            })
        })
    }
}

pub(crate) fn fields(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
