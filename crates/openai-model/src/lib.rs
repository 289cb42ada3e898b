//! A streaming model provider for OpenAI-compatible chat completion APIs.
//!
//! Responses are read as server-sent events and surfaced as raw deltas, tool
//! call fragments are passed through without being merged.

#[macro_use]
extern crate tracing;

mod config;
mod error;
mod io;
mod proto;
mod response;

use std::sync::Arc;

use mime::Mime;
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, RequestBuilder, Response};
use toolstream_model::{ErrorKind, ModelProvider, ModelRequest};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
pub use error::Error;
use io::{Chunks, Sse};
use response::OpenAIResponse;

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Creates a new `OpenAIProvider` that sends requests with `client`,
    /// for example one with custom timeouts or proxies.
    #[inline]
    pub fn with_client(client: Client, config: OpenAIConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        debug!(
            "opening a stream with {} messages and {} tools",
            req.messages.len(),
            req.tools.len()
        );
        let body = proto::create_request(req, &self.config);
        let builder = self
            .client
            .post(self.config.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, mime::TEXT_EVENT_STREAM.as_ref())
            .json(&body);
        open_stream(builder)
    }
}

async fn open_stream(builder: RequestBuilder) -> Result<OpenAIResponse, Error> {
    let resp = match builder.send().await.and_then(Response::error_for_status)
    {
        Ok(resp) => resp,
        Err(err) => {
            warn!("chat completion request failed: {err}");
            return Err(Error::from_http(err));
        }
    };

    if !is_event_stream(resp.headers()) {
        return Err(Error::new(
            format!(
                "Unexpected content type: {:?}",
                resp.headers().get(header::CONTENT_TYPE)
            ),
            ErrorKind::Other,
        ));
    }

    let sse = Sse::new(Chunks::from_response(resp));
    Ok(OpenAIResponse::from_sse(sse))
}

fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Mime>().ok())
        .is_some_and(|m| {
            m.type_() == mime::TEXT && m.subtype() == mime::EVENT_STREAM
        })
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn test_is_event_stream() {
        let mut headers = HeaderMap::new();
        assert!(!is_event_stream(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream; charset=utf-8"),
        );
        assert!(is_event_stream(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        assert!(!is_event_stream(&headers));
    }
}
