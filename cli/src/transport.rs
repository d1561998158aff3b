//! HTTP transport for the chat endpoint with a response-interceptor hook.
//!
//! Interceptors see every response before the caller does and may wrap its
//! body. The progress-marker tap is installed through this hook instead of
//! patching the HTTP client globally.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use merak_core::markers::{MarkerTap, should_watch};
use serde_json::Value;

pub type ByteStream = BoxStream<'static, Result<Bytes, reqwest::Error>>;

/// What an interceptor may know about a response before reading its body.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
}

pub trait ResponseInterceptor: Send + Sync {
    /// Return the body the consumer should read. Implementations that only
    /// observe must pass every chunk through unchanged.
    fn intercept(&self, meta: &ResponseMeta, body: ByteStream) -> ByteStream;
}

pub struct ChatResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl ChatResponse {
    /// Drain the body into a string, for error reporting.
    pub async fn text(mut self) -> String {
        let mut raw = Vec::new();
        while let Some(chunk) = self.body.next().await {
            match chunk {
                Ok(chunk) => raw.extend_from_slice(&chunk),
                Err(err) => {
                    tracing::debug!(error = %err, "Chat response body ended early");
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }
}

pub struct ChatTransport {
    client: reqwest::Client,
    url: reqwest::Url,
    access_token: Option<String>,
    interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

impl ChatTransport {
    pub fn new(client: reqwest::Client, url: reqwest::Url, access_token: Option<String>) -> Self {
        Self {
            client,
            url,
            access_token,
            interceptors: Vec::new(),
        }
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub async fn post(&self, envelope: &Value) -> Result<ChatResponse, reqwest::Error> {
        let mut request = self.client.post(self.url.clone()).json(envelope);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();

        let meta = ResponseMeta {
            method: "POST".to_string(),
            path: self.url.path().to_string(),
            content_type: response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        };

        let body = self
            .interceptors
            .iter()
            .fold(response.bytes_stream().boxed(), |body, interceptor| {
                interceptor.intercept(&meta, body)
            });

        Ok(ChatResponse { status, body })
    }
}

/// Watches chat event streams for progress markers and reports toggles.
pub struct MarkerInterceptor {
    chat_path: String,
    on_toggle: Arc<dyn Fn(bool) + Send + Sync>,
}

impl MarkerInterceptor {
    pub fn new(chat_path: impl Into<String>, on_toggle: Arc<dyn Fn(bool) + Send + Sync>) -> Self {
        Self {
            chat_path: chat_path.into(),
            on_toggle,
        }
    }
}

impl ResponseInterceptor for MarkerInterceptor {
    fn intercept(&self, meta: &ResponseMeta, body: ByteStream) -> ByteStream {
        if !should_watch(
            &meta.method,
            &meta.path,
            meta.content_type.as_deref(),
            &self.chat_path,
        ) {
            return body;
        }
        let on_toggle = Arc::clone(&self.on_toggle);
        tap_stream(body, move |active| on_toggle(active)).boxed()
    }
}

/// Pass `body` through untouched while feeding every chunk to a [`MarkerTap`].
///
/// The tap closes when the stream ends, when it yields an error, or when
/// the consumer drops it early.
pub fn tap_stream<S, E, F>(body: S, on_toggle: F) -> impl Stream<Item = Result<Bytes, E>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    F: FnMut(bool),
{
    stream::unfold(Some((body, MarkerTap::new(on_toggle))), |state| async move {
        let Some((mut body, mut tap)) = state else {
            return None;
        };
        match body.next().await {
            Some(Ok(chunk)) => {
                tap.feed(&chunk);
                Some((Ok(chunk), Some((body, tap))))
            }
            Some(Err(err)) => {
                tap.close();
                Some((Err(err), None))
            }
            None => {
                tap.close();
                None
            }
        }
    })
}
