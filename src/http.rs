// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::FetchError;

/// A streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, FetchError>> + Send>>;

/// Fully buffered HTTP response
pub struct HttpBody {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Bytes,
}

/// HTTP response with status, content length, and body stream
pub struct HttpStream {
    /// HTTP status code
    pub status: u16,
    /// Content-Length header value, if present
    pub content_length: Option<u64>,
    /// Response body as a stream of bytes
    pub body: ByteStream,
}

/// HTTP client abstraction for testability.
///
/// Transport-level failures are classified into [`FetchError`] kinds by
/// the implementation; status codes are returned as data and judged by
/// the caller.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch the entire response body as bytes
    async fn get_bytes(&self, url: &str, timeout: Duration) -> Result<HttpBody, FetchError>;

    /// Get a streaming response for large downloads
    async fn get_stream(&self, url: &str, timeout: Duration) -> Result<HttpStream, FetchError>;
}

#[async_trait]
impl<C: HttpClient> HttpClient for std::sync::Arc<C> {
    async fn get_bytes(&self, url: &str, timeout: Duration) -> Result<HttpBody, FetchError> {
        (**self).get_bytes(url, timeout).await
    }

    async fn get_stream(&self, url: &str, timeout: Duration) -> Result<HttpStream, FetchError> {
        (**self).get_stream(url, timeout).await
    }
}

/// Default HTTP client implementation using reqwest
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Create a new ReqwestClient with default settings
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a new ReqwestClient with a custom reqwest::Client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get_bytes(&self, url: &str, timeout: Duration) -> Result<HttpBody, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_transport(url, e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_transport(url, e))?;

        Ok(HttpBody { status, body })
    }

    async fn get_stream(&self, url: &str, timeout: Duration) -> Result<HttpStream, FetchError> {
        use futures::StreamExt;

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_transport(url, e))?;

        let status = response.status().as_u16();
        let content_length = response.content_length();

        let owned_url = url.to_string();
        let body: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(move |result| result.map_err(|e| FetchError::from_transport(&owned_url, e))),
        );

        Ok(HttpStream {
            status,
            content_length,
            body,
        })
    }
}
