// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::config::RetryConfig;
use crate::error::{DownloadError, FetchError};
use crate::events::{EngineEvent, SharedEventSink};
use crate::http::{ByteStream, HttpClient};

/// Network fetcher with bounded exponential-backoff retry.
///
/// Only transient failures are retried. A permanent failure (4xx status,
/// malformed URL, filesystem error) surfaces immediately.
pub struct Fetcher<C> {
    client: C,
    retry: RetryConfig,
    timeout: Duration,
    sink: SharedEventSink,
}

impl<C: HttpClient> Fetcher<C> {
    pub fn new(client: C, retry: RetryConfig, timeout: Duration, sink: SharedEventSink) -> Self {
        Self {
            client,
            retry,
            timeout,
            sink,
        }
    }

    /// Fetch an entire response body
    pub async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        Url::parse(url)?;

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.try_bytes(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempts < self.retry.max_retries => {
                    self.backoff(url, attempts).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Stream a response body to `dest`.
    ///
    /// Data is written to a `.partial` sibling first and renamed into
    /// place only once the full body has been flushed, so an aborted
    /// download never leaves a truncated file at the final path.
    /// Returns the number of bytes written.
    pub async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        Url::parse(url).map_err(FetchError::from)?;

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.try_stream_to_file(url, dest).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_transient() && attempts < self.retry.max_retries => {
                    self.backoff(url, attempts).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self.client.get_bytes(url, self.timeout).await?;
        if response.status >= 400 {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    }

    async fn try_stream_to_file(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let response = self.client.get_stream(url, self.timeout).await?;
        if response.status >= 400 {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            }
            .into());
        }

        let partial = partial_path(dest);
        match write_stream(response.body, &partial).await {
            Ok(bytes) => {
                tokio::fs::rename(&partial, dest)
                    .await
                    .map_err(|e| DownloadError::FinalizeFailed {
                        from: partial.clone(),
                        source: e,
                    })?;
                Ok(bytes)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }

    /// Sleep before the next attempt: base * 2^(k-2) for attempt k,
    /// capped at max_delay
    async fn backoff(&self, url: &str, completed_attempts: u32) {
        let factor = 2u32.saturating_pow(completed_attempts.saturating_sub(1));
        let delay = self
            .retry
            .base_delay
            .saturating_mul(factor)
            .min(self.retry.max_delay);

        self.sink.emit(EngineEvent::RetryScheduled {
            url: url.to_string(),
            attempt: completed_attempts + 1,
            max_attempts: self.retry.max_retries,
            delay,
        });

        tokio::time::sleep(delay).await;
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

async fn write_stream(mut body: ByteStream, path: &Path) -> Result<u64, DownloadError> {
    use futures::StreamExt;

    let mut file = File::create(path)
        .await
        .map_err(|e| DownloadError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(DownloadError::from)?;
        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::WriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(|e| DownloadError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(written)
}
