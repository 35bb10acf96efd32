//! Ranged stream head downloads.

use crate::client::Connection;
use crate::error::{Result, ServerClientError};
use async_trait::async_trait;
use cadenza_core::StreamFetcher;
use futures_util::StreamExt;
use reqwest::header::RANGE;
use std::sync::Arc;
use tracing::debug;

/// `StreamFetcher` issuing `Range: bytes=0-{n-1}` requests.
///
/// Servers that ignore the range and send the whole body are cut off after
/// `max_bytes`.
#[derive(Debug, Clone)]
pub struct HttpStreamFetcher {
    connection: Arc<Connection>,
}

impl HttpStreamFetcher {
    pub(crate) fn new(connection: Arc<Connection>) -> Self {
        Self { connection }
    }

    /// Download at most `max_bytes` from the start of the stream.
    pub async fn download_head(&self, locator: &str, max_bytes: u64) -> Result<Vec<u8>> {
        if max_bytes == 0 {
            return Ok(Vec::new());
        }
        let url = self.connection.resolve(locator)?;
        debug!(url = %url, max_bytes, "Downloading stream head");

        let request = self
            .connection
            .http
            .get(url.clone())
            .header(RANGE, format!("bytes=0-{}", max_bytes - 1));
        let response = self
            .connection
            .authorize(request, &url)
            .send()
            .await
            .map_err(ServerClientError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return match status.as_u16() {
                401 => Err(ServerClientError::AuthRequired),
                404 => Err(ServerClientError::NotFound(format!("stream {}", url))),
                code => {
                    let error_text = response.text().await.unwrap_or_default();
                    Err(ServerClientError::ServerError {
                        status: code,
                        message: error_text,
                    })
                }
            };
        }

        let limit = usize::try_from(max_bytes).unwrap_or(usize::MAX);
        let capacity = response
            .content_length()
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0)
            .min(limit);
        let mut head = Vec::with_capacity(capacity);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let room = limit - head.len();
            head.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if head.len() >= limit {
                break;
            }
        }

        debug!(url = %url, bytes = head.len(), "Downloaded stream head");
        Ok(head)
    }
}

#[async_trait]
impl StreamFetcher for HttpStreamFetcher {
    async fn fetch_head(&self, locator: &str, max_bytes: u64) -> cadenza_core::Result<Vec<u8>> {
        Ok(self.download_head(locator, max_bytes).await?)
    }
}
