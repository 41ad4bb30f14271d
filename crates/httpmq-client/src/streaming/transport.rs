//! Transport session for the subscription socket

use std::pin::Pin;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use tracing::{debug, trace};
use url::Url;

use crate::context::RequestContext;
use crate::error::{HttpmqError, ResponseEnvelope, Result};

/// Outcome of one bounded read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkRead {
    /// Bytes received from the server
    Data(Bytes),
    /// No data arrived within the timeout
    Idle,
    /// The server closed the stream, or the session was closed
    EndOfStream,
}

/// One exclusively owned, long-lived streaming connection
#[async_trait]
pub trait TransportSession: Send {
    /// Wait at most `timeout` for the next chunk
    async fn read_next_chunk(&mut self, timeout: Duration) -> Result<ChunkRead>;

    /// Release the connection. Idempotent.
    fn close(&mut self);
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// [`TransportSession`] over a chunked HTTP response body
pub struct HttpTransport {
    request_id: String,
    byte_stream: Option<ByteStream>,
}

impl HttpTransport {
    /// Open the streaming request.
    ///
    /// The context timeout, if set, bounds only the wait for the response
    /// head; the body itself is unbounded.
    pub async fn open(
        http_client: &Client,
        url: Url,
        query: &[(&str, String)],
        context: &RequestContext,
    ) -> Result<Self> {
        let request_id = context.request_id().to_string();
        let path = url.path().to_string();
        debug!(request_id = %request_id, "Opening subscription socket");

        let request = context.apply(http_client.get(url).query(query));
        debug!("> GET {}", path);
        let started = Instant::now();
        let send = request.send();
        let response = match context.timeout() {
            Some(timeout) => tokio::time::timeout(timeout, send).await.map_err(|_| {
                HttpmqError::Connect {
                    request_id: request_id.clone(),
                    message: format!("no response within {:?}", timeout),
                }
            })?,
            None => send.await,
        };

        let response = response.map_err(|e| {
            debug!(error = %e, "> GET {} raised ({:.3} ms)", path, elapsed_ms(started));
            if e.is_builder() {
                HttpmqError::Http(e)
            } else {
                HttpmqError::Connect {
                    request_id: request_id.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        debug!("< {} ({:.3} ms)", status, elapsed_ms(started));
        if !status.is_success() {
            let detail = match response.bytes().await {
                Ok(body) => match serde_json::from_slice::<ResponseEnvelope>(&body) {
                    Ok(envelope) => envelope.into_api_error(status.as_u16()).to_string(),
                    Err(_) if body.is_empty() => format!("HTTP {}", status),
                    Err(_) => String::from_utf8_lossy(&body).into_owned(),
                },
                Err(e) => format!("HTTP {}; body unreadable: {}", status, e),
            };
            return Err(HttpmqError::Protocol {
                request_id,
                status: Some(status.as_u16()),
                detail,
            });
        }

        Ok(Self {
            request_id,
            byte_stream: Some(Box::pin(response.bytes_stream())),
        })
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[async_trait]
impl TransportSession for HttpTransport {
    async fn read_next_chunk(&mut self, timeout: Duration) -> Result<ChunkRead> {
        let Some(stream) = self.byte_stream.as_mut() else {
            return Ok(ChunkRead::EndOfStream);
        };

        match tokio::time::timeout(timeout, stream.next()).await {
            Err(_) => Ok(ChunkRead::Idle),
            Ok(Some(Ok(bytes))) => {
                trace!(len = bytes.len(), "Received chunk");
                Ok(ChunkRead::Data(bytes))
            }
            Ok(Some(Err(e))) => Err(HttpmqError::protocol(
                self.request_id.as_str(),
                format!("stream read failed: {}", e),
            )),
            Ok(None) => Ok(ChunkRead::EndOfStream),
        }
    }

    fn close(&mut self) {
        if self.byte_stream.take().is_some() {
            debug!(request_id = %self.request_id, "Closed subscription socket");
        }
    }
}
