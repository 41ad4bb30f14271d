//! httpmq data plane client

use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, StatusCode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use crate::context::RequestContext;
use crate::error::{ApiError, HttpmqError, ResponseEnvelope, Result};
use crate::streaming::{
    log_connecting, AckRequest, HttpTransport, MessageHandler, PushSubscriber, ReceivedMessage,
    StreamItem, SubscribeRequest,
};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for a [`DataClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the data plane (e.g., "http://127.0.0.1:4101")
    pub base_url: String,
    /// Total timeout for non-streaming requests
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Bearer token sent with every request
    pub bearer_token: Option<String>,
    /// Extra PEM encoded root certificate
    pub ca_cert_pem: Option<Vec<u8>>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            bearer_token: None,
            ca_cert_pem: None,
        }
    }
}

/// httpmq data plane client
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct DataClient {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl DataClient {
    /// Create a new data plane client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the data plane (e.g., "http://127.0.0.1:4101")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::from_config(&ClientConfig::new(base_url))
    }

    /// Create a new client with custom timeouts
    pub fn with_config(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let mut config = ClientConfig::new(base_url);
        config.request_timeout = timeout;
        config.connect_timeout = connect_timeout;
        Self::from_config(&config)
    }

    /// Create a new client that sends a bearer token with every request.
    ///
    /// The token is set as a default `Authorization: Bearer <token>` header.
    pub fn with_bearer_token(base_url: &str, token: &str) -> Result<Self> {
        let mut config = ClientConfig::new(base_url);
        config.bearer_token = Some(token.to_string());
        Self::from_config(&config)
    }

    /// Create a new client from a full [`ClientConfig`]
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        // No total timeout on the client: subscription bodies are unbounded.
        let mut builder = Client::builder().connect_timeout(config.connect_timeout);

        if let Some(token) = &config.bearer_token {
            let mut headers = reqwest::header::HeaderMap::new();
            let header_value =
                reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| HttpmqError::InvalidHeader(format!("Invalid auth token: {}", e)))?;
            headers.insert(reqwest::header::AUTHORIZATION, header_value);
            builder = builder.default_headers(headers);
        }

        if let Some(pem) = &config.ca_cert_pem {
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(pem)?);
        }

        let base_url = Url::parse(&config.base_url)?;

        Ok(Self {
            client: builder.build()?,
            base_url,
            request_timeout: config.request_timeout,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get a reference to the underlying HTTP client.
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    // =========================================================================
    // Health Check
    // =========================================================================

    /// Check whether the data plane is ready
    #[instrument(skip(self, context), fields(request_id = %context.request_id()))]
    pub async fn ready(&self, context: &RequestContext) -> Result<String> {
        let url = self.endpoint(&["v1", "data", "ready"])?;
        let response = self.execute(self.client.get(url), context).await?;

        if response.status() != StatusCode::OK {
            return Err(ApiError::new(context.request_id(), response.status().as_u16())
                .with_message("dataplane API is not ready")
                .into());
        }
        self.handle_envelope(response, context).await
    }

    // =========================================================================
    // Publishing
    // =========================================================================

    /// Publish a message under a subject
    #[instrument(skip(self, message, context), fields(request_id = %context.request_id()))]
    pub async fn publish(
        &self,
        subject: &str,
        message: &[u8],
        context: &RequestContext,
    ) -> Result<String> {
        let url = self.endpoint(&["v1", "data", "subject", subject])?;
        let request = self.client.post(url).body(message.to_vec());
        let response = self.execute(request, context).await?;
        self.handle_envelope(response, context).await
    }

    // =========================================================================
    // Acknowledgements
    // =========================================================================

    /// Acknowledge one delivery
    ///
    /// Every delivery is identified by two sequence numbers: the stream
    /// sequence, unique per message within the stream, and the consumer
    /// sequence, which grows with each delivery (including redeliveries)
    /// to that consumer on that stream.
    pub async fn send_ack(
        &self,
        stream: &str,
        stream_seq: u64,
        consumer: &str,
        consumer_seq: u64,
        context: &RequestContext,
    ) -> Result<String> {
        self.ack(
            &AckRequest::new(stream, stream_seq, consumer, consumer_seq),
            context,
        )
        .await
    }

    /// Acknowledge a received message
    pub async fn send_ack_simple(
        &self,
        msg: &ReceivedMessage,
        context: &RequestContext,
    ) -> Result<String> {
        self.ack(&AckRequest::from(msg), context).await
    }

    /// Send an [`AckRequest`]. Exactly one request, never retried.
    #[instrument(skip(self, context), fields(request_id = %context.request_id()))]
    pub async fn ack(&self, ack: &AckRequest, context: &RequestContext) -> Result<String> {
        let url = self.endpoint(&[
            "v1",
            "data",
            "stream",
            &ack.stream,
            "consumer",
            &ack.consumer,
            "ack",
        ])?;
        let request = self.client.post(url).json(&ack.body());
        let response = self.execute(request, context).await?;
        self.handle_envelope(response, context).await
    }

    // =========================================================================
    // Push Subscriptions
    // =========================================================================

    /// URL of the subscription socket for a stream/consumer pair
    pub fn subscribe_url(&self, stream: &str, consumer: &str) -> Result<Url> {
        self.endpoint(&["v1", "data", "stream", stream, "consumer", consumer])
    }

    /// Run a push subscription, forwarding every item to `handler`.
    ///
    /// Returns the context's request ID once the subscription ends cleanly:
    /// `cancel` was triggered, the server closed the stream, or the handler
    /// returned `Break`. Items already parsed when `cancel` is observed are
    /// still forwarded. Transport and protocol failures are returned as
    /// errors and never routed through the handler.
    #[instrument(
        skip(self, handler, context, cancel),
        fields(request_id = %context.request_id(), stream = %request.stream, consumer = %request.consumer)
    )]
    pub async fn push_subscribe<H>(
        &self,
        request: &SubscribeRequest,
        handler: &mut H,
        context: &RequestContext,
        cancel: &CancellationToken,
    ) -> Result<String>
    where
        H: MessageHandler + ?Sized,
    {
        let url = self.subscribe_url(&request.stream, &request.consumer)?;

        log_connecting(context.request_id());
        let transport = HttpTransport::open(&self.client, url, &request.query(), context).await?;

        let mut subscriber =
            PushSubscriber::new(transport, context.request_id(), request.poll_interval);
        subscriber.run(handler, cancel).await
    }

    /// Run a push subscription on a background task, publishing into a
    /// bounded channel.
    ///
    /// Dropping the receiver stops the subscription the same way `cancel`
    /// does. The task resolves to the result of [`push_subscribe`](Self::push_subscribe).
    pub fn subscribe(
        &self,
        request: SubscribeRequest,
        context: RequestContext,
        cancel: CancellationToken,
        buffer: usize,
    ) -> (mpsc::Receiver<StreamItem>, JoinHandle<Result<String>>) {
        let (mut tx, rx) = mpsc::channel(buffer.max(1));
        let client = self.clone();
        let handle = tokio::spawn(async move {
            client
                .push_subscribe(&request, &mut tx, &context, &cancel)
                .await
        });
        (rx, handle)
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    /// Build an endpoint URL, percent-encoding each path segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a non-streaming request with context and logging applied
    async fn execute(
        &self,
        request: RequestBuilder,
        context: &RequestContext,
    ) -> Result<reqwest::Response> {
        let request = context
            .apply(request)
            .timeout(context.timeout().unwrap_or(self.request_timeout))
            .build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();

        debug!("> {} {}", method, path);
        let started = Instant::now();
        match self.client.execute(request).await {
            Ok(response) => {
                debug!(
                    "< {} ({:.3} ms)",
                    response.status(),
                    started.elapsed().as_secs_f64() * 1000.0
                );
                Ok(response)
            }
            Err(e) => {
                debug!(
                    error = %e,
                    "> {} {} raised ({:.3} ms)",
                    method,
                    path,
                    started.elapsed().as_secs_f64() * 1000.0
                );
                Err(HttpmqError::Connect {
                    request_id: context.request_id().to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Parse the standard response envelope into the request ID or an error
    async fn handle_envelope(
        &self,
        response: reqwest::Response,
        context: &RequestContext,
    ) -> Result<String> {
        let status = response.status();
        let body = response.bytes().await.map_err(|e| HttpmqError::Protocol {
            request_id: context.request_id().to_string(),
            status: Some(status.as_u16()),
            detail: format!("failed to read response body: {}", e),
        })?;

        let envelope: ResponseEnvelope =
            serde_json::from_slice(&body).map_err(|e| HttpmqError::Protocol {
                request_id: context.request_id().to_string(),
                status: Some(status.as_u16()),
                detail: format!("invalid response envelope: {}", e),
            })?;

        Ok(envelope.into_result(status.as_u16())?)
    }
}
