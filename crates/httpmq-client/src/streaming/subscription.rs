//! Push-subscription engine

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::parser::FrameSplitter;
use super::transport::{ChunkRead, TransportSession};
use super::types::{decode_frame, StreamItem};
use crate::error::{HttpmqError, Result};

/// Receives every item of a subscription, in server order.
///
/// The engine waits for `handle` to return before forwarding the next item
/// or reading more data. Returning `Break` drains the subscription.
#[async_trait]
pub trait MessageHandler: Send {
    async fn handle(&mut self, item: StreamItem) -> ControlFlow<()>;
}

/// Publishes into a bounded channel; a dropped receiver drains the subscription.
#[async_trait]
impl MessageHandler for mpsc::Sender<StreamItem> {
    async fn handle(&mut self, item: StreamItem) -> ControlFlow<()> {
        match self.send(item).await {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => {
                debug!("Subscription receiver dropped");
                ControlFlow::Break(())
            }
        }
    }
}

/// Handler backed by an async closure, see [`handler_fn`]
pub struct FnHandler<F>(F);

/// Wrap an async closure as a [`MessageHandler`]
///
/// ```
/// use std::ops::ControlFlow;
/// use httpmq_client::streaming::{handler_fn, StreamItem};
///
/// let handler = handler_fn(|item: StreamItem| async move {
///     if let StreamItem::Delivered(msg) = item {
///         println!("{}: {} bytes", msg.subject, msg.message.len());
///     }
///     ControlFlow::Continue(())
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: FnMut(StreamItem) -> Fut + Send,
    Fut: Future<Output = ControlFlow<()>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: FnMut(StreamItem) -> Fut + Send,
    Fut: Future<Output = ControlFlow<()>> + Send + 'static,
{
    async fn handle(&mut self, item: StreamItem) -> ControlFlow<()> {
        (self.0)(item).await
    }
}

/// Lifecycle of one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubscriptionState {
    Idle,
    Connecting,
    Streaming,
    Draining,
    Closed,
    Failed,
}

/// Drives one subscription from an open transport to termination.
pub(crate) struct PushSubscriber<T> {
    transport: T,
    splitter: FrameSplitter,
    state: SubscriptionState,
    request_id: String,
    poll_interval: Duration,
}

impl<T: TransportSession> PushSubscriber<T> {
    pub(crate) fn new(transport: T, request_id: impl Into<String>, poll_interval: Duration) -> Self {
        let mut subscriber = Self {
            transport,
            splitter: FrameSplitter::new(),
            state: SubscriptionState::Connecting,
            request_id: request_id.into(),
            poll_interval,
        };
        subscriber.transition(SubscriptionState::Streaming);
        subscriber
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> SubscriptionState {
        self.state
    }

    fn transition(&mut self, next: SubscriptionState) {
        debug!(
            request_id = %self.request_id,
            from = ?self.state,
            to = ?next,
            "Subscription state change"
        );
        self.state = next;
    }

    /// Run the read loop until cancellation, server close, handler break,
    /// or failure. The transport is always closed before returning.
    pub(crate) async fn run<H>(&mut self, handler: &mut H, cancel: &CancellationToken) -> Result<String>
    where
        H: MessageHandler + ?Sized,
    {
        let result = self.read_loop(handler, cancel).await;
        self.transport.close();

        match result {
            Ok(forwarded) => {
                self.transition(SubscriptionState::Closed);
                info!(request_id = %self.request_id, forwarded, "Subscription closed");
                Ok(self.request_id.clone())
            }
            Err(e) => {
                self.transition(SubscriptionState::Failed);
                warn!(request_id = %self.request_id, error = %e, "Subscription failed");
                Err(e)
            }
        }
    }

    async fn read_loop<H>(&mut self, handler: &mut H, cancel: &CancellationToken) -> Result<u64>
    where
        H: MessageHandler + ?Sized,
    {
        let mut forwarded = 0u64;

        loop {
            if cancel.is_cancelled() {
                debug!(request_id = %self.request_id, "Cancellation requested");
                self.transition(SubscriptionState::Draining);
                return Ok(forwarded);
            }

            let read = self.transport.read_next_chunk(self.poll_interval).await;
            let chunk = match read.map_err(|e| self.read_error(e))? {
                ChunkRead::Data(chunk) => chunk,
                ChunkRead::Idle => continue,
                ChunkRead::EndOfStream => {
                    debug!(request_id = %self.request_id, "Server closed the stream");
                    return Ok(forwarded);
                }
            };

            for value in self.splitter.feed(&chunk) {
                let item = decode_frame(value, &self.request_id)?;
                forwarded += 1;
                if handler.handle(item).await.is_break() {
                    debug!(request_id = %self.request_id, "Handler stopped the subscription");
                    self.transition(SubscriptionState::Draining);
                    return Ok(forwarded);
                }
            }
        }
    }

    /// Attribute a failed read to this subscription's request ID
    fn read_error(&self, err: HttpmqError) -> HttpmqError {
        match err {
            HttpmqError::Protocol { status, detail, .. } => HttpmqError::Protocol {
                request_id: self.request_id.clone(),
                status,
                detail,
            },
            other => HttpmqError::protocol(
                self.request_id.as_str(),
                format!("stream read failed: {}", other),
            ),
        }
    }
}

/// Log the open attempt of a subscription before a transport exists
pub(crate) fn log_connecting(request_id: &str) {
    debug!(
        request_id = %request_id,
        from = ?SubscriptionState::Idle,
        to = ?SubscriptionState::Connecting,
        "Subscription state change"
    );
}
