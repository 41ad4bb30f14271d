//! httpmq Client Library
//!
//! Typed client for the httpmq data plane: publish messages, run JetStream
//! push subscriptions over a streaming HTTP response, and acknowledge
//! deliveries.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::ops::ControlFlow;
//!
//! use httpmq_client::streaming::handler_fn;
//! use httpmq_client::{DataClient, RequestContext, StreamItem, SubscribeRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DataClient::new("http://127.0.0.1:4101")?;
//!     client.ready(&RequestContext::new()).await?;
//!
//!     client
//!         .publish("subj.1", b"hello world", &RequestContext::new())
//!         .await?;
//!
//!     let cancel = CancellationToken::new();
//!     let stop = cancel.clone();
//!     let mut handler = handler_fn(move |item| {
//!         if let StreamItem::Delivered(msg) = &item {
//!             println!("{}", String::from_utf8_lossy(&msg.message));
//!         }
//!         stop.cancel();
//!         async { ControlFlow::Continue(()) }
//!     });
//!
//!     let request = SubscribeRequest::new("stream", "consumer", "subj.1");
//!     let request_id = client
//!         .push_subscribe(&request, &mut handler, &RequestContext::new(), &cancel)
//!         .await?;
//!     println!("subscription {} ended", request_id);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! The library emits `tracing` events and spans tagged with the request ID
//! and never installs a subscriber; configure one in the application.
//!
//! # Testing
//!
//! The `testing` module provides utilities for integration testing:
//!
//! ```rust,ignore
//! use httpmq_client::testing::TestServer;
//!
//! let server = TestServer::start(mock_data_plane()).await?;
//! server.client.ready(&RequestContext::new()).await?;
//! ```

mod client;
mod context;
mod error;
pub mod streaming;
pub mod testing;

pub use client::{ClientConfig, DataClient, DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT};
pub use context::{RequestContext, REQUEST_ID_HEADER};
pub use error::{ApiError, ErrorDetail, HttpmqError, ResponseEnvelope, Result};

// Re-export streaming types for convenience
pub use streaming::{AckRequest, MessageHandler, ReceivedMessage, StreamItem, SubscribeRequest};

// Cancellation token used by subscriptions
pub use tokio_util::sync::CancellationToken;
