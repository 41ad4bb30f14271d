//! Push subscriptions over a chunked HTTP response
//!
//! The server writes one JSON object per line on a long-lived response
//! body. [`FrameSplitter`] reassembles objects across chunk boundaries, the
//! engine decodes them into [`StreamItem`]s and forwards each one to a
//! [`MessageHandler`] in server order.
//!
//! # Example
//!
//! ```no_run
//! use httpmq_client::{DataClient, RequestContext, StreamItem, SubscribeRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DataClient::new("http://127.0.0.1:4101")?;
//! let cancel = CancellationToken::new();
//!
//! let request = SubscribeRequest::new("orders", "billing", "orders.>").max_inflight(1);
//! let (mut rx, task) = client.subscribe(request, RequestContext::new(), cancel.clone(), 16);
//!
//! while let Some(item) = rx.recv().await {
//!     match item {
//!         StreamItem::Delivered(msg) => {
//!             println!("{} #{}", msg.subject, msg.stream_seq);
//!             client.send_ack_simple(&msg, &RequestContext::new()).await?;
//!         }
//!         StreamItem::ServerError(err) => {
//!             eprintln!("server error: {}", err);
//!             break;
//!         }
//!     }
//! }
//!
//! cancel.cancel();
//! task.await??;
//! # Ok(())
//! # }
//! ```

mod parser;
mod subscription;
mod transport;
mod types;

pub use parser::FrameSplitter;
pub use subscription::{handler_fn, FnHandler, MessageHandler};
pub use transport::{ChunkRead, HttpTransport, TransportSession};
pub use types::{
    AckRequest, MessageFrame, ReceivedMessage, SequencePair, StreamItem, SubscribeRequest,
    DEFAULT_POLL_INTERVAL, IN_BAND_ERROR_STATUS,
};

pub(crate) use subscription::{log_connecting, PushSubscriber};
