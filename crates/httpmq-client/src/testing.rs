//! Test utilities for httpmq-client
//!
//! Provides a throwaway HTTP server for integration tests and a scripted
//! transport for exercising the subscription engine without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::TcpListener;

use crate::error::HttpmqError;
use crate::streaming::{ChunkRead, TransportSession};
use crate::{DataClient, Result};

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub client: DataClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve an axum Router on an ephemeral port
    ///
    /// # Example
    ///
    /// ```ignore
    /// use httpmq_client::testing::TestServer;
    ///
    /// let router = axum::Router::new().route("/v1/data/ready", get(ready));
    /// let server = TestServer::start(router).await?;
    /// server.client.ready(&RequestContext::new()).await?;
    /// ```
    pub async fn start<S>(router: axum::Router<S>) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let router: axum::Router = router.into();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        let base_url = format!("http://{}", addr);
        let client =
            DataClient::with_config(&base_url, Duration::from_secs(5), Duration::from_secs(2))?;

        Ok(Self {
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// One step replayed by [`ScriptedTransport`]
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Chunk(Bytes),
    /// Report no data for this read
    Idle,
    /// Fail the read with a protocol error
    Fail(String),
    End,
}

impl ScriptStep {
    pub fn chunk(data: impl AsRef<[u8]>) -> Self {
        Self::Chunk(Bytes::copy_from_slice(data.as_ref()))
    }
}

/// In-memory [`TransportSession`] replaying a fixed script
///
/// Once the script is exhausted the transport reports end of stream, or,
/// after [`then_idle`](Self::then_idle), idles for the full read timeout
/// on every call like a quiet server.
pub struct ScriptedTransport {
    steps: VecDeque<ScriptStep>,
    idle_when_exhausted: bool,
    closed: Arc<AtomicBool>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: steps.into(),
            idle_when_exhausted: false,
            closed: Arc::new(AtomicBool::new(false)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn then_idle(mut self) -> Self {
        self.idle_when_exhausted = true;
        self
    }

    /// Flag set once `close` has been called
    pub fn close_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    /// Number of reads that returned data
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }
}

#[async_trait]
impl TransportSession for ScriptedTransport {
    async fn read_next_chunk(&mut self, timeout: Duration) -> Result<ChunkRead> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(ChunkRead::EndOfStream);
        }

        match self.steps.pop_front() {
            Some(ScriptStep::Chunk(bytes)) => {
                self.reads.fetch_add(1, Ordering::SeqCst);
                Ok(ChunkRead::Data(bytes))
            }
            Some(ScriptStep::Idle) => Ok(ChunkRead::Idle),
            Some(ScriptStep::Fail(detail)) => Err(HttpmqError::protocol("scripted", detail)),
            Some(ScriptStep::End) => Ok(ChunkRead::EndOfStream),
            None if self.idle_when_exhausted => {
                tokio::time::sleep(timeout).await;
                Ok(ChunkRead::Idle)
            }
            None => Ok(ChunkRead::EndOfStream),
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Wait for a condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}
