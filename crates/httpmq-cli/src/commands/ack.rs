//! Ack command - acknowledge one delivery

use anyhow::{Context, Result};
use httpmq_client::{DataClient, RequestContext};

use crate::output::OutputContext;

/// Acknowledge a delivery by its sequence numbers
pub async fn ack(
    client: &DataClient,
    stream: &str,
    consumer: &str,
    stream_seq: u64,
    consumer_seq: u64,
    request: &RequestContext,
    ctx: &OutputContext,
) -> Result<()> {
    let request_id = client
        .send_ack(stream, stream_seq, consumer, consumer_seq, request)
        .await
        .context("Failed to acknowledge message")?;

    ctx.request_id(
        &format!(
            "Acknowledged {}/{} seq {} (consumer seq {})",
            stream, consumer, stream_seq, consumer_seq
        ),
        &request_id,
    );
    Ok(())
}
