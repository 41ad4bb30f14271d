//! Publish command - send one message

use anyhow::{Context, Result};
use httpmq_client::{DataClient, RequestContext};

use crate::output::OutputContext;

/// Publish a message under a subject
pub async fn publish(
    client: &DataClient,
    subject: &str,
    body: &[u8],
    request: &RequestContext,
    ctx: &OutputContext,
) -> Result<()> {
    let request_id = client
        .publish(subject, body, request)
        .await
        .with_context(|| format!("Failed to publish to '{}'", subject))?;

    ctx.request_id(
        &format!("Published {} bytes to '{}'", body.len(), subject),
        &request_id,
    );
    Ok(())
}
