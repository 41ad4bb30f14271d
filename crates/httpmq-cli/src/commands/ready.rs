//! Ready command - check the data plane

use anyhow::{Context, Result};
use httpmq_client::{DataClient, RequestContext};

use crate::output::OutputContext;

/// Verify the data plane API is ready
pub async fn ready(client: &DataClient, request: &RequestContext, ctx: &OutputContext) -> Result<()> {
    let request_id = client
        .ready(request)
        .await
        .context("Data plane is not ready")?;

    ctx.request_id("Data plane API ready", &request_id);
    Ok(())
}
