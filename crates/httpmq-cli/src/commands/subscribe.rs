//! Subscribe command - push subscription with optional acking

use anyhow::{Context, Result};
use httpmq_client::{
    CancellationToken, DataClient, RequestContext, StreamItem, SubscribeRequest,
};

use crate::output::{OutputContext, OutputFormat, SubscriptionSummaryRow};

/// Channel depth between the subscription task and the printer
const BUFFER: usize = 16;

pub struct SubscribeOptions {
    pub stream: String,
    pub consumer: String,
    pub subject: String,
    pub max_inflight: Option<u32>,
    pub delivery_group: Option<String>,
    pub ack: bool,
    pub count: Option<u64>,
}

impl SubscribeOptions {
    fn request(&self) -> SubscribeRequest {
        let mut request =
            SubscribeRequest::new(&self.stream, &self.consumer, &self.subject);
        if let Some(max) = self.max_inflight {
            request = request.max_inflight(max);
        }
        if let Some(group) = &self.delivery_group {
            request = request.delivery_group(group);
        }
        request
    }
}

/// Run a push subscription until Ctrl+C, server close, or `count` messages
pub async fn subscribe(
    client: &DataClient,
    options: SubscribeOptions,
    request: &RequestContext,
    ctx: &OutputContext,
) -> Result<()> {
    ctx.info(&format!(
        "Subscribing to {}/{} (subject '{}')...",
        options.stream, options.consumer, options.subject
    ));
    ctx.info("Press Ctrl+C to stop");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        on_interrupt.cancel();
    })?;

    let (mut rx, task) = client.subscribe(options.request(), request.clone(), cancel.clone(), BUFFER);

    let mut summary = SubscriptionSummaryRow {
        request_id: request.request_id().to_string(),
        received: 0,
        acked: 0,
        server_errors: 0,
    };

    while let Some(item) = rx.recv().await {
        match item {
            StreamItem::Delivered(msg) => {
                ctx.print_message(&msg, summary.received == 0);
                summary.received += 1;

                if options.ack {
                    match client.send_ack_simple(&msg, &RequestContext::new()).await {
                        Ok(_) => summary.acked += 1,
                        Err(e) => ctx.warn(&format!("Ack failed: {}", e)),
                    }
                }
            }
            StreamItem::ServerError(err) => {
                summary.server_errors += 1;
                ctx.error(&format!("Server error: {}", err));
            }
        }

        if options.count.is_some_and(|count| summary.received >= count) {
            break;
        }
    }

    cancel.cancel();
    drop(rx);

    let request_id = task
        .await
        .context("Subscription task panicked")?
        .context("Subscription failed")?;
    summary.request_id = request_id;

    if ctx.format == OutputFormat::Table && !ctx.quiet {
        println!();
        ctx.print(&[summary]);
    }
    ctx.success("Subscription closed");

    Ok(())
}
