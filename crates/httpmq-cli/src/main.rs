//! httpmq CLI - Command-line tool for the httpmq data plane
//!
//! Publish messages, run push subscriptions and acknowledge deliveries.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use httpmq_client::{ClientConfig, DataClient, RequestContext};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "httpmq-cli")]
#[command(author, version, about = "httpmq data plane CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Data plane server URL
    #[arg(short, long, env = "HTTPMQ_SERVER")]
    server: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "HTTPMQ_CONFIG")]
    config: Option<PathBuf>,

    /// Bearer access token used for authentication
    #[arg(long = "access-token", visible_alias = "at", env = "HTTP_BEARER_ACCESS_TOKEN")]
    access_token: Option<String>,

    /// Custom CA file to use with the HTTP client
    #[arg(long = "ca", env = "HTTP_CUSTOM_CA_FILE")]
    ca_file: Option<PathBuf>,

    /// Request ID to use with this call
    #[arg(long = "request-id", visible_alias = "rid")]
    request_id: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the data plane is ready
    Ready,

    /// Publish a message under a subject
    Publish {
        /// Subject to publish under
        subject: String,

        /// Message text
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        message: Option<String>,

        /// Read the message body from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Push-subscribe to a consumer on a stream (Ctrl+C to stop)
    Subscribe {
        /// Stream name
        stream: String,

        /// Consumer name
        consumer: String,

        /// Subject filter (may contain wildcards)
        #[arg(long)]
        subject: String,

        /// Max number of inflight messages
        #[arg(long)]
        max_inflight: Option<u32>,

        /// Delivery group of the consumer
        #[arg(long)]
        delivery_group: Option<String>,

        /// Acknowledge each message after printing it
        #[arg(long)]
        ack: bool,

        /// Stop after this many messages
        #[arg(long)]
        count: Option<u64>,
    },

    /// Acknowledge one delivery
    Ack {
        /// Stream name
        stream: String,

        /// Consumer name
        consumer: String,

        /// Stream sequence number of the message
        stream_seq: u64,

        /// Consumer sequence number of the delivery
        consumer_seq: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(
        cli.server.as_deref(),
        cli.access_token.as_deref(),
        cli.ca_file.as_deref(),
        cli.output.map(Into::into),
        cli.no_color,
    );
    debug!(server = %merged.server, "Resolved configuration");

    let format = merged
        .output
        .parse::<OutputFormat>()
        .unwrap_or_default();
    let ctx = OutputContext::new(format, merged.no_color, cli.quiet);

    let client = create_client(&merged)?;
    let mut request = RequestContext::new();
    if let Some(request_id) = &cli.request_id {
        request = request.with_request_id(request_id);
    }

    match &cli.command {
        Commands::Ready => {
            commands::ready(&client, &request, &ctx).await?;
        }

        Commands::Publish {
            subject,
            message,
            file,
        } => {
            let body = match (message, file) {
                (_, Some(path)) => std::fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (Some(message), None) => message.clone().into_bytes(),
                (None, None) => anyhow::bail!("Either a message or --file is required"),
            };
            commands::publish(&client, subject, &body, &request, &ctx).await?;
        }

        Commands::Subscribe {
            stream,
            consumer,
            subject,
            max_inflight,
            delivery_group,
            ack,
            count,
        } => {
            let options = commands::SubscribeOptions {
                stream: stream.clone(),
                consumer: consumer.clone(),
                subject: subject.clone(),
                max_inflight: *max_inflight,
                delivery_group: delivery_group.clone(),
                ack: *ack,
                count: *count,
            };
            commands::subscribe(&client, options, &request, &ctx).await?;
        }

        Commands::Ack {
            stream,
            consumer,
            stream_seq,
            consumer_seq,
        } => {
            commands::ack(
                &client,
                stream,
                consumer,
                *stream_seq,
                *consumer_seq,
                &request,
                &ctx,
            )
            .await?;
        }
    }

    Ok(())
}

/// Create a data plane client from the resolved configuration
fn create_client(merged: &config::MergedConfig) -> Result<DataClient> {
    let mut config = ClientConfig::new(merged.server.clone());
    config.bearer_token = merged.access_token.clone();
    if let Some(ca_file) = &merged.ca_file {
        let pem = std::fs::read(ca_file)
            .with_context(|| format!("Failed to read CA file: {}", ca_file.display()))?;
        config.ca_cert_pem = Some(pem);
    }
    DataClient::from_config(&config).context("Failed to create httpmq client")
}

// Implement conversion for OutputFormat to string (for config merge)
impl From<OutputFormat> for &str {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}
