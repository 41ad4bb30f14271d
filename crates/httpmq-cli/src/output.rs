//! Output formatting for httpmq-cli (table, json, csv)

use clap::ValueEnum;
use colored::Colorize;
use httpmq_client::ReceivedMessage;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print a request ID result (the only output in quiet mode)
    pub fn request_id(&self, label: &str, request_id: &str) {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "request_id": request_id }));
            }
            _ if self.quiet => println!("{}", request_id),
            _ => println!("{} (request {})", label.green(), request_id.bold()),
        }
    }

    /// Print one received message as it arrives
    pub fn print_message(&self, msg: &ReceivedMessage, header: bool) {
        let row = MessageRow::from(msg);
        match self.format {
            OutputFormat::Table => {
                println!(
                    "[{}] {} #{}/{}: {}",
                    row.subject.cyan(),
                    row.stream,
                    row.stream_seq,
                    row.consumer_seq,
                    row.message
                );
            }
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(&row) {
                    println!("{}", json);
                }
            }
            OutputFormat::Csv => print_csv(&[row], header),
        }
    }

    /// Print rows in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    println!("{}", Table::new(data));
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
            OutputFormat::Csv => print_csv(data, true),
        }
    }
}

/// Print data as CSV
fn print_csv<T: Serialize>(data: &[T], header: bool) {
    if data.is_empty() {
        return;
    }

    // Get field names from the first item
    let first = serde_json::to_value(&data[0]).unwrap_or_default();
    if let serde_json::Value::Object(map) = &first {
        let headers: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
        if header {
            println!("{}", headers.join(","));
        }

        for item in data {
            if let Ok(serde_json::Value::Object(row)) = serde_json::to_value(item) {
                let values: Vec<String> = headers
                    .iter()
                    .map(|h| {
                        row.get(*h)
                            .map(|v| match v {
                                serde_json::Value::String(s) => escape_csv(s),
                                other => escape_csv(&other.to_string()),
                            })
                            .unwrap_or_default()
                    })
                    .collect();
                println!("{}", values.join(","));
            }
        }
    }
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Received message display for subscribe command
#[derive(Debug, Tabled, Serialize)]
pub struct MessageRow {
    #[tabled(rename = "Stream")]
    pub stream: String,
    #[tabled(rename = "Stream Seq")]
    pub stream_seq: u64,
    #[tabled(rename = "Consumer")]
    pub consumer: String,
    #[tabled(rename = "Consumer Seq")]
    pub consumer_seq: u64,
    #[tabled(rename = "Subject")]
    pub subject: String,
    #[tabled(rename = "Message")]
    pub message: String,
    #[tabled(rename = "Request ID")]
    pub request_id: String,
}

impl From<&ReceivedMessage> for MessageRow {
    fn from(msg: &ReceivedMessage) -> Self {
        Self {
            stream: msg.stream.clone(),
            stream_seq: msg.stream_seq,
            consumer: msg.consumer.clone(),
            consumer_seq: msg.consumer_seq,
            subject: msg.subject.clone(),
            message: String::from_utf8_lossy(&msg.message).into_owned(),
            request_id: msg.request_id.clone(),
        }
    }
}

/// Summary display for a finished subscription
#[derive(Debug, Tabled, Serialize)]
pub struct SubscriptionSummaryRow {
    #[tabled(rename = "Request ID")]
    pub request_id: String,
    #[tabled(rename = "Received")]
    pub received: u64,
    #[tabled(rename = "Acked")]
    pub acked: u64,
    #[tabled(rename = "Server Errors")]
    pub server_errors: u64,
}
