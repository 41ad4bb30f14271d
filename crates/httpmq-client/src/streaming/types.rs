//! Types for push subscriptions

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, HttpmqError, ResponseEnvelope, Result};

/// Default interval between cancellation checks while waiting for data
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One delivered message instance
///
/// `(stream, stream_seq)` identifies the message on the stream, while
/// `(consumer, stream, consumer_seq)` identifies this particular delivery.
/// A redelivery keeps `stream_seq` and gets a new `consumer_seq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Stream the message is from
    pub stream: String,
    /// Sequence number of the message within the stream
    pub stream_seq: u64,
    /// Consumer that received the message
    pub consumer: String,
    /// Sequence number of this delivery for the consumer on this stream
    pub consumer_seq: u64,
    /// Subject the message was published under
    pub subject: String,
    /// Raw message payload
    pub message: Vec<u8>,
    /// Request ID correlating this delivery with server logs
    pub request_id: String,
}

/// Acknowledgement for one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckRequest {
    pub stream: String,
    pub stream_seq: u64,
    pub consumer: String,
    pub consumer_seq: u64,
}

impl AckRequest {
    pub fn new(
        stream: impl Into<String>,
        stream_seq: u64,
        consumer: impl Into<String>,
        consumer_seq: u64,
    ) -> Self {
        Self {
            stream: stream.into(),
            stream_seq,
            consumer: consumer.into(),
            consumer_seq,
        }
    }

    pub(crate) fn body(&self) -> SequencePair {
        SequencePair {
            stream: self.stream_seq,
            consumer: self.consumer_seq,
        }
    }
}

impl From<&ReceivedMessage> for AckRequest {
    fn from(msg: &ReceivedMessage) -> Self {
        Self::new(
            msg.stream.clone(),
            msg.stream_seq,
            msg.consumer.clone(),
            msg.consumer_seq,
        )
    }
}

/// Item forwarded to a subscription handler
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// A message delivered by the server
    Delivered(ReceivedMessage),
    /// An in-band error frame reported by the server.
    ///
    /// Frames without an `error` section carry [`IN_BAND_ERROR_STATUS`].
    ServerError(ApiError),
}

impl StreamItem {
    pub fn as_message(&self) -> Option<&ReceivedMessage> {
        match self {
            Self::Delivered(msg) => Some(msg),
            Self::ServerError(_) => None,
        }
    }

    pub fn into_message(self) -> Option<ReceivedMessage> {
        match self {
            Self::Delivered(msg) => Some(msg),
            Self::ServerError(_) => None,
        }
    }
}

/// Stream and consumer sequence numbers, as used on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePair {
    pub stream: u64,
    pub consumer: u64,
}

/// Message frame as written by the server on the subscription socket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageFrame {
    pub stream: String,
    pub sequence: SequencePair,
    pub consumer: String,
    pub subject: String,
    pub request_id: String,
    pub b64_msg: String,
}

impl MessageFrame {
    /// Build a frame for a payload (used by test servers)
    pub fn encode(msg: &ReceivedMessage) -> Self {
        Self {
            stream: msg.stream.clone(),
            sequence: SequencePair {
                stream: msg.stream_seq,
                consumer: msg.consumer_seq,
            },
            consumer: msg.consumer.clone(),
            subject: msg.subject.clone(),
            request_id: msg.request_id.clone(),
            b64_msg: STANDARD.encode(&msg.message),
        }
    }

    fn into_message(self) -> std::result::Result<ReceivedMessage, base64::DecodeError> {
        let message = STANDARD.decode(self.b64_msg.as_bytes())?;
        Ok(ReceivedMessage {
            stream: self.stream,
            stream_seq: self.sequence.stream,
            consumer: self.consumer,
            consumer_seq: self.sequence.consumer,
            subject: self.subject,
            message,
            request_id: self.request_id,
        })
    }
}

/// Status given to an in-band error frame that reports no code of its own.
/// The socket itself answered 200, so the failure is attributed to the server.
pub const IN_BAND_ERROR_STATUS: u16 = 500;

/// Decode one parsed frame into a [`StreamItem`].
///
/// Error envelopes (`success: false`) become [`StreamItem::ServerError`].
/// Anything else that is not a valid message frame is a protocol error
/// attributed to `request_id`.
pub(crate) fn decode_frame(value: serde_json::Value, request_id: &str) -> Result<StreamItem> {
    if value.get("b64_msg").is_none() {
        if let Ok(envelope) = serde_json::from_value::<ResponseEnvelope>(value.clone()) {
            if !envelope.success {
                return Ok(StreamItem::ServerError(
                    envelope.into_api_error(IN_BAND_ERROR_STATUS),
                ));
            }
        }
    }

    let frame: MessageFrame = serde_json::from_value(value).map_err(|e| {
        HttpmqError::protocol(request_id, format!("malformed message frame: {}", e))
    })?;
    let msg = frame.into_message().map_err(|e| {
        HttpmqError::protocol(request_id, format!("invalid base64 payload: {}", e))
    })?;
    Ok(StreamItem::Delivered(msg))
}

/// Parameters of a push subscription
#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    pub stream: String,
    pub consumer: String,
    /// Subject filter, matched by the server (may be a wildcard)
    pub subject_filter: String,
    pub max_inflight: Option<u32>,
    pub delivery_group: Option<String>,
    /// Upper bound on each chunk read before the cancel flag is re-checked
    pub poll_interval: Duration,
}

impl SubscribeRequest {
    pub fn new(
        stream: impl Into<String>,
        consumer: impl Into<String>,
        subject_filter: impl Into<String>,
    ) -> Self {
        Self {
            stream: stream.into(),
            consumer: consumer.into(),
            subject_filter: subject_filter.into(),
            max_inflight: None,
            delivery_group: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn max_inflight(mut self, max_inflight: u32) -> Self {
        self.max_inflight = Some(max_inflight);
        self
    }

    pub fn delivery_group(mut self, group: impl Into<String>) -> Self {
        self.delivery_group = Some(group.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Query parameters sent with the subscribe request
    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("subject_name", self.subject_filter.clone())];
        if let Some(max) = self.max_inflight {
            query.push(("max_msg_inflight", max.to_string()));
        }
        if let Some(group) = &self.delivery_group {
            query.push(("delivery_group", group.clone()));
        }
        query
    }
}
