//! Newline-delimited JSON frame splitter
//!
//! Turns raw body chunks from the subscription socket into parsed JSON
//! values. Chunk boundaries may land anywhere, including inside a UTF-8
//! sequence or inside a field value.

use tracing::trace;

/// Incremental NDJSON splitter
///
/// Holds at most one pending fragment: the tail of the input that did not
/// yet parse as a complete JSON value. The fragment is prefixed onto the
/// next candidate line and retried. It is not bounded; a record that never
/// becomes valid JSON keeps absorbing subsequent input.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    pending: Option<Vec<u8>>,
}

impl FrameSplitter {
    /// Create a new splitter
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the buffered partial fragment, in bytes
    pub fn pending_len(&self) -> usize {
        self.pending.as_ref().map_or(0, Vec::len)
    }

    /// Feed a chunk and return every value completed by it, in order.
    ///
    /// Never fails: anything that does not parse is buffered and retried
    /// with subsequent input.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<serde_json::Value> {
        let mut values = Vec::new();
        if chunk.is_empty() {
            return values;
        }

        for line in chunk.split(|&b| b == b'\n') {
            let candidate = match self.pending.take() {
                Some(mut fragment) => {
                    fragment.extend_from_slice(line);
                    fragment
                }
                None => line.to_vec(),
            };

            if candidate.is_empty() {
                continue;
            }

            match serde_json::from_slice::<serde_json::Value>(&candidate) {
                Ok(value) => values.push(value),
                Err(e) => {
                    trace!(len = candidate.len(), error = %e, "Buffering partial frame");
                    self.pending = Some(candidate);
                }
            }
        }

        values
    }
}
