//! Buffer set for state machine operations.

use tracing::Level;

use crate::error::Result;
use crate::logging;
use crate::protocol::backend::{BackendMessage, RawMessage};
use crate::protocol::codec::{decode_message, encode_message};
use crate::protocol::frontend::FrontendMessage;

/// Buffer set for state machine operations.
pub struct BufferSet {
    /// Read buffer for the payload of the last message read
    pub read_buffer: Vec<u8>,
    /// Write buffer for outgoing frames
    pub write_buffer: Vec<u8>,
    /// Type byte of the last message read
    pub type_byte: u8,
    /// Description of the buffered frame, kept only when trace logging is on
    unsent: Option<String>,
}

impl BufferSet {
    /// Create a new buffer set.
    pub fn new() -> Self {
        Self {
            read_buffer: Vec::with_capacity(8192),
            write_buffer: Vec::with_capacity(8192),
            type_byte: 0,
            unsent: None,
        }
    }

    /// Replace the write buffer with the frame for `msg`.
    pub fn encode<M: FrontendMessage + ?Sized>(&mut self, msg: &M) {
        self.write_buffer.clear();
        encode_message(&mut self.write_buffer, msg);
        self.unsent = logging::enabled(Level::TRACE).then(|| msg.to_string());
    }

    /// Record that the write buffer reached the socket.
    pub fn mark_sent(&mut self) {
        if let Some(msg) = self.unsent.take() {
            tracing::trace!("-> {}", msg);
        }
    }

    /// The last message read, undecoded.
    pub fn raw_message(&self) -> RawMessage<'_> {
        RawMessage::new(self.type_byte, &self.read_buffer)
    }

    /// Decode the last message read.
    pub fn message(&self) -> Result<BackendMessage<'_>> {
        decode_message(self.raw_message())
    }
}

impl Default for BufferSet {
    fn default() -> Self {
        Self::new()
    }
}
