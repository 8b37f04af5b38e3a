//! Action types for state machine I/O requests.

use crate::error::ErrorFields;
use crate::opts::TlsMode;

/// Action requested by a state machine.
///
/// The caller should perform the requested I/O and then call `step()` again.
#[derive(Debug)]
pub enum Action {
    /// Write `buffer_set.write_buffer` to the server, then read a single byte.
    ///
    /// Used for SSL negotiation: write SSL request, then read response ('S' or 'N').
    /// The byte goes back through `set_ssl_response()`.
    WriteAndReadByte,

    /// Read a frame from the server into the buffer set.
    ///
    /// The caller should:
    /// 1. Read the message type byte (1 byte)
    /// 2. Read the length (4 bytes, big-endian, counting itself)
    /// 3. Read (length - 4) bytes of payload into the buffer set
    ReadMessage,

    /// Write `buffer_set.write_buffer` to the server and flush.
    Write,

    /// Write `buffer_set.write_buffer` to the server, then read a message.
    WriteAndReadMessage,

    /// Wrap the transport in TLS using the given verification policy.
    ///
    /// Nothing is written or read by the state machine until this completes.
    TlsHandshake(TlsMode),

    /// An asynchronous message was received.
    ///
    /// The caller should handle the message, read the next message,
    /// then call `step()` again.
    HandleAsyncMessageAndReadMessage(AsyncMessage),

    /// The state machine has finished successfully.
    Finished,
}

/// Asynchronous message from the server.
///
/// These can arrive between any two messages of an exchange.
#[derive(Debug, Clone)]
pub enum AsyncMessage {
    /// Non-fatal notice/warning from server.
    Notice(ErrorFields),

    /// Server parameter value changed.
    ParameterChanged {
        /// Parameter name
        name: String,
        /// New value
        value: String,
    },
}
