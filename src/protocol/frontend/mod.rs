//! Frontend (client → server) messages.

pub mod auth;
pub mod simple;
pub mod startup;

pub use auth::{Password, md5_password, sha512_password};
pub use simple::Query;
pub use startup::{CancelRequest, PROTOCOL_VERSION, SslRequest, Startup, Terminate};

use crate::protocol::codec::MessageBuilder;

/// Frontend message type bytes.
pub mod msg_type {
    /// Untagged startup-phase message (Startup, SSLRequest, CancelRequest)
    pub const UNTAGGED: u8 = 0;
    /// Password response
    pub const PASSWORD: u8 = b'p';
    /// Query (simple query protocol)
    pub const QUERY: u8 = b'Q';
    /// Terminate
    pub const TERMINATE: u8 = b'X';
}

/// A message the client sends.
///
/// `Display` gives the human-readable description used in logs; it must not
/// reveal secrets.
pub trait FrontendMessage: std::fmt::Display {
    /// Type byte, or [`msg_type::UNTAGGED`].
    fn tag(&self) -> u8;

    /// Append the body (everything after the length field).
    fn write_body(&self, buf: &mut Vec<u8>);

    /// Body bytes and tag.
    fn flatten(&self) -> (Vec<u8>, u8) {
        let mut body = Vec::new();
        self.write_body(&mut body);
        (body, self.tag())
    }

    /// Append the complete frame: tag (unless untagged), length, body.
    fn write_frame(&self, buf: &mut Vec<u8>) {
        let tag = self.tag();
        let mut msg = if tag == msg_type::UNTAGGED {
            MessageBuilder::new_startup(buf)
        } else {
            MessageBuilder::new(buf, tag)
        };
        self.write_body(msg.buf());
        msg.finish();
    }
}
