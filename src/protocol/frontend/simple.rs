//! Simple query protocol messages.

use std::fmt;

use crate::protocol::codec::write_cstr;

use super::{FrontendMessage, msg_type};

/// Query message.
///
/// The query string may contain multiple SQL statements separated by semicolons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query<'a> {
    pub sql: &'a str,
}

impl FrontendMessage for Query<'_> {
    fn tag(&self) -> u8 {
        msg_type::QUERY
    }

    fn write_body(&self, buf: &mut Vec<u8>) {
        write_cstr(buf, self.sql);
    }
}

impl fmt::Display for Query<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query: '{}'", self.sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query() {
        let mut buf = Vec::new();
        Query { sql: "SELECT 1" }.write_frame(&mut buf);

        assert_eq!(buf[0], b'Q');

        // Length should be 4 (length field) + 9 (query + null terminator)
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        assert_eq!(len, 13);

        // Query string should be "SELECT 1\0"
        assert_eq!(&buf[5..14], b"SELECT 1\0");
    }
}
