//! Startup-phase and termination messages.

use std::fmt;

use crate::error::Result;
use crate::protocol::codec::{expect_end, read_cstr, read_u32, write_cstr, write_u32};

use super::{FrontendMessage, msg_type};

/// Protocol version 3.8 (0x00030008)
pub const PROTOCOL_VERSION: u32 = 0x0003_0008;

/// SSL request code
pub const SSL_REQUEST_CODE: u32 = 80877103;

/// Cancel request code
pub const CANCEL_REQUEST_CODE: u32 = 80877102;

/// StartupMessage: protocol version and `key\0value\0` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Startup<'a> {
    pub protocol_version: u32,
    pub driver_name: &'a str,
    pub driver_version: &'a str,
    pub user: &'a str,
    pub database: &'a str,
    pub session_id: &'a str,
    pub client_pid: u32,
}

impl Startup<'_> {
    /// Parse a startup body back into its version and parameter pairs.
    pub fn parse_body(body: &[u8]) -> Result<(u32, Vec<(&str, &str)>)> {
        let (version, mut data) = read_u32(body)?;
        let mut params = Vec::new();
        loop {
            if let Some((&0, rest)) = data.split_first() {
                expect_end(rest, "Startup")?;
                break;
            }
            let (key, rest) = read_cstr(data)?;
            let (value, rest) = read_cstr(rest)?;
            params.push((key, value));
            data = rest;
        }
        Ok((version, params))
    }
}

impl FrontendMessage for Startup<'_> {
    fn tag(&self) -> u8 {
        msg_type::UNTAGGED
    }

    fn write_body(&self, buf: &mut Vec<u8>) {
        write_u32(buf, self.protocol_version);

        let mut pair = |key: &str, value: &str| {
            write_cstr(buf, key);
            write_cstr(buf, value);
        };
        if !self.user.is_empty() {
            pair("user", self.user);
        }
        if !self.database.is_empty() {
            pair("database", self.database);
        }
        pair("client_type", self.driver_name);
        pair("client_version", self.driver_version);
        pair("client_label", self.session_id);
        pair("client_pid", &self.client_pid.to_string());

        buf.push(0);
    }
}

impl fmt::Display for Startup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Startup (packet): ProtocolVersion:{:08X}, DriverName='{}', DriverVersion='{}', \
             UserName='{}', Database='{}', SessionID='{}', ClientPID={}",
            self.protocol_version,
            self.driver_name,
            self.driver_version,
            self.user,
            self.database,
            self.session_id,
            self.client_pid
        )
    }
}

/// SSLRequest, sent before Startup to ask for TLS.
///
/// The server answers with a single unframed byte: `'S'` or `'N'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SslRequest;

impl FrontendMessage for SslRequest {
    fn tag(&self) -> u8 {
        msg_type::UNTAGGED
    }

    fn write_body(&self, buf: &mut Vec<u8>) {
        write_u32(buf, SSL_REQUEST_CODE);
    }
}

impl fmt::Display for SslRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SSLRequest")
    }
}

/// CancelRequest, sent on a NEW connection to cancel work running on another one.
///
/// The server closes the connection without replying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelRequest {
    pub backend_pid: u32,
    pub cancel_key: u32,
}

impl FrontendMessage for CancelRequest {
    fn tag(&self) -> u8 {
        msg_type::UNTAGGED
    }

    fn write_body(&self, buf: &mut Vec<u8>) {
        write_u32(buf, CANCEL_REQUEST_CODE);
        write_u32(buf, self.backend_pid);
        write_u32(buf, self.cancel_key);
    }
}

impl fmt::Display for CancelRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CancelRequest: BackendPID={}", self.backend_pid)
    }
}

/// Terminate, sent to cleanly close the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminate;

impl FrontendMessage for Terminate {
    fn tag(&self) -> u8 {
        msg_type::TERMINATE
    }

    fn write_body(&self, _buf: &mut Vec<u8>) {}
}

impl fmt::Display for Terminate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Terminate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn startup() -> Startup<'static> {
        Startup {
            protocol_version: PROTOCOL_VERSION,
            driver_name: "vertica-wire",
            driver_version: "0.1.0",
            user: "dbadmin",
            database: "analytics",
            session_id: "vertica-wire-0.1.0-77-1700000000",
            client_pid: 77,
        }
    }

    #[test]
    fn ssl_request() {
        let mut buf = Vec::new();
        SslRequest.write_frame(&mut buf);

        assert_eq!(buf.len(), 8);
        assert_eq!(&buf[0..4], &8_u32.to_be_bytes());
        assert_eq!(&buf[4..8], &SSL_REQUEST_CODE.to_be_bytes());
    }

    #[test]
    fn startup_frame_is_untagged() {
        let mut buf = Vec::new();
        startup().write_frame(&mut buf);

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        assert_eq!(len as usize, buf.len());
        assert_eq!(&buf[4..8], &[0, 3, 0, 8]);
        assert_eq!(buf.last(), Some(&0));
    }

    #[test]
    fn startup_round_trip() {
        let msg = startup();
        let (body, tag) = msg.flatten();
        assert_eq!(tag, 0);

        let (version, params) = Startup::parse_body(&body).unwrap();
        assert_eq!(version, PROTOCOL_VERSION);
        assert_eq!(
            params,
            vec![
                ("user", "dbadmin"),
                ("database", "analytics"),
                ("client_type", "vertica-wire"),
                ("client_version", "0.1.0"),
                ("client_label", "vertica-wire-0.1.0-77-1700000000"),
                ("client_pid", "77"),
            ]
        );
    }

    #[test]
    fn startup_omits_empty_user_and_database() {
        let msg = Startup {
            user: "",
            database: "",
            ..startup()
        };
        let (body, _) = msg.flatten();
        let (_, params) = Startup::parse_body(&body).unwrap();
        assert!(params.iter().all(|(k, _)| *k != "user" && *k != "database"));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn cancel_and_terminate() {
        let mut buf = Vec::new();
        CancelRequest {
            backend_pid: 1,
            cancel_key: 2,
        }
        .write_frame(&mut buf);
        assert_eq!(buf.len(), 16);
        assert_eq!(&buf[4..8], &CANCEL_REQUEST_CODE.to_be_bytes());

        buf.clear();
        Terminate.write_frame(&mut buf);
        assert_eq!(buf, [b'X', 0, 0, 0, 4]);
    }
}
