//! Backend (server → client) messages.

pub mod auth;
pub mod error;
pub mod query;

pub use auth::{
    AuthChallenge, Authentication, BackendKeyData, ParameterStatus, ReadyForQuery, auth_type,
};
pub use error::{ErrorResponse, NoticeResponse};
pub use query::{CommandComplete, DataRow, DataRowIter, ParameterDescription, RowDescription};

use crate::error::{Error, Result};
use crate::protocol::codec::{MessageBuilder, expect_end};

/// Backend message type bytes.
pub mod msg_type {
    /// Authentication message
    pub const AUTHENTICATION: u8 = b'R';
    /// BackendKeyData
    pub const BACKEND_KEY_DATA: u8 = b'K';
    /// ParameterStatus
    pub const PARAMETER_STATUS: u8 = b'S';
    /// ReadyForQuery
    pub const READY_FOR_QUERY: u8 = b'Z';
    /// RowDescription
    pub const ROW_DESCRIPTION: u8 = b'T';
    /// DataRow
    pub const DATA_ROW: u8 = b'D';
    /// CommandComplete
    pub const COMMAND_COMPLETE: u8 = b'C';
    /// EmptyQueryResponse
    pub const EMPTY_QUERY_RESPONSE: u8 = b'I';
    /// ErrorResponse
    pub const ERROR_RESPONSE: u8 = b'E';
    /// NoticeResponse
    pub const NOTICE_RESPONSE: u8 = b'N';
    /// ParseComplete
    pub const PARSE_COMPLETE: u8 = b'1';
    /// BindComplete
    pub const BIND_COMPLETE: u8 = b'2';
    /// CloseComplete
    pub const CLOSE_COMPLETE: u8 = b'3';
    /// ParameterDescription
    pub const PARAMETER_DESCRIPTION: u8 = b't';
    /// NoData
    pub const NO_DATA: u8 = b'n';
    /// PortalSuspended
    pub const PORTAL_SUSPENDED: u8 = b's';
}

/// Raw message from the server.
///
/// This is a thin wrapper around the message type byte and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessage<'a> {
    /// Message type byte
    pub type_byte: u8,
    /// Message payload (after length field)
    pub payload: &'a [u8],
}

impl<'a> RawMessage<'a> {
    /// Create a new RawMessage.
    pub fn new(type_byte: u8, payload: &'a [u8]) -> Self {
        Self { type_byte, payload }
    }

    /// Decode into a typed message.
    pub fn decode(&self) -> Result<BackendMessage<'a>> {
        BackendMessage::decode(self.type_byte, self.payload)
    }
}

/// A decoded backend message.
///
/// Tags with no decoder become [`BackendMessage::Unrecognized`]; whether
/// that is fatal is up to the phase reading it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMessage<'a> {
    Authentication(Authentication<'a>),
    ParameterStatus(ParameterStatus<'a>),
    BackendKeyData(BackendKeyData),
    ReadyForQuery(ReadyForQuery),
    ErrorResponse(ErrorResponse),
    NoticeResponse(NoticeResponse),
    RowDescription(RowDescription<'a>),
    DataRow(DataRow<'a>),
    CommandComplete(CommandComplete<'a>),
    EmptyQueryResponse,
    ParseComplete,
    BindComplete,
    CloseComplete,
    NoData,
    PortalSuspended,
    ParameterDescription(ParameterDescription<'a>),
    Unrecognized { type_byte: u8, payload: &'a [u8] },
}

impl<'a> BackendMessage<'a> {
    /// Decode the body of a frame tagged `type_byte`.
    ///
    /// A body that does not match the layout of its tag is a protocol error.
    pub fn decode(type_byte: u8, payload: &'a [u8]) -> Result<Self> {
        let msg = match type_byte {
            msg_type::AUTHENTICATION => Self::Authentication(Authentication::parse(payload)?),
            msg_type::PARAMETER_STATUS => Self::ParameterStatus(ParameterStatus::parse(payload)?),
            msg_type::BACKEND_KEY_DATA => Self::BackendKeyData(*BackendKeyData::parse(payload)?),
            msg_type::READY_FOR_QUERY => Self::ReadyForQuery(ReadyForQuery::parse(payload)?),
            msg_type::ERROR_RESPONSE => Self::ErrorResponse(ErrorResponse::parse(payload)?),
            msg_type::NOTICE_RESPONSE => Self::NoticeResponse(NoticeResponse::parse(payload)?),
            msg_type::ROW_DESCRIPTION => Self::RowDescription(RowDescription::parse(payload)?),
            msg_type::DATA_ROW => Self::DataRow(DataRow::parse(payload)?),
            msg_type::COMMAND_COMPLETE => Self::CommandComplete(CommandComplete::parse(payload)?),
            msg_type::PARAMETER_DESCRIPTION => {
                Self::ParameterDescription(ParameterDescription::parse(payload)?)
            }
            msg_type::EMPTY_QUERY_RESPONSE
            | msg_type::PARSE_COMPLETE
            | msg_type::BIND_COMPLETE
            | msg_type::CLOSE_COMPLETE
            | msg_type::NO_DATA
            | msg_type::PORTAL_SUSPENDED => {
                expect_end(payload, Self::name_of(type_byte))?;
                match type_byte {
                    msg_type::EMPTY_QUERY_RESPONSE => Self::EmptyQueryResponse,
                    msg_type::PARSE_COMPLETE => Self::ParseComplete,
                    msg_type::BIND_COMPLETE => Self::BindComplete,
                    msg_type::CLOSE_COMPLETE => Self::CloseComplete,
                    msg_type::NO_DATA => Self::NoData,
                    _ => Self::PortalSuspended,
                }
            }
            _ => Self::Unrecognized { type_byte, payload },
        };
        Ok(msg)
    }

    /// The frame tag of this message.
    pub fn type_byte(&self) -> u8 {
        match self {
            Self::Authentication(_) => msg_type::AUTHENTICATION,
            Self::ParameterStatus(_) => msg_type::PARAMETER_STATUS,
            Self::BackendKeyData(_) => msg_type::BACKEND_KEY_DATA,
            Self::ReadyForQuery(_) => msg_type::READY_FOR_QUERY,
            Self::ErrorResponse(_) => msg_type::ERROR_RESPONSE,
            Self::NoticeResponse(_) => msg_type::NOTICE_RESPONSE,
            Self::RowDescription(_) => msg_type::ROW_DESCRIPTION,
            Self::DataRow(_) => msg_type::DATA_ROW,
            Self::CommandComplete(_) => msg_type::COMMAND_COMPLETE,
            Self::EmptyQueryResponse => msg_type::EMPTY_QUERY_RESPONSE,
            Self::ParseComplete => msg_type::PARSE_COMPLETE,
            Self::BindComplete => msg_type::BIND_COMPLETE,
            Self::CloseComplete => msg_type::CLOSE_COMPLETE,
            Self::NoData => msg_type::NO_DATA,
            Self::PortalSuspended => msg_type::PORTAL_SUSPENDED,
            Self::ParameterDescription(_) => msg_type::PARAMETER_DESCRIPTION,
            Self::Unrecognized { type_byte, .. } => *type_byte,
        }
    }

    /// Whether this is a row of result data.
    pub fn is_data_row(&self) -> bool {
        matches!(self, Self::DataRow(_))
    }

    /// Write this message as a complete frame.
    pub fn write(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Authentication(m) => m.write(buf),
            Self::ParameterStatus(m) => m.write(buf),
            Self::BackendKeyData(m) => m.write(buf),
            Self::ReadyForQuery(m) => m.write(buf),
            Self::ErrorResponse(m) => m.write(buf),
            Self::NoticeResponse(m) => m.write(buf),
            Self::RowDescription(m) => m.write(buf),
            Self::DataRow(m) => m.write(buf),
            Self::CommandComplete(m) => m.write(buf),
            Self::ParameterDescription(m) => m.write(buf),
            Self::Unrecognized { type_byte, payload } => {
                let mut msg = MessageBuilder::new(buf, *type_byte);
                msg.write_bytes(payload);
                msg.finish();
            }
            Self::EmptyQueryResponse
            | Self::ParseComplete
            | Self::BindComplete
            | Self::CloseComplete
            | Self::NoData
            | Self::PortalSuspended => MessageBuilder::new(buf, self.type_byte()).finish(),
        }
    }

    /// Turn an ErrorResponse into an [`Error`], anything else into a protocol error.
    pub fn into_unexpected(self, context: &str) -> Error {
        match self {
            Self::ErrorResponse(err) => err.into_error(),
            other => Error::Protocol(format!("unhandled message {context}: {other}")),
        }
    }

    fn name_of(type_byte: u8) -> &'static str {
        match type_byte {
            msg_type::AUTHENTICATION => "Authentication",
            msg_type::PARAMETER_STATUS => "ParameterStatus",
            msg_type::BACKEND_KEY_DATA => "BackendKeyData",
            msg_type::READY_FOR_QUERY => "ReadyForQuery",
            msg_type::ERROR_RESPONSE => "ErrorResponse",
            msg_type::NOTICE_RESPONSE => "NoticeResponse",
            msg_type::ROW_DESCRIPTION => "RowDescription",
            msg_type::DATA_ROW => "DataRow",
            msg_type::COMMAND_COMPLETE => "CommandComplete",
            msg_type::EMPTY_QUERY_RESPONSE => "EmptyQueryResponse",
            msg_type::PARSE_COMPLETE => "ParseComplete",
            msg_type::BIND_COMPLETE => "BindComplete",
            msg_type::CLOSE_COMPLETE => "CloseComplete",
            msg_type::NO_DATA => "NoData",
            msg_type::PORTAL_SUSPENDED => "PortalSuspended",
            msg_type::PARAMETER_DESCRIPTION => "ParameterDescription",
            _ => "Unrecognized",
        }
    }
}

impl std::fmt::Display for BackendMessage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication(m) => write!(f, "{m}"),
            Self::ParameterStatus(m) => write!(f, "ParameterStatus: {}='{}'", m.name, m.value),
            Self::BackendKeyData(m) => write!(
                f,
                "BackendKeyData: BackendPID={}, CancelKey={}",
                m.process_id(),
                m.secret()
            ),
            Self::ReadyForQuery(m) => write!(
                f,
                "ReadyForQuery: TransactionState='{}'",
                m.status.as_byte() as char
            ),
            Self::ErrorResponse(m) => write!(f, "ErrorResponse: {}", m.fields),
            Self::NoticeResponse(m) => write!(f, "NoticeResponse: {}", m.fields),
            Self::RowDescription(m) => write!(f, "RowDescription: {} fields", m.len()),
            Self::DataRow(m) => write!(f, "DataRow: {} columns", m.len()),
            Self::CommandComplete(m) => write!(f, "CommandComplete: Tag='{}'", m.tag),
            Self::ParameterDescription(m) => {
                write!(f, "ParameterDescription: {} parameters", m.len())
            }
            Self::Unrecognized { type_byte, payload } => write!(
                f,
                "Unrecognized: tag='{}' ({} bytes)",
                type_byte.escape_ascii(),
                payload.len()
            ),
            other => f.write_str(Self::name_of(other.type_byte())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorFields;
    use crate::protocol::codec::split_frame;
    use crate::protocol::types::TransactionStatus;

    fn reparse(msg: &BackendMessage<'_>, buf: &mut Vec<u8>) {
        buf.clear();
        msg.write(buf);
        let (raw, rest) = split_frame(buf).unwrap();
        assert!(rest.is_empty());
        assert_eq!(&raw.decode().unwrap(), msg, "round trip of {msg}");
    }

    #[test]
    fn every_variant_survives_a_frame() {
        let row_data = {
            let mut buf = Vec::new();
            DataRow::write_values(&mut buf, &[Some(&b"42"[..]), None]);
            buf
        };
        let (raw_row, _) = split_frame(&row_data).unwrap();

        let messages = vec![
            BackendMessage::Authentication(Authentication {
                code: auth_type::MD5_PASSWORD,
                extra: &[1, 2, 3, 4],
            }),
            BackendMessage::ParameterStatus(ParameterStatus {
                name: "server_version",
                value: "v12.0.4-0",
            }),
            BackendMessage::BackendKeyData(BackendKeyData::new(4711, 0xdead_beef)),
            BackendMessage::ReadyForQuery(ReadyForQuery {
                status: TransactionStatus::Failed,
            }),
            BackendMessage::ErrorResponse(ErrorResponse {
                fields: ErrorFields {
                    severity: Some("ERROR".into()),
                    sqlstate: Some("42601".into()),
                    message: Some("Syntax error".into()),
                    position: Some(8),
                    error_code: Some(4856),
                    ..Default::default()
                },
            }),
            BackendMessage::NoticeResponse(NoticeResponse {
                fields: ErrorFields {
                    severity: Some("NOTICE".into()),
                    message: Some("hello".into()),
                    ..Default::default()
                },
            }),
            BackendMessage::RowDescription(RowDescription::new(1, b"now\0")),
            BackendMessage::DataRow(DataRow::parse(raw_row.payload).unwrap()),
            BackendMessage::CommandComplete(CommandComplete { tag: "SELECT" }),
            BackendMessage::EmptyQueryResponse,
            BackendMessage::ParseComplete,
            BackendMessage::BindComplete,
            BackendMessage::CloseComplete,
            BackendMessage::NoData,
            BackendMessage::PortalSuspended,
            BackendMessage::ParameterDescription(ParameterDescription::parse(&[0, 0]).unwrap()),
            BackendMessage::Unrecognized {
                type_byte: b'm',
                payload: b"opaque",
            },
        ];

        let mut buf = Vec::new();
        for msg in &messages {
            reparse(msg, &mut buf);
        }
    }

    #[test]
    fn empty_messages_reject_bodies() {
        assert!(BackendMessage::decode(msg_type::NO_DATA, b"x").is_err());
        assert_eq!(
            BackendMessage::decode(msg_type::NO_DATA, b"").unwrap(),
            BackendMessage::NoData
        );
    }

    #[test]
    fn unknown_tag_is_preserved() {
        let msg = BackendMessage::decode(b'?', b"abc").unwrap();
        assert_eq!(msg.type_byte(), b'?');
        assert!(matches!(msg, BackendMessage::Unrecognized { .. }));
        let err = msg.into_unexpected("during handshake");
        assert!(err.to_string().contains("Unrecognized"));
    }

    #[test]
    fn describe() {
        let msg = BackendMessage::ParameterStatus(ParameterStatus {
            name: "timezone",
            value: "UTC",
        });
        assert_eq!(msg.to_string(), "ParameterStatus: timezone='UTC'");
        assert_eq!(BackendMessage::BindComplete.to_string(), "BindComplete");
    }
}
