//! Error and notice response messages.

use crate::error::{Error, ErrorFields, Result};
use crate::protocol::codec::{MessageBuilder, expect_end, read_cstr};

use super::msg_type;

/// Error field type codes.
pub mod field_type {
    /// Severity
    pub const SEVERITY: u8 = b'S';
    /// SQLSTATE code
    pub const SQLSTATE: u8 = b'C';
    /// Message
    pub const MESSAGE: u8 = b'M';
    /// Detail
    pub const DETAIL: u8 = b'D';
    /// Hint
    pub const HINT: u8 = b'H';
    /// Position in query
    pub const POSITION: u8 = b'P';
    /// Internal position
    pub const INTERNAL_POSITION: u8 = b'p';
    /// Internal query
    pub const INTERNAL_QUERY: u8 = b'q';
    /// Where (context)
    pub const WHERE: u8 = b'W';
    /// File name
    pub const FILE: u8 = b'F';
    /// Line number
    pub const LINE: u8 = b'L';
    /// Routine name
    pub const ROUTINE: u8 = b'R';
    /// Numeric server error code
    pub const ERROR_CODE: u8 = b'V';
}

/// Parse error/notice fields from payload.
fn parse_fields(payload: &[u8]) -> Result<ErrorFields> {
    let mut fields = ErrorFields::default();
    let mut data = payload;

    loop {
        let Some((&field_type, rest)) = data.split_first() else {
            return Err(Error::Protocol(
                "error fields: missing terminating null".into(),
            ));
        };
        if field_type == 0 {
            expect_end(rest, "error fields")?;
            break;
        }

        let (value, rest) = read_cstr(rest)?;
        data = rest;

        match field_type {
            field_type::SEVERITY => fields.severity = Some(value.to_string()),
            field_type::SQLSTATE => fields.sqlstate = Some(value.to_string()),
            field_type::MESSAGE => fields.message = Some(value.to_string()),
            field_type::DETAIL => fields.detail = Some(value.to_string()),
            field_type::HINT => fields.hint = Some(value.to_string()),
            field_type::POSITION => fields.position = value.parse().ok(),
            field_type::INTERNAL_POSITION => fields.internal_position = value.parse().ok(),
            field_type::INTERNAL_QUERY => fields.internal_query = Some(value.to_string()),
            field_type::WHERE => fields.where_ = Some(value.to_string()),
            field_type::FILE => fields.file = Some(value.to_string()),
            field_type::LINE => fields.line = value.parse().ok(),
            field_type::ROUTINE => fields.routine = Some(value.to_string()),
            field_type::ERROR_CODE => fields.error_code = value.parse().ok(),
            _ => {
                tracing::debug!("Unknown error field type: {}", field_type as char);
            }
        }
    }

    Ok(fields)
}

fn write_fields(msg: &mut MessageBuilder<'_>, fields: &ErrorFields) {
    let mut put = |code: u8, value: &str| {
        msg.write_u8(code);
        msg.write_cstr(value);
    };
    let strings = [
        (field_type::SEVERITY, &fields.severity),
        (field_type::SQLSTATE, &fields.sqlstate),
        (field_type::MESSAGE, &fields.message),
        (field_type::DETAIL, &fields.detail),
        (field_type::HINT, &fields.hint),
        (field_type::INTERNAL_QUERY, &fields.internal_query),
        (field_type::WHERE, &fields.where_),
        (field_type::FILE, &fields.file),
        (field_type::ROUTINE, &fields.routine),
    ];
    for (code, value) in strings {
        if let Some(value) = value {
            put(code, value);
        }
    }
    let numbers = [
        (field_type::POSITION, fields.position),
        (field_type::INTERNAL_POSITION, fields.internal_position),
        (field_type::LINE, fields.line),
    ];
    for (code, value) in numbers {
        if let Some(value) = value {
            put(code, &value.to_string());
        }
    }
    if let Some(code) = fields.error_code {
        put(field_type::ERROR_CODE, &code.to_string());
    }
    msg.write_u8(0);
}

/// ErrorResponse message - error reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Parsed error fields
    pub fields: ErrorFields,
}

impl ErrorResponse {
    /// Parse an ErrorResponse message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Ok(Self {
            fields: parse_fields(payload)?,
        })
    }

    /// Convert to an Error.
    pub fn into_error(self) -> Error {
        Error::Server(self.fields)
    }

    /// Get the SQLSTATE code.
    pub fn sqlstate(&self) -> Option<&str> {
        self.fields.sqlstate.as_deref()
    }

    /// Get the primary message.
    pub fn message(&self) -> Option<&str> {
        self.fields.message.as_deref()
    }

    /// Write this message as a backend frame.
    pub fn write(&self, buf: &mut Vec<u8>) {
        let mut msg = MessageBuilder::new(buf, msg_type::ERROR_RESPONSE);
        write_fields(&mut msg, &self.fields);
        msg.finish();
    }
}

/// NoticeResponse message - non-fatal warning/info from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeResponse {
    /// Parsed notice fields
    pub fields: ErrorFields,
}

impl NoticeResponse {
    /// Parse a NoticeResponse message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Ok(Self {
            fields: parse_fields(payload)?,
        })
    }

    /// Get the primary message.
    pub fn message(&self) -> Option<&str> {
        self.fields.message.as_deref()
    }

    /// Write this message as a backend frame.
    pub fn write(&self, buf: &mut Vec<u8>) {
        let mut msg = MessageBuilder::new(buf, msg_type::NOTICE_RESPONSE);
        write_fields(&mut msg, &self.fields);
        msg.finish();
    }
}
