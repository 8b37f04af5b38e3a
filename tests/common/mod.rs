//! Scripted fake server pieces shared by the handshake tests.

#![allow(dead_code)]

use std::io::{Read, Write};

use vertica_wire::protocol::backend::{
    Authentication, BackendKeyData, BackendMessage, CommandComplete, DataRow, ErrorResponse,
    ParameterStatus, ReadyForQuery, RowDescription,
};
use vertica_wire::protocol::frontend::Startup;
use vertica_wire::{ErrorFields, Opts, TransactionStatus};

pub const BACKEND_PID: u32 = 4242;
pub const CANCEL_KEY: u32 = 9001;

pub fn opts(port: u16) -> Opts {
    Opts {
        host: "127.0.0.1".into(),
        port,
        user: "dbadmin".into(),
        password: Some("abc".into()),
        database: "analytics".into(),
        ..Default::default()
    }
}

pub fn frame(msg: BackendMessage<'_>) -> Vec<u8> {
    let mut buf = Vec::new();
    msg.write(&mut buf);
    buf
}

pub fn auth(code: i32, extra: &[u8]) -> Vec<u8> {
    frame(BackendMessage::Authentication(Authentication { code, extra }))
}

pub fn ready(status: TransactionStatus) -> Vec<u8> {
    frame(BackendMessage::ReadyForQuery(ReadyForQuery { status }))
}

pub fn error(severity: &str, sqlstate: &str, message: &str) -> Vec<u8> {
    frame(BackendMessage::ErrorResponse(ErrorResponse {
        fields: ErrorFields {
            severity: Some(severity.into()),
            sqlstate: Some(sqlstate.into()),
            message: Some(message.into()),
            ..Default::default()
        },
    }))
}

/// Everything a server sends after accepting the credentials.
pub fn session_start() -> Vec<u8> {
    let mut buf = auth(0, &[]);
    buf.extend(frame(BackendMessage::ParameterStatus(ParameterStatus {
        name: "server_version",
        value: "v24.1.0",
    })));
    buf.extend(frame(BackendMessage::BackendKeyData(BackendKeyData::new(
        BACKEND_PID,
        CANCEL_KEY,
    ))));
    buf.extend(ready(TransactionStatus::Idle));
    buf
}

/// A one-row, one-column result followed by ReadyForQuery.
pub fn single_value_result(value: &str) -> Vec<u8> {
    let fields = b"now\0\0\0\0\0\0\0\0\x04\xa0\0\x08\xff\xff\xff\xff\0\0";
    let mut buf = frame(BackendMessage::RowDescription(RowDescription::new(
        1, fields,
    )));
    DataRow::write_values(&mut buf, &[Some(value.as_bytes())]);
    buf.extend(frame(BackendMessage::CommandComplete(CommandComplete {
        tag: "SELECT",
    })));
    buf.extend(ready(TransactionStatus::Idle));
    buf
}

/// Key/value pairs of a startup body, owned.
pub fn startup_params(body: &[u8]) -> (u32, Vec<(String, String)>) {
    let (version, params) = Startup::parse_body(body).unwrap();
    let params = params
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    (version, params)
}

pub fn lookup<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Read an untagged frame and return its body.
pub fn read_untagged<S: Read>(stream: &mut S) -> Vec<u8> {
    let mut len = [0u8; 4];
    stream.read_exact(&mut len).unwrap();
    let mut body = vec![0u8; u32::from_be_bytes(len) as usize - 4];
    stream.read_exact(&mut body).unwrap();
    body
}

/// Read a tagged frame and return its tag and body.
pub fn read_tagged<S: Read>(stream: &mut S) -> (u8, Vec<u8>) {
    let mut tag = [0u8; 1];
    stream.read_exact(&mut tag).unwrap();
    (tag[0], read_untagged(stream))
}

pub fn send<S: Write>(stream: &mut S, bytes: &[u8]) {
    stream.write_all(bytes).unwrap();
    stream.flush().unwrap();
}

/// Block until the client closes its end.
pub fn expect_eof<S: Read>(stream: &mut S) {
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
}
