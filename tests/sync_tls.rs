//! In-band TLS upgrade for the blocking connection.

#![cfg(feature = "sync-tls")]

mod common;

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use native_tls::{Identity, TlsAcceptor};

use common::*;
use vertica_wire::protocol::backend::auth_type;
use vertica_wire::protocol::frontend::startup::{PROTOCOL_VERSION, SSL_REQUEST_CODE};
use vertica_wire::session::SERVER_TIME_QUERY;
use vertica_wire::sync::Conn;
use vertica_wire::{AuthState, Error, ErrorKind, Opts, TlsMode};

fn acceptor() -> TlsAcceptor {
    let identity = Identity::from_pkcs8(
        include_bytes!("fixtures/server.crt"),
        include_bytes!("fixtures/server.key"),
    )
    .unwrap();
    TlsAcceptor::new(identity).unwrap()
}

fn tls_opts(port: u16, tls_mode: TlsMode) -> Opts {
    Opts {
        tls_mode,
        ..opts(port)
    }
}

fn serve<F>(script: F) -> (u16, JoinHandle<()>)
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        script(stream);
    });
    (port, handle)
}

/// Read the SSL probe and answer it with `reply`.
fn answer_probe(stream: &mut TcpStream, reply: &[u8]) {
    let body = read_untagged(stream);
    assert_eq!(body, SSL_REQUEST_CODE.to_be_bytes());
    send(stream, reply);
}

fn answer_time_query<S: Read + Write>(stream: &mut S, value: &str) {
    let (tag, body) = read_tagged(stream);
    assert_eq!(tag, b'Q');
    assert_eq!(body, format!("{SERVER_TIME_QUERY}\0").as_bytes());
    send(stream, &single_value_result(value));
}

#[test]
fn session_runs_over_tls_after_s() {
    let (port, server) = serve(|mut stream| {
        answer_probe(&mut stream, b"S");
        let mut tls = acceptor().accept(stream).unwrap();

        let (version, params) = startup_params(&read_untagged(&mut tls));
        assert_eq!(version, PROTOCOL_VERSION);
        assert_eq!(lookup(&params, "user"), Some("dbadmin"));

        send(&mut tls, &auth(auth_type::CLEARTEXT_PASSWORD, &[]));
        let (tag, body) = read_tagged(&mut tls);
        assert_eq!(tag, b'p');
        assert_eq!(body, b"abc\0");

        send(&mut tls, &session_start());
        answer_time_query(&mut tls, "2024-06-01 12:00:00+01");

        let (tag, _) = read_tagged(&mut tls);
        assert_eq!(tag, b'X');
    });

    let mut conn = Conn::new(tls_opts(port, TlsMode::Server)).unwrap();
    assert_eq!(conn.auth_state(), AuthState::Ok);
    assert_eq!(conn.connection_id(), BACKEND_PID);
    assert_eq!(conn.server_tz_offset(), Some("+01"));
    conn.close().unwrap();
    server.join().unwrap();
}

#[test]
fn strict_mode_rejects_untrusted_certificate() {
    let (port, server) = serve(|mut stream| {
        answer_probe(&mut stream, b"S");
        // The client aborts mid-handshake.
        let _ = acceptor().accept(stream);
    });

    let err = Conn::new(tls_opts(port, TlsMode::ServerStrict)).err().unwrap();
    assert!(matches!(err, Error::Tls(_)));
    assert_eq!(err.kind(), ErrorKind::Transport);
    server.join().unwrap();
}

#[test]
fn bytes_before_tls_handshake_are_rejected() {
    let (port, server) = serve(|mut stream| {
        let mut reply = b"S".to_vec();
        reply.extend(auth(0, &[]));
        answer_probe(&mut stream, &reply);
        expect_eof(&mut stream);
    });

    let err = Conn::new(tls_opts(port, TlsMode::Server)).err().unwrap();
    assert!(matches!(err, Error::Protocol(_)));
    server.join().unwrap();
}
