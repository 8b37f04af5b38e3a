//! Asynchronous Vertica connection.

use std::collections::HashMap;

use tokio::net::TcpStream;

use crate::buffer_set::BufferSet;
use crate::error::{Error, Result};
use crate::handler::{RawCollectHandler, RawResultSet, TextHandler};
use crate::opts::Opts;
use crate::protocol::backend::{BackendKeyData, BackendMessage};
use crate::protocol::frontend::{FrontendMessage, Terminate};
use crate::protocol::types::{AuthState, TransactionStatus};
use crate::session::{SERVER_TIME_QUERY, Session, server_tz_offset_from};
use crate::state::StateMachine;
use crate::state::action::Action;
use crate::state::connection::ConnectionStateMachine;
use crate::state::simple_query::SimpleQueryStateMachine;

use super::stream::Stream;

/// Asynchronous Vertica connection.
pub struct Conn {
    stream: Option<Stream>,
    buffer_set: BufferSet,
    session: Session,
    is_broken: bool,
}

impl Conn {
    /// Connect to a Vertica server.
    pub async fn new<O: TryInto<Opts>>(opts: O) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        let opts = opts.try_into()?;
        opts.validate()?;
        if opts.host.is_empty() {
            return Err(Error::Config("host is empty".into()));
        }

        let tcp = TcpStream::connect((opts.host.as_str(), opts.port)).await?;
        tcp.set_nodelay(true)?;
        Self::new_with_stream(Stream::tcp(tcp), opts).await
    }

    /// Connect using an existing stream.
    pub async fn new_with_stream(mut stream: Stream, opts: Opts) -> Result<Self> {
        let mut buffer_set = BufferSet::new();
        let host = opts.host.clone();
        let session = Session::new(&opts);
        let mut state_machine = ConnectionStateMachine::new(opts, session);

        // Drive the connection state machine
        loop {
            match state_machine.step(&mut buffer_set)? {
                Action::WriteAndReadByte => {
                    stream.send(&mut buffer_set).await?;
                    let byte = stream.read_u8().await?;
                    state_machine.set_ssl_response(byte);
                }
                Action::ReadMessage => {
                    stream.read_message(&mut buffer_set).await?;
                }
                Action::Write => {
                    stream.send(&mut buffer_set).await?;
                }
                Action::WriteAndReadMessage => {
                    stream.send(&mut buffer_set).await?;
                    stream.read_message(&mut buffer_set).await?;
                }
                Action::TlsHandshake(mode) => {
                    #[cfg(feature = "tokio-tls")]
                    {
                        stream = stream.upgrade_to_tls(&host, mode).await?;
                    }
                    #[cfg(not(feature = "tokio-tls"))]
                    {
                        let _ = (&host, mode);
                        return Err(Error::Unsupported(
                            "TLS requested but tokio-tls feature not enabled".into(),
                        ));
                    }
                }
                Action::HandleAsyncMessageAndReadMessage(_) => {
                    // Ignore async messages during startup, read next message
                    stream.read_message(&mut buffer_set).await?;
                }
                Action::Finished => break,
            }
        }

        let mut conn = Self {
            stream: Some(stream),
            buffer_set,
            session: state_machine.into_session(),
            is_broken: false,
        };
        tracing::debug!(
            "connected: backend pid {}, session '{}'",
            conn.session.backend_pid(),
            conn.session.session_id()
        );

        conn.initialize_session().await?;
        Ok(conn)
    }

    /// Learn the server's UTC offset. Only a lost connection is fatal here.
    async fn initialize_session(&mut self) -> Result<()> {
        let result = match self.query_raw(SERVER_TIME_QUERY).await {
            Ok(result) => result,
            Err(e) if e.is_connection_broken() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    "unable to query the server time zone, date/time values may decode incorrectly: {}",
                    e
                );
                return Ok(());
            }
        };
        match server_tz_offset_from(&result) {
            Ok(offset) => {
                tracing::debug!("server time zone offset: {}", offset);
                self.session.set_server_tz_offset(offset);
            }
            Err(e) => tracing::warn!(
                "unable to determine the server time zone, date/time values may decode incorrectly: {}",
                e
            ),
        }
        Ok(())
    }

    /// Session state gathered so far.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Get server parameters.
    pub fn server_params(&self) -> &HashMap<String, String> {
        self.session.parameters()
    }

    /// Get the backend key data for query cancellation.
    pub fn backend_key(&self) -> Option<&BackendKeyData> {
        self.session.backend_key()
    }

    /// Get the connection ID (backend process ID).
    ///
    /// Returns 0 if the backend key data is not available.
    pub fn connection_id(&self) -> u32 {
        self.session.backend_pid()
    }

    /// Get the current transaction status.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.session.transaction_status()
    }

    /// Check if currently in a transaction.
    pub fn in_transaction(&self) -> bool {
        self.session.transaction_status().in_transaction()
    }

    /// Get the authentication state.
    pub fn auth_state(&self) -> AuthState {
        self.session.auth_state()
    }

    /// The server's UTC offset, if it could be determined.
    pub fn server_tz_offset(&self) -> Option<&str> {
        self.session.server_tz_offset()
    }

    /// Check if the connection is broken.
    pub fn is_broken(&self) -> bool {
        self.is_broken
    }

    /// Check if the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Send one frontend message.
    pub async fn send_message<M: FrontendMessage + ?Sized>(&mut self, msg: &M) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::ConnectionClosed)?;
        self.buffer_set.encode(msg);
        if let Err(e) = stream.send(&mut self.buffer_set).await {
            tracing::error!("failed to send {}: {}", msg, e);
            self.is_broken = true;
            return Err(e.into());
        }
        Ok(())
    }

    /// Receive one backend message.
    ///
    /// The message borrows the connection's read buffer and is valid until the
    /// next call.
    pub async fn recv_message(&mut self) -> Result<BackendMessage<'_>> {
        let stream = self.stream.as_mut().ok_or(Error::ConnectionClosed)?;
        if let Err(e) = stream.read_message(&mut self.buffer_set).await {
            self.is_broken = true;
            return Err(e);
        }
        let result = self.buffer_set.message();
        if result.is_err() {
            self.is_broken = true;
        }
        result
    }

    /// Drive a state machine to completion.
    async fn drive<S: StateMachine>(&mut self, state_machine: &mut S) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::ConnectionClosed)?;
        loop {
            let action = match state_machine.step(&mut self.buffer_set) {
                Ok(action) => action,
                Err(e) => {
                    if matches!(e, Error::Server(_)) {
                        self.session
                            .set_transaction_status(state_machine.transaction_status());
                    }
                    return Err(e);
                }
            };
            match action {
                Action::WriteAndReadByte => {
                    return Err(Error::Protocol(
                        "Unexpected WriteAndReadByte in query state machine".into(),
                    ));
                }
                Action::ReadMessage => {
                    stream.read_message(&mut self.buffer_set).await?;
                }
                Action::Write => {
                    stream.send(&mut self.buffer_set).await?;
                }
                Action::WriteAndReadMessage => {
                    stream.send(&mut self.buffer_set).await?;
                    stream.read_message(&mut self.buffer_set).await?;
                }
                Action::TlsHandshake(_) => {
                    return Err(Error::Protocol(
                        "Unexpected TlsHandshake in query state machine".into(),
                    ));
                }
                Action::HandleAsyncMessageAndReadMessage(async_msg) => {
                    self.session.apply_async_message(async_msg);
                    // Read next message after handling async message
                    stream.read_message(&mut self.buffer_set).await?;
                }
                Action::Finished => {
                    self.session
                        .set_transaction_status(state_machine.transaction_status());
                    break;
                }
            }
        }
        Ok(())
    }

    /// Execute a simple query with a handler.
    pub async fn query<H: TextHandler>(&mut self, sql: &str, handler: &mut H) -> Result<()> {
        let mut state_machine = SimpleQueryStateMachine::new(handler, sql);
        let result = self.drive(&mut state_machine).await;
        if let Err(e) = &result
            && (e.is_connection_broken() || !matches!(e, Error::Server(_)))
        {
            self.is_broken = true;
        }
        result
    }

    /// Execute a simple query and collect the last result set undecoded.
    pub async fn query_raw(&mut self, sql: &str) -> Result<RawResultSet> {
        let mut handler = RawCollectHandler::new();
        self.query(sql, &mut handler).await?;
        Ok(handler.into_result())
    }

    /// Close the connection gracefully.
    ///
    /// Sends Terminate and releases the socket. Calling it again is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        if self.is_broken {
            return Ok(());
        }
        self.buffer_set.encode(&Terminate);
        stream.send(&mut self.buffer_set).await?;
        Ok(())
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        if self.is_broken {
            return;
        }
        self.buffer_set.encode(&Terminate);
        if stream.try_write_all(&self.buffer_set.write_buffer) {
            self.buffer_set.mark_sent();
        } else {
            tracing::debug!("dropped connection without sending Terminate");
        }
    }
}
