//! Connection startup and authentication state machine.

use crate::buffer_set::BufferSet;
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::backend::{AuthChallenge, BackendMessage};
use crate::protocol::frontend::{
    PROTOCOL_VERSION, Password, SslRequest, Startup, md5_password, sha512_password,
};
use crate::protocol::types::{AuthState, TransactionStatus};
use crate::session::Session;
use crate::{DRIVER_NAME, DRIVER_VERSION};

use super::StateMachine;
use super::action::{Action, AsyncMessage};

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Init,
    SslProbe,
    TlsUpgrade,
    StartupSent,
    AuthNegotiating,
    Ready,
    Failed,
}

/// Connection startup state machine.
///
/// Runs from the first byte on the socket to the first ReadyForQuery.
pub struct ConnectionStateMachine {
    state: HandshakeState,
    opts: Opts,
    session: Session,
    ssl_response: Option<u8>,
}

impl ConnectionStateMachine {
    /// Create a new connection state machine.
    pub fn new(opts: Opts, session: Session) -> Self {
        Self {
            state: HandshakeState::Init,
            opts,
            session,
            ssl_response: None,
        }
    }

    /// Get the current handshake state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Session state gathered so far.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Take the session once the handshake is done.
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Hand over the byte read after [`Action::WriteAndReadByte`].
    pub fn set_ssl_response(&mut self, byte: u8) {
        self.ssl_response = Some(byte);
    }

    fn step_inner(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        match self.state {
            HandshakeState::Init => {
                self.opts.validate()?;
                if self.opts.tls_mode.requested() {
                    buffer_set.encode(&SslRequest);
                    self.state = HandshakeState::SslProbe;
                    Ok(Action::WriteAndReadByte)
                } else {
                    self.write_startup(buffer_set);
                    Ok(Action::WriteAndReadMessage)
                }
            }
            HandshakeState::SslProbe => {
                let byte = self.ssl_response.take().ok_or_else(|| {
                    Error::Protocol("SSL probe response was not supplied".into())
                })?;
                match byte {
                    b'S' => {
                        self.state = HandshakeState::TlsUpgrade;
                        Ok(Action::TlsHandshake(self.opts.tls_mode))
                    }
                    b'N' => Err(Error::TlsRejected),
                    other => Err(Error::Protocol(format!(
                        "unexpected SSL probe response: '{}'",
                        other.escape_ascii()
                    ))),
                }
            }
            HandshakeState::TlsUpgrade => {
                self.write_startup(buffer_set);
                Ok(Action::WriteAndReadMessage)
            }
            HandshakeState::StartupSent | HandshakeState::AuthNegotiating => {
                self.handle_message(buffer_set)
            }
            HandshakeState::Ready | HandshakeState::Failed => Err(Error::Protocol(format!(
                "handshake already finished ({:?})",
                self.state
            ))),
        }
    }

    fn write_startup(&mut self, buffer_set: &mut BufferSet) {
        let startup = Startup {
            protocol_version: PROTOCOL_VERSION,
            driver_name: DRIVER_NAME,
            driver_version: DRIVER_VERSION,
            user: &self.opts.user,
            database: &self.opts.database,
            session_id: self.session.session_id(),
            client_pid: self.session.client_pid(),
        };
        buffer_set.encode(&startup);
        self.state = HandshakeState::StartupSent;
    }

    fn handle_message(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        let credential = match buffer_set.message()? {
            BackendMessage::Authentication(auth) => {
                self.state = HandshakeState::AuthNegotiating;
                match self.credential_for(auth.challenge()?)? {
                    Some(credential) => credential,
                    None => return Ok(Action::ReadMessage),
                }
            }
            BackendMessage::ParameterStatus(param) => {
                self.session.set_parameter(param.name, param.value);
                return Ok(Action::ReadMessage);
            }
            BackendMessage::BackendKeyData(key) => {
                self.session.set_backend_key(key);
                return Ok(Action::ReadMessage);
            }
            BackendMessage::ReadyForQuery(ready) => {
                if self.session.auth_state() != AuthState::Ok {
                    tracing::debug!("ReadyForQuery without AuthenticationOk");
                    self.session.set_auth_state(AuthState::Ok);
                }
                self.session.set_transaction_status(ready.status);
                self.state = HandshakeState::Ready;
                return Ok(Action::Finished);
            }
            BackendMessage::NoticeResponse(notice) => {
                return Ok(Action::HandleAsyncMessageAndReadMessage(
                    AsyncMessage::Notice(notice.fields),
                ));
            }
            other => return Err(other.into_unexpected("during handshake")),
        };

        buffer_set.encode(&Password {
            credential: &credential,
        });
        Ok(Action::WriteAndReadMessage)
    }

    /// The credential answering `challenge`, or `None` once authenticated.
    fn credential_for(&mut self, challenge: AuthChallenge<'_>) -> Result<Option<String>> {
        let password = self.opts.password_or_empty();
        let credential = match challenge {
            AuthChallenge::Ok => {
                self.session.set_auth_state(AuthState::Ok);
                return Ok(None);
            }
            AuthChallenge::CleartextPassword => password.to_string(),
            AuthChallenge::Md5Password { salt } => md5_password(&self.opts.user, password, &salt),
            AuthChallenge::Sha512Password { salt, user_salt } => {
                sha512_password(password, user_salt, &salt)
            }
            AuthChallenge::Unsupported(code) => return Err(Error::UnsupportedAuth(code)),
        };
        self.session.set_auth_state(AuthState::Negotiating);
        Ok(Some(credential))
    }
}

impl StateMachine for ConnectionStateMachine {
    fn step(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        let result = self.step_inner(buffer_set);
        if result.is_err() {
            self.state = HandshakeState::Failed;
            if self.session.auth_state() != AuthState::Ok {
                self.session.set_auth_state(AuthState::Failed);
            }
        }
        result
    }

    fn transaction_status(&self) -> TransactionStatus {
        self.session.transaction_status()
    }
}
