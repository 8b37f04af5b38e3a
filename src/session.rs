//! Per-connection session state.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};
use crate::handler::RawResultSet;
use crate::opts::Opts;
use crate::protocol::backend::BackendKeyData;
use crate::protocol::frontend::CancelRequest;
use crate::protocol::types::{AuthState, TransactionStatus};
use crate::state::AsyncMessage;
use crate::{DRIVER_NAME, DRIVER_VERSION};

/// Query issued right after the handshake to learn the server's UTC offset.
pub const SERVER_TIME_QUERY: &str = "select now()::timestamptz";

/// State accumulated over the life of one server session.
///
/// Filled in by the handshake and updated by later exchanges; owned by a
/// single connection and never shared.
#[derive(Debug, Clone)]
pub struct Session {
    parameters: HashMap<String, String>,
    client_pid: u32,
    backend_key: Option<BackendKeyData>,
    transaction_status: TransactionStatus,
    auth_state: AuthState,
    use_prepared_statements: bool,
    session_id: String,
    server_tz_offset: Option<String>,
}

impl Session {
    /// Fresh session for `opts`, before any I/O.
    pub fn new(opts: &Opts) -> Self {
        let client_pid = std::process::id();
        let session_id = match &opts.client_label {
            Some(label) => label.clone(),
            None => generate_session_id(client_pid),
        };
        Self {
            parameters: HashMap::new(),
            client_pid,
            backend_key: None,
            transaction_status: TransactionStatus::Idle,
            auth_state: AuthState::Waiting,
            use_prepared_statements: opts.use_prepared_statements,
            session_id,
            server_tz_offset: None,
        }
    }

    /// Server-reported parameters.
    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    /// Look up one server-reported parameter.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Insert or replace a parameter.
    pub fn set_parameter(&mut self, name: &str, value: &str) {
        if let Some(existing) = self.parameters.get_mut(name) {
            existing.clear();
            existing.push_str(value);
        } else {
            self.parameters.insert(name.to_string(), value.to_string());
        }
    }

    /// Process id of this client, as sent in the startup message.
    pub fn client_pid(&self) -> u32 {
        self.client_pid
    }

    /// Backend key data, once the server has sent it.
    pub fn backend_key(&self) -> Option<&BackendKeyData> {
        self.backend_key.as_ref()
    }

    /// Backend process id, or 0 before BackendKeyData arrives.
    pub fn backend_pid(&self) -> u32 {
        self.backend_key.as_ref().map_or(0, |k| k.process_id())
    }

    /// Cancellation key, or 0 before BackendKeyData arrives.
    pub fn cancel_key(&self) -> u32 {
        self.backend_key.as_ref().map_or(0, |k| k.secret())
    }

    pub(crate) fn set_backend_key(&mut self, key: BackendKeyData) {
        self.backend_key = Some(key);
    }

    /// A CancelRequest targeting this session, to be sent on a separate connection.
    pub fn cancel_request(&self) -> Option<CancelRequest> {
        self.backend_key.as_ref().map(|key| CancelRequest {
            backend_pid: key.process_id(),
            cancel_key: key.secret(),
        })
    }

    /// Transaction status from the last ReadyForQuery.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction_status
    }

    pub(crate) fn set_transaction_status(&mut self, status: TransactionStatus) {
        self.transaction_status = status;
    }

    /// Where the authentication exchange stands.
    pub fn auth_state(&self) -> AuthState {
        self.auth_state
    }

    pub(crate) fn set_auth_state(&mut self, state: AuthState) {
        self.auth_state = state;
    }

    /// Whether statements should be prepared server-side.
    pub fn use_prepared_statements(&self) -> bool {
        self.use_prepared_statements
    }

    /// Label sent to the server as `client_label`.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The server's UTC offset (e.g. `-05`), if the bootstrap query succeeded.
    pub fn server_tz_offset(&self) -> Option<&str> {
        self.server_tz_offset.as_deref()
    }

    pub(crate) fn set_server_tz_offset(&mut self, offset: String) {
        self.server_tz_offset = Some(offset);
    }

    /// Fold a message the server sent outside the normal reply flow into the session.
    pub(crate) fn apply_async_message(&mut self, msg: AsyncMessage) {
        match msg {
            AsyncMessage::Notice(fields) => tracing::info!("server notice: {}", fields),
            AsyncMessage::ParameterChanged { name, value } => {
                tracing::debug!("parameter changed: {}='{}'", name, value);
                self.set_parameter(&name, &value);
            }
        }
    }
}

fn generate_session_id(client_pid: u32) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{}-{}-{}-{}", DRIVER_NAME, DRIVER_VERSION, client_pid, secs)
}

/// Pull the UTC offset out of the result of [`SERVER_TIME_QUERY`].
///
/// The result must be exactly one row of one non-null column whose text ends
/// in a `+NN` or `-NN` offset.
pub fn server_tz_offset_from(result: &RawResultSet) -> Result<String> {
    if result.columns != 1 {
        return Err(Error::Protocol(format!(
            "server time query returned {} columns, expected 1",
            result.columns
        )));
    }
    if result.rows.len() != 1 {
        return Err(Error::Protocol(format!(
            "server time query returned {} rows, expected 1",
            result.rows.len()
        )));
    }
    let value = result
        .single_value()
        .ok_or_else(|| Error::Protocol("server time query returned NULL".into()))?;

    let offset = value
        .len()
        .checked_sub(3)
        .and_then(|start| value.get(start..))
        .filter(|tail| {
            matches!(tail, [b'+' | b'-', h, l] if h.is_ascii_digit() && l.is_ascii_digit())
        })
        .ok_or_else(|| {
            Error::Protocol(format!(
                "server time '{}' does not end in a UTC offset",
                value.escape_ascii()
            ))
        })?;

    // The filter above only admits ASCII.
    Ok(offset.iter().map(|&b| b as char).collect())
}
