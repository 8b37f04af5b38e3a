//! Error types for vertica-wire.

use thiserror::Error;

/// Result type for vertica-wire operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Fields carried by an ErrorResponse or NoticeResponse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorFields {
    /// Severity: ERROR, FATAL, PANIC, WARNING, NOTICE, INFO, ...
    pub severity: Option<String>,
    /// SQLSTATE code (5 characters)
    pub sqlstate: Option<String>,
    /// Primary message
    pub message: Option<String>,
    /// Detailed explanation
    pub detail: Option<String>,
    /// Suggestion for fixing the problem
    pub hint: Option<String>,
    /// Cursor position in the query string (1-based)
    pub position: Option<u32>,
    /// Position in the internal query
    pub internal_position: Option<u32>,
    /// Failed internal command text
    pub internal_query: Option<String>,
    /// Context
    pub where_: Option<String>,
    /// Server source file
    pub file: Option<String>,
    /// Server source line
    pub line: Option<u32>,
    /// Server source routine
    pub routine: Option<String>,
    /// Numeric server error code
    pub error_code: Option<i32>,
}

impl std::fmt::Display for ErrorFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(severity) = &self.severity {
            write!(f, "{}: ", severity)?;
        }
        if let Some(message) = &self.message {
            write!(f, "{}", message)?;
        }
        if let Some(code) = &self.sqlstate {
            write!(f, " (SQLSTATE {})", code)?;
        }
        if let Some(code) = self.error_code {
            write!(f, " [Vertica {}]", code)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {}", detail)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT: {}", hint)?;
        }
        Ok(())
    }
}

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad options; raised before any I/O
    Configuration,
    /// Socket or TLS failure; the session is lost
    Transport,
    /// Malformed or unexpected traffic
    Protocol,
    /// ErrorResponse sent by the server
    Server,
    /// API misuse such as talking to a closed connection
    Usage,
}

/// Error type for vertica-wire.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or incomplete connection options
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS negotiation failed
    #[cfg(any(feature = "sync-tls", feature = "tokio-tls"))]
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    /// The server answered the SSL probe with 'N'
    #[error("SSL/TLS is not enabled on this server")]
    TlsRejected,

    /// Protocol error (malformed frame, unexpected message, etc.)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server asked for an authentication method this driver cannot answer
    #[error("Unsupported authentication scheme: {0}")]
    UnsupportedAuth(i32),

    /// ErrorResponse from the server
    #[error("Vertica error: {0}")]
    Server(ErrorFields),

    /// The connection was closed by the caller
    #[error("Connection is closed")]
    ConnectionClosed,

    /// Unsupported feature
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Configuration,
            Error::Io(_) => ErrorKind::Transport,
            #[cfg(any(feature = "sync-tls", feature = "tokio-tls"))]
            Error::Tls(_) => ErrorKind::Transport,
            Error::TlsRejected | Error::Protocol(_) | Error::UnsupportedAuth(_) => {
                ErrorKind::Protocol
            }
            Error::Server(_) => ErrorKind::Server,
            Error::ConnectionClosed | Error::Unsupported(_) => ErrorKind::Usage,
        }
    }

    /// Returns true if the error indicates the connection cannot be reused.
    pub fn is_connection_broken(&self) -> bool {
        match self {
            Error::Io(_) | Error::Protocol(_) | Error::ConnectionClosed => true,
            #[cfg(any(feature = "sync-tls", feature = "tokio-tls"))]
            Error::Tls(_) => true,
            Error::Server(fields) => {
                matches!(fields.severity.as_deref(), Some("FATAL") | Some("PANIC"))
            }
            _ => false,
        }
    }

    /// Get the SQLSTATE code if this is a server error.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Server(fields) => fields.sqlstate.as_deref(),
            _ => None,
        }
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

impl<Src: std::fmt::Debug, Dst: std::fmt::Debug + ?Sized>
    From<zerocopy::error::CastError<Src, Dst>> for Error
{
    fn from(err: zerocopy::error::CastError<Src, Dst>) -> Self {
        Error::Protocol(format!("malformed fixed-size message: {err:?}"))
    }
}
