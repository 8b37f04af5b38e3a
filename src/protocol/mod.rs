//! Vertica wire protocol implementation.
//!
//! This module contains the low-level protocol encoding and decoding.
//!
//! # Structure
//!
//! - `backend`: Server → Client messages (parsing)
//! - `frontend`: Client → Server messages (encoding)
//! - `codec`: Framing and low-level encoding/decoding primitives
//! - `types`: Common protocol types (TransactionStatus, AuthState)

pub mod backend;
pub mod codec;
pub mod frontend;
pub mod types;

// Re-export commonly used types
pub use backend::{BackendMessage, RawMessage};
pub use frontend::FrontendMessage;
pub use types::{AuthState, TransactionStatus};
