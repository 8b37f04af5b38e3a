//! Sans-I/O state machines for the Vertica protocol.
//!
//! These state machines handle the protocol logic without performing any I/O.
//! They produce `Action` values that tell the caller what to do next.

pub mod action;
pub mod connection;
pub mod simple_query;

pub use action::{Action, AsyncMessage};
pub use connection::{ConnectionStateMachine, HandshakeState};
pub use simple_query::SimpleQueryStateMachine;

use crate::buffer_set::BufferSet;
use crate::error::Result;
use crate::protocol::types::TransactionStatus;

/// A state machine that can be driven by a connection front end.
pub trait StateMachine {
    /// Advance the state machine; the last frame read is in `buffer_set`.
    fn step(&mut self, buffer_set: &mut BufferSet) -> Result<Action>;

    /// Transaction status from the final ReadyForQuery.
    fn transaction_status(&self) -> TransactionStatus;
}
