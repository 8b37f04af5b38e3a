//! Simple query protocol state machine.

use crate::buffer_set::BufferSet;
use crate::error::{Error, Result};
use crate::handler::TextHandler;
use crate::protocol::backend::{BackendMessage, RowDescription};
use crate::protocol::frontend::Query;
use crate::protocol::types::TransactionStatus;

use super::StateMachine;
use super::action::{Action, AsyncMessage};

/// Simple query state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    WaitingResponse,
    ProcessingRows,
    WaitingReady,
    Finished,
}

/// Simple query protocol state machine.
///
/// An ErrorResponse does not end the exchange: the machine keeps reading until
/// ReadyForQuery so the connection stays in sync, then reports the error.
pub struct SimpleQueryStateMachine<'a, H> {
    state: State,
    handler: &'a mut H,
    sql: &'a str,
    column_buffer: Vec<u8>,
    transaction_status: TransactionStatus,
    error: Option<Error>,
}

impl<'a, H: TextHandler> SimpleQueryStateMachine<'a, H> {
    /// Create a new simple query state machine.
    pub fn new(handler: &'a mut H, sql: &'a str) -> Self {
        Self {
            state: State::Initial,
            handler,
            sql,
            column_buffer: Vec::new(),
            transaction_status: TransactionStatus::Idle,
            error: None,
        }
    }

    fn handle_message(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        let msg = buffer_set.message()?;
        match (self.state, msg) {
            (_, BackendMessage::NoticeResponse(notice)) => Ok(
                Action::HandleAsyncMessageAndReadMessage(AsyncMessage::Notice(notice.fields)),
            ),
            (_, BackendMessage::ParameterStatus(param)) => Ok(
                Action::HandleAsyncMessageAndReadMessage(AsyncMessage::ParameterChanged {
                    name: param.name.to_string(),
                    value: param.value.to_string(),
                }),
            ),
            (_, BackendMessage::ErrorResponse(err)) => {
                // Keep the first error; later ones are consequences of it.
                if self.error.is_none() {
                    self.error = Some(err.into_error());
                }
                self.state = State::WaitingReady;
                Ok(Action::ReadMessage)
            }
            (_, BackendMessage::ReadyForQuery(ready)) => {
                self.transaction_status = ready.status;
                self.state = State::Finished;
                match self.error.take() {
                    Some(err) => Err(err),
                    None => Ok(Action::Finished),
                }
            }
            (_, BackendMessage::Unrecognized { type_byte, .. }) => {
                tracing::debug!(
                    "skipping unrecognized message '{}' in query response",
                    type_byte.escape_ascii()
                );
                Ok(Action::ReadMessage)
            }
            (State::WaitingResponse, BackendMessage::RowDescription(cols)) => {
                self.column_buffer.clear();
                self.column_buffer.extend_from_slice(&buffer_set.read_buffer);
                self.handler.result_start(cols)?;
                self.state = State::ProcessingRows;
                Ok(Action::ReadMessage)
            }
            (State::WaitingResponse, BackendMessage::EmptyQueryResponse) => {
                self.state = State::WaitingReady;
                Ok(Action::ReadMessage)
            }
            (State::ProcessingRows, BackendMessage::DataRow(row)) => {
                let cols = RowDescription::parse(&self.column_buffer)?;
                self.handler.row(cols, row)?;
                Ok(Action::ReadMessage)
            }
            (
                State::WaitingResponse | State::ProcessingRows,
                BackendMessage::CommandComplete(complete),
            ) => {
                self.handler.result_end(complete)?;
                // More commands may follow in a multi-statement query
                self.state = State::WaitingResponse;
                Ok(Action::ReadMessage)
            }
            (state, other) => Err(Error::Protocol(format!(
                "unexpected message in query response ({state:?}): {other}"
            ))),
        }
    }
}

impl<H: TextHandler> StateMachine for SimpleQueryStateMachine<'_, H> {
    fn step(&mut self, buffer_set: &mut BufferSet) -> Result<Action> {
        match self.state {
            State::Initial => {
                buffer_set.encode(&Query { sql: self.sql });
                self.state = State::WaitingResponse;
                Ok(Action::WriteAndReadMessage)
            }
            State::Finished => Err(Error::Protocol("query already finished".into())),
            _ => self.handle_message(buffer_set),
        }
    }

    fn transaction_status(&self) -> TransactionStatus {
        self.transaction_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorFields;
    use crate::handler::RawCollectHandler;
    use crate::protocol::backend::{CommandComplete, DataRow, ErrorResponse, ReadyForQuery};
    use crate::protocol::codec::split_frame;

    fn feed_frame(buffer_set: &mut BufferSet, frame: &[u8]) {
        buffer_set.type_byte = frame[0];
        buffer_set.read_buffer = frame[5..].to_vec();
    }

    fn feed(buffer_set: &mut BufferSet, msg: BackendMessage<'_>) {
        let mut frame = Vec::new();
        msg.write(&mut frame);
        feed_frame(buffer_set, &frame);
    }

    fn one_column() -> Vec<u8> {
        // name, table oid, column no, type oid, type len, type mod, format
        let mut fields = Vec::new();
        fields.extend_from_slice(b"now\0");
        fields.extend_from_slice(&[0; 4]);
        fields.extend_from_slice(&[0; 2]);
        fields.extend_from_slice(&1184_u32.to_be_bytes());
        fields.extend_from_slice(&8_i16.to_be_bytes());
        fields.extend_from_slice(&(-1_i32).to_be_bytes());
        fields.extend_from_slice(&[0; 2]);
        fields
    }

    #[test]
    fn collects_rows() {
        let mut handler = RawCollectHandler::new();
        let mut sm = SimpleQueryStateMachine::new(&mut handler, "select now()");
        let mut buffers = BufferSet::new();

        assert!(matches!(
            sm.step(&mut buffers).unwrap(),
            Action::WriteAndReadMessage
        ));
        let (raw, _) = split_frame(&buffers.write_buffer).unwrap();
        assert_eq!(raw.type_byte, b'Q');
        assert_eq!(raw.payload, b"select now()\0");

        let fields = one_column();
        feed(
            &mut buffers,
            BackendMessage::RowDescription(RowDescription::new(1, &fields)),
        );
        assert!(matches!(sm.step(&mut buffers).unwrap(), Action::ReadMessage));

        let mut row = Vec::new();
        DataRow::write_values(&mut row, &[Some(&b"2024-01-01 00:00:00-05"[..])]);
        feed_frame(&mut buffers, &row);
        assert!(matches!(sm.step(&mut buffers).unwrap(), Action::ReadMessage));

        feed(
            &mut buffers,
            BackendMessage::CommandComplete(CommandComplete { tag: "SELECT" }),
        );
        assert!(matches!(sm.step(&mut buffers).unwrap(), Action::ReadMessage));

        feed(
            &mut buffers,
            BackendMessage::ReadyForQuery(ReadyForQuery {
                status: TransactionStatus::InTransaction,
            }),
        );
        assert!(matches!(sm.step(&mut buffers).unwrap(), Action::Finished));
        assert_eq!(sm.transaction_status(), TransactionStatus::InTransaction);

        let result = handler.into_result();
        assert_eq!(result.columns, 1);
        assert_eq!(result.single_value(), Some(&b"2024-01-01 00:00:00-05"[..]));
        assert_eq!(result.command.as_deref(), Some("SELECT"));
    }

    #[test]
    fn error_waits_for_ready() {
        let mut handler = RawCollectHandler::new();
        let mut sm = SimpleQueryStateMachine::new(&mut handler, "select nope");
        let mut buffers = BufferSet::new();
        sm.step(&mut buffers).unwrap();

        feed(
            &mut buffers,
            BackendMessage::ErrorResponse(ErrorResponse {
                fields: ErrorFields {
                    severity: Some("ERROR".into()),
                    sqlstate: Some("42703".into()),
                    ..Default::default()
                },
            }),
        );
        assert!(matches!(sm.step(&mut buffers).unwrap(), Action::ReadMessage));

        feed(
            &mut buffers,
            BackendMessage::ReadyForQuery(ReadyForQuery {
                status: TransactionStatus::Idle,
            }),
        );
        let err = sm.step(&mut buffers).unwrap_err();
        assert_eq!(err.sqlstate(), Some("42703"));
        assert!(!err.is_connection_broken());
    }

    #[test]
    fn row_before_description_is_protocol_error() {
        let mut handler = RawCollectHandler::new();
        let mut sm = SimpleQueryStateMachine::new(&mut handler, "select 1");
        let mut buffers = BufferSet::new();
        sm.step(&mut buffers).unwrap();

        let mut row = Vec::new();
        DataRow::write_values(&mut row, &[Some(&b"1"[..])]);
        feed_frame(&mut buffers, &row);
        assert!(matches!(sm.step(&mut buffers), Err(Error::Protocol(_))));
    }
}
