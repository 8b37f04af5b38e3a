//! Result handlers for the simple query protocol.

use crate::error::Result;
use crate::protocol::backend::query::{CommandComplete, DataRow, RowDescription};

/// Handler for simple query results (text format).
///
/// Callback patterns by statement type:
/// - SELECT with rows: `result_start` → `row*` → `result_end`
/// - SELECT with 0 rows: `result_start` → `result_end`
/// - INSERT/UPDATE/DELETE: `result_end` only
///
/// For multi-statement queries like `"SELECT 1; UPDATE foo SET x=1"`:
/// ```text
/// result_start → row* → result_end   // SELECT 1
/// result_end                          // UPDATE
/// ```
pub trait TextHandler {
    /// Called when a result set begins.
    fn result_start(&mut self, cols: RowDescription<'_>) -> Result<()> {
        let _ = cols;
        Ok(())
    }

    /// Called for each data row.
    fn row(&mut self, cols: RowDescription<'_>, row: DataRow<'_>) -> Result<()>;

    /// Called when a result set ends.
    fn result_end(&mut self, complete: CommandComplete<'_>) -> Result<()> {
        let _ = complete;
        Ok(())
    }
}

/// A handler that discards all results.
#[derive(Debug, Default)]
pub struct DropHandler {
    command: Option<String>,
}

impl DropHandler {
    /// Create a new drop handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag of the last completed command.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }
}

impl TextHandler for DropHandler {
    fn row(&mut self, _cols: RowDescription<'_>, _row: DataRow<'_>) -> Result<()> {
        Ok(())
    }

    fn result_end(&mut self, complete: CommandComplete<'_>) -> Result<()> {
        self.command = Some(complete.tag.to_string());
        Ok(())
    }
}

/// One column value as sent by the server; `None` is SQL NULL.
pub type RawValue = Option<Vec<u8>>;

/// Undecoded rows of the last result set of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResultSet {
    /// Column count from the RowDescription
    pub columns: usize,
    /// Rows in arrival order
    pub rows: Vec<Vec<RawValue>>,
    /// CommandComplete tag
    pub command: Option<String>,
}

impl RawResultSet {
    /// The only value of a one-row, one-column result.
    ///
    /// Returns `None` for any other shape or for NULL.
    pub fn single_value(&self) -> Option<&[u8]> {
        if self.columns != 1 || self.rows.len() != 1 {
            return None;
        }
        let row = self.rows.first()?;
        if row.len() != 1 {
            return None;
        }
        row.first()?.as_deref()
    }
}

/// Handler that copies raw rows out of the read buffer.
///
/// Column values are not interpreted; type decoding belongs to the caller.
#[derive(Debug, Default)]
pub struct RawCollectHandler {
    result: RawResultSet,
}

impl RawCollectHandler {
    /// Create a new raw collect handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the collected result.
    pub fn into_result(self) -> RawResultSet {
        self.result
    }
}

impl TextHandler for RawCollectHandler {
    fn result_start(&mut self, cols: RowDescription<'_>) -> Result<()> {
        self.result = RawResultSet {
            columns: cols.len(),
            ..Default::default()
        };
        Ok(())
    }

    fn row(&mut self, _cols: RowDescription<'_>, row: DataRow<'_>) -> Result<()> {
        self.result
            .rows
            .push(row.iter().map(|value| value.map(<[u8]>::to_vec)).collect());
        Ok(())
    }

    fn result_end(&mut self, complete: CommandComplete<'_>) -> Result<()> {
        self.result.command = Some(complete.tag.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_shape() {
        let mut result = RawResultSet {
            columns: 1,
            rows: vec![vec![Some(b"x".to_vec())]],
            command: None,
        };
        assert_eq!(result.single_value(), Some(&b"x"[..]));

        result.rows.push(vec![Some(b"y".to_vec())]);
        assert_eq!(result.single_value(), None);

        let wide = RawResultSet {
            columns: 2,
            rows: vec![vec![Some(b"a".to_vec()), Some(b"b".to_vec())]],
            command: None,
        };
        assert_eq!(wide.single_value(), None);

        let null = RawResultSet {
            columns: 1,
            rows: vec![vec![None]],
            command: None,
        };
        assert_eq!(null.single_value(), None);
    }
}
