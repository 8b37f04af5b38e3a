//! Query-phase backend messages.
//!
//! Column metadata is carried opaquely here: the result-set layer owns its
//! decoding. Only the counts needed to sanity-check a result are parsed.

use crate::error::{Error, Result};
use crate::protocol::codec::{MessageBuilder, expect_end, read_cstr, read_i32, read_u16};

use super::msg_type;

/// RowDescription message - describes the columns in a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowDescription<'a> {
    num_fields: u16,
    fields_data: &'a [u8],
}

impl<'a> RowDescription<'a> {
    /// Parse a RowDescription message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (num_fields, fields_data) = read_u16(payload)?;
        Ok(Self {
            num_fields,
            fields_data,
        })
    }

    /// Build from a field count and the encoded field descriptions.
    pub fn new(num_fields: u16, fields_data: &'a [u8]) -> Self {
        Self {
            num_fields,
            fields_data,
        }
    }

    /// Get the number of fields.
    pub fn len(&self) -> usize {
        self.num_fields as usize
    }

    /// Check if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.num_fields == 0
    }

    /// Encoded field descriptions following the count.
    pub fn fields_data(&self) -> &'a [u8] {
        self.fields_data
    }

    /// Write this message as a backend frame.
    pub fn write(&self, buf: &mut Vec<u8>) {
        let mut msg = MessageBuilder::new(buf, msg_type::ROW_DESCRIPTION);
        msg.write_u16(self.num_fields);
        msg.write_bytes(self.fields_data);
        msg.finish();
    }
}

/// DataRow message - contains a single row of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRow<'a> {
    /// Number of columns
    num_columns: u16,
    /// Column data (after the column count)
    columns_data: &'a [u8],
}

impl<'a> DataRow<'a> {
    /// Parse a DataRow message from payload bytes.
    ///
    /// Every column length is checked against the body so that iteration
    /// never runs past it.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (num_columns, columns_data) = read_u16(payload)?;

        let mut data = columns_data;
        for index in 0..num_columns {
            let (len, rest) = read_i32(data)?;
            data = rest;
            if len == -1 {
                continue;
            }
            let len = usize::try_from(len).map_err(|_| {
                Error::Protocol(format!("DataRow: column {index} has length {len}"))
            })?;
            data = data.get(len..).ok_or_else(|| {
                Error::Protocol(format!(
                    "DataRow: column {index} overruns the body ({len} > {})",
                    data.len()
                ))
            })?;
        }
        expect_end(data, "DataRow")?;

        Ok(Self {
            num_columns,
            columns_data,
        })
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.num_columns as usize
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.num_columns == 0
    }

    /// Create an iterator over column values.
    ///
    /// Each item is `Option<&[u8]>` where `None` represents NULL.
    pub fn iter(&self) -> DataRowIter<'a> {
        DataRowIter {
            remaining: self.columns_data,
        }
    }

    /// Get a column value by index.
    ///
    /// Returns `None` if the column is NULL, `Some(bytes)` otherwise.
    pub fn get(&self, index: usize) -> Option<Option<&'a [u8]>> {
        self.iter().nth(index)
    }

    /// Write a DataRow frame holding `values`.
    pub fn write_values(buf: &mut Vec<u8>, values: &[Option<&[u8]>]) {
        let mut msg = MessageBuilder::new(buf, msg_type::DATA_ROW);
        msg.write_u16(values.len() as u16);
        for value in values {
            match value {
                Some(bytes) => {
                    msg.write_i32(bytes.len() as i32);
                    msg.write_bytes(bytes);
                }
                None => msg.write_i32(-1),
            }
        }
        msg.finish();
    }

    /// Write this message as a backend frame.
    pub fn write(&self, buf: &mut Vec<u8>) {
        let mut msg = MessageBuilder::new(buf, msg_type::DATA_ROW);
        msg.write_u16(self.num_columns);
        msg.write_bytes(self.columns_data);
        msg.finish();
    }
}

/// Iterator over column values in a DataRow.
#[derive(Debug, Clone)]
pub struct DataRowIter<'a> {
    remaining: &'a [u8],
}

impl<'a> Iterator for DataRowIter<'a> {
    type Item = Option<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        let len;
        (len, self.remaining) = self.remaining.split_first_chunk::<4>()?;
        let len = i32::from_be_bytes(*len);

        if len == -1 {
            // NULL value
            Some(None)
        } else {
            let value;
            (value, self.remaining) = self.remaining.split_at_checked(len as usize)?;
            Some(Some(value))
        }
    }
}

/// CommandComplete message - indicates successful completion of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandComplete<'a> {
    /// Command tag (e.g., "SELECT", "INSERT")
    pub tag: &'a str,
}

impl<'a> CommandComplete<'a> {
    /// Parse a CommandComplete message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (tag, rest) = read_cstr(payload)?;
        expect_end(rest, "CommandComplete")?;
        Ok(Self { tag })
    }

    /// Get the command name from the tag.
    pub fn command(&self) -> Option<&str> {
        self.tag.split_whitespace().next()
    }

    /// Write this message as a backend frame.
    pub fn write(&self, buf: &mut Vec<u8>) {
        let mut msg = MessageBuilder::new(buf, msg_type::COMMAND_COMPLETE);
        msg.write_cstr(self.tag);
        msg.finish();
    }
}

/// ParameterDescription message - parameter metadata of a prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterDescription<'a> {
    num_params: u16,
    params_data: &'a [u8],
}

impl<'a> ParameterDescription<'a> {
    /// Parse a ParameterDescription message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (num_params, params_data) = read_u16(payload)?;
        Ok(Self {
            num_params,
            params_data,
        })
    }

    /// Get the number of parameters.
    pub fn len(&self) -> usize {
        self.num_params as usize
    }

    /// Check if the statement takes no parameters.
    pub fn is_empty(&self) -> bool {
        self.num_params == 0
    }

    /// Encoded parameter descriptions following the count.
    pub fn params_data(&self) -> &'a [u8] {
        self.params_data
    }

    /// Write this message as a backend frame.
    pub fn write(&self, buf: &mut Vec<u8>) {
        let mut msg = MessageBuilder::new(buf, msg_type::PARAMETER_DESCRIPTION);
        msg.write_u16(self.num_params);
        msg.write_bytes(self.params_data);
        msg.finish();
    }
}
