//! Rows: named bags of columns belonging to one table schema.
//!
//! A row's identity is optional: absent means not yet persisted. The backing
//! store never sees the absence directly: it is normalized to a `-1`
//! sentinel in the identity column's buffer and inverted on the way out, so
//! callers must never treat `-1` as a legitimate persisted identity.
//!
//! Rows are not thread-safe for concurrent mutation; ownership is exclusive
//! to whichever component currently holds one.

use std::sync::Arc;

use crate::column::Column;
use crate::error::DbError;
use crate::schema::TableSchema;

/// Sentinel stored in the identity column while a row is unpersisted.
pub(crate) const ABSENT_ID: i64 = -1;

/// One row of a table: a column cell per schema column, plus an optional
/// persisted identity.
#[derive(Debug, Clone)]
pub struct Row {
    schema: Arc<TableSchema>,
    columns: Vec<Column>,
}

impl Row {
    /// Stamps a fresh row: every column present and unset, identity absent.
    pub(crate) fn new(schema: Arc<TableSchema>) -> Self {
        let columns = schema.specs().iter().map(|s| s.make_column()).collect();
        let mut row = Self { schema, columns };
        row.set_id(None);
        row
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// The column with the given name, or [`DbError::UnknownColumn`].
    pub fn column(&self, name: &str) -> Result<&Column, DbError> {
        let idx = self
            .schema
            .column_index(name)
            .ok_or_else(|| self.unknown_column(name))?;
        Ok(&self.columns[idx])
    }

    /// Mutable access to the column with the given name.
    pub fn column_mut(&mut self, name: &str) -> Result<&mut Column, DbError> {
        let idx = self
            .schema
            .column_index(name)
            .ok_or_else(|| self.unknown_column(name))?;
        Ok(&mut self.columns[idx])
    }

    /// Columns in schema declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Sets the persisted identity; `None` marks the row unpersisted.
    pub fn set_id(&mut self, id: Option<i64>) {
        let idx = self.schema.identity_index();
        self.columns[idx].encode_i64(id.unwrap_or(ABSENT_ID));
    }

    /// The persisted identity, or `None` for a row not yet persisted.
    pub fn id(&self) -> Option<i64> {
        let idx = self.schema.identity_index();
        match self.columns[idx].try_decode_i64() {
            Some(ABSENT_ID) | None => None,
            Some(id) => Some(id),
        }
    }

    fn unknown_column(&self, name: &str) -> DbError {
        DbError::UnknownColumn {
            table: self.schema.name().to_string(),
            name: name.to_string(),
        }
    }
}
