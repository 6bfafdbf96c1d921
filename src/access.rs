//! Typed access to one table of a backing store.
//!
//! [`TableStore`] pairs a [`TableSchema`] with an [`OpenStore`] and speaks
//! the store contract on the schema's behalf: DDL execution, row selection
//! with schema verification, and insert/update/delete keyed on the row
//! identity. Every operation opens a fresh store handle and drops it when
//! done; no handle is held across executions.
//!
//! The decode step is shared between the one-shot `select_rows` path and the
//! reload coordinator: both verify the store-reported shape against the
//! schema before any row is decoded, and both deliver rows in store
//! iteration order.

use std::sync::Arc;

use tracing::debug;

use crate::backend::{OpenStore, RecordSet};
use crate::error::DbError;
use crate::loader::QuerySource;
use crate::query_args::QueryArgs;
use crate::row::Row;
use crate::schema::TableSchema;
use crate::value::{StoreValue, ValueKind};

/// Schema-aware access to one table.
#[derive(Clone)]
pub struct TableStore<O: OpenStore> {
    schema: Arc<TableSchema>,
    opener: O,
}

impl<O: OpenStore> TableStore<O> {
    pub fn new(schema: Arc<TableSchema>, opener: O) -> Self {
        Self { schema, opener }
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// Creates the table in the store (no-op when it already exists).
    pub fn create_table(&self) -> Result<(), DbError> {
        let mut store = self.opener.open()?;
        store.create_table(&self.schema.create_statement())
    }

    /// Drops the table from the store (no-op when it does not exist).
    pub fn drop_table(&self) -> Result<(), DbError> {
        let mut store = self.opener.open()?;
        store.drop_table(&self.schema.drop_statement())
    }

    /// Selects rows and collects them in store iteration order.
    pub fn select_rows(&self, args: &QueryArgs) -> Result<Vec<Row>, DbError> {
        let mut rows = Vec::new();
        self.stream_rows(args, &mut |row| rows.push(row))?;
        Ok(rows)
    }

    /// Selects rows, handing each decoded row to `sink` as it is produced.
    ///
    /// Returns the number of rows decoded.
    pub fn stream_rows(
        &self,
        args: &QueryArgs,
        sink: &mut dyn FnMut(Row),
    ) -> Result<usize, DbError> {
        let mut store = self.opener.open()?;
        let projection = self.schema.column_names();
        let mut records = store.query(self.schema.name(), &projection, args)?;
        let count = decode_records(&self.schema, records.as_mut(), sink)?;
        debug!(table = self.schema.name(), rows = count, "select complete");
        Ok(count)
    }

    /// Inserts one row; returns the identity the store assigned.
    ///
    /// The identity column is never written by an insert; unset columns are
    /// left to the store's defaults.
    pub fn insert_row(&self, row: &Row) -> Result<i64, DbError> {
        let values = self.writable_values(row)?;
        let mut store = self.opener.open()?;
        let id = store.insert(self.schema.name(), values)?;
        debug!(table = self.schema.name(), id, "row inserted");
        Ok(id)
    }

    /// Updates the persisted row with this row's column values.
    pub fn update_row(&self, row: &Row) -> Result<u64, DbError> {
        let id = row.id().ok_or_else(|| self.identity_required())?;
        let values = self.writable_values(row)?;
        let selection = format!("{}=?", self.schema.identity_column().name());
        let mut store = self.opener.open()?;
        store.update(
            self.schema.name(),
            values,
            Some(&selection),
            &[StoreValue::Integer(id)],
        )
    }

    /// Deletes the given persisted rows; every row must carry an identity.
    pub fn delete_rows(&self, rows: &[Row]) -> Result<u64, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(StoreValue::Integer(
                row.id().ok_or_else(|| self.identity_required())?,
            ));
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let selection = format!(
            "{} IN ({})",
            self.schema.identity_column().name(),
            placeholders
        );
        let mut store = self.opener.open()?;
        store.delete(self.schema.name(), Some(&selection), &ids)
    }

    /// Inserts unpersisted rows and updates persisted ones; newly inserted
    /// rows get their assigned identity written back.
    pub fn save_rows(&self, rows: &mut [Row]) -> Result<(), DbError> {
        for row in rows {
            match row.id() {
                None => {
                    let id = self.insert_row(row)?;
                    row.set_id(Some(id));
                }
                Some(_) => {
                    self.update_row(row)?;
                }
            }
        }
        Ok(())
    }

    fn writable_values(&self, row: &Row) -> Result<Vec<(String, StoreValue)>, DbError> {
        let identity = self.schema.identity_column().name();
        let mut values = Vec::new();
        for column in row.columns() {
            if column.name() == identity || !column.is_set() {
                continue;
            }
            values.push((column.name().to_string(), column.to_store_value()?));
        }
        Ok(values)
    }

    fn identity_required(&self) -> DbError {
        DbError::IdentityRequired {
            table: self.schema.name().to_string(),
        }
    }
}

impl<O: OpenStore + Clone + 'static> TableStore<O> {
    /// Adapts this table to a [`QuerySource`] the reload coordinator can
    /// re-run: each execution opens a handle, streams decoded rows to the
    /// sink, and closes the handle.
    pub fn reload_source(&self, args: QueryArgs) -> impl QuerySource + use<O> {
        let table = self.clone();
        move |sink: &mut dyn FnMut(Row)| table.stream_rows(&args, sink).map(|_| ())
    }
}

/// Decodes raw store records into rows, verifying the store-reported shape
/// against the schema first.
///
/// The first record doubles as the type probe. An empty result set
/// short-circuits to zero rows without a shape verdict: with no sample row
/// there is nothing to type-check against.
pub(crate) fn decode_records(
    schema: &Arc<TableSchema>,
    records: &mut dyn RecordSet,
    sink: &mut dyn FnMut(Row),
) -> Result<usize, DbError> {
    let Some(first) = records.next_record()? else {
        return Ok(0);
    };
    let store_columns = records.columns().to_vec();
    verify_shape(schema, &store_columns, &first)?;

    let mut count = 0;
    let mut record = Some(first);
    while let Some(values) = record {
        let mut row = schema.make_row();
        for (name, value) in store_columns.iter().zip(&values) {
            if value.kind() == ValueKind::Null {
                // NULL leaves the column unset
                continue;
            }
            row.column_mut(name)?.load_store_value(value)?;
        }
        sink(row);
        count += 1;
        record = records.next_record()?;
    }
    Ok(count)
}

fn verify_shape(
    schema: &Arc<TableSchema>,
    store_columns: &[String],
    probe: &[StoreValue],
) -> Result<(), DbError> {
    let mismatch = || DbError::SchemaMismatch {
        table: schema.name().to_string(),
        store_columns: store_columns.to_vec(),
        schema_columns: schema
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    };

    for name in schema.column_names() {
        if !store_columns.iter().any(|c| c == name) {
            return Err(mismatch());
        }
    }
    for (name, value) in store_columns.iter().zip(probe) {
        let Some(spec) = schema.column_spec(name) else {
            return Err(mismatch());
        };
        if value.kind() != ValueKind::Null && !spec.type_tag().accepts(value.kind()) {
            return Err(mismatch());
        }
    }
    Ok(())
}
