//! Backing-store abstraction.
//!
//! The crate does not implement storage or querying itself; it defines the
//! contract any row store must honor. A [`Store`] handle executes blocking
//! operations against one open connection; an [`OpenStore`] opens a fresh
//! handle per execution, because the access layer opens and closes the store
//! around every operation rather than holding a handle across executions.

use crate::error::DbError;
use crate::query_args::QueryArgs;
use crate::value::StoreValue;

pub mod memory;

/// One open handle to a backing row store.
///
/// All operations are blocking and are expected to run on a worker context,
/// never on the orchestration context.
pub trait Store {
    /// Executes a schema-definition statement. Idempotent: the statement
    /// carries `IF NOT EXISTS` semantics.
    fn create_table(&mut self, ddl: &str) -> Result<(), DbError>;

    /// Executes a schema-teardown statement. Idempotent: the statement
    /// carries `IF EXISTS` semantics.
    fn drop_table(&mut self, ddl: &str) -> Result<(), DbError>;

    /// Runs a selection, returning a lazy sequence of raw field records in
    /// store iteration order.
    fn query(
        &mut self,
        table: &str,
        projection: &[&str],
        args: &QueryArgs,
    ) -> Result<Box<dyn RecordSet>, DbError>;

    /// Inserts one record; returns the new row identity.
    fn insert(&mut self, table: &str, values: Vec<(String, StoreValue)>) -> Result<i64, DbError>;

    /// Updates records matching the selection; returns the affected count.
    fn update(
        &mut self,
        table: &str,
        values: Vec<(String, StoreValue)>,
        selection: Option<&str>,
        args: &[StoreValue],
    ) -> Result<u64, DbError>;

    /// Deletes records matching the selection; returns the affected count.
    fn delete(
        &mut self,
        table: &str,
        selection: Option<&str>,
        args: &[StoreValue],
    ) -> Result<u64, DbError>;
}

/// Pull-based sequence of raw records from one query execution.
pub trait RecordSet {
    /// Column names of the records, in store-reported order.
    fn columns(&self) -> &[String];

    /// The next record, or `None` after the last one.
    fn next_record(&mut self) -> Result<Option<Vec<StoreValue>>, DbError>;
}

/// Opens a store handle for the duration of one execution.
pub trait OpenStore: Send + Sync {
    fn open(&self) -> Result<Box<dyn Store>, DbError>;
}

impl<F> OpenStore for F
where
    F: Fn() -> Result<Box<dyn Store>, DbError> + Send + Sync,
{
    fn open(&self) -> Result<Box<dyn Store>, DbError> {
        self()
    }
}
