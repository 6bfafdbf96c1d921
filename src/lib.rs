//! Schema-driven row storage with asynchronous reload coordination.
//!
//! The crate models a table as a [`schema::TableSchema`] of typed columns,
//! materializes query results as [`row::Row`]s of binary-encoded
//! [`column::Column`]s, and talks to any backing store through the
//! [`backend::Store`] traits. On top of that, [`loader::ReloadCoordinator`]
//! re-runs a query off the caller's thread and streams rows back to an
//! observer in a strict callback order, coalescing bursts of reload
//! requests into a single trailing execution.

pub mod access;
pub mod backend;
pub mod column;
pub mod error;
pub mod exec;
pub mod loader;
pub mod query_args;
pub mod row;
pub mod schema;
pub mod value;

#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures;

// Re-export commonly used items
pub use access::TableStore;
pub use backend::{OpenStore, RecordSet, Store};
pub use column::{Column, ColumnSpec};
pub use error::DbError;
pub use exec::{Dispatcher, DispatcherHandle, WorkerPool, WorkerPoolConfig};
pub use loader::{LoadObserver, QuerySource, ReloadCoordinator};
pub use query_args::{QueryArgs, QueryArgsBuilder};
pub use row::Row;
pub use schema::{SchemaRegistry, TableSchema, TableSchemaBuilder, ID_COLUMN};
pub use value::{Constraint, StorageType, StoreValue, TypeTag, ValueKind};
