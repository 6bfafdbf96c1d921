//! Error taxonomy for the schema, codec, and loader layers.
//!
//! Schema and type errors (`TypeMismatch`, `InvalidSpec`, `UnknownColumn`,
//! `UninitializedColumn`) indicate a contract violation by the caller and are
//! raised at construction or access time, before any store interaction.
//! `SchemaMismatch` and `Store` surface from the decode and execution paths
//! and carry enough context to diagnose a disagreement with the backing
//! store.

use thiserror::Error;

use crate::value::TypeTag;

#[derive(Error, Debug)]
pub enum DbError {
    /// A column value was set or read through an accessor of the wrong type.
    #[error("column '{column}' holds {actual} values; cannot access as {requested}")]
    TypeMismatch {
        column: String,
        actual: TypeTag,
        requested: TypeTag,
    },

    /// A column or table declaration is malformed.
    #[error("invalid schema declaration: {reason}")]
    InvalidSpec { reason: String },

    /// A column was read before any value was written to it.
    #[error("column '{column}' was read before any value was set")]
    UninitializedColumn { column: String },

    /// The named column is not part of the table's schema.
    #[error("no column named '{name}' in table '{table}'")]
    UnknownColumn { table: String, name: String },

    /// The shape the store reported disagrees with the declared schema.
    ///
    /// Carries both column-name sets for diagnosis.
    #[error(
        "store shape disagrees with schema for table '{table}': \
         store columns [{}]; schema columns [{}]",
        .store_columns.join(", "),
        .schema_columns.join(", ")
    )]
    SchemaMismatch {
        table: String,
        store_columns: Vec<String>,
        schema_columns: Vec<String>,
    },

    /// An operation requiring a persisted identity was invoked on a row with
    /// an absent identity.
    #[error("operation on table '{table}' requires rows with a persisted identity")]
    IdentityRequired { table: String },

    /// A column's value buffer does not decode under its declared type.
    #[error("column '{column}' holds a malformed value buffer: {reason}")]
    CorruptValue { column: String, reason: String },

    /// The backing store failed to execute an operation.
    #[error("store operation failed: {message}")]
    Store { message: String },
}

impl DbError {
    /// Wraps a backing-store failure message.
    pub fn store(message: impl Into<String>) -> Self {
        DbError::Store {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mismatch_names_both_column_sets() {
        let err = DbError::SchemaMismatch {
            table: "Names".to_string(),
            store_columns: vec!["_id".to_string(), "FirstName".to_string()],
            schema_columns: vec![
                "_id".to_string(),
                "FirstName".to_string(),
                "LastName".to_string(),
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("store columns [_id, FirstName]"));
        assert!(rendered.contains("schema columns [_id, FirstName, LastName]"));
    }

    #[test]
    fn type_mismatch_names_both_tags() {
        let err = DbError::TypeMismatch {
            column: "age".to_string(),
            actual: TypeTag::Int32,
            requested: TypeTag::Double,
        };
        assert_eq!(
            err.to_string(),
            "column 'age' holds int32 values; cannot access as double"
        );
    }
}
