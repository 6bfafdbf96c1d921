//! Table declarations and the process-wide schema registry.
//!
//! A [`TableSchema`] is the full declaration of one table: its name and an
//! ordered list of [`ColumnSpec`]s. It is built once at process start,
//! validated, and shared read-only behind an `Arc`; statement generation and
//! row stamping never mutate it. The [`SchemaRegistry`] replaces implicit
//! static singletons: construct it during initialization, register every
//! table, then hand out shared references.

use std::collections::HashMap;
use std::sync::Arc;

use crate::column::ColumnSpec;
use crate::error::DbError;
use crate::row::Row;
use crate::value::{Constraint, TypeTag};

/// Conventional name of the row-identity column.
pub const ID_COLUMN: &str = "_id";

/// Declaration of one table: name plus ordered, keyed column specs.
#[derive(Debug)]
pub struct TableSchema {
    name: String,
    specs: Vec<Arc<ColumnSpec>>,
    index: HashMap<String, usize>,
    identity: usize,
}

impl TableSchema {
    /// Starts a declaration for the named table.
    pub fn builder(name: &str) -> TableSchemaBuilder {
        TableSchemaBuilder {
            name: name.trim().to_string(),
            columns: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column names in declaration order; used to build projections.
    pub fn column_names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name()).collect()
    }

    pub fn column_spec(&self, name: &str) -> Option<&Arc<ColumnSpec>> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    pub fn specs(&self) -> &[Arc<ColumnSpec>] {
        &self.specs
    }

    /// The column acting as the row identity.
    pub fn identity_column(&self) -> &Arc<ColumnSpec> {
        &self.specs[self.identity]
    }

    pub(crate) fn identity_index(&self) -> usize {
        self.identity
    }

    pub(crate) fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Stamps out a row with every column present and unset, identity absent.
    pub fn make_row(self: &Arc<Self>) -> Row {
        Row::new(Arc::clone(self))
    }

    /// Deterministic CREATE statement: columns in declaration order, the
    /// identity column rendering `PRIMARY KEY` exactly once.
    pub fn create_statement(&self) -> String {
        let columns: Vec<String> = self.specs.iter().map(|s| s.ddl_fragment()).collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.name,
            columns.join(",")
        )
    }

    /// Deterministic DROP statement.
    pub fn drop_statement(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.name)
    }
}

/// Accumulates column declarations for [`TableSchema::builder`].
pub struct TableSchemaBuilder {
    name: String,
    columns: Vec<(String, TypeTag, Vec<Constraint>)>,
}

impl TableSchemaBuilder {
    /// Declares the next column. Order of calls is the schema's declared
    /// order.
    pub fn column(mut self, name: &str, type_tag: TypeTag, constraints: &[Constraint]) -> Self {
        self.columns
            .push((name.to_string(), type_tag, constraints.to_vec()));
        self
    }

    /// Validates the declaration and builds the shared schema.
    ///
    /// Fails with [`DbError::InvalidSpec`] when the table name is blank, a
    /// column name is blank or duplicated, or the declaration does not
    /// contain exactly one `PrimaryKey` column of type `Int64` (the row
    /// identity).
    pub fn build(self) -> Result<Arc<TableSchema>, DbError> {
        if self.name.is_empty() {
            return Err(DbError::InvalidSpec {
                reason: "table name trims to empty".to_string(),
            });
        }

        let mut specs = Vec::with_capacity(self.columns.len());
        let mut index = HashMap::with_capacity(self.columns.len());
        let mut identity = None;

        for (name, type_tag, constraints) in &self.columns {
            let spec = Arc::new(ColumnSpec::new(name, *type_tag, constraints)?);
            if index
                .insert(spec.name().to_string(), specs.len())
                .is_some()
            {
                return Err(DbError::InvalidSpec {
                    reason: format!(
                        "duplicate column '{}' in table '{}'",
                        spec.name(),
                        self.name
                    ),
                });
            }
            if spec.is_primary_key() {
                if identity.is_some() {
                    return Err(DbError::InvalidSpec {
                        reason: format!("table '{}' declares more than one primary key", self.name),
                    });
                }
                if spec.type_tag() != TypeTag::Int64 {
                    return Err(DbError::InvalidSpec {
                        reason: format!(
                            "identity column '{}' of table '{}' must be int64",
                            spec.name(),
                            self.name
                        ),
                    });
                }
                identity = Some(specs.len());
            }
            specs.push(spec);
        }

        let identity = identity.ok_or_else(|| DbError::InvalidSpec {
            reason: format!("table '{}' declares no identity column", self.name),
        })?;

        Ok(Arc::new(TableSchema {
            name: self.name,
            specs,
            index,
            identity,
        }))
    }
}

/// Registry of every table schema in the process.
///
/// Built once during initialization and read-only afterwards; share it as
/// `Arc<SchemaRegistry>`; lookups never lock.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, Arc<TableSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema, rejecting duplicate table names.
    pub fn register(&mut self, schema: Arc<TableSchema>) -> Result<(), DbError> {
        let name = schema.name().to_string();
        if self.tables.contains_key(&name) {
            return Err(DbError::InvalidSpec {
                reason: format!("table '{name}' is already registered"),
            });
        }
        self.tables.insert(name, schema);
        Ok(())
    }

    pub fn get(&self, table: &str) -> Option<&Arc<TableSchema>> {
        self.tables.get(table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableSchema>> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names_schema() -> Arc<TableSchema> {
        TableSchema::builder("Names")
            .column(ID_COLUMN, TypeTag::Int64, &[Constraint::PrimaryKey])
            .column("first", TypeTag::Utf8String, &[Constraint::NotNull])
            .column("last", TypeTag::Utf8String, &[Constraint::NotNull])
            .build()
            .unwrap()
    }

    #[test]
    fn create_statement_is_exact() {
        assert_eq!(
            names_schema().create_statement(),
            "CREATE TABLE IF NOT EXISTS Names (_id INTEGER PRIMARY KEY,first TEXT NOT NULL,last TEXT NOT NULL)"
        );
    }

    #[test]
    fn drop_statement_is_exact() {
        assert_eq!(names_schema().drop_statement(), "DROP TABLE IF EXISTS Names");
    }

    #[test]
    fn column_names_preserve_declaration_order() {
        assert_eq!(names_schema().column_names(), vec![ID_COLUMN, "first", "last"]);
    }

    #[test]
    fn unique_constraint_renders_after_type() {
        let schema = TableSchema::builder("Users")
            .column(ID_COLUMN, TypeTag::Int64, &[Constraint::PrimaryKey])
            .column(
                "email",
                TypeTag::Utf8String,
                &[Constraint::NotNull, Constraint::Unique],
            )
            .build()
            .unwrap();
        assert_eq!(
            schema.create_statement(),
            "CREATE TABLE IF NOT EXISTS Users (_id INTEGER PRIMARY KEY,email TEXT NOT NULL UNIQUE)"
        );
    }

    #[test]
    fn missing_identity_is_invalid() {
        let err = TableSchema::builder("T")
            .column("a", TypeTag::Int32, &[])
            .build()
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidSpec { .. }));
    }

    #[test]
    fn two_primary_keys_are_invalid() {
        let err = TableSchema::builder("T")
            .column("a", TypeTag::Int64, &[Constraint::PrimaryKey])
            .column("b", TypeTag::Int64, &[Constraint::PrimaryKey])
            .build()
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidSpec { .. }));
    }

    #[test]
    fn non_int64_identity_is_invalid() {
        let err = TableSchema::builder("T")
            .column("a", TypeTag::Utf8String, &[Constraint::PrimaryKey])
            .build()
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidSpec { .. }));
    }

    #[test]
    fn duplicate_column_is_invalid() {
        let err = TableSchema::builder("T")
            .column(ID_COLUMN, TypeTag::Int64, &[Constraint::PrimaryKey])
            .column("a", TypeTag::Int32, &[])
            .column("a", TypeTag::Int32, &[])
            .build()
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidSpec { .. }));
    }

    #[test]
    fn blank_table_name_is_invalid() {
        let err = TableSchema::builder("  ")
            .column(ID_COLUMN, TypeTag::Int64, &[Constraint::PrimaryKey])
            .build()
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidSpec { .. }));
    }

    #[test]
    fn registry_rejects_duplicate_tables() {
        let mut registry = SchemaRegistry::new();
        registry.register(names_schema()).unwrap();
        let err = registry.register(names_schema()).unwrap_err();
        assert!(matches!(err, DbError::InvalidSpec { .. }));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("Names").is_some());
        assert!(registry.get("Other").is_none());
    }
}
