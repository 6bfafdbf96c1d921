//! Shared test fixtures: the `Names` table used across the test suite.
//!
//! Available to downstream crates behind the `test-utils` feature.

use std::sync::Arc;

use crate::row::Row;
use crate::schema::{TableSchema, ID_COLUMN};
use crate::value::{Constraint, TypeTag};

pub const NAMES_TABLE: &str = "Names";
pub const FIRST: &str = "FirstName";
pub const LAST: &str = "LastName";

/// `Names (_id INTEGER PRIMARY KEY,FirstName TEXT NOT NULL,LastName TEXT NOT NULL)`
pub fn names_schema() -> Arc<TableSchema> {
    TableSchema::builder(NAMES_TABLE)
        .column(ID_COLUMN, TypeTag::Int64, &[Constraint::PrimaryKey])
        .column(FIRST, TypeTag::Utf8String, &[Constraint::NotNull])
        .column(LAST, TypeTag::Utf8String, &[Constraint::NotNull])
        .build()
        .expect("names fixture schema is valid")
}

/// A `Names` row with both name parts set and no identity yet.
pub fn name_row(first: &str, last: &str) -> Row {
    let schema = names_schema();
    let mut row = schema.make_row();
    row.column_mut(FIRST)
        .and_then(|c| c.set_str(first))
        .expect("first column");
    row.column_mut(LAST)
        .and_then(|c| c.set_str(last))
        .expect("last column");
    row
}

/// Plain domain view of a `Names` row, for tests that map both ways.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Name {
    pub id: Option<i64>,
    pub first: String,
    pub last: String,
}

impl Name {
    pub fn from_row(row: &Row) -> Name {
        Name {
            id: row.id(),
            first: row
                .column(FIRST)
                .and_then(|c| c.as_str().map(str::to_string))
                .expect("first column"),
            last: row
                .column(LAST)
                .and_then(|c| c.as_str().map(str::to_string))
                .expect("last column"),
        }
    }

    pub fn to_row(&self) -> Row {
        let mut row = name_row(&self.first, &self.last);
        row.set_id(self.id);
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_fixture_generates_the_expected_ddl() {
        assert_eq!(
            names_schema().create_statement(),
            "CREATE TABLE IF NOT EXISTS Names (_id INTEGER PRIMARY KEY,FirstName TEXT NOT NULL,LastName TEXT NOT NULL)"
        );
    }

    #[test]
    fn name_maps_both_ways() {
        let name = Name {
            id: Some(3),
            first: "Ada".to_string(),
            last: "Lovelace".to_string(),
        };
        assert_eq!(Name::from_row(&name.to_row()), name);
    }
}
