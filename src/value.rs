//! Value typing for columns and the runtime value shapes a backing store
//! reports.
//!
//! Everything schema-related keys off [`TypeTag`]: the storage type a column
//! renders as in DDL, the width of its binary encoding, and which store value
//! kinds it accepts during decode are all derived from the tag in one place,
//! so the encode, decode, and verify paths cannot drift apart.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic kind of value a column holds.
///
/// Closed set; the mapping to [`StorageType`] is total and fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Bool,
    Bytes,
    Double,
    Float,
    Int32,
    Int64,
    Int16,
    Utf8String,
}

impl TypeTag {
    /// Storage type this tag renders as in schema statements.
    pub fn storage_type(self) -> StorageType {
        match self {
            TypeTag::Bool | TypeTag::Int32 | TypeTag::Int64 | TypeTag::Int16 => {
                StorageType::Integer
            }
            TypeTag::Double | TypeTag::Float => StorageType::Real,
            TypeTag::Bytes => StorageType::Blob,
            TypeTag::Utf8String => StorageType::Text,
        }
    }

    /// Whether a store-reported value of `kind` can be decoded into a column
    /// of this tag.
    ///
    /// Derived from the storage mapping: integer-kind store values are
    /// required for `Bool`/`Int32`/`Int64`/`Int16`, real for
    /// `Double`/`Float`, and so on.
    pub fn accepts(self, kind: ValueKind) -> bool {
        match self.storage_type() {
            StorageType::Integer => kind == ValueKind::Integer,
            StorageType::Real => kind == ValueKind::Real,
            StorageType::Blob => kind == ValueKind::Blob,
            StorageType::Text => kind == ValueKind::Text,
        }
    }

    /// Encoded width in bytes for fixed-width tags; `None` for the
    /// variable-width `Bytes` and `Utf8String`.
    pub(crate) fn encoded_width(self) -> Option<usize> {
        match self {
            TypeTag::Bool => Some(1),
            TypeTag::Int16 => Some(2),
            TypeTag::Int32 | TypeTag::Float => Some(4),
            TypeTag::Int64 | TypeTag::Double => Some(8),
            TypeTag::Bytes | TypeTag::Utf8String => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Bool => "bool",
            TypeTag::Bytes => "bytes",
            TypeTag::Double => "double",
            TypeTag::Float => "float",
            TypeTag::Int32 => "int32",
            TypeTag::Int64 => "int64",
            TypeTag::Int16 => "int16",
            TypeTag::Utf8String => "string",
        };
        f.write_str(name)
    }
}

/// Storage type a column occupies in the backing store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageType {
    Integer,
    Real,
    Blob,
    Text,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            StorageType::Integer => "INTEGER",
            StorageType::Real => "REAL",
            StorageType::Blob => "BLOB",
            StorageType::Text => "TEXT",
        };
        f.write_str(word)
    }
}

/// Column constraint, rendered as a suffix in schema statements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constraint {
    PrimaryKey,
    NotNull,
    Unique,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Constraint::PrimaryKey => "PRIMARY KEY",
            Constraint::NotNull => "NOT NULL",
            Constraint::Unique => "UNIQUE",
        };
        f.write_str(word)
    }
}

/// Raw field value as reported by (or handed to) a backing store.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum StoreValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl StoreValue {
    /// Runtime kind of this value, used for schema compatibility checks.
    pub fn kind(&self) -> ValueKind {
        match self {
            StoreValue::Null => ValueKind::Null,
            StoreValue::Integer(_) => ValueKind::Integer,
            StoreValue::Real(_) => ValueKind::Real,
            StoreValue::Text(_) => ValueKind::Text,
            StoreValue::Blob(_) => ValueKind::Blob,
        }
    }
}

/// Kind discriminant of a [`StoreValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Integer,
    Real,
    Text,
    Blob,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Integer => "integer",
            ValueKind::Real => "real",
            ValueKind::Text => "text",
            ValueKind::Blob => "blob",
        };
        f.write_str(name)
    }
}
