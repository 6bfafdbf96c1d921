//! Column descriptors and value cells.
//!
//! [`ColumnSpec`] is the immutable flyweight descriptor: one per declared
//! column, owned by its [`TableSchema`](crate::schema::TableSchema) and
//! shared by every [`Column`] stamped from it. A `Column` is the per-row
//! value cell: a shared reference to its spec plus an opaque byte buffer
//! holding the encoded value.
//!
//! # Encoding
//!
//! Fixed-width types encode big-endian (`Bool` as a single `0x00`/`0x01`
//! byte, `Int16`/`Int32`/`Int64` and `Float`/`Double` as their byte width).
//! `Bytes` is a raw passthrough and `Utf8String` is the UTF-8 byte sequence
//! with no length prefix; length is implicit in the buffer size. Accessing a
//! value through the wrong type accessor is a [`DbError::TypeMismatch`],
//! never a silent coercion, and reading a cell before its first write is
//! [`DbError::UninitializedColumn`].

use std::sync::Arc;

use crate::error::DbError;
use crate::value::{Constraint, StorageType, StoreValue, TypeTag};

/// Immutable descriptor of one column: name, type tag, and constraints.
///
/// Holds no back-reference to its owning table; any table context a caller
/// needs is passed explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    name: String,
    type_tag: TypeTag,
    constraints: Vec<Constraint>,
}

impl ColumnSpec {
    /// Creates a spec with a trimmed, non-empty name.
    pub fn new(
        name: &str,
        type_tag: TypeTag,
        constraints: &[Constraint],
    ) -> Result<Self, DbError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DbError::InvalidSpec {
                reason: "column name trims to empty".to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            type_tag,
            constraints: constraints.to_vec(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    /// Storage type derived from the value type tag.
    pub fn storage_type(&self) -> StorageType {
        self.type_tag.storage_type()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_primary_key(&self) -> bool {
        self.constraints.contains(&Constraint::PrimaryKey)
    }

    /// Stamps out a fresh, unset value cell sharing this descriptor.
    pub fn make_column(self: &Arc<Self>) -> Column {
        Column {
            spec: Arc::clone(self),
            data: None,
        }
    }

    /// Column fragment of a CREATE statement: `<name> <TYPE>[ <CONSTRAINT>]*`.
    pub(crate) fn ddl_fragment(&self) -> String {
        let mut out = format!("{} {}", self.name, self.storage_type());
        for constraint in &self.constraints {
            out.push(' ');
            out.push_str(&constraint.to_string());
        }
        out
    }
}

/// One value cell of a row: a shared spec and an encoded value buffer.
#[derive(Debug, Clone)]
pub struct Column {
    spec: Arc<ColumnSpec>,
    data: Option<Vec<u8>>,
}

impl Column {
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn type_tag(&self) -> TypeTag {
        self.spec.type_tag()
    }

    pub fn storage_type(&self) -> StorageType {
        self.spec.storage_type()
    }

    pub fn constraints(&self) -> &[Constraint] {
        self.spec.constraints()
    }

    pub fn spec(&self) -> &Arc<ColumnSpec> {
        &self.spec
    }

    /// Whether a value has been written to this cell.
    pub fn is_set(&self) -> bool {
        self.data.is_some()
    }

    // setters

    pub fn set_bool(&mut self, value: bool) -> Result<(), DbError> {
        self.expect(TypeTag::Bool)?;
        self.data = Some(vec![if value { 0x01 } else { 0x00 }]);
        Ok(())
    }

    pub fn set_bytes(&mut self, value: impl Into<Vec<u8>>) -> Result<(), DbError> {
        self.expect(TypeTag::Bytes)?;
        self.data = Some(value.into());
        Ok(())
    }

    pub fn set_f64(&mut self, value: f64) -> Result<(), DbError> {
        self.expect(TypeTag::Double)?;
        self.data = Some(value.to_be_bytes().to_vec());
        Ok(())
    }

    pub fn set_f32(&mut self, value: f32) -> Result<(), DbError> {
        self.expect(TypeTag::Float)?;
        self.data = Some(value.to_be_bytes().to_vec());
        Ok(())
    }

    pub fn set_i32(&mut self, value: i32) -> Result<(), DbError> {
        self.expect(TypeTag::Int32)?;
        self.data = Some(value.to_be_bytes().to_vec());
        Ok(())
    }

    pub fn set_i64(&mut self, value: i64) -> Result<(), DbError> {
        self.expect(TypeTag::Int64)?;
        self.data = Some(value.to_be_bytes().to_vec());
        Ok(())
    }

    pub fn set_i16(&mut self, value: i16) -> Result<(), DbError> {
        self.expect(TypeTag::Int16)?;
        self.data = Some(value.to_be_bytes().to_vec());
        Ok(())
    }

    pub fn set_str(&mut self, value: &str) -> Result<(), DbError> {
        self.expect(TypeTag::Utf8String)?;
        self.data = Some(value.as_bytes().to_vec());
        Ok(())
    }

    // getters

    pub fn as_bool(&self) -> Result<bool, DbError> {
        let bytes: [u8; 1] = self.fixed(TypeTag::Bool)?;
        Ok(bytes[0] == 0x01)
    }

    pub fn as_bytes(&self) -> Result<&[u8], DbError> {
        self.expect(TypeTag::Bytes)?;
        self.buffer()
    }

    pub fn as_f64(&self) -> Result<f64, DbError> {
        Ok(f64::from_be_bytes(self.fixed(TypeTag::Double)?))
    }

    pub fn as_f32(&self) -> Result<f32, DbError> {
        Ok(f32::from_be_bytes(self.fixed(TypeTag::Float)?))
    }

    pub fn as_i32(&self) -> Result<i32, DbError> {
        Ok(i32::from_be_bytes(self.fixed(TypeTag::Int32)?))
    }

    pub fn as_i64(&self) -> Result<i64, DbError> {
        Ok(i64::from_be_bytes(self.fixed(TypeTag::Int64)?))
    }

    pub fn as_i16(&self) -> Result<i16, DbError> {
        Ok(i16::from_be_bytes(self.fixed(TypeTag::Int16)?))
    }

    pub fn as_str(&self) -> Result<&str, DbError> {
        self.expect(TypeTag::Utf8String)?;
        let bytes = self.buffer()?;
        std::str::from_utf8(bytes).map_err(|e| DbError::CorruptValue {
            column: self.name().to_string(),
            reason: format!("invalid UTF-8: {e}"),
        })
    }

    // store bridging, used by the access layer

    /// Writes a store-reported value into this cell.
    ///
    /// The caller is expected to have verified kind compatibility against the
    /// schema first; an incompatible value here means the buffer cannot be
    /// produced and is reported as corrupt.
    pub(crate) fn load_store_value(&mut self, value: &StoreValue) -> Result<(), DbError> {
        match (self.type_tag(), value) {
            (TypeTag::Bool, StoreValue::Integer(i)) => {
                self.data = Some(vec![if *i != 0 { 0x01 } else { 0x00 }]);
            }
            (TypeTag::Int16, StoreValue::Integer(i)) => {
                let narrowed = i16::try_from(*i).map_err(|_| self.out_of_range(*i))?;
                self.data = Some(narrowed.to_be_bytes().to_vec());
            }
            (TypeTag::Int32, StoreValue::Integer(i)) => {
                let narrowed = i32::try_from(*i).map_err(|_| self.out_of_range(*i))?;
                self.data = Some(narrowed.to_be_bytes().to_vec());
            }
            (TypeTag::Int64, StoreValue::Integer(i)) => {
                self.data = Some(i.to_be_bytes().to_vec());
            }
            (TypeTag::Float, StoreValue::Real(f)) => {
                let narrowed = *f as f32;
                if f.is_finite() && narrowed.is_infinite() {
                    return Err(DbError::CorruptValue {
                        column: self.name().to_string(),
                        reason: format!("real value {f} overflows a float column"),
                    });
                }
                self.data = Some(narrowed.to_be_bytes().to_vec());
            }
            (TypeTag::Double, StoreValue::Real(f)) => {
                self.data = Some(f.to_be_bytes().to_vec());
            }
            (TypeTag::Bytes, StoreValue::Blob(b)) => {
                self.data = Some(b.clone());
            }
            (TypeTag::Utf8String, StoreValue::Text(s)) => {
                self.data = Some(s.as_bytes().to_vec());
            }
            (tag, other) => {
                return Err(DbError::CorruptValue {
                    column: self.name().to_string(),
                    reason: format!("store reported a {} value for a {} column", other.kind(), tag),
                });
            }
        }
        Ok(())
    }

    /// Decodes this cell into the value shape the store consumes.
    pub(crate) fn to_store_value(&self) -> Result<StoreValue, DbError> {
        Ok(match self.type_tag() {
            TypeTag::Bool => StoreValue::Integer(if self.as_bool()? { 1 } else { 0 }),
            TypeTag::Int16 => StoreValue::Integer(i64::from(self.as_i16()?)),
            TypeTag::Int32 => StoreValue::Integer(i64::from(self.as_i32()?)),
            TypeTag::Int64 => StoreValue::Integer(self.as_i64()?),
            TypeTag::Float => StoreValue::Real(f64::from(self.as_f32()?)),
            TypeTag::Double => StoreValue::Real(self.as_f64()?),
            TypeTag::Bytes => StoreValue::Blob(self.as_bytes()?.to_vec()),
            TypeTag::Utf8String => StoreValue::Text(self.as_str()?.to_string()),
        })
    }

    fn out_of_range(&self, value: i64) -> DbError {
        DbError::CorruptValue {
            column: self.name().to_string(),
            reason: format!("integer {value} does not fit a {} column", self.type_tag()),
        }
    }

    // identity plumbing, used by Row on the schema-guaranteed Int64 column

    pub(crate) fn encode_i64(&mut self, value: i64) {
        debug_assert_eq!(self.type_tag(), TypeTag::Int64);
        self.data = Some(value.to_be_bytes().to_vec());
    }

    pub(crate) fn try_decode_i64(&self) -> Option<i64> {
        let bytes: [u8; 8] = self.data.as_deref()?.try_into().ok()?;
        Some(i64::from_be_bytes(bytes))
    }

    // internal helpers

    fn expect(&self, requested: TypeTag) -> Result<(), DbError> {
        let actual = self.type_tag();
        if actual != requested {
            return Err(DbError::TypeMismatch {
                column: self.name().to_string(),
                actual,
                requested,
            });
        }
        Ok(())
    }

    fn buffer(&self) -> Result<&[u8], DbError> {
        self.data
            .as_deref()
            .ok_or_else(|| DbError::UninitializedColumn {
                column: self.name().to_string(),
            })
    }

    fn fixed<const N: usize>(&self, requested: TypeTag) -> Result<[u8; N], DbError> {
        debug_assert_eq!(requested.encoded_width(), Some(N));
        self.expect(requested)?;
        let bytes = self.buffer()?;
        bytes.try_into().map_err(|_| DbError::CorruptValue {
            column: self.name().to_string(),
            reason: format!("{} bytes where {} were expected", bytes.len(), N),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cell(name: &str, tag: TypeTag) -> Column {
        let spec = Arc::new(ColumnSpec::new(name, tag, &[]).unwrap());
        spec.make_column()
    }

    #[test]
    fn spec_trims_name() {
        let spec = ColumnSpec::new("  FirstName  ", TypeTag::Utf8String, &[]).unwrap();
        assert_eq!(spec.name(), "FirstName");
    }

    #[test]
    fn spec_rejects_blank_name() {
        let err = ColumnSpec::new("   ", TypeTag::Int64, &[]).unwrap_err();
        assert!(matches!(err, DbError::InvalidSpec { .. }));
    }

    #[test]
    fn flyweight_cells_share_spec_but_not_buffers() {
        let spec = Arc::new(ColumnSpec::new("n", TypeTag::Int32, &[]).unwrap());
        let mut a = spec.make_column();
        let b = spec.make_column();
        a.set_i32(7).unwrap();
        assert!(a.is_set());
        assert!(!b.is_set());
        assert!(Arc::ptr_eq(a.spec(), b.spec()));
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(i64::MIN)]
    #[case(i64::MAX)]
    fn i64_round_trips(#[case] value: i64) {
        let mut c = cell("v", TypeTag::Int64);
        c.set_i64(value).unwrap();
        assert_eq!(c.as_i64().unwrap(), value);
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(i32::MIN)]
    #[case(i32::MAX)]
    fn i32_round_trips(#[case] value: i32) {
        let mut c = cell("v", TypeTag::Int32);
        c.set_i32(value).unwrap();
        assert_eq!(c.as_i32().unwrap(), value);
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(i16::MIN)]
    #[case(i16::MAX)]
    fn i16_round_trips(#[case] value: i16) {
        let mut c = cell("v", TypeTag::Int16);
        c.set_i16(value).unwrap();
        assert_eq!(c.as_i16().unwrap(), value);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-0.0)]
    #[case(f64::MIN)]
    #[case(f64::MAX)]
    #[case(f64::INFINITY)]
    #[case(f64::NEG_INFINITY)]
    fn f64_round_trips(#[case] value: f64) {
        let mut c = cell("v", TypeTag::Double);
        c.set_f64(value).unwrap();
        assert_eq!(c.as_f64().unwrap(), value);
    }

    #[test]
    fn f64_nan_round_trips_bitwise() {
        let mut c = cell("v", TypeTag::Double);
        c.set_f64(f64::NAN).unwrap();
        assert_eq!(c.as_f64().unwrap().to_bits(), f64::NAN.to_bits());
    }

    #[rstest]
    #[case(0.0)]
    #[case(f32::MIN)]
    #[case(f32::MAX)]
    #[case(f32::INFINITY)]
    fn f32_round_trips(#[case] value: f32) {
        let mut c = cell("v", TypeTag::Float);
        c.set_f32(value).unwrap();
        assert_eq!(c.as_f32().unwrap(), value);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn bool_round_trips(#[case] value: bool) {
        let mut c = cell("v", TypeTag::Bool);
        c.set_bool(value).unwrap();
        assert_eq!(c.as_bool().unwrap(), value);
    }

    #[rstest]
    #[case("")]
    #[case("hello")]
    #[case("héllo wörld")]
    #[case("日本語テキスト")]
    fn string_round_trips(#[case] value: &str) {
        let mut c = cell("v", TypeTag::Utf8String);
        c.set_str(value).unwrap();
        assert_eq!(c.as_str().unwrap(), value);
    }

    #[rstest]
    #[case(Vec::new())]
    #[case(vec![0x00])]
    #[case(vec![0xde, 0xad, 0xbe, 0xef])]
    fn bytes_round_trip(#[case] value: Vec<u8>) {
        let mut c = cell("v", TypeTag::Bytes);
        c.set_bytes(value.clone()).unwrap();
        assert_eq!(c.as_bytes().unwrap(), value.as_slice());
    }

    #[test]
    fn wrong_typed_set_is_a_type_mismatch() {
        let mut c = cell("v", TypeTag::Int32);
        let err = c.set_f64(1.5).unwrap_err();
        assert!(matches!(
            err,
            DbError::TypeMismatch {
                actual: TypeTag::Int32,
                requested: TypeTag::Double,
                ..
            }
        ));
    }

    #[test]
    fn wrong_typed_get_is_a_type_mismatch() {
        let mut c = cell("v", TypeTag::Int32);
        c.set_i32(9).unwrap();
        let err = c.as_f64().unwrap_err();
        assert!(matches!(err, DbError::TypeMismatch { .. }));
    }

    #[test]
    fn read_before_write_is_uninitialized() {
        let c = cell("v", TypeTag::Utf8String);
        let err = c.as_str().unwrap_err();
        assert!(matches!(err, DbError::UninitializedColumn { column } if column == "v"));
    }

    #[test]
    fn bool_encodes_as_single_byte() {
        let mut c = cell("v", TypeTag::Bool);
        c.set_bool(true).unwrap();
        let store = c.to_store_value().unwrap();
        assert_eq!(store, StoreValue::Integer(1));
    }

    #[test]
    fn store_values_load_through_the_kind_table() {
        let mut c = cell("v", TypeTag::Int16);
        c.load_store_value(&StoreValue::Integer(300)).unwrap();
        assert_eq!(c.as_i16().unwrap(), 300);

        let mut s = cell("s", TypeTag::Utf8String);
        s.load_store_value(&StoreValue::Text("abc".into())).unwrap();
        assert_eq!(s.as_str().unwrap(), "abc");
    }

    #[rstest]
    #[case(TypeTag::Int16, i64::from(i16::MAX) + 1)]
    #[case(TypeTag::Int16, i64::from(i16::MIN) - 1)]
    #[case(TypeTag::Int16, 70_000)]
    #[case(TypeTag::Int32, i64::from(i32::MAX) + 1)]
    #[case(TypeTag::Int32, i64::from(i32::MIN) - 1)]
    fn out_of_range_store_integer_is_rejected(#[case] tag: TypeTag, #[case] value: i64) {
        let mut c = cell("v", tag);
        let err = c.load_store_value(&StoreValue::Integer(value)).unwrap_err();
        assert!(matches!(err, DbError::CorruptValue { .. }));
        assert!(!c.is_set());
    }

    #[rstest]
    #[case(TypeTag::Int16, i64::from(i16::MAX))]
    #[case(TypeTag::Int16, i64::from(i16::MIN))]
    #[case(TypeTag::Int32, i64::from(i32::MAX))]
    #[case(TypeTag::Int32, i64::from(i32::MIN))]
    fn boundary_store_integer_still_loads(#[case] tag: TypeTag, #[case] value: i64) {
        let mut c = cell("v", tag);
        c.load_store_value(&StoreValue::Integer(value)).unwrap();
        assert_eq!(c.to_store_value().unwrap(), StoreValue::Integer(value));
    }

    #[test]
    fn overflowing_real_is_rejected_for_float_cells() {
        let mut c = cell("v", TypeTag::Float);
        let err = c.load_store_value(&StoreValue::Real(1e39)).unwrap_err();
        assert!(matches!(err, DbError::CorruptValue { .. }));
        // an infinity reported by the store is not an overflow
        let mut inf = cell("v", TypeTag::Float);
        inf.load_store_value(&StoreValue::Real(f64::INFINITY)).unwrap();
        assert_eq!(inf.as_f32().unwrap(), f32::INFINITY);
    }

    #[test]
    fn incompatible_store_value_is_rejected() {
        let mut c = cell("v", TypeTag::Int64);
        let err = c.load_store_value(&StoreValue::Text("7".into())).unwrap_err();
        assert!(matches!(err, DbError::CorruptValue { .. }));
    }

    #[test]
    fn uninitialized_cell_cannot_encode_for_the_store() {
        let c = cell("v", TypeTag::Double);
        let err = c.to_store_value().unwrap_err();
        assert!(matches!(err, DbError::UninitializedColumn { .. }));
    }
}
