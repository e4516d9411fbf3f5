use std::collections::HashMap;
use std::hash::Hash;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::record::Record;

/// Owned dynamic value tree. The walker consumes these on write and the
/// materializer produces them on read; `Record` impls convert between their
/// concrete shape and this form.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Bool(bool),
	I8(i8),
	I16(i16),
	I32(i32),
	I64(i64),
	F32(f32),
	F64(f64),
	Str(String),
	/// Name of an enum constant.
	Enum(String),
	Bytes(Vec<u8>),
	Uuid(Uuid),
	Date(NaiveDate),
	Time(NaiveTime),
	/// Instant adjusted to UTC.
	Timestamp(DateTime<Utc>),
	/// Wall-clock timestamp without a zone.
	LocalTimestamp(NaiveDateTime),
	Decimal(BigDecimal),
	Json(String),
	Bson(Vec<u8>),
	List(Vec<Value>),
	/// Entries in insertion order; keys are never null.
	Map(Vec<(Value, Value)>),
	/// Named fields in declaration order (or file order when produced by a
	/// dynamic-map read).
	Record(Vec<(String, Value)>),
	/// Pre-encoded self-describing variant.
	Variant { metadata: Vec<u8>, value: Vec<u8> },
}

impl Value {
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	pub fn record(fields: Vec<(String, Value)>) -> Value {
		Value::Record(fields)
	}

	/// Looks a field up by name in a record value.
	pub fn get(&self, name: &str) -> Option<&Value> {
		match self {
			Value::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
			_ => None,
		}
	}

	/// Turns a record value into a positional cursor over its fields.
	pub fn into_fields(self) -> Result<Fields> {
		match self {
			Value::Record(fields) => Ok(Fields { iter: fields.into_iter() }),
			other => Err(Error::mismatch("<record>", format!("expected a record value, got {}", other.kind_name()))),
		}
	}

	pub(crate) fn kind_name(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::I8(_) => "i8",
			Value::I16(_) => "i16",
			Value::I32(_) => "i32",
			Value::I64(_) => "i64",
			Value::F32(_) => "f32",
			Value::F64(_) => "f64",
			Value::Str(_) => "string",
			Value::Enum(_) => "enum",
			Value::Bytes(_) => "binary",
			Value::Uuid(_) => "uuid",
			Value::Date(_) => "date",
			Value::Time(_) => "time",
			Value::Timestamp(_) => "timestamp",
			Value::LocalTimestamp(_) => "local timestamp",
			Value::Decimal(_) => "decimal",
			Value::Json(_) => "json",
			Value::Bson(_) => "bson",
			Value::List(_) => "list",
			Value::Map(_) => "map",
			Value::Record(_) => "record",
			Value::Variant { .. } => "variant",
		}
	}
}

/// Positional cursor over the fields of a record value, in declaration
/// order. Keeps `Record::from_value` impls to a line per field.
pub struct Fields {
	iter: std::vec::IntoIter<(String, Value)>,
}

impl Fields {
	pub fn next_value(&mut self) -> Result<Value> {
		match self.iter.next() {
			Some((_, v)) => Ok(v),
			None => Err(Error::mismatch("<record>", "ran out of fields")),
		}
	}

	pub fn next<T: FromValue>(&mut self) -> Result<T> {
		T::from_value(self.next_value()?)
	}

	pub fn next_record<R: Record>(&mut self) -> Result<R> {
		R::from_value(self.next_value()?)
	}

	pub fn next_opt_record<R: Record>(&mut self) -> Result<Option<R>> {
		match self.next_value()? {
			Value::Null => Ok(None),
			v => R::from_value(v).map(Some),
		}
	}

	// Vec<u8> would collide with the generic list conversion, so binary
	// fields get their own accessors.
	pub fn next_bytes(&mut self) -> Result<Vec<u8>> {
		match self.next_value()? {
			Value::Bytes(v) | Value::Bson(v) => Ok(v),
			other => wrong_kind("binary", &other),
		}
	}

	pub fn next_opt_bytes(&mut self) -> Result<Option<Vec<u8>>> {
		match self.next_value()? {
			Value::Null => Ok(None),
			Value::Bytes(v) | Value::Bson(v) => Ok(Some(v)),
			other => wrong_kind("binary", &other),
		}
	}
}

fn wrong_kind<T>(expected: &'static str, got: &Value) -> Result<T> {
	Err(Error::mismatch("<value>", format!("expected {}, got {}", expected, got.kind_name())))
}

/// Conversion out of the dynamic value tree, for `from_value` glue.
pub trait FromValue: Sized {
	fn from_value(value: Value) -> Result<Self>;
}

impl FromValue for Value {
	fn from_value(value: Value) -> Result<Value> {
		Ok(value)
	}
}

impl FromValue for bool {
	fn from_value(value: Value) -> Result<bool> {
		match value {
			Value::Bool(v) => Ok(v),
			other => wrong_kind("bool", &other),
		}
	}
}

impl FromValue for i8 {
	fn from_value(value: Value) -> Result<i8> {
		match value {
			Value::I8(v) => Ok(v),
			other => wrong_kind("i8", &other),
		}
	}
}

impl FromValue for i16 {
	fn from_value(value: Value) -> Result<i16> {
		match value {
			Value::I16(v) => Ok(v),
			Value::I8(v) => Ok(v as i16),
			other => wrong_kind("i16", &other),
		}
	}
}

impl FromValue for i32 {
	fn from_value(value: Value) -> Result<i32> {
		match value {
			Value::I32(v) => Ok(v),
			Value::I16(v) => Ok(v as i32),
			Value::I8(v) => Ok(v as i32),
			other => wrong_kind("i32", &other),
		}
	}
}

impl FromValue for i64 {
	fn from_value(value: Value) -> Result<i64> {
		match value {
			Value::I64(v) => Ok(v),
			Value::I32(v) => Ok(v as i64),
			Value::I16(v) => Ok(v as i64),
			Value::I8(v) => Ok(v as i64),
			other => wrong_kind("i64", &other),
		}
	}
}

impl FromValue for f32 {
	fn from_value(value: Value) -> Result<f32> {
		match value {
			Value::F32(v) => Ok(v),
			other => wrong_kind("f32", &other),
		}
	}
}

impl FromValue for f64 {
	fn from_value(value: Value) -> Result<f64> {
		match value {
			Value::F64(v) => Ok(v),
			Value::F32(v) => Ok(v as f64),
			other => wrong_kind("f64", &other),
		}
	}
}

impl FromValue for String {
	fn from_value(value: Value) -> Result<String> {
		match value {
			Value::Str(v) | Value::Enum(v) | Value::Json(v) => Ok(v),
			other => wrong_kind("string", &other),
		}
	}
}

impl FromValue for Uuid {
	fn from_value(value: Value) -> Result<Uuid> {
		match value {
			Value::Uuid(v) => Ok(v),
			other => wrong_kind("uuid", &other),
		}
	}
}

impl FromValue for NaiveDate {
	fn from_value(value: Value) -> Result<NaiveDate> {
		match value {
			Value::Date(v) => Ok(v),
			other => wrong_kind("date", &other),
		}
	}
}

impl FromValue for NaiveTime {
	fn from_value(value: Value) -> Result<NaiveTime> {
		match value {
			Value::Time(v) => Ok(v),
			other => wrong_kind("time", &other),
		}
	}
}

impl FromValue for DateTime<Utc> {
	fn from_value(value: Value) -> Result<DateTime<Utc>> {
		match value {
			Value::Timestamp(v) => Ok(v),
			other => wrong_kind("timestamp", &other),
		}
	}
}

impl FromValue for NaiveDateTime {
	fn from_value(value: Value) -> Result<NaiveDateTime> {
		match value {
			Value::LocalTimestamp(v) => Ok(v),
			other => wrong_kind("local timestamp", &other),
		}
	}
}

impl FromValue for BigDecimal {
	fn from_value(value: Value) -> Result<BigDecimal> {
		match value {
			Value::Decimal(v) => Ok(v),
			other => wrong_kind("decimal", &other),
		}
	}
}

impl<T: FromValue> FromValue for Option<T> {
	fn from_value(value: Value) -> Result<Option<T>> {
		match value {
			Value::Null => Ok(None),
			v => T::from_value(v).map(Some),
		}
	}
}

impl<T: FromValue> FromValue for Vec<T> {
	fn from_value(value: Value) -> Result<Vec<T>> {
		match value {
			Value::List(items) => items.into_iter().map(T::from_value).collect(),
			other => wrong_kind("list", &other),
		}
	}
}

impl<K: FromValue + Eq + Hash, V: FromValue> FromValue for HashMap<K, V> {
	fn from_value(value: Value) -> Result<HashMap<K, V>> {
		match value {
			Value::Map(entries) => entries
				.into_iter()
				.map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
				.collect(),
			other => wrong_kind("map", &other),
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Value {
		Value::Bool(v)
	}
}

impl From<i8> for Value {
	fn from(v: i8) -> Value {
		Value::I8(v)
	}
}

impl From<i16> for Value {
	fn from(v: i16) -> Value {
		Value::I16(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Value {
		Value::I32(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Value {
		Value::I64(v)
	}
}

impl From<f32> for Value {
	fn from(v: f32) -> Value {
		Value::F32(v)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Value {
		Value::F64(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Value {
		Value::Str(v.to_string())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Value {
		Value::Str(v)
	}
}

impl From<Uuid> for Value {
	fn from(v: Uuid) -> Value {
		Value::Uuid(v)
	}
}

impl From<NaiveDate> for Value {
	fn from(v: NaiveDate) -> Value {
		Value::Date(v)
	}
}

impl From<NaiveTime> for Value {
	fn from(v: NaiveTime) -> Value {
		Value::Time(v)
	}
}

impl From<DateTime<Utc>> for Value {
	fn from(v: DateTime<Utc>) -> Value {
		Value::Timestamp(v)
	}
}

impl From<NaiveDateTime> for Value {
	fn from(v: NaiveDateTime) -> Value {
		Value::LocalTimestamp(v)
	}
}

impl From<BigDecimal> for Value {
	fn from(v: BigDecimal) -> Value {
		Value::Decimal(v)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(v: Option<T>) -> Value {
		match v {
			Some(v) => v.into(),
			None => Value::Null,
		}
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(v: Vec<T>) -> Value {
		Value::List(v.into_iter().map(Into::into).collect())
	}
}
