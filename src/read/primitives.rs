//! Per-primitive event converters: each one accepts the physical-level
//! events of its column, decodes them to a `Value` and hands the result to
//! the owning group when the row boundary closes. Dictionary-encoded columns
//! are pre-decoded once and served by id afterwards.

use crate::convert;
use crate::error::{Error, Result};
use crate::schema_filter::DecodePlan;
use crate::value::Value;

/// Decoded dictionary page of a column, as an embedding engine delivers it.
#[derive(Debug, Clone)]
pub enum Dictionary {
	I32(Vec<i32>),
	I64(Vec<i64>),
	F32(Vec<f32>),
	F64(Vec<f64>),
	Bytes(Vec<Vec<u8>>),
}

#[derive(Debug)]
pub struct PrimitiveConverter {
	plan: DecodePlan,
	path: String,
	cache: Vec<Value>,
	out: Option<Value>,
}

impl PrimitiveConverter {
	pub(crate) fn new(plan: DecodePlan, path: String) -> PrimitiveConverter {
		PrimitiveConverter { plan, path, cache: Vec::new(), out: None }
	}

	pub(crate) fn take(&mut self) -> Option<Value> {
		self.out.take()
	}

	fn wrong_event(&self, event: &'static str) -> Error {
		Error::mismatch(&self.path, format!("converter cannot accept {} events", event))
	}

	pub fn add_bool(&mut self, v: bool) -> Result<()> {
		match self.plan {
			DecodePlan::Bool => {
				self.out = Some(Value::Bool(v));
				Ok(())
			}
			_ => Err(self.wrong_event("boolean")),
		}
	}

	pub fn add_i32(&mut self, v: i32) -> Result<()> {
		let value = self.decode_i32(v)?;
		self.out = Some(value);
		Ok(())
	}

	fn decode_i32(&self, v: i32) -> Result<Value> {
		match &self.plan {
			DecodePlan::Int { bits, src_wide: false } => Ok(narrow_int(v as i64, *bits)),
			DecodePlan::Date => Ok(Value::Date(convert::date_from_days(v)?)),
			DecodePlan::Time { unit } => {
				Ok(Value::Time(convert::time_of_day_from_unit(v as i64, *unit)?))
			}
			DecodePlan::Decimal { scale } => {
				Ok(Value::Decimal(convert::decimal_from_unscaled_i64(v as i64, *scale as i64)))
			}
			_ => Err(self.wrong_event("int32")),
		}
	}

	pub fn add_i64(&mut self, v: i64) -> Result<()> {
		let value = self.decode_i64(v)?;
		self.out = Some(value);
		Ok(())
	}

	fn decode_i64(&self, v: i64) -> Result<Value> {
		match &self.plan {
			DecodePlan::Int { bits, src_wide: true } => Ok(narrow_int(v, *bits)),
			DecodePlan::Time { unit } => Ok(Value::Time(convert::time_of_day_from_unit(v, *unit)?)),
			DecodePlan::Timestamp { unit, utc } => {
				let instant = convert::timestamp_from_unit(v, *unit)?;
				Ok(if *utc {
					Value::Timestamp(instant)
				} else {
					Value::LocalTimestamp(instant.naive_utc())
				})
			}
			DecodePlan::Decimal { scale } => {
				Ok(Value::Decimal(convert::decimal_from_unscaled_i64(v, *scale as i64)))
			}
			_ => Err(self.wrong_event("int64")),
		}
	}

	pub fn add_f32(&mut self, v: f32) -> Result<()> {
		match &self.plan {
			DecodePlan::Float { wide: false, src_wide: false } => {
				self.out = Some(Value::F32(v));
				Ok(())
			}
			DecodePlan::Float { wide: true, src_wide: false } => {
				self.out = Some(Value::F64(v as f64));
				Ok(())
			}
			_ => Err(self.wrong_event("float")),
		}
	}

	pub fn add_f64(&mut self, v: f64) -> Result<()> {
		match &self.plan {
			DecodePlan::Float { wide: true, src_wide: true } => {
				self.out = Some(Value::F64(v));
				Ok(())
			}
			// explicit narrowing, allowed by the projection
			DecodePlan::Float { wide: false, src_wide: true } => {
				self.out = Some(Value::F32(v as f32));
				Ok(())
			}
			_ => Err(self.wrong_event("double")),
		}
	}

	pub fn add_binary(&mut self, v: &[u8]) -> Result<()> {
		let value = self.decode_binary(v)?;
		self.out = Some(value);
		Ok(())
	}

	fn decode_binary(&self, v: &[u8]) -> Result<Value> {
		match &self.plan {
			DecodePlan::Utf8 => Ok(Value::Str(self.utf8(v)?)),
			DecodePlan::Json => Ok(Value::Json(self.utf8(v)?)),
			DecodePlan::Enum { constants } => {
				let name = self.utf8(v)?;
				if let Some(constants) = constants {
					convert::check_enum_constant(constants, &name, &self.path)?;
				}
				Ok(Value::Enum(name))
			}
			DecodePlan::Bytes => Ok(Value::Bytes(v.to_vec())),
			DecodePlan::Bson => Ok(Value::Bson(v.to_vec())),
			DecodePlan::Uuid => Ok(Value::Uuid(convert::uuid_from_bytes(v)?)),
			DecodePlan::UuidToStr => Ok(Value::Str(convert::uuid_from_bytes(v)?.to_string())),
			DecodePlan::UuidFromStr => {
				let text = self.utf8(v)?;
				uuid::Uuid::parse_str(&text)
					.map(Value::Uuid)
					.map_err(|e| Error::mismatch(&self.path, format!("invalid uuid string: {}", e)))
			}
			DecodePlan::Decimal { scale } => {
				Ok(Value::Decimal(convert::decimal_from_unscaled_bytes(v, *scale as i64)))
			}
			_ => Err(self.wrong_event("binary")),
		}
	}

	fn utf8(&self, v: &[u8]) -> Result<String> {
		String::from_utf8(v.to_vec())
			.map_err(|_| Error::mismatch(&self.path, "column data is not valid utf-8"))
	}

	/// Whether this converter caches dictionary pages; engines fall through
	/// to the raw path for the rest.
	pub fn has_dictionary_support(&self) -> bool {
		matches!(
			self.plan,
			DecodePlan::Utf8
				| DecodePlan::Json
				| DecodePlan::Enum { .. }
				| DecodePlan::Bytes
				| DecodePlan::Bson
				| DecodePlan::Uuid
				| DecodePlan::UuidToStr
				| DecodePlan::UuidFromStr
				| DecodePlan::Date
				| DecodePlan::Time { .. }
				| DecodePlan::Timestamp { .. }
				| DecodePlan::Decimal { .. }
		)
	}

	/// Pre-decodes every dictionary entry; later values arrive as ids.
	/// Delivered once per column chunk before any value event.
	pub fn set_dictionary(&mut self, dictionary: &Dictionary) -> Result<()> {
		self.cache.clear();
		match dictionary {
			Dictionary::I32(entries) => {
				for &v in entries {
					self.cache.push(self.decode_i32(v)?);
				}
			}
			Dictionary::I64(entries) => {
				for &v in entries {
					self.cache.push(self.decode_i64(v)?);
				}
			}
			Dictionary::F32(entries) => {
				for &v in entries {
					self.cache.push(Value::F32(v));
				}
			}
			Dictionary::F64(entries) => {
				for &v in entries {
					self.cache.push(Value::F64(v));
				}
			}
			Dictionary::Bytes(entries) => {
				for v in entries {
					self.cache.push(self.decode_binary(v)?);
				}
			}
		}
		Ok(())
	}

	pub fn add_from_dictionary(&mut self, id: usize) -> Result<()> {
		match self.cache.get(id) {
			Some(value) => {
				self.out = Some(value.clone());
				Ok(())
			}
			None => Err(Error::mismatch(
				&self.path,
				format!("dictionary id {} out of range ({} entries)", id, self.cache.len()),
			)),
		}
	}
}

fn narrow_int(v: i64, bits: u8) -> Value {
	match bits {
		8 => Value::I8(v as i8),
		16 => Value::I16(v as i16),
		32 => Value::I32(v as i32),
		_ => Value::I64(v),
	}
}
