//! Decoding of the self-describing variant binary encoding (metadata
//! dictionary + value) into dynamic values. Covers the v1 encoding:
//! primitives, short and long strings, arrays and insertion-ordered
//! objects.

use bigdecimal::BigDecimal;
use byteorder::{ByteOrder, LittleEndian};
use num_bigint::BigInt;

use crate::convert;
use crate::error::{Error, Result};
use crate::options::TimeUnit;
use crate::value::Value;

const BASIC_PRIMITIVE: u8 = 0;
const BASIC_SHORT_STRING: u8 = 1;
const BASIC_OBJECT: u8 = 2;
const BASIC_ARRAY: u8 = 3;

fn malformed(detail: impl Into<String>) -> Error {
	Error::mismatch("<variant>", detail)
}

/// The metadata dictionary: version header plus the field-name table.
struct Metadata {
	names: Vec<String>,
}

impl Metadata {
	fn parse(bytes: &[u8]) -> Result<Metadata> {
		let header = *bytes.first().ok_or_else(|| malformed("empty metadata"))?;
		let version = header & 0x0F;
		if version != 1 {
			return Err(malformed(format!("unsupported metadata version {}", version)));
		}
		let offset_size = ((header >> 6) & 0x03) as usize + 1;

		let read_uint = |at: usize| -> Result<usize> {
			let slice = bytes
				.get(at..at + offset_size)
				.ok_or_else(|| malformed("metadata truncated"))?;
			Ok(LittleEndian::read_uint(slice, offset_size) as usize)
		};

		let dictionary_size = read_uint(1)?;
		let offsets_at = 1 + offset_size;
		let bytes_at = offsets_at + (dictionary_size + 1) * offset_size;

		let mut names = Vec::with_capacity(dictionary_size);
		for i in 0..dictionary_size {
			let start = read_uint(offsets_at + i * offset_size)?;
			let end = read_uint(offsets_at + (i + 1) * offset_size)?;
			let name = bytes
				.get(bytes_at + start..bytes_at + end)
				.ok_or_else(|| malformed("metadata string out of bounds"))?;
			names.push(
				std::str::from_utf8(name)
					.map_err(|_| malformed("metadata string is not utf-8"))?
					.to_string(),
			);
		}
		Ok(Metadata { names })
	}

	fn name(&self, id: usize) -> Result<&str> {
		self.names
			.get(id)
			.map(String::as_str)
			.ok_or_else(|| malformed(format!("field id {} outside the dictionary", id)))
	}
}

/// Decodes one variant column value into a dynamic value tree.
pub fn decode(metadata: &[u8], value: &[u8]) -> Result<Value> {
	let metadata = Metadata::parse(metadata)?;
	let (decoded, _) = decode_value(&metadata, value)?;
	Ok(decoded)
}

fn take<'a>(bytes: &'a [u8], at: usize, len: usize) -> Result<&'a [u8]> {
	bytes.get(at..at + len).ok_or_else(|| malformed("value truncated"))
}

/// Decodes the value at the start of `bytes`, returning it and the number
/// of bytes it occupied.
fn decode_value(metadata: &Metadata, bytes: &[u8]) -> Result<(Value, usize)> {
	let header = *bytes.first().ok_or_else(|| malformed("empty value"))?;
	let basic = header & 0x03;
	let detail = header >> 2;

	match basic {
		BASIC_PRIMITIVE => decode_primitive(detail, &bytes[1..]).map(|(v, n)| (v, n + 1)),
		BASIC_SHORT_STRING => {
			let len = detail as usize;
			let data = take(bytes, 1, len)?;
			let text = std::str::from_utf8(data).map_err(|_| malformed("string is not utf-8"))?;
			Ok((Value::Str(text.to_string()), 1 + len))
		}
		BASIC_OBJECT => decode_object(metadata, detail, bytes),
		BASIC_ARRAY => decode_array(metadata, detail, bytes),
		_ => unreachable!(),
	}
}

fn decode_primitive(type_id: u8, data: &[u8]) -> Result<(Value, usize)> {
	match type_id {
		0 => Ok((Value::Null, 0)),
		1 => Ok((Value::Bool(true), 0)),
		2 => Ok((Value::Bool(false), 0)),
		3 => Ok((Value::I8(take(data, 0, 1)?[0] as i8), 1)),
		4 => Ok((Value::I16(LittleEndian::read_i16(take(data, 0, 2)?)), 2)),
		5 => Ok((Value::I32(LittleEndian::read_i32(take(data, 0, 4)?)), 4)),
		6 => Ok((Value::I64(LittleEndian::read_i64(take(data, 0, 8)?)), 8)),
		7 => Ok((Value::F64(LittleEndian::read_f64(take(data, 0, 8)?)), 8)),
		8 => decode_decimal(data, 4),
		9 => decode_decimal(data, 8),
		10 => decode_decimal(data, 16),
		11 => {
			let days = LittleEndian::read_i32(take(data, 0, 4)?);
			Ok((Value::Date(convert::date_from_days(days)?), 4))
		}
		12 => decode_timestamp(data, TimeUnit::Micros, true),
		13 => decode_timestamp(data, TimeUnit::Micros, false),
		14 => Ok((Value::F32(LittleEndian::read_f32(take(data, 0, 4)?)), 4)),
		15 => decode_sized(data, false),
		16 => decode_sized(data, true),
		17 => {
			let micros = LittleEndian::read_i64(take(data, 0, 8)?);
			Ok((Value::Time(convert::time_of_day_from_unit(micros, TimeUnit::Micros)?), 8))
		}
		18 => decode_timestamp(data, TimeUnit::Nanos, true),
		19 => decode_timestamp(data, TimeUnit::Nanos, false),
		20 => Ok((Value::Uuid(convert::uuid_from_bytes(take(data, 0, 16)?)?), 16)),
		other => Err(malformed(format!("unknown primitive type id {}", other))),
	}
}

fn decode_decimal(data: &[u8], width: usize) -> Result<(Value, usize)> {
	let scale = take(data, 0, 1)?[0] as i64;
	let unscaled = BigInt::from_signed_bytes_le(take(data, 1, width)?);
	Ok((Value::Decimal(BigDecimal::new(unscaled, scale)), 1 + width))
}

fn decode_timestamp(data: &[u8], unit: TimeUnit, tz: bool) -> Result<(Value, usize)> {
	let raw = LittleEndian::read_i64(take(data, 0, 8)?);
	let instant = convert::timestamp_from_unit(raw, unit)?;
	let value = if tz { Value::Timestamp(instant) } else { Value::LocalTimestamp(instant.naive_utc()) };
	Ok((value, 8))
}

/// Length-prefixed binary or string.
fn decode_sized(data: &[u8], utf8: bool) -> Result<(Value, usize)> {
	let len = LittleEndian::read_u32(take(data, 0, 4)?) as usize;
	let payload = take(data, 4, len)?;
	let value = if utf8 {
		Value::Str(
			std::str::from_utf8(payload)
				.map_err(|_| malformed("string is not utf-8"))?
				.to_string(),
		)
	} else {
		Value::Bytes(payload.to_vec())
	};
	Ok((value, 4 + len))
}

fn decode_object(metadata: &Metadata, detail: u8, bytes: &[u8]) -> Result<(Value, usize)> {
	let is_large = (detail >> 4) & 0x01 == 1;
	let id_size = ((detail >> 2) & 0x03) as usize + 1;
	let offset_size = (detail & 0x03) as usize + 1;

	let mut at = 1;
	let count = if is_large {
		let c = LittleEndian::read_u32(take(bytes, at, 4)?) as usize;
		at += 4;
		c
	} else {
		let c = take(bytes, at, 1)?[0] as usize;
		at += 1;
		c
	};

	let ids_at = at;
	let offsets_at = ids_at + count * id_size;
	let values_at = offsets_at + (count + 1) * offset_size;

	let read_uint = |base: usize, index: usize, size: usize| -> Result<usize> {
		let slice = take(bytes, base + index * size, size)?;
		Ok(LittleEndian::read_uint(slice, size) as usize)
	};

	let mut fields = Vec::with_capacity(count);
	for i in 0..count {
		let id = read_uint(ids_at, i, id_size)?;
		let offset = read_uint(offsets_at, i, offset_size)?;
		let (value, _) = decode_value(metadata, &bytes[values_at + offset..])?;
		fields.push((metadata.name(id)?.to_string(), value));
	}
	let end = read_uint(offsets_at, count, offset_size)?;
	Ok((Value::Record(fields), values_at + end))
}

fn decode_array(metadata: &Metadata, detail: u8, bytes: &[u8]) -> Result<(Value, usize)> {
	let is_large = (detail >> 2) & 0x01 == 1;
	let offset_size = (detail & 0x03) as usize + 1;

	let mut at = 1;
	let count = if is_large {
		let c = LittleEndian::read_u32(take(bytes, at, 4)?) as usize;
		at += 4;
		c
	} else {
		let c = take(bytes, at, 1)?[0] as usize;
		at += 1;
		c
	};

	let offsets_at = at;
	let values_at = offsets_at + (count + 1) * offset_size;

	let read_offset = |index: usize| -> Result<usize> {
		let slice = take(bytes, offsets_at + index * offset_size, offset_size)?;
		Ok(LittleEndian::read_uint(slice, offset_size) as usize)
	};

	let mut items = Vec::with_capacity(count);
	for i in 0..count {
		let offset = read_offset(i)?;
		let (value, _) = decode_value(metadata, &bytes[values_at + offset..])?;
		items.push(value);
	}
	let end = read_offset(count)?;
	Ok((Value::List(items), values_at + end))
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Metadata with 1-byte offsets and the given dictionary strings.
	fn metadata(names: &[&str]) -> Vec<u8> {
		let mut out = vec![0x01, names.len() as u8];
		let mut offset = 0u8;
		out.push(offset);
		for name in names {
			offset += name.len() as u8;
			out.push(offset);
		}
		for name in names {
			out.extend_from_slice(name.as_bytes());
		}
		out
	}

	fn primitive(type_id: u8, payload: &[u8]) -> Vec<u8> {
		let mut out = vec![type_id << 2];
		out.extend_from_slice(payload);
		out
	}

	#[test]
	fn primitives() {
		let meta = metadata(&[]);
		assert_eq!(decode(&meta, &primitive(0, &[])).unwrap(), Value::Null);
		assert_eq!(decode(&meta, &primitive(1, &[])).unwrap(), Value::Bool(true));
		assert_eq!(decode(&meta, &primitive(2, &[])).unwrap(), Value::Bool(false));
		assert_eq!(decode(&meta, &primitive(3, &[0xFE])).unwrap(), Value::I8(-2));
		assert_eq!(
			decode(&meta, &primitive(6, &(-7i64).to_le_bytes())).unwrap(),
			Value::I64(-7)
		);
		assert_eq!(
			decode(&meta, &primitive(7, &1.5f64.to_le_bytes())).unwrap(),
			Value::F64(1.5)
		);
	}

	#[test]
	fn short_and_long_strings() {
		let meta = metadata(&[]);
		// short string: basic type 1, length in the header
		let mut short = vec![(5 << 2) | 1];
		short.extend_from_slice(b"hello");
		assert_eq!(decode(&meta, &short).unwrap(), Value::Str("hello".into()));

		let mut long = vec![16 << 2];
		long.extend_from_slice(&(3u32).to_le_bytes());
		long.extend_from_slice(b"abc");
		assert_eq!(decode(&meta, &long).unwrap(), Value::Str("abc".into()));
	}

	#[test]
	fn decimal_and_date() {
		let meta = metadata(&[]);
		let mut dec = vec![8 << 2, 2];
		dec.extend_from_slice(&(-1234i32).to_le_bytes());
		assert_eq!(
			decode(&meta, &dec).unwrap(),
			Value::Decimal(BigDecimal::new(BigInt::from(-1234), 2))
		);

		let date = primitive(11, &(19_000i32).to_le_bytes());
		assert_eq!(
			decode(&meta, &date).unwrap(),
			Value::Date(convert::date_from_days(19_000).unwrap())
		);
	}

	#[test]
	fn array_of_ints() {
		let meta = metadata(&[]);
		// [1i32, 2i32]: small array, 1-byte offsets
		let mut value = vec![BASIC_ARRAY, 2];
		value.extend_from_slice(&[0, 5, 10]);
		value.extend_from_slice(&primitive(5, &1i32.to_le_bytes()));
		value.extend_from_slice(&primitive(5, &2i32.to_le_bytes()));
		assert_eq!(
			decode(&meta, &value).unwrap(),
			Value::List(vec![Value::I32(1), Value::I32(2)])
		);
	}

	#[test]
	fn object_preserves_field_order() {
		let meta = metadata(&["a", "b"]);
		// {a: true, b: false}: small object, 1-byte ids and offsets
		let mut value = vec![BASIC_OBJECT, 2];
		value.extend_from_slice(&[0, 1]); // field ids
		value.extend_from_slice(&[0, 1, 2]); // offsets
		value.push(1 << 2); // true
		value.push(2 << 2); // false
		assert_eq!(
			decode(&meta, &value).unwrap(),
			Value::Record(vec![
				("a".into(), Value::Bool(true)),
				("b".into(), Value::Bool(false)),
			])
		);
	}
}
