//! Per-leaf column buffers. Each stripe accumulates the (value, definition
//! level, repetition level) triplets of one column for the current row group
//! and flushes them through the serialized column writer in one batch.

use bytes::Bytes;
use parquet::basic::Type as PhysicalType;
use parquet::data_type::{
	BoolType, ByteArray, ByteArrayType, DoubleType, FixedLenByteArray, FixedLenByteArrayType,
	FloatType, Int32Type, Int64Type,
};
use parquet::file::writer::SerializedColumnWriter;

use crate::error::Result;
use crate::layout::LeafInfo;

use super::levels::RepetitionTracker;

/// Physical storage of buffered values. Byte arrays are concatenated into a
/// single growing buffer and sliced apart only at flush time.
#[derive(Debug)]
enum StripeValues {
	Bool(Vec<bool>),
	I32(Vec<i32>),
	I64(Vec<i64>),
	F32(Vec<f32>),
	F64(Vec<f64>),
	Bytes { buffer: Vec<u8>, offsets: Vec<usize> },
	Fixed { buffer: Vec<u8>, length: usize },
}

#[derive(Debug)]
pub(crate) struct ColumnStripe {
	max_dl: i16,
	max_rl: i16,
	values: StripeValues,
	dls: Vec<i16>,
	rls: Vec<i16>,
	tracker: RepetitionTracker,
	raw_bytes: usize,
}

impl ColumnStripe {
	pub fn new(leaf: &LeafInfo, max_dl: i16, max_rl: i16) -> ColumnStripe {
		let values = match leaf.physical {
			PhysicalType::BOOLEAN => StripeValues::Bool(Vec::new()),
			PhysicalType::INT32 => StripeValues::I32(Vec::new()),
			PhysicalType::INT64 => StripeValues::I64(Vec::new()),
			PhysicalType::FLOAT => StripeValues::F32(Vec::new()),
			PhysicalType::DOUBLE => StripeValues::F64(Vec::new()),
			PhysicalType::BYTE_ARRAY => StripeValues::Bytes { buffer: Vec::new(), offsets: Vec::new() },
			PhysicalType::FIXED_LEN_BYTE_ARRAY => {
				StripeValues::Fixed { buffer: Vec::new(), length: leaf.type_length.max(0) as usize }
			}
			PhysicalType::INT96 => unreachable!("INT96 is never emitted by the schema builder"),
		};
		ColumnStripe {
			max_dl,
			max_rl,
			values,
			dls: Vec::new(),
			rls: Vec::new(),
			tracker: RepetitionTracker::new(max_rl),
			raw_bytes: 0,
		}
	}

	fn push_levels(&mut self, dl: i16, path: &[usize]) {
		if self.max_dl > 0 {
			self.dls.push(dl);
			self.raw_bytes += 2;
		}
		if self.max_rl > 0 {
			let rl = self.tracker.observe(path);
			self.rls.push(rl);
			self.raw_bytes += 2;
		}
	}

	pub fn push_null(&mut self, dl: i16, path: &[usize]) {
		debug_assert!(dl < self.max_dl);
		self.push_levels(dl, path);
	}

	pub fn push_bool(&mut self, v: bool, path: &[usize]) {
		match &mut self.values {
			StripeValues::Bool(column) => column.push(v),
			_ => unreachable!("boolean value on a non-boolean column"),
		}
		self.raw_bytes += 1;
		self.push_levels(self.max_dl, path);
	}

	pub fn push_i32(&mut self, v: i32, path: &[usize]) {
		match &mut self.values {
			StripeValues::I32(column) => column.push(v),
			_ => unreachable!("int32 value on a non-int32 column"),
		}
		self.raw_bytes += 4;
		self.push_levels(self.max_dl, path);
	}

	pub fn push_i64(&mut self, v: i64, path: &[usize]) {
		match &mut self.values {
			StripeValues::I64(column) => column.push(v),
			_ => unreachable!("int64 value on a non-int64 column"),
		}
		self.raw_bytes += 8;
		self.push_levels(self.max_dl, path);
	}

	pub fn push_f32(&mut self, v: f32, path: &[usize]) {
		match &mut self.values {
			StripeValues::F32(column) => column.push(v),
			_ => unreachable!("float value on a non-float column"),
		}
		self.raw_bytes += 4;
		self.push_levels(self.max_dl, path);
	}

	pub fn push_f64(&mut self, v: f64, path: &[usize]) {
		match &mut self.values {
			StripeValues::F64(column) => column.push(v),
			_ => unreachable!("double value on a non-double column"),
		}
		self.raw_bytes += 8;
		self.push_levels(self.max_dl, path);
	}

	pub fn push_bytes(&mut self, v: &[u8], path: &[usize]) {
		match &mut self.values {
			StripeValues::Bytes { buffer, offsets } => {
				offsets.push(buffer.len());
				buffer.extend_from_slice(v);
			}
			StripeValues::Fixed { buffer, length } => {
				debug_assert_eq!(v.len(), *length);
				buffer.extend_from_slice(v);
			}
			_ => unreachable!("binary value on a non-binary column"),
		}
		self.raw_bytes += v.len();
		self.push_levels(self.max_dl, path);
	}

	pub fn raw_bytes(&self) -> usize {
		self.raw_bytes
	}

	#[cfg(test)]
	pub fn levels(&self) -> (Vec<i16>, Vec<i16>) {
		(self.dls.clone(), self.rls.clone())
	}

	#[cfg(test)]
	pub fn i64_values(&self) -> Vec<i64> {
		match &self.values {
			StripeValues::I64(v) => v.clone(),
			_ => panic!("not an int64 stripe"),
		}
	}

	#[cfg(test)]
	pub fn utf8_values(&self) -> Vec<String> {
		match &self.values {
			StripeValues::Bytes { buffer, offsets } => {
				let mut out = Vec::with_capacity(offsets.len());
				for (i, &start) in offsets.iter().enumerate() {
					let end = offsets.get(i + 1).copied().unwrap_or(buffer.len());
					out.push(String::from_utf8(buffer[start..end].to_vec()).unwrap());
				}
				out
			}
			_ => panic!("not a byte-array stripe"),
		}
	}

	/// Writes the buffered triplets as one batch and clears the stripe for
	/// the next row group. The repetition tracker is not reset: row ordinals
	/// keep growing across groups, so the first value of the next group
	/// still diffs at level zero.
	pub fn flush(&mut self, writer: &mut SerializedColumnWriter) -> Result<()> {
		let dls = if self.max_dl > 0 { Some(self.dls.as_slice()) } else { None };
		let rls = if self.max_rl > 0 { Some(self.rls.as_slice()) } else { None };

		match &mut self.values {
			StripeValues::Bool(column) => {
				writer.typed::<BoolType>().write_batch(column, dls, rls)?;
				column.clear();
			}
			StripeValues::I32(column) => {
				writer.typed::<Int32Type>().write_batch(column, dls, rls)?;
				column.clear();
			}
			StripeValues::I64(column) => {
				writer.typed::<Int64Type>().write_batch(column, dls, rls)?;
				column.clear();
			}
			StripeValues::F32(column) => {
				writer.typed::<FloatType>().write_batch(column, dls, rls)?;
				column.clear();
			}
			StripeValues::F64(column) => {
				writer.typed::<DoubleType>().write_batch(column, dls, rls)?;
				column.clear();
			}
			StripeValues::Bytes { buffer, offsets } => {
				let shared = Bytes::from(std::mem::take(buffer));
				let mut column: Vec<ByteArray> = Vec::with_capacity(offsets.len());
				for (i, &offset) in offsets.iter().enumerate() {
					let end = offsets.get(i + 1).copied().unwrap_or(shared.len());
					column.push(ByteArray::from(shared.slice(offset..end)));
				}
				writer.typed::<ByteArrayType>().write_batch(&column, dls, rls)?;
				offsets.clear();
			}
			StripeValues::Fixed { buffer, length } => {
				let column: Vec<FixedLenByteArray> = if *length == 0 {
					Vec::new()
				} else {
					buffer
						.chunks_exact(*length)
						.map(|chunk| FixedLenByteArray::from(chunk.to_vec()))
						.collect()
				};
				writer.typed::<FixedLenByteArrayType>().write_batch(&column, dls, rls)?;
				buffer.clear();
			}
		}

		self.dls.clear();
		self.rls.clear();
		self.raw_bytes = 0;
		Ok(())
	}
}
