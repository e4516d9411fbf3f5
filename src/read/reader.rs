//! Public read surface: iterators over the records of a Parquet file. The
//! projection is computed once per open; column chunks are pulled one row
//! group at a time and assembled row by row.

use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;

use parquet::column::reader::ColumnReader;
use parquet::errors::ParquetError;
use parquet::file::reader::{FileReader, SerializedFileReader};

use crate::error::{Error, Result};
use crate::layout::ColumnLayout;
use crate::options::ReadOptions;
use crate::record::Record;
use crate::schema_filter::{project_dynamic, project_record, Projection};
use crate::value::Value;

use super::assembly::{RawValues, RowAssembler, Triplets};
use super::materializer::Converter;

const READ_BATCH: usize = 8 * 1024;

/// Shared machinery of the typed and dynamic iterators. Owns the underlying
/// file reader and releases it when dropped.
struct RawIter {
	reader: SerializedFileReader<File>,
	layout: ColumnLayout,
	file_leaves: Vec<usize>,
	converter: Converter,
	metadata: Vec<(String, String)>,
	next_group: usize,
	columns: Vec<Triplets>,
	rows_remaining: usize,
	failed: bool,
}

impl RawIter {
	fn open(path: &Path, project: impl FnOnce(&parquet::schema::types::TypePtr) -> Result<Projection>) -> Result<RawIter> {
		let file = File::open(path)?;
		let reader = SerializedFileReader::new(file)?;

		let file_schema = reader.metadata().file_metadata().schema_descr().root_schema_ptr();
		let projection = project(&file_schema)?;
		let layout = ColumnLayout::build(&projection.schema);
		let converter = Converter::build(&projection);
		let metadata = reader
			.metadata()
			.file_metadata()
			.key_value_metadata()
			.map(|kvs| {
				kvs.iter()
					.map(|kv| (kv.key.clone(), kv.value.clone().unwrap_or_default()))
					.collect()
			})
			.unwrap_or_default();

		tracing::debug!(
			row_groups = reader.metadata().num_row_groups(),
			columns = projection.file_leaves.len(),
			"opened parquet file"
		);

		Ok(RawIter {
			reader,
			layout,
			file_leaves: projection.file_leaves,
			converter,
			metadata,
			next_group: 0,
			columns: Vec::new(),
			rows_remaining: 0,
			failed: false,
		})
	}

	/// Loads the triplets of the next non-empty row group. `false` when the
	/// file is exhausted.
	fn load_next_group(&mut self) -> Result<bool> {
		while self.next_group < self.reader.metadata().num_row_groups() {
			let group_index = self.next_group;
			self.next_group += 1;

			let group = self.reader.get_row_group(group_index)?;
			let rows = group.metadata().num_rows() as usize;
			if rows == 0 {
				continue;
			}

			// projected leaves are numbered depth-first, matching the layout
			let mut columns = Vec::with_capacity(self.file_leaves.len());
			let mut leaf_levels = Vec::with_capacity(self.file_leaves.len());
			for node in &self.layout.nodes {
				if node.is_leaf() {
					leaf_levels.push((node.def_level, node.rep_level));
				}
			}
			debug_assert_eq!(leaf_levels.len(), self.file_leaves.len());

			for (ordinal, &file_leaf) in self.file_leaves.iter().enumerate() {
				let (max_dl, max_rl) = leaf_levels[ordinal];
				let column_reader = group.get_column_reader(file_leaf)?;
				columns.push(read_triplets(column_reader, max_dl, max_rl)?);
			}

			self.columns = columns;
			self.rows_remaining = rows;
			return Ok(true);
		}
		Ok(false)
	}

	fn next_value(&mut self) -> Option<Result<Value>> {
		if self.failed {
			return None;
		}
		if self.rows_remaining == 0 {
			match self.load_next_group() {
				Ok(true) => {}
				Ok(false) => return None,
				Err(e) => {
					self.failed = true;
					return Some(Err(e));
				}
			}
		}

		let mut assembler = RowAssembler::new(&self.layout, &mut self.columns);
		match assembler.read_row(&mut self.converter) {
			Ok(value) => {
				self.rows_remaining -= 1;
				Some(Ok(value))
			}
			Err(e) => {
				self.failed = true;
				Some(Err(e))
			}
		}
	}
}

fn read_triplets(column_reader: ColumnReader, max_dl: i16, max_rl: i16) -> Result<Triplets> {
	let mut dls: Vec<i16> = Vec::new();
	let mut rls: Vec<i16> = Vec::new();

	macro_rules! drain {
		($reader:expr, $values:expr) => {{
			let mut r = $reader;
			loop {
				let dl_buf = if max_dl > 0 { Some(&mut dls) } else { None };
				let rl_buf = if max_rl > 0 { Some(&mut rls) } else { None };
				let (records, values, levels) = r.read_records(READ_BATCH, dl_buf, rl_buf, &mut $values)?;
				if records == 0 && values == 0 && levels == 0 {
					break;
				}
			}
		}};
	}

	let values = match column_reader {
		ColumnReader::BoolColumnReader(reader) => {
			let mut v = Vec::new();
			drain!(reader, v);
			RawValues::Bool(v)
		}
		ColumnReader::Int32ColumnReader(reader) => {
			let mut v = Vec::new();
			drain!(reader, v);
			RawValues::I32(v)
		}
		ColumnReader::Int64ColumnReader(reader) => {
			let mut v = Vec::new();
			drain!(reader, v);
			RawValues::I64(v)
		}
		ColumnReader::FloatColumnReader(reader) => {
			let mut v = Vec::new();
			drain!(reader, v);
			RawValues::F32(v)
		}
		ColumnReader::DoubleColumnReader(reader) => {
			let mut v = Vec::new();
			drain!(reader, v);
			RawValues::F64(v)
		}
		ColumnReader::ByteArrayColumnReader(reader) => {
			let mut v = Vec::new();
			drain!(reader, v);
			RawValues::Bytes(v)
		}
		ColumnReader::FixedLenByteArrayColumnReader(reader) => {
			let mut v = Vec::new();
			drain!(reader, v);
			RawValues::Fixed(v)
		}
		ColumnReader::Int96ColumnReader(_) => {
			return Err(Error::Parquet(ParquetError::NYI("INT96 columns are not supported".to_string())))
		}
	};

	Ok(Triplets::new(values, dls, rls, max_dl, max_rl))
}

/// Iterator over the records of one file. Errors are yielded once at the
/// `next` boundary; the iterator is exhausted afterwards.
pub struct RecordIter<R: Record> {
	raw: RawIter,
	_record: PhantomData<R>,
}

impl<R: Record> RecordIter<R> {
	pub fn open(path: impl AsRef<Path>) -> Result<RecordIter<R>> {
		RecordIter::open_with(path, ReadOptions::default())
	}

	pub fn open_with(path: impl AsRef<Path>, options: ReadOptions) -> Result<RecordIter<R>> {
		let desc = R::descriptor();
		let raw = RawIter::open(path.as_ref(), |schema| project_record(schema, &desc, &options))?;
		Ok(RecordIter { raw, _record: PhantomData })
	}

	/// Extra key/value pairs from the file footer.
	pub fn file_metadata(&self) -> &[(String, String)] {
		&self.raw.metadata
	}
}

impl<R: Record> Iterator for RecordIter<R> {
	type Item = Result<R>;

	fn next(&mut self) -> Option<Result<R>> {
		match self.raw.next_value()? {
			Ok(value) => Some(R::from_value(value)),
			Err(e) => Some(Err(e)),
		}
	}
}

/// Iterator over whole rows as dynamic values, preserving the file's column
/// order and nesting.
pub struct DynamicIter {
	raw: RawIter,
}

impl DynamicIter {
	pub fn open(path: impl AsRef<Path>) -> Result<DynamicIter> {
		let raw = RawIter::open(path.as_ref(), |schema| project_dynamic(schema))?;
		Ok(DynamicIter { raw })
	}

	pub fn file_metadata(&self) -> &[(String, String)] {
		&self.raw.metadata
	}
}

impl Iterator for DynamicIter {
	type Item = Result<Value>;

	fn next(&mut self) -> Option<Result<Value>> {
		self.raw.next_value()
	}
}

/// Reads every record of the file into a vector, releasing the reader when
/// done (or on the first error).
pub fn read_file<R: Record>(path: impl AsRef<Path>) -> Result<Vec<R>> {
	RecordIter::open(path)?.collect()
}

pub fn read_file_with<R: Record>(path: impl AsRef<Path>, options: ReadOptions) -> Result<Vec<R>> {
	RecordIter::open_with(path, options)?.collect()
}

/// Reads every row as a dynamic value tree.
pub fn read_dynamic(path: impl AsRef<Path>) -> Result<Vec<Value>> {
	DynamicIter::open(path)?.collect()
}
