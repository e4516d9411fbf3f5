use std::fs::File;
use std::io::Write;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;

use crate::error::Result;
use crate::layout::ColumnLayout;
use crate::options::WriteOptions;
use crate::record::Record;
use crate::schema_builder::derive_schema;
use crate::write::consumer::RecordConsumer;
use crate::write::striper::ColumnStriper;
use crate::write::walker::RecordWalker;

#[derive(Debug, Clone, Default)]
pub struct WriterStats {
	pub rows: usize,
	/// Raw (uncompressed, unencoded) bytes buffered, values plus levels.
	pub bytes: usize,
	/// Compressed bytes of the closed row groups.
	pub bytes_out: usize,
	pub groups: usize,
}

/// Writes instances of one record type into a Parquet file. The schema is
/// derived once at construction; `close` flushes the last row group and
/// seals the footer. Dropping a writer without closing it leaves the file
/// without a footer, which readers treat as aborted.
pub struct RecordWriter<R: Record, W: Write + Send> {
	writer: SerializedFileWriter<W>,
	striper: ColumnStriper,
	walker: RecordWalker,
	stats: WriterStats,
	row_group_row_limit: usize,
	row_group_byte_limit: usize,
	rows_in_group: usize,
	_record: PhantomData<R>,
}

impl<R: Record> RecordWriter<R, File> {
	pub fn create(path: impl AsRef<Path>, options: WriteOptions) -> Result<RecordWriter<R, File>> {
		let file = File::create(path)?;
		RecordWriter::new(file, options)
	}
}

impl<R: Record, W: Write + Send> RecordWriter<R, W> {
	pub fn new(sink: W, options: WriteOptions) -> Result<RecordWriter<R, W>> {
		let desc = options.record_model.clone().unwrap_or_else(R::descriptor);
		let derived = derive_schema(&desc, &options)?;

		let mut props = WriterProperties::builder()
			.set_compression(options.compression)
			.set_created_by(format!(
				"{} version {}",
				env!("CARGO_PKG_NAME"),
				env!("CARGO_PKG_VERSION")
			));
		if !options.extra_metadata.is_empty() {
			let kv = options
				.extra_metadata
				.iter()
				.map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
				.collect();
			props = props.set_key_value_metadata(Some(kv));
		}

		let writer = SerializedFileWriter::new(sink, derived.schema.clone(), Arc::new(props.build()))?;
		let striper = ColumnStriper::new(ColumnLayout::build(&derived.schema));

		Ok(RecordWriter {
			writer,
			striper,
			walker: RecordWalker::new(derived.plan),
			stats: WriterStats::default(),
			row_group_row_limit: options.row_group_row_limit,
			row_group_byte_limit: options.row_group_byte_limit,
			rows_in_group: 0,
			_record: PhantomData,
		})
	}

	pub fn write(&mut self, record: &R) -> Result<()> {
		let value = record.to_value();
		self.walker.write_row(&value, &mut self.striper)?;

		self.stats.rows += 1;
		self.rows_in_group += 1;

		if self.rows_in_group >= self.row_group_row_limit
			|| self.striper.pending_bytes() >= self.row_group_byte_limit
		{
			self.flush_group()?;
		}
		Ok(())
	}

	fn flush_group(&mut self) -> Result<()> {
		if self.rows_in_group == 0 {
			return Ok(());
		}
		let pending = self.striper.pending_bytes();
		let mut row_group = self.writer.next_row_group()?;
		self.striper.flush(&mut row_group)?;
		let metadata = row_group.close()?;

		self.stats.groups += 1;
		self.stats.bytes += pending;
		self.stats.bytes_out += metadata.compressed_size() as usize;
		tracing::debug!(
			rows = self.rows_in_group,
			raw_bytes = pending,
			compressed = metadata.compressed_size(),
			"closed row group"
		);
		self.rows_in_group = 0;
		Ok(())
	}

	pub fn stats(&self) -> WriterStats {
		self.stats.clone()
	}

	/// Flushes pending rows and writes the footer, consuming the writer and
	/// releasing the sink.
	pub fn close(mut self) -> Result<WriterStats> {
		self.flush_group()?;
		self.writer.close()?;
		Ok(self.stats)
	}
}

/// Writes all records to a fresh file and closes it.
pub fn write_file<R: Record>(
	path: impl AsRef<Path>,
	records: impl IntoIterator<Item = R>,
	options: WriteOptions,
) -> Result<WriterStats> {
	let mut writer = RecordWriter::<R, File>::create(path, options)?;
	for record in records {
		writer.write(&record)?;
	}
	writer.close()
}

/// Lower-level entry point: walks one record value against a derived plan
/// and emits its events into any consumer. Used by embeddings that bring
/// their own column writer.
pub fn write_record_to_consumer<R: Record, C: RecordConsumer>(
	record: &R,
	options: &WriteOptions,
	consumer: &mut C,
) -> Result<()> {
	let desc = options.record_model.clone().unwrap_or_else(R::descriptor);
	let derived = derive_schema(&desc, options)?;
	RecordWalker::new(derived.plan).write_row(&record.to_value(), consumer)
}
