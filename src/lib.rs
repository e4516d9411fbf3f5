//! Serialization of user-declared record types to and from Apache Parquet.
//!
//! A type describes itself once through the [`Record`] trait — an ordered
//! list of named, typed fields — and the crate derives the Parquet schema,
//! streams instances into column storage and assembles them back, including
//! nested records, lists, maps, schema-less reads and variant columns.
//!
//! ```no_run
//! use std::sync::{Arc, OnceLock};
//! use parquet_record::{
//! 	EntityType, FieldDesc, PrimitiveKind, Record, RecordDesc, Value, WriteOptions,
//! };
//!
//! struct Measurement {
//! 	sensor: String,
//! 	reading: f64,
//! }
//!
//! impl Record for Measurement {
//! 	fn descriptor() -> Arc<RecordDesc> {
//! 		static DESC: OnceLock<Arc<RecordDesc>> = OnceLock::new();
//! 		DESC.get_or_init(|| RecordDesc::new("Measurement", vec![
//! 			FieldDesc::new("sensor", EntityType::Primitive(PrimitiveKind::Str)),
//! 			FieldDesc::new("reading", EntityType::Primitive(PrimitiveKind::F64)),
//! 		])).clone()
//! 	}
//!
//! 	fn to_value(&self) -> Value {
//! 		Value::record(vec![
//! 			("sensor".into(), self.sensor.as_str().into()),
//! 			("reading".into(), self.reading.into()),
//! 		])
//! 	}
//!
//! 	fn from_value(value: Value) -> parquet_record::Result<Measurement> {
//! 		let mut f = value.into_fields()?;
//! 		Ok(Measurement { sensor: f.next()?, reading: f.next()? })
//! 	}
//! }
//!
//! # fn main() -> parquet_record::Result<()> {
//! parquet_record::write_file(
//! 	"out.parquet",
//! 	vec![Measurement { sensor: "a".into(), reading: 0.5 }],
//! 	WriteOptions::default(),
//! )?;
//! let back: Vec<Measurement> = parquet_record::read_file("out.parquet")?;
//! # let _ = back;
//! # Ok(())
//! # }
//! ```

mod convert;
mod descriptor;
mod error;
mod field_matching;
mod layout;
mod options;
mod read;
mod record;
mod schema_builder;
mod schema_filter;
mod value;
mod variant;
mod write;

pub use descriptor::{EdgeAlgorithm, EntityType, FieldAnnotations, FieldDesc, PrimitiveKind, RecordDesc};
pub use error::{Error, Result};
pub use options::{
	ColumnNaming, DecimalDefaults, FieldMatching, ListLevels, ReadOptions, RoundingMode, TimeUnit,
	WriteOptions,
};
pub use read::{read_dynamic, read_file, read_file_with, Dictionary, DynamicIter, PrimitiveConverter, RecordIter};
pub use record::Record;
pub use value::{Fields, FromValue, Value};
pub use variant::decode as decode_variant;
pub use write::{write_file, write_record_to_consumer, RecordConsumer, RecordWriter, WriterStats};

/// Derives the Parquet schema a record type writes with. Deterministic for
/// a given descriptor and options.
pub fn schema_for<R: Record>(options: &WriteOptions) -> Result<parquet::schema::types::TypePtr> {
	let desc = options.record_model.clone().unwrap_or_else(R::descriptor);
	Ok(schema_builder::derive_schema(&desc, options)?.schema)
}
