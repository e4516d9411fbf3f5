use std::sync::Arc;

pub use bigdecimal::rounding::RoundingMode;
use parquet::basic::{Compression, ZstdLevel};

use crate::descriptor::RecordDesc;

/// How `List(T)` is laid out in the schema. Three-level is the modern
/// convention and the only one that supports nested collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListLevels {
	One,
	Two,
	#[default]
	Three,
}

/// Wire-name derivation for fields without an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnNaming {
	#[default]
	AsIs,
	SnakeCase,
}

/// Resolution of temporal columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
	Millis,
	Micros,
	Nanos,
}

/// Strategy for matching requested fields to file columns on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldMatching {
	#[default]
	FieldName,
	SnakeCase,
	/// Tries every strategy and stops at the first unique match; an ambiguous
	/// match is an error.
	BestEffort,
}

/// Writer default for decimal fields lacking a per-field annotation.
#[derive(Debug, Clone, Copy)]
pub struct DecimalDefaults {
	pub precision: u32,
	pub scale: i32,
	pub rounding: Option<RoundingMode>,
}

/// Frozen configuration of a writer. Constructed once, consumed by schema
/// derivation and the writer; never mutated afterwards.
#[derive(Clone)]
pub struct WriteOptions {
	pub list_levels: ListLevels,
	pub column_naming: ColumnNaming,
	pub default_time_unit: TimeUnit,
	pub default_decimal: Option<DecimalDefaults>,
	pub compression: Compression,
	pub extra_metadata: Vec<(String, String)>,
	pub row_group_row_limit: usize,
	pub row_group_byte_limit: usize,
	/// Explicitly constructed write model. When set, the writer derives the
	/// schema and write plan from this description instead of the record
	/// type's own descriptor; semantics are otherwise identical.
	pub record_model: Option<Arc<RecordDesc>>,
}

impl Default for WriteOptions {
	fn default() -> WriteOptions {
		WriteOptions {
			list_levels: ListLevels::default(),
			column_naming: ColumnNaming::default(),
			default_time_unit: TimeUnit::Millis,
			default_decimal: None,
			compression: Compression::ZSTD(ZstdLevel::default()),
			extra_metadata: Vec::new(),
			row_group_row_limit: 1024 * 1024,
			row_group_byte_limit: 512 * 1024 * 1024,
			record_model: None,
		}
	}
}

impl WriteOptions {
	pub fn with_list_levels(mut self, levels: ListLevels) -> WriteOptions {
		self.list_levels = levels;
		self
	}

	pub fn with_column_naming(mut self, naming: ColumnNaming) -> WriteOptions {
		self.column_naming = naming;
		self
	}

	pub fn with_default_time_unit(mut self, unit: TimeUnit) -> WriteOptions {
		self.default_time_unit = unit;
		self
	}

	pub fn with_default_decimal(mut self, precision: u32, scale: i32) -> WriteOptions {
		self.default_decimal = Some(DecimalDefaults { precision, scale, rounding: None });
		self
	}

	pub fn with_decimal_rounding(mut self, rounding: RoundingMode) -> WriteOptions {
		let defaults = self.default_decimal.get_or_insert(DecimalDefaults {
			precision: 38,
			scale: 18,
			rounding: None,
		});
		defaults.rounding = Some(rounding);
		self
	}

	pub fn with_compression(mut self, compression: Compression) -> WriteOptions {
		self.compression = compression;
		self
	}

	/// Arbitrary key/value pair stored in the file footer.
	pub fn with_extra_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> WriteOptions {
		self.extra_metadata.push((key.into(), value.into()));
		self
	}

	pub fn with_record_model(mut self, model: Arc<RecordDesc>) -> WriteOptions {
		self.record_model = Some(model);
		self
	}

	pub fn with_row_group_limits(mut self, rows: usize, bytes: usize) -> WriteOptions {
		self.row_group_row_limit = rows;
		self.row_group_byte_limit = bytes;
		self
	}
}

/// Frozen configuration of a reader.
#[derive(Debug, Clone)]
pub struct ReadOptions {
	/// Fail when a requested field has no column in the file; when disabled
	/// the field reads as null (or the zero value for non-nullable
	/// primitives) on every row.
	pub fail_on_missing_column: bool,
	/// Fail when a null arrives in a non-nullable primitive field; when
	/// disabled the zero value of the type is substituted.
	pub fail_on_null_for_primitives: bool,
	/// Reject narrowing primitive coercions (i64 -> i32, f64 -> f32, ...).
	pub fail_narrowing_primitive_conversion: bool,
	pub field_matching: FieldMatching,
}

impl Default for ReadOptions {
	fn default() -> ReadOptions {
		ReadOptions {
			fail_on_missing_column: true,
			fail_on_null_for_primitives: false,
			fail_narrowing_primitive_conversion: false,
			field_matching: FieldMatching::default(),
		}
	}
}

impl ReadOptions {
	pub fn with_missing_columns_as_null(mut self) -> ReadOptions {
		self.fail_on_missing_column = false;
		self
	}

	pub fn with_fail_on_null_for_primitives(mut self) -> ReadOptions {
		self.fail_on_null_for_primitives = true;
		self
	}

	pub fn with_fail_narrowing(mut self) -> ReadOptions {
		self.fail_narrowing_primitive_conversion = true;
		self
	}

	pub fn with_field_matching(mut self, strategy: FieldMatching) -> ReadOptions {
		self.field_matching = strategy;
		self
	}
}
