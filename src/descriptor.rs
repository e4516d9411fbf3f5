use std::sync::Arc;

use crate::options::TimeUnit;

/// Scalar kinds a field can take. Temporal units and decimal precision/scale
/// may be left unset here and resolved against per-field annotations and the
/// writer defaults when the schema is derived.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveKind {
	Bool,
	I8,
	I16,
	I32,
	I64,
	F32,
	F64,
	Str,
	/// UTF-8 name of one of the declared constants.
	Enum(Arc<Vec<String>>),
	Binary,
	Uuid,
	Date,
	Time { unit: Option<TimeUnit>, adjusted_utc: bool },
	Timestamp { unit: Option<TimeUnit>, adjusted_utc: bool },
	Decimal { precision: Option<u32>, scale: Option<i32> },
	Json,
	Bson,
	/// WKB payload. CRS metadata is kept on the descriptor; see DESIGN.md for
	/// the logical-annotation caveat on parquet 54.
	Geometry { crs: Option<String> },
	Geography { crs: Option<String>, algorithm: Option<EdgeAlgorithm> },
	/// Pre-encoded self-describing variant (metadata + value binaries).
	Variant,
}

impl PrimitiveKind {
	pub fn enumeration<S: Into<String>>(constants: impl IntoIterator<Item = S>) -> PrimitiveKind {
		PrimitiveKind::Enum(Arc::new(constants.into_iter().map(Into::into).collect()))
	}

	pub fn time() -> PrimitiveKind {
		PrimitiveKind::Time { unit: None, adjusted_utc: false }
	}

	pub fn timestamp() -> PrimitiveKind {
		PrimitiveKind::Timestamp { unit: None, adjusted_utc: true }
	}

	pub fn decimal(precision: u32, scale: i32) -> PrimitiveKind {
		PrimitiveKind::Decimal { precision: Some(precision), scale: Some(scale) }
	}

	/// Unbounded-precision decimal; requires a per-field annotation or a
	/// writer default before a schema can be derived.
	pub fn decimal_unsized() -> PrimitiveKind {
		PrimitiveKind::Decimal { precision: None, scale: None }
	}
}

/// Interpolation algorithm attached to a geography column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeAlgorithm {
	Spherical,
	Vincenty,
	Thomas,
	Andoyer,
	Karney,
}

/// The closed lattice of types a field position can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityType {
	Primitive(PrimitiveKind),
	Record(Arc<RecordDesc>),
	List { element: Box<EntityType>, element_nullable: bool },
	Map { key: Box<EntityType>, value: Box<EntityType>, value_nullable: bool },
	/// Schema-less read target: the whole column tree as name -> value pairs.
	/// Not writable.
	DynamicMap,
}

impl EntityType {
	pub fn list(element: EntityType) -> EntityType {
		EntityType::List { element: Box::new(element), element_nullable: true }
	}

	pub fn list_required(element: EntityType) -> EntityType {
		EntityType::List { element: Box::new(element), element_nullable: false }
	}

	pub fn map(key: EntityType, value: EntityType) -> EntityType {
		EntityType::Map { key: Box::new(key), value: Box::new(value), value_nullable: true }
	}

	pub fn map_required_values(key: EntityType, value: EntityType) -> EntityType {
		EntityType::Map { key: Box::new(key), value: Box::new(value), value_nullable: false }
	}

	pub fn record(desc: Arc<RecordDesc>) -> EntityType {
		EntityType::Record(desc)
	}

	/// Scalars are non-nullable by default, everything else is nullable.
	pub(crate) fn default_nullable(&self) -> bool {
		!matches!(self, EntityType::Primitive(_))
	}
}

/// Per-field modifiers. Everything defaults to "off"; a set marker wins over
/// the writer-level default for the same concern.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldAnnotations {
	pub alias: Option<String>,
	pub field_id: Option<i32>,
	pub as_enum: bool,
	pub as_json: bool,
	pub as_bson: bool,
	pub as_string: bool,
	pub decimal: Option<(u32, i32)>,
	pub time_unit: Option<TimeUnit>,
}

/// One named, typed field position of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDesc {
	pub logical_name: String,
	pub declared_type: EntityType,
	pub nullable: bool,
	pub annotations: FieldAnnotations,
}

impl FieldDesc {
	pub fn new(logical_name: impl Into<String>, declared_type: EntityType) -> FieldDesc {
		let nullable = declared_type.default_nullable();
		FieldDesc {
			logical_name: logical_name.into(),
			declared_type,
			nullable,
			annotations: FieldAnnotations::default(),
		}
	}

	pub fn nullable(mut self) -> FieldDesc {
		self.nullable = true;
		self
	}

	pub fn required(mut self) -> FieldDesc {
		self.nullable = false;
		self
	}

	/// Overrides the wire name regardless of the naming policy.
	pub fn with_alias(mut self, alias: impl Into<String>) -> FieldDesc {
		self.annotations.alias = Some(alias.into());
		self
	}

	pub fn with_field_id(mut self, id: i32) -> FieldDesc {
		self.annotations.field_id = Some(id);
		self
	}

	pub fn as_enum(mut self) -> FieldDesc {
		self.annotations.as_enum = true;
		self
	}

	pub fn as_json(mut self) -> FieldDesc {
		self.annotations.as_json = true;
		self
	}

	pub fn as_bson(mut self) -> FieldDesc {
		self.annotations.as_bson = true;
		self
	}

	pub fn as_string(mut self) -> FieldDesc {
		self.annotations.as_string = true;
		self
	}

	pub fn with_decimal(mut self, precision: u32, scale: i32) -> FieldDesc {
		self.annotations.decimal = Some((precision, scale));
		self
	}

	pub fn with_time_unit(mut self, unit: TimeUnit) -> FieldDesc {
		self.annotations.time_unit = Some(unit);
		self
	}
}

/// Ordered description of a record type. Built once per type and shared;
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDesc {
	pub name: String,
	pub fields: Vec<FieldDesc>,
}

impl RecordDesc {
	pub fn new(name: impl Into<String>, fields: Vec<FieldDesc>) -> Arc<RecordDesc> {
		Arc::new(RecordDesc { name: name.into(), fields })
	}

	pub fn field(&self, logical_name: &str) -> Option<&FieldDesc> {
		self.fields.iter().find(|f| f.logical_name == logical_name)
	}
}
