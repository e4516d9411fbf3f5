//! Derivation of the Parquet schema tree (and the matching write plan) from
//! a record description. Pure: same description + same options always yield
//! the same schema.

use std::collections::HashSet;
use std::sync::Arc;

use bigdecimal::rounding::RoundingMode;
use parquet::basic::{self, LogicalType, Repetition};
use parquet::schema::types::{Type as ParquetType, TypePtr};

use crate::descriptor::{EntityType, FieldAnnotations, FieldDesc, PrimitiveKind, RecordDesc};
use crate::error::{Error, Result};
use crate::field_matching::wire_name;
use crate::options::{ListLevels, TimeUnit, WriteOptions};

/// Physical carrier of a decimal column, chosen from its precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecimalPhysical {
	Int32,
	Int64,
	Binary,
}

pub(crate) fn decimal_physical(precision: u32) -> DecimalPhysical {
	if precision <= 9 {
		DecimalPhysical::Int32
	} else if precision <= 18 {
		DecimalPhysical::Int64
	} else {
		DecimalPhysical::Binary
	}
}

/// How the walker turns one primitive value into a consumer event.
#[derive(Debug, Clone)]
pub(crate) enum PrimitivePlan {
	Bool,
	I8,
	I16,
	I32,
	I64,
	F32,
	F64,
	Utf8,
	EnumUtf8 { constants: Option<Arc<Vec<String>>> },
	Bytes,
	Uuid,
	Date,
	Time { unit: TimeUnit },
	Timestamp { unit: TimeUnit },
	Decimal { precision: u32, scale: i32, rounding: Option<RoundingMode>, physical: DecimalPhysical },
}

#[derive(Debug, Clone)]
pub(crate) enum FieldPlan {
	Primitive(PrimitivePlan),
	Record(RecordPlan),
	List { levels: ListLevels, element_nullable: bool, element: Box<FieldPlan> },
	Map { key: Box<FieldPlan>, value: Box<FieldPlan>, value_nullable: bool },
	Variant,
}

#[derive(Debug, Clone)]
pub(crate) struct FieldPlanEntry {
	pub wire_name: String,
	pub nullable: bool,
	pub plan: FieldPlan,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordPlan {
	pub fields: Vec<FieldPlanEntry>,
}

#[derive(Debug)]
pub(crate) struct DerivedSchema {
	pub schema: TypePtr,
	pub plan: RecordPlan,
}

struct Builder<'a> {
	options: &'a WriteOptions,
	/// Identity of every record description on the current path; recursion
	/// into one of these again means a cyclic type.
	visiting: Vec<*const RecordDesc>,
}

pub(crate) fn derive_schema(desc: &Arc<RecordDesc>, options: &WriteOptions) -> Result<DerivedSchema> {
	let mut builder = Builder { options, visiting: Vec::new() };
	let (fields, plan) = builder.record_fields(desc, &desc.name)?;
	let schema = ParquetType::group_type_builder(&desc.name)
		.with_fields(fields)
		.build()?;
	tracing::debug!(record = %desc.name, "derived parquet schema");
	Ok(DerivedSchema { schema: Arc::new(schema), plan })
}

impl<'a> Builder<'a> {
	fn record_fields(&mut self, desc: &Arc<RecordDesc>, path: &str) -> Result<(Vec<TypePtr>, RecordPlan)> {
		let key = Arc::as_ptr(desc);
		if self.visiting.contains(&key) {
			return Err(Error::unsupported(path, "record type refers to itself"));
		}
		self.visiting.push(key);

		let mut seen_ids: HashSet<i32> = HashSet::new();
		let mut types = Vec::with_capacity(desc.fields.len());
		let mut entries = Vec::with_capacity(desc.fields.len());
		for field in &desc.fields {
			let name = wire_name(field, self.options.column_naming);
			let field_path = format!("{}/{}", path, name);
			if let Some(id) = field.annotations.field_id {
				if !seen_ids.insert(id) {
					self.visiting.pop();
					return Err(Error::DuplicateFieldId { path: path.to_string(), id });
				}
			}
			let (ty, plan) = self.field_type(field, &name, &field_path)?;
			types.push(Arc::new(ty));
			entries.push(FieldPlanEntry { wire_name: name, nullable: field.nullable, plan });
		}

		self.visiting.pop();
		Ok((types, RecordPlan { fields: entries }))
	}

	fn field_type(&mut self, field: &FieldDesc, name: &str, path: &str) -> Result<(ParquetType, FieldPlan)> {
		let repetition = if field.nullable { Repetition::OPTIONAL } else { Repetition::REQUIRED };
		self.entity_type(&field.declared_type, &field.annotations, name, repetition, field.annotations.field_id, path)
	}

	fn entity_type(
		&mut self,
		entity: &EntityType,
		annotations: &FieldAnnotations,
		name: &str,
		repetition: Repetition,
		id: Option<i32>,
		path: &str,
	) -> Result<(ParquetType, FieldPlan)> {
		match entity {
			EntityType::Primitive(kind) => self.primitive_type(kind, annotations, name, repetition, id, path),
			EntityType::Record(desc) => {
				let (fields, plan) = self.record_fields(desc, path)?;
				let ty = ParquetType::group_type_builder(name)
					.with_repetition(repetition)
					.with_id(id)
					.with_fields(fields)
					.build()?;
				Ok((ty, FieldPlan::Record(plan)))
			}
			EntityType::List { element, element_nullable } => {
				self.list_type(element, *element_nullable, annotations, name, repetition, id, path)
			}
			EntityType::Map { key, value, value_nullable } => {
				self.map_type(key, value, *value_nullable, annotations, name, repetition, id, path)
			}
			EntityType::DynamicMap => {
				Err(Error::unsupported(path, "dynamic maps are a read-side shape and cannot be written"))
			}
		}
	}

	fn list_type(
		&mut self,
		element: &EntityType,
		element_nullable: bool,
		annotations: &FieldAnnotations,
		name: &str,
		repetition: Repetition,
		id: Option<i32>,
		path: &str,
	) -> Result<(ParquetType, FieldPlan)> {
		let levels = self.options.list_levels;
		let nested_collection = matches!(
			element,
			EntityType::List { .. } | EntityType::Map { .. } | EntityType::DynamicMap
		);
		if levels == ListLevels::One && nested_collection {
			return Err(Error::unsupported(
				path,
				"a 1-level list cannot contain another collection; use the 3-level encoding",
			));
		}

		match levels {
			ListLevels::One => {
				// The element itself carries the column name and repeats.
				let (ty, element_plan) =
					self.entity_type(element, annotations, name, Repetition::REPEATED, id, path)?;
				let plan = FieldPlan::List {
					levels,
					element_nullable: false,
					element: Box::new(element_plan),
				};
				Ok((ty, plan))
			}
			ListLevels::Two => {
				let (element_ty, element_plan) =
					self.entity_type(element, annotations, "element", Repetition::REPEATED, None, path)?;
				let ty = ParquetType::group_type_builder(name)
					.with_repetition(repetition)
					.with_logical_type(Some(LogicalType::List))
					.with_id(id)
					.with_fields(vec![Arc::new(element_ty)])
					.build()?;
				let plan = FieldPlan::List {
					levels,
					element_nullable: false,
					element: Box::new(element_plan),
				};
				Ok((ty, plan))
			}
			ListLevels::Three => {
				let element_repetition = if element_nullable { Repetition::OPTIONAL } else { Repetition::REQUIRED };
				let (element_ty, element_plan) =
					self.entity_type(element, annotations, "element", element_repetition, None, path)?;
				let inner = ParquetType::group_type_builder("list")
					.with_repetition(Repetition::REPEATED)
					.with_fields(vec![Arc::new(element_ty)])
					.build()?;
				let ty = ParquetType::group_type_builder(name)
					.with_repetition(repetition)
					.with_logical_type(Some(LogicalType::List))
					.with_id(id)
					.with_fields(vec![Arc::new(inner)])
					.build()?;
				let plan = FieldPlan::List {
					levels,
					element_nullable,
					element: Box::new(element_plan),
				};
				Ok((ty, plan))
			}
		}
	}

	fn map_type(
		&mut self,
		key: &EntityType,
		value: &EntityType,
		value_nullable: bool,
		annotations: &FieldAnnotations,
		name: &str,
		repetition: Repetition,
		id: Option<i32>,
		path: &str,
	) -> Result<(ParquetType, FieldPlan)> {
		if matches!(key, EntityType::List { .. } | EntityType::Map { .. } | EntityType::DynamicMap) {
			return Err(Error::unsupported(path, "map keys cannot be collections or maps"));
		}
		if self.options.list_levels == ListLevels::One && matches!(value, EntityType::List { .. }) {
			return Err(Error::unsupported(
				path,
				"a map value cannot use the 1-level list encoding; use a multi-level encoding",
			));
		}

		let (key_ty, key_plan) =
			self.entity_type(key, &FieldAnnotations::default(), "key", Repetition::REQUIRED, None, path)?;
		let value_repetition = if value_nullable { Repetition::OPTIONAL } else { Repetition::REQUIRED };
		let (value_ty, value_plan) =
			self.entity_type(value, annotations, "value", value_repetition, None, path)?;

		let key_value = ParquetType::group_type_builder("key_value")
			.with_repetition(Repetition::REPEATED)
			.with_fields(vec![Arc::new(key_ty), Arc::new(value_ty)])
			.build()?;
		let ty = ParquetType::group_type_builder(name)
			.with_repetition(repetition)
			.with_logical_type(Some(LogicalType::Map))
			.with_id(id)
			.with_fields(vec![Arc::new(key_value)])
			.build()?;
		let plan = FieldPlan::Map {
			key: Box::new(key_plan),
			value: Box::new(value_plan),
			value_nullable,
		};
		Ok((ty, plan))
	}

	fn primitive_type(
		&mut self,
		kind: &PrimitiveKind,
		annotations: &FieldAnnotations,
		name: &str,
		repetition: Repetition,
		id: Option<i32>,
		path: &str,
	) -> Result<(ParquetType, FieldPlan)> {
		let mut length: Option<i32> = None;
		let (physical, logical, plan) = match kind {
			PrimitiveKind::Bool => (basic::Type::BOOLEAN, None, PrimitivePlan::Bool),
			PrimitiveKind::I8 => (
				basic::Type::INT32,
				Some(LogicalType::Integer { bit_width: 8, is_signed: true }),
				PrimitivePlan::I8,
			),
			PrimitiveKind::I16 => (
				basic::Type::INT32,
				Some(LogicalType::Integer { bit_width: 16, is_signed: true }),
				PrimitivePlan::I16,
			),
			PrimitiveKind::I32 => (basic::Type::INT32, None, PrimitivePlan::I32),
			PrimitiveKind::I64 => (basic::Type::INT64, None, PrimitivePlan::I64),
			PrimitiveKind::F32 => (basic::Type::FLOAT, None, PrimitivePlan::F32),
			PrimitiveKind::F64 => (basic::Type::DOUBLE, None, PrimitivePlan::F64),
			PrimitiveKind::Str => {
				let logical = if annotations.as_enum {
					LogicalType::Enum
				} else if annotations.as_json {
					LogicalType::Json
				} else {
					LogicalType::String
				};
				let plan = if annotations.as_enum {
					PrimitivePlan::EnumUtf8 { constants: None }
				} else {
					PrimitivePlan::Utf8
				};
				(basic::Type::BYTE_ARRAY, Some(logical), plan)
			}
			PrimitiveKind::Enum(constants) => {
				let logical = if annotations.as_string { LogicalType::String } else { LogicalType::Enum };
				(
					basic::Type::BYTE_ARRAY,
					Some(logical),
					PrimitivePlan::EnumUtf8 { constants: Some(constants.clone()) },
				)
			}
			PrimitiveKind::Binary => {
				let logical = if annotations.as_json {
					Some(LogicalType::Json)
				} else if annotations.as_bson {
					Some(LogicalType::Bson)
				} else if annotations.as_string {
					Some(LogicalType::String)
				} else {
					None
				};
				(basic::Type::BYTE_ARRAY, logical, PrimitivePlan::Bytes)
			}
			PrimitiveKind::Json => (basic::Type::BYTE_ARRAY, Some(LogicalType::Json), PrimitivePlan::Utf8),
			PrimitiveKind::Bson => (basic::Type::BYTE_ARRAY, Some(LogicalType::Bson), PrimitivePlan::Bytes),
			PrimitiveKind::Uuid => {
				length = Some(16);
				(basic::Type::FIXED_LEN_BYTE_ARRAY, Some(LogicalType::Uuid), PrimitivePlan::Uuid)
			}
			PrimitiveKind::Date => (basic::Type::INT32, Some(LogicalType::Date), PrimitivePlan::Date),
			PrimitiveKind::Time { unit, adjusted_utc } => {
				let unit = annotations.time_unit.or(*unit).unwrap_or(self.options.default_time_unit);
				let physical = match unit {
					TimeUnit::Millis => basic::Type::INT32,
					TimeUnit::Micros | TimeUnit::Nanos => basic::Type::INT64,
				};
				let logical = LogicalType::Time {
					is_adjusted_to_u_t_c: *adjusted_utc,
					unit: parquet_time_unit(unit),
				};
				(physical, Some(logical), PrimitivePlan::Time { unit })
			}
			PrimitiveKind::Timestamp { unit, adjusted_utc } => {
				let unit = annotations.time_unit.or(*unit).unwrap_or(self.options.default_time_unit);
				let logical = LogicalType::Timestamp {
					is_adjusted_to_u_t_c: *adjusted_utc,
					unit: parquet_time_unit(unit),
				};
				(basic::Type::INT64, Some(logical), PrimitivePlan::Timestamp { unit })
			}
			PrimitiveKind::Decimal { precision, scale } => {
				return self.decimal_type(*precision, *scale, annotations, name, repetition, id, path);
			}
			// parquet 54 has no GEOMETRY/GEOGRAPHY logical types yet; the WKB
			// payload is stored as plain BINARY (see DESIGN.md).
			PrimitiveKind::Geometry { .. } | PrimitiveKind::Geography { .. } => {
				(basic::Type::BYTE_ARRAY, None, PrimitivePlan::Bytes)
			}
			PrimitiveKind::Variant => {
				return self.variant_type(name, repetition, id);
			}
		};

		let mut builder = ParquetType::primitive_type_builder(name, physical)
			.with_repetition(repetition)
			.with_logical_type(logical)
			.with_id(id);
		if let Some(length) = length {
			builder = builder.with_length(length);
		}
		Ok((builder.build()?, FieldPlan::Primitive(plan)))
	}

	fn decimal_type(
		&mut self,
		precision: Option<u32>,
		scale: Option<i32>,
		annotations: &FieldAnnotations,
		name: &str,
		repetition: Repetition,
		id: Option<i32>,
		path: &str,
	) -> Result<(ParquetType, FieldPlan)> {
		let defaults = self.options.default_decimal;
		let (precision, scale) = match (annotations.decimal, precision.zip(scale), defaults) {
			(Some((p, s)), _, _) => (p, s),
			(None, Some((p, s)), _) => (p, s),
			(None, None, Some(d)) => (d.precision, d.scale),
			(None, None, None) => return Err(Error::DecimalConfigMissing { path: path.to_string() }),
		};
		if precision < 1 || scale < 0 || scale > precision as i32 {
			return Err(Error::unsupported(
				path,
				format!("invalid decimal precision/scale ({}, {})", precision, scale),
			));
		}

		let physical = decimal_physical(precision);
		let parquet_physical = match physical {
			DecimalPhysical::Int32 => basic::Type::INT32,
			DecimalPhysical::Int64 => basic::Type::INT64,
			DecimalPhysical::Binary => basic::Type::BYTE_ARRAY,
		};
		let ty = ParquetType::primitive_type_builder(name, parquet_physical)
			.with_repetition(repetition)
			.with_logical_type(Some(LogicalType::Decimal { scale, precision: precision as i32 }))
			.with_precision(precision as i32)
			.with_scale(scale)
			.with_id(id)
			.build()?;
		let plan = PrimitivePlan::Decimal {
			precision,
			scale,
			rounding: defaults.and_then(|d| d.rounding),
			physical,
		};
		Ok((ty, FieldPlan::Primitive(plan)))
	}

	/// Self-describing variant: two binary columns, metadata and value. The
	/// VARIANT annotation itself is not expressible on parquet 54.
	fn variant_type(&mut self, name: &str, repetition: Repetition, id: Option<i32>) -> Result<(ParquetType, FieldPlan)> {
		let metadata = ParquetType::primitive_type_builder("metadata", basic::Type::BYTE_ARRAY)
			.with_repetition(Repetition::REQUIRED)
			.build()?;
		let value = ParquetType::primitive_type_builder("value", basic::Type::BYTE_ARRAY)
			.with_repetition(Repetition::REQUIRED)
			.build()?;
		let ty = ParquetType::group_type_builder(name)
			.with_repetition(repetition)
			.with_id(id)
			.with_fields(vec![Arc::new(metadata), Arc::new(value)])
			.build()?;
		Ok((ty, FieldPlan::Variant))
	}
}

fn parquet_time_unit(unit: TimeUnit) -> parquet::format::TimeUnit {
	match unit {
		TimeUnit::Millis => parquet::format::TimeUnit::MILLIS(parquet::format::MilliSeconds {}),
		TimeUnit::Micros => parquet::format::TimeUnit::MICROS(parquet::format::MicroSeconds {}),
		TimeUnit::Nanos => parquet::format::TimeUnit::NANOS(parquet::format::NanoSeconds {}),
	}
}
