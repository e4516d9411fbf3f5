//! Read-side reconciliation of a file schema with the requested record
//! shape. Produces a projection: the subset of the file schema the read
//! needs (in file column order), decode plans for every projected leaf and
//! slot maps that put materialized values back into declaration order.

use std::collections::HashMap;
use std::sync::Arc;

use parquet::basic::{ConvertedType, LogicalType, Repetition, Type as PhysicalType};
use parquet::schema::types::{Type as ParquetType, TypePtr};

use crate::descriptor::{EntityType, FieldDesc, PrimitiveKind, RecordDesc};
use crate::error::{Error, Result};
use crate::field_matching::match_column;
use crate::options::{ReadOptions, TimeUnit};
use crate::value::Value;

/// How one projected leaf turns physical values into `Value`s.
#[derive(Debug, Clone)]
pub(crate) enum DecodePlan {
	Bool,
	/// Target integer width in bits; `src_wide` when the column is INT64.
	Int { bits: u8, src_wide: bool },
	Float { wide: bool, src_wide: bool },
	Utf8,
	Json,
	Enum { constants: Option<Arc<Vec<String>>> },
	Bytes,
	Bson,
	Uuid,
	UuidToStr,
	UuidFromStr,
	Date,
	Time { unit: TimeUnit },
	Timestamp { unit: TimeUnit, utc: bool },
	Decimal { scale: i32 },
}

#[derive(Debug)]
pub(crate) enum ProjNode {
	Primitive { plan: DecodePlan },
	Group(ProjGroup),
	List { levels: ProjListLevels, element: Box<ProjNode> },
	Map { key: Box<ProjNode>, value: Box<ProjNode> },
	Variant { metadata_index: usize, value_index: usize },
}

/// Shape the file encodes a list with, as detected from the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProjListLevels {
	One,
	Two,
	Three,
}

#[derive(Debug)]
pub(crate) struct ProjField {
	/// Declaration-order slot the materialized value lands in.
	pub slot: usize,
	pub node: ProjNode,
}

#[derive(Debug)]
pub(crate) struct ProjGroup {
	/// Projected children in file order.
	pub fields: Vec<ProjField>,
	pub slot_count: usize,
	/// Slot names in slot order.
	pub names: Vec<String>,
	/// Per-slot prefill: null, or the zero value for non-nullable
	/// primitives read with defaulting.
	pub defaults: Vec<Value>,
	/// Slots where an actual null must raise `NullForPrimitive` instead of
	/// defaulting.
	pub strict_null: Vec<bool>,
}

#[derive(Debug)]
pub(crate) struct Projection {
	/// Projected schema, file column order preserved.
	pub schema: TypePtr,
	pub root: ProjGroup,
	/// For every projected leaf (depth-first), the leaf ordinal in the
	/// *file* schema, for column-chunk selection.
	pub file_leaves: Vec<usize>,
}

/// Projects the file schema onto a requested record description.
pub(crate) fn project_record(
	file_schema: &TypePtr,
	desc: &RecordDesc,
	options: &ReadOptions,
) -> Result<Projection> {
	let mut file_leaves = Vec::new();
	let (types, root) = project_group(file_schema, 0, desc, options, &desc.name, &mut file_leaves)?;
	let schema = ParquetType::group_type_builder(file_schema.name())
		.with_fields(types)
		.build()?;
	tracing::debug!(record = %desc.name, columns = file_leaves.len(), "projected file schema");
	Ok(Projection { schema: Arc::new(schema), root, file_leaves })
}

/// Projects the whole file schema for a schema-less (dynamic map) read.
pub(crate) fn project_dynamic(file_schema: &TypePtr) -> Result<Projection> {
	let mut file_leaves = Vec::new();
	let root = dynamic_group(file_schema, 0, &mut file_leaves)?;
	Ok(Projection { schema: file_schema.clone(), root, file_leaves })
}

fn count_leaves(node: &TypePtr) -> usize {
	match node.as_ref() {
		ParquetType::PrimitiveType { .. } => 1,
		ParquetType::GroupType { fields, .. } => fields.iter().map(count_leaves).sum(),
	}
}

fn children_of(node: &TypePtr) -> &[TypePtr] {
	match node.as_ref() {
		ParquetType::GroupType { fields, .. } => fields,
		ParquetType::PrimitiveType { .. } => &[],
	}
}

fn project_group(
	file_group: &TypePtr,
	leaf_base: usize,
	desc: &RecordDesc,
	options: &ReadOptions,
	path: &str,
	file_leaves: &mut Vec<usize>,
) -> Result<(Vec<TypePtr>, ProjGroup)> {
	let columns = children_of(file_group);

	// requested slot -> file child index
	let mut chosen: HashMap<usize, usize> = HashMap::new();
	let mut names = Vec::with_capacity(desc.fields.len());
	let mut defaults = Vec::with_capacity(desc.fields.len());
	let mut strict_null = Vec::with_capacity(desc.fields.len());
	for (slot, field) in desc.fields.iter().enumerate() {
		let field_path = format!("{}/{}", path, field.logical_name);
		names.push(field.logical_name.clone());
		defaults.push(default_value(field));
		strict_null.push(
			options.fail_on_null_for_primitives
				&& !field.nullable
				&& matches!(field.declared_type, EntityType::Primitive(_)),
		);
		match match_column(field, columns, options.field_matching, &field_path)? {
			Some((file_index, _)) => {
				if chosen.insert(file_index, slot).is_some() {
					return Err(Error::mismatch(
						&field_path,
						"two requested fields match the same file column",
					));
				}
			}
			None => {
				if options.fail_on_missing_column {
					return Err(Error::MissingColumn { path: field_path });
				}
			}
		}
	}

	let mut projected_types = Vec::new();
	let mut fields = Vec::new();
	let mut base = leaf_base;
	for (file_index, column) in columns.iter().enumerate() {
		if let Some(&slot) = chosen.get(&file_index) {
			let field = &desc.fields[slot];
			let field_path = format!("{}/{}", path, field.logical_name);
			let (ty, node) = project_node(column, base, field, options, &field_path, file_leaves)?;
			projected_types.push(ty);
			fields.push(ProjField { slot, node });
		}
		base += count_leaves(column);
	}

	let group = ProjGroup { fields, slot_count: desc.fields.len(), names, defaults, strict_null };
	Ok((projected_types, group))
}

fn default_value(field: &FieldDesc) -> Value {
	if field.nullable {
		return Value::Null;
	}
	match &field.declared_type {
		EntityType::Primitive(kind) => zero_value(kind),
		_ => Value::Null,
	}
}

fn zero_value(kind: &PrimitiveKind) -> Value {
	match kind {
		PrimitiveKind::Bool => Value::Bool(false),
		PrimitiveKind::I8 => Value::I8(0),
		PrimitiveKind::I16 => Value::I16(0),
		PrimitiveKind::I32 => Value::I32(0),
		PrimitiveKind::I64 => Value::I64(0),
		PrimitiveKind::F32 => Value::F32(0.0),
		PrimitiveKind::F64 => Value::F64(0.0),
		PrimitiveKind::Str | PrimitiveKind::Json => Value::Str(String::new()),
		PrimitiveKind::Binary | PrimitiveKind::Bson => Value::Bytes(Vec::new()),
		_ => Value::Null,
	}
}

fn project_node(
	file_node: &TypePtr,
	leaf_base: usize,
	field: &FieldDesc,
	options: &ReadOptions,
	path: &str,
	file_leaves: &mut Vec<usize>,
) -> Result<(TypePtr, ProjNode)> {
	project_entity(file_node, leaf_base, &field.declared_type, field.nullable, options, path, file_leaves)
}

fn project_entity(
	file_node: &TypePtr,
	leaf_base: usize,
	entity: &EntityType,
	nullable: bool,
	options: &ReadOptions,
	path: &str,
	file_leaves: &mut Vec<usize>,
) -> Result<(TypePtr, ProjNode)> {
	match entity {
		EntityType::Primitive(PrimitiveKind::Variant) => project_variant(file_node, leaf_base, path, file_leaves),
		EntityType::Primitive(kind) => {
			if !file_node.is_primitive() {
				return Err(Error::mismatch(path, "file column is a group, a primitive was requested"));
			}
			let plan = primitive_plan(file_node, kind, nullable, options, path)?;
			file_leaves.push(leaf_base);
			Ok((file_node.clone(), ProjNode::Primitive { plan }))
		}
		EntityType::Record(desc) => {
			if file_node.is_primitive() {
				return Err(Error::mismatch(path, "file column is a primitive, a record was requested"));
			}
			if is_list_shaped(file_node) || is_map_shaped(file_node) {
				return Err(Error::mismatch(path, "file column is a collection, a record was requested"));
			}
			let (types, group) = project_group(file_node, leaf_base, desc, options, path, file_leaves)?;
			let ty = rebuild_group(file_node, types)?;
			Ok((ty, ProjNode::Group(group)))
		}
		EntityType::List { element, .. } => project_list(file_node, leaf_base, element, options, path, file_leaves),
		EntityType::Map { key, value, .. } => project_map(file_node, leaf_base, key, value, options, path, file_leaves),
		EntityType::DynamicMap => {
			if file_node.is_primitive() {
				return Err(Error::mismatch(path, "file column is a primitive, a dynamic map was requested"));
			}
			let group = dynamic_group(file_node, leaf_base, file_leaves)?;
			Ok((file_node.clone(), ProjNode::Group(group)))
		}
	}
}

fn repetition_of(node: &TypePtr) -> Repetition {
	let info = node.get_basic_info();
	if info.has_repetition() {
		info.repetition()
	} else {
		Repetition::REQUIRED
	}
}

fn is_list_shaped(node: &TypePtr) -> bool {
	!node.is_primitive()
		&& (matches!(node.get_basic_info().logical_type(), Some(LogicalType::List))
			|| node.get_basic_info().converted_type() == ConvertedType::LIST)
}

fn is_map_shaped(node: &TypePtr) -> bool {
	!node.is_primitive()
		&& (matches!(node.get_basic_info().logical_type(), Some(LogicalType::Map))
			|| node.get_basic_info().converted_type() == ConvertedType::MAP
			|| node.get_basic_info().converted_type() == ConvertedType::MAP_KEY_VALUE)
}

fn rebuild_group(file_group: &TypePtr, children: Vec<TypePtr>) -> Result<TypePtr> {
	let info = file_group.get_basic_info();
	let mut builder = ParquetType::group_type_builder(info.name())
		.with_logical_type(info.logical_type())
		.with_converted_type(info.converted_type())
		.with_fields(children);
	if info.has_repetition() {
		builder = builder.with_repetition(info.repetition());
	}
	Ok(Arc::new(builder.build()?))
}

fn project_list(
	file_node: &TypePtr,
	leaf_base: usize,
	element: &EntityType,
	options: &ReadOptions,
	path: &str,
	file_leaves: &mut Vec<usize>,
) -> Result<(TypePtr, ProjNode)> {
	// A repeated field with no LIST wrapper is the 1-level form.
	if repetition_of(file_node) == Repetition::REPEATED {
		if matches!(element, EntityType::List { .. } | EntityType::Map { .. }) {
			return Err(Error::unsupported(path, "a 1-level list cannot hold a nested collection"));
		}
		let (ty, node) = project_entity(file_node, leaf_base, element, false, options, path, file_leaves)?;
		return Ok((ty, ProjNode::List { levels: ProjListLevels::One, element: Box::new(node) }));
	}

	if !is_list_shaped(file_node) {
		return Err(Error::mismatch(path, "file column is not a list"));
	}
	let children = children_of(file_node);
	if children.len() != 1 || repetition_of(&children[0]) != Repetition::REPEATED {
		return Err(Error::mismatch(path, "malformed list group in the file schema"));
	}
	let repeated = &children[0];

	// Three-level: the repeated child is a group holding a single field
	// named "element"; anything else is the 2-level form.
	let three_level = !repeated.is_primitive()
		&& repeated.get_basic_info().logical_type().is_none()
		&& children_of(repeated).len() == 1
		&& children_of(repeated)[0].name() == "element";

	if three_level {
		let element_node = &children_of(repeated)[0];
		let element_nullable = repetition_of(element_node) == Repetition::OPTIONAL;
		let (element_ty, element_proj) =
			project_entity(element_node, leaf_base, element, element_nullable, options, path, file_leaves)?;
		let inner = ParquetType::group_type_builder(repeated.name())
			.with_repetition(Repetition::REPEATED)
			.with_fields(vec![element_ty])
			.build()?;
		let ty = rebuild_group(file_node, vec![Arc::new(inner)])?;
		Ok((ty, ProjNode::List { levels: ProjListLevels::Three, element: Box::new(element_proj) }))
	} else {
		let (element_ty, element_proj) =
			project_entity(repeated, leaf_base, element, false, options, path, file_leaves)?;
		let ty = rebuild_group(file_node, vec![element_ty])?;
		Ok((ty, ProjNode::List { levels: ProjListLevels::Two, element: Box::new(element_proj) }))
	}
}

fn project_map(
	file_node: &TypePtr,
	leaf_base: usize,
	key: &EntityType,
	value: &EntityType,
	options: &ReadOptions,
	path: &str,
	file_leaves: &mut Vec<usize>,
) -> Result<(TypePtr, ProjNode)> {
	if !is_map_shaped(file_node) {
		return Err(Error::mismatch(path, "file column is not a map"));
	}
	let children = children_of(file_node);
	if children.len() != 1 || repetition_of(&children[0]) != Repetition::REPEATED {
		return Err(Error::mismatch(path, "malformed map group in the file schema"));
	}
	let key_value = &children[0];
	let entries = children_of(key_value);
	if entries.len() != 2 {
		return Err(Error::mismatch(path, "map entry group must hold exactly a key and a value"));
	}

	let key_path = format!("{}/key", path);
	let value_path = format!("{}/value", path);
	let (key_ty, key_proj) = project_entity(&entries[0], leaf_base, key, false, options, &key_path, file_leaves)?;
	let value_nullable = repetition_of(&entries[1]) == Repetition::OPTIONAL;
	let (value_ty, value_proj) = project_entity(
		&entries[1],
		leaf_base + count_leaves(&entries[0]),
		value,
		value_nullable,
		options,
		&value_path,
		file_leaves,
	)?;

	let inner = ParquetType::group_type_builder(key_value.name())
		.with_repetition(Repetition::REPEATED)
		.with_fields(vec![key_ty, value_ty])
		.build()?;
	let ty = rebuild_group(file_node, vec![Arc::new(inner)])?;
	Ok((ty, ProjNode::Map { key: Box::new(key_proj), value: Box::new(value_proj) }))
}

fn project_variant(
	file_node: &TypePtr,
	leaf_base: usize,
	path: &str,
	file_leaves: &mut Vec<usize>,
) -> Result<(TypePtr, ProjNode)> {
	match variant_shape(file_node) {
		Some((metadata_index, value_index)) => {
			file_leaves.push(leaf_base);
			file_leaves.push(leaf_base + 1);
			Ok((file_node.clone(), ProjNode::Variant { metadata_index, value_index }))
		}
		None => Err(Error::mismatch(path, "file column is not a variant group")),
	}
}

/// A variant column is a group with exactly two binary fields, `metadata`
/// and `value`.
fn variant_shape(node: &TypePtr) -> Option<(usize, usize)> {
	if node.is_primitive() {
		return None;
	}
	let children = children_of(node);
	if children.len() != 2 {
		return None;
	}
	let mut metadata = None;
	let mut value = None;
	for (i, child) in children.iter().enumerate() {
		if !child.is_primitive() || child.get_physical_type() != PhysicalType::BYTE_ARRAY {
			return None;
		}
		match child.name() {
			"metadata" => metadata = Some(i),
			"value" => value = Some(i),
			_ => return None,
		}
	}
	metadata.zip(value)
}

fn dynamic_group(file_group: &TypePtr, leaf_base: usize, file_leaves: &mut Vec<usize>) -> Result<ProjGroup> {
	let columns = children_of(file_group);
	let mut fields = Vec::with_capacity(columns.len());
	let mut names = Vec::with_capacity(columns.len());
	let mut base = leaf_base;
	for (slot, column) in columns.iter().enumerate() {
		names.push(column.name().to_string());
		let node = dynamic_node(column, base, file_leaves)?;
		fields.push(ProjField { slot, node });
		base += count_leaves(column);
	}
	let defaults = vec![Value::Null; columns.len()];
	let strict_null = vec![false; columns.len()];
	Ok(ProjGroup { slot_count: columns.len(), fields, names, defaults, strict_null })
}

fn dynamic_node(column: &TypePtr, leaf_base: usize, file_leaves: &mut Vec<usize>) -> Result<ProjNode> {
	if column.is_primitive() {
		file_leaves.push(leaf_base);
		return Ok(ProjNode::Primitive { plan: dynamic_plan(column) });
	}

	if repetition_of(column) == Repetition::REPEATED {
		// 1-level list of whatever the repeated node holds
		let element = dynamic_repeated_element(column, leaf_base, file_leaves)?;
		return Ok(ProjNode::List { levels: ProjListLevels::One, element: Box::new(element) });
	}

	if is_list_shaped(column) {
		let children = children_of(column);
		if children.len() == 1 && repetition_of(&children[0]) == Repetition::REPEATED {
			let repeated = &children[0];
			let three_level = !repeated.is_primitive()
				&& repeated.get_basic_info().logical_type().is_none()
				&& children_of(repeated).len() == 1
				&& children_of(repeated)[0].name() == "element";
			if three_level {
				let element = dynamic_node(&children_of(repeated)[0], leaf_base, file_leaves)?;
				return Ok(ProjNode::List { levels: ProjListLevels::Three, element: Box::new(element) });
			}
			let element = dynamic_repeated_element(repeated, leaf_base, file_leaves)?;
			return Ok(ProjNode::List { levels: ProjListLevels::Two, element: Box::new(element) });
		}
	}

	if is_map_shaped(column) {
		let children = children_of(column);
		if children.len() == 1 && repetition_of(&children[0]) == Repetition::REPEATED {
			let entries = children_of(&children[0]);
			if entries.len() == 2 {
				let key = dynamic_node(&entries[0], leaf_base, file_leaves)?;
				let value = dynamic_node(&entries[1], leaf_base + count_leaves(&entries[0]), file_leaves)?;
				return Ok(ProjNode::Map { key: Box::new(key), value: Box::new(value) });
			}
		}
	}

	if let Some((metadata_index, value_index)) = variant_shape(column) {
		file_leaves.push(leaf_base);
		file_leaves.push(leaf_base + 1);
		return Ok(ProjNode::Variant { metadata_index, value_index });
	}

	dynamic_group(column, leaf_base, file_leaves).map(ProjNode::Group)
}

/// Element of a repeated node when reading dynamically: the repeated node
/// itself, as a struct or primitive.
fn dynamic_repeated_element(
	repeated: &TypePtr,
	leaf_base: usize,
	file_leaves: &mut Vec<usize>,
) -> Result<ProjNode> {
	if repeated.is_primitive() {
		file_leaves.push(leaf_base);
		Ok(ProjNode::Primitive { plan: dynamic_plan(repeated) })
	} else {
		dynamic_group(repeated, leaf_base, file_leaves).map(ProjNode::Group)
	}
}

struct FileColumn {
	physical: PhysicalType,
	logical: Option<LogicalType>,
	converted: ConvertedType,
	type_length: i32,
	scale: i32,
	repetition: Repetition,
}

fn file_column(node: &TypePtr) -> FileColumn {
	match node.as_ref() {
		ParquetType::PrimitiveType { basic_info, physical_type, type_length, scale, .. } => FileColumn {
			physical: *physical_type,
			logical: basic_info.logical_type(),
			converted: basic_info.converted_type(),
			type_length: *type_length,
			scale: *scale,
			repetition: repetition_of(node),
		},
		ParquetType::GroupType { .. } => unreachable!("file_column on a group"),
	}
}

/// Effective signed bit width of an integer column.
fn int_source_bits(col: &FileColumn) -> Option<u8> {
	match col.physical {
		PhysicalType::INT32 => Some(match (&col.logical, col.converted) {
			(Some(LogicalType::Integer { bit_width: 8, .. }), _) | (None, ConvertedType::INT_8) => 8,
			(Some(LogicalType::Integer { bit_width: 16, .. }), _) | (None, ConvertedType::INT_16) => 16,
			_ => 32,
		}),
		PhysicalType::INT64 => Some(64),
		_ => None,
	}
}

fn narrowing_guard(
	options: &ReadOptions,
	path: &str,
	from: &'static str,
	to: &'static str,
) -> Result<()> {
	if options.fail_narrowing_primitive_conversion {
		Err(Error::NarrowingNotAllowed { path: path.to_string(), from, to })
	} else {
		Ok(())
	}
}

fn int_plan(col: &FileColumn, bits: u8, options: &ReadOptions, path: &str) -> Result<DecodePlan> {
	let src_bits = match int_source_bits(col) {
		Some(b) => b,
		None => return Err(Error::mismatch(path, "file column is not an integer")),
	};
	if src_bits > bits {
		let from = match src_bits {
			64 => "i64",
			32 => "i32",
			_ => "i16",
		};
		let to = match bits {
			8 => "i8",
			16 => "i16",
			_ => "i32",
		};
		narrowing_guard(options, path, from, to)?;
	}
	Ok(DecodePlan::Int { bits, src_wide: col.physical == PhysicalType::INT64 })
}

fn is_string_like(col: &FileColumn) -> bool {
	matches!(
		col.logical,
		Some(LogicalType::String) | Some(LogicalType::Enum) | Some(LogicalType::Json)
	) || matches!(col.converted, ConvertedType::UTF8 | ConvertedType::ENUM | ConvertedType::JSON)
}

fn primitive_plan(
	file_node: &TypePtr,
	kind: &PrimitiveKind,
	_nullable: bool,
	options: &ReadOptions,
	path: &str,
) -> Result<DecodePlan> {
	let col = file_column(file_node);
	// Rejecting optional columns mapped onto non-nullable primitive fields
	// happens at materialization, where an actual null can be told apart
	// from an always-present column.
	let _ = col.repetition;

	match kind {
		PrimitiveKind::Bool => match col.physical {
			PhysicalType::BOOLEAN => Ok(DecodePlan::Bool),
			_ => Err(Error::mismatch(path, "file column is not a boolean")),
		},
		PrimitiveKind::I8 => int_plan(&col, 8, options, path),
		PrimitiveKind::I16 => int_plan(&col, 16, options, path),
		PrimitiveKind::I32 => int_plan(&col, 32, options, path),
		PrimitiveKind::I64 => int_plan(&col, 64, options, path),
		PrimitiveKind::F32 => match col.physical {
			PhysicalType::FLOAT => Ok(DecodePlan::Float { wide: false, src_wide: false }),
			PhysicalType::DOUBLE => {
				narrowing_guard(options, path, "f64", "f32")?;
				Ok(DecodePlan::Float { wide: false, src_wide: true })
			}
			_ => Err(Error::mismatch(path, "file column is not a float")),
		},
		PrimitiveKind::F64 => match col.physical {
			PhysicalType::DOUBLE => Ok(DecodePlan::Float { wide: true, src_wide: true }),
			PhysicalType::FLOAT => Ok(DecodePlan::Float { wide: true, src_wide: false }),
			_ => Err(Error::mismatch(path, "file column is not a float")),
		},
		PrimitiveKind::Str => match col.physical {
			PhysicalType::BYTE_ARRAY => Ok(DecodePlan::Utf8),
			PhysicalType::FIXED_LEN_BYTE_ARRAY
				if matches!(col.logical, Some(LogicalType::Uuid)) || col.type_length == 16 =>
			{
				Ok(DecodePlan::UuidToStr)
			}
			_ => Err(Error::mismatch(path, "file column is not a string")),
		},
		PrimitiveKind::Enum(constants) => match col.physical {
			PhysicalType::BYTE_ARRAY => Ok(DecodePlan::Enum { constants: Some(constants.clone()) }),
			_ => Err(Error::mismatch(path, "file column is not an enum")),
		},
		PrimitiveKind::Json => match col.physical {
			PhysicalType::BYTE_ARRAY => Ok(DecodePlan::Json),
			_ => Err(Error::mismatch(path, "file column is not a json string")),
		},
		PrimitiveKind::Binary | PrimitiveKind::Geometry { .. } | PrimitiveKind::Geography { .. } => {
			match col.physical {
				PhysicalType::BYTE_ARRAY | PhysicalType::FIXED_LEN_BYTE_ARRAY => Ok(DecodePlan::Bytes),
				_ => Err(Error::mismatch(path, "file column is not binary")),
			}
		}
		PrimitiveKind::Bson => match col.physical {
			PhysicalType::BYTE_ARRAY => Ok(DecodePlan::Bson),
			_ => Err(Error::mismatch(path, "file column is not bson")),
		},
		PrimitiveKind::Uuid => match col.physical {
			PhysicalType::FIXED_LEN_BYTE_ARRAY if col.type_length == 16 => Ok(DecodePlan::Uuid),
			PhysicalType::BYTE_ARRAY if is_string_like(&col) => Ok(DecodePlan::UuidFromStr),
			_ => Err(Error::mismatch(path, "file column is not a uuid")),
		},
		PrimitiveKind::Date => match col.physical {
			PhysicalType::INT32 => Ok(DecodePlan::Date),
			_ => Err(Error::mismatch(path, "file column is not a date")),
		},
		PrimitiveKind::Time { .. } => match col.physical {
			PhysicalType::INT32 => Ok(DecodePlan::Time { unit: TimeUnit::Millis }),
			PhysicalType::INT64 => Ok(DecodePlan::Time { unit: file_time_unit(&col).unwrap_or(TimeUnit::Micros) }),
			_ => Err(Error::mismatch(path, "file column is not a time")),
		},
		PrimitiveKind::Timestamp { adjusted_utc, .. } => match col.physical {
			PhysicalType::INT64 => {
				let (unit, utc) = file_timestamp_info(&col, *adjusted_utc);
				Ok(DecodePlan::Timestamp { unit, utc })
			}
			_ => Err(Error::mismatch(path, "file column is not a timestamp")),
		},
		PrimitiveKind::Decimal { .. } => decimal_plan(&col, path),
		PrimitiveKind::Variant => unreachable!("variant columns are projected as groups"),
	}
}

fn file_time_unit(col: &FileColumn) -> Option<TimeUnit> {
	match &col.logical {
		Some(LogicalType::Time { unit, .. }) | Some(LogicalType::Timestamp { unit, .. }) => Some(match unit {
			parquet::format::TimeUnit::MILLIS(_) => TimeUnit::Millis,
			parquet::format::TimeUnit::MICROS(_) => TimeUnit::Micros,
			parquet::format::TimeUnit::NANOS(_) => TimeUnit::Nanos,
		}),
		None => match col.converted {
			ConvertedType::TIME_MILLIS | ConvertedType::TIMESTAMP_MILLIS => Some(TimeUnit::Millis),
			ConvertedType::TIME_MICROS | ConvertedType::TIMESTAMP_MICROS => Some(TimeUnit::Micros),
			_ => None,
		},
		_ => None,
	}
}

fn file_timestamp_info(col: &FileColumn, requested_utc: bool) -> (TimeUnit, bool) {
	let unit = file_time_unit(col).unwrap_or(TimeUnit::Micros);
	let utc = match &col.logical {
		Some(LogicalType::Timestamp { is_adjusted_to_u_t_c, .. }) => *is_adjusted_to_u_t_c,
		_ => requested_utc,
	};
	(unit, utc)
}

fn decimal_plan(col: &FileColumn, path: &str) -> Result<DecodePlan> {
	let scale = match &col.logical {
		Some(LogicalType::Decimal { scale, .. }) => *scale,
		None if col.converted == ConvertedType::DECIMAL => col.scale,
		_ => return Err(Error::mismatch(path, "file column is not a decimal")),
	};
	match col.physical {
		PhysicalType::INT32 | PhysicalType::INT64 | PhysicalType::BYTE_ARRAY | PhysicalType::FIXED_LEN_BYTE_ARRAY => {
			Ok(DecodePlan::Decimal { scale })
		}
		_ => Err(Error::mismatch(path, "unsupported decimal physical type")),
	}
}

fn dynamic_plan(column: &TypePtr) -> DecodePlan {
	let col = file_column(column);
	match col.physical {
		PhysicalType::BOOLEAN => DecodePlan::Bool,
		PhysicalType::INT32 => match (&col.logical, col.converted) {
			(Some(LogicalType::Integer { bit_width: 8, .. }), _) | (None, ConvertedType::INT_8) => {
				DecodePlan::Int { bits: 8, src_wide: false }
			}
			(Some(LogicalType::Integer { bit_width: 16, .. }), _) | (None, ConvertedType::INT_16) => {
				DecodePlan::Int { bits: 16, src_wide: false }
			}
			(Some(LogicalType::Date), _) | (None, ConvertedType::DATE) => DecodePlan::Date,
			(Some(LogicalType::Time { .. }), _) | (None, ConvertedType::TIME_MILLIS) => {
				DecodePlan::Time { unit: TimeUnit::Millis }
			}
			(Some(LogicalType::Decimal { scale, .. }), _) => DecodePlan::Decimal { scale: *scale },
			(None, ConvertedType::DECIMAL) => DecodePlan::Decimal { scale: col.scale },
			_ => DecodePlan::Int { bits: 32, src_wide: false },
		},
		PhysicalType::INT64 => match (&col.logical, col.converted) {
			(Some(LogicalType::Timestamp { is_adjusted_to_u_t_c, .. }), _) => DecodePlan::Timestamp {
				unit: file_time_unit(&col).unwrap_or(TimeUnit::Micros),
				utc: *is_adjusted_to_u_t_c,
			},
			(None, ConvertedType::TIMESTAMP_MILLIS) => {
				DecodePlan::Timestamp { unit: TimeUnit::Millis, utc: true }
			}
			(None, ConvertedType::TIMESTAMP_MICROS) => {
				DecodePlan::Timestamp { unit: TimeUnit::Micros, utc: true }
			}
			(Some(LogicalType::Time { .. }), _) | (None, ConvertedType::TIME_MICROS) => {
				DecodePlan::Time { unit: file_time_unit(&col).unwrap_or(TimeUnit::Micros) }
			}
			(Some(LogicalType::Decimal { scale, .. }), _) => DecodePlan::Decimal { scale: *scale },
			(None, ConvertedType::DECIMAL) => DecodePlan::Decimal { scale: col.scale },
			_ => DecodePlan::Int { bits: 64, src_wide: true },
		},
		PhysicalType::FLOAT => DecodePlan::Float { wide: false, src_wide: false },
		PhysicalType::DOUBLE => DecodePlan::Float { wide: true, src_wide: true },
		PhysicalType::BYTE_ARRAY => match (&col.logical, col.converted) {
			(Some(LogicalType::String), _) | (None, ConvertedType::UTF8) => DecodePlan::Utf8,
			(Some(LogicalType::Enum), _) | (None, ConvertedType::ENUM) => DecodePlan::Enum { constants: None },
			(Some(LogicalType::Json), _) | (None, ConvertedType::JSON) => DecodePlan::Json,
			(Some(LogicalType::Bson), _) | (None, ConvertedType::BSON) => DecodePlan::Bson,
			(Some(LogicalType::Decimal { scale, .. }), _) => DecodePlan::Decimal { scale: *scale },
			(None, ConvertedType::DECIMAL) => DecodePlan::Decimal { scale: col.scale },
			_ => DecodePlan::Bytes,
		},
		PhysicalType::FIXED_LEN_BYTE_ARRAY => match &col.logical {
			Some(LogicalType::Uuid) => DecodePlan::Uuid,
			Some(LogicalType::Decimal { scale, .. }) => DecodePlan::Decimal { scale: *scale },
			_ => DecodePlan::Bytes,
		},
		PhysicalType::INT96 => DecodePlan::Bytes,
	}
}

#[cfg(test)]
mod tests {
	use crate::descriptor::{FieldDesc, RecordDesc};
	use crate::options::{FieldMatching, WriteOptions};
	use crate::schema_builder::derive_schema;

	use super::*;

	fn schema_for(desc: &Arc<RecordDesc>) -> TypePtr {
		derive_schema(desc, &WriteOptions::default()).unwrap().schema
	}

	fn prim(name: &str, kind: PrimitiveKind) -> FieldDesc {
		FieldDesc::new(name, EntityType::Primitive(kind))
	}

	#[test]
	fn widening_is_always_accepted() {
		let file = schema_for(&RecordDesc::new("Rec", vec![prim("age", PrimitiveKind::I32)]));
		let requested = RecordDesc::new("Rec", vec![prim("age", PrimitiveKind::I64)]);
		let projection = project_record(&file, &requested, &ReadOptions::default()).unwrap();
		match &projection.root.fields[0].node {
			ProjNode::Primitive { plan: DecodePlan::Int { bits: 64, src_wide: false } } => {}
			other => panic!("unexpected plan: {:?}", other),
		}
	}

	#[test]
	fn narrowing_respects_the_flag() {
		let file = schema_for(&RecordDesc::new("Rec", vec![prim("age", PrimitiveKind::I64)]));
		let requested = RecordDesc::new("Rec", vec![prim("age", PrimitiveKind::I32)]);

		assert!(project_record(&file, &requested, &ReadOptions::default()).is_ok());
		let err = project_record(&file, &requested, &ReadOptions::default().with_fail_narrowing())
			.unwrap_err();
		assert!(matches!(err, Error::NarrowingNotAllowed { .. }));
	}

	#[test]
	fn logical_int8_is_not_a_narrowing() {
		let file = schema_for(&RecordDesc::new("Rec", vec![prim("d", PrimitiveKind::I8)]));
		let requested = RecordDesc::new("Rec", vec![prim("d", PrimitiveKind::I8)]);
		let projection =
			project_record(&file, &requested, &ReadOptions::default().with_fail_narrowing()).unwrap();
		match &projection.root.fields[0].node {
			ProjNode::Primitive { plan: DecodePlan::Int { bits: 8, src_wide: false } } => {}
			other => panic!("unexpected plan: {:?}", other),
		}
	}

	#[test]
	fn missing_column_behavior_follows_the_flag() {
		let file = schema_for(&RecordDesc::new("Rec", vec![prim("a", PrimitiveKind::I64)]));
		let requested = RecordDesc::new(
			"Rec",
			vec![prim("a", PrimitiveKind::I64), prim("extra", PrimitiveKind::Str).nullable()],
		);

		let err = project_record(&file, &requested, &ReadOptions::default()).unwrap_err();
		assert!(matches!(err, Error::MissingColumn { .. }));

		let projection =
			project_record(&file, &requested, &ReadOptions::default().with_missing_columns_as_null())
				.unwrap();
		assert_eq!(projection.root.fields.len(), 1);
		assert_eq!(projection.root.slot_count, 2);
		assert_eq!(projection.root.defaults[1], Value::Null);
	}

	#[test]
	fn projection_keeps_file_order() {
		let file = schema_for(&RecordDesc::new(
			"Rec",
			vec![
				prim("a", PrimitiveKind::I64),
				prim("b", PrimitiveKind::Str),
				prim("c", PrimitiveKind::F64),
			],
		));
		// requested in a different order: the projection must stay a, c
		let requested = RecordDesc::new(
			"Rec",
			vec![prim("c", PrimitiveKind::F64), prim("a", PrimitiveKind::I64)],
		);
		let projection = project_record(&file, &requested, &ReadOptions::default()).unwrap();
		let names: Vec<&str> = match projection.schema.as_ref() {
			ParquetType::GroupType { fields, .. } => fields.iter().map(|f| f.name()).collect(),
			_ => panic!(),
		};
		assert_eq!(names, vec!["a", "c"]);
		// and the slots map back to the requested order
		assert_eq!(projection.root.fields[0].slot, 1);
		assert_eq!(projection.root.fields[1].slot, 0);
		assert_eq!(projection.file_leaves, vec![0, 2]);
	}

	#[test]
	fn shape_mismatches_are_rejected() {
		let file = schema_for(&RecordDesc::new(
			"Rec",
			vec![FieldDesc::new("xs", EntityType::list(EntityType::Primitive(PrimitiveKind::I32)))],
		));
		let requested = RecordDesc::new("Rec", vec![prim("xs", PrimitiveKind::I32)]);
		let err = project_record(&file, &requested, &ReadOptions::default()).unwrap_err();
		assert!(matches!(err, Error::TypeMismatch { .. }));

		let as_map = RecordDesc::new(
			"Rec",
			vec![FieldDesc::new(
				"xs",
				EntityType::map(
					EntityType::Primitive(PrimitiveKind::Str),
					EntityType::Primitive(PrimitiveKind::I32),
				),
			)],
		);
		assert!(matches!(
			project_record(&file, &as_map, &ReadOptions::default()).unwrap_err(),
			Error::TypeMismatch { .. }
		));
	}

	#[test]
	fn three_level_lists_are_detected_by_shape() {
		let file = schema_for(&RecordDesc::new(
			"Rec",
			vec![FieldDesc::new("xs", EntityType::list(EntityType::Primitive(PrimitiveKind::Str)))],
		));
		let requested = RecordDesc::new(
			"Rec",
			vec![FieldDesc::new("xs", EntityType::list(EntityType::Primitive(PrimitiveKind::Str)))],
		);
		let projection = project_record(&file, &requested, &ReadOptions::default()).unwrap();
		match &projection.root.fields[0].node {
			ProjNode::List { levels: ProjListLevels::Three, .. } => {}
			other => panic!("unexpected node: {:?}", other),
		}
	}

	#[test]
	fn enum_and_string_interchange() {
		let file = schema_for(&RecordDesc::new(
			"Rec",
			vec![prim("color", PrimitiveKind::enumeration(["RED", "GREEN"]))],
		));
		// an enum column read as a plain string
		let as_string = RecordDesc::new("Rec", vec![prim("color", PrimitiveKind::Str)]);
		let projection = project_record(&file, &as_string, &ReadOptions::default()).unwrap();
		assert!(matches!(
			&projection.root.fields[0].node,
			ProjNode::Primitive { plan: DecodePlan::Utf8 }
		));

		// and a string column read as an enum
		let file = schema_for(&RecordDesc::new("Rec", vec![prim("color", PrimitiveKind::Str)]));
		let as_enum = RecordDesc::new(
			"Rec",
			vec![prim("color", PrimitiveKind::enumeration(["RED", "GREEN"]))],
		);
		let projection = project_record(&file, &as_enum, &ReadOptions::default()).unwrap();
		assert!(matches!(
			&projection.root.fields[0].node,
			ProjNode::Primitive { plan: DecodePlan::Enum { .. } }
		));
	}

	#[test]
	fn uuid_reads_as_string_and_back() {
		let file = schema_for(&RecordDesc::new("Rec", vec![prim("id", PrimitiveKind::Uuid)]));
		let as_string = RecordDesc::new("Rec", vec![prim("id", PrimitiveKind::Str)]);
		let projection = project_record(&file, &as_string, &ReadOptions::default()).unwrap();
		assert!(matches!(
			&projection.root.fields[0].node,
			ProjNode::Primitive { plan: DecodePlan::UuidToStr }
		));

		let file = schema_for(&RecordDesc::new("Rec", vec![prim("id", PrimitiveKind::Str)]));
		let as_uuid = RecordDesc::new("Rec", vec![prim("id", PrimitiveKind::Uuid)]);
		let projection = project_record(&file, &as_uuid, &ReadOptions::default()).unwrap();
		assert!(matches!(
			&projection.root.fields[0].node,
			ProjNode::Primitive { plan: DecodePlan::UuidFromStr }
		));
	}

	#[test]
	fn dynamic_target_keeps_the_whole_group() {
		let child = RecordDesc::new(
			"Child",
			vec![prim("d", PrimitiveKind::I8), prim("e", PrimitiveKind::I64).nullable()],
		);
		let file = schema_for(&RecordDesc::new(
			"Outer",
			vec![
				prim("a", PrimitiveKind::Str),
				FieldDesc::new("c", EntityType::record(child)).nullable(),
			],
		));
		let requested = RecordDesc::new(
			"Outer",
			vec![
				prim("a", PrimitiveKind::Str),
				FieldDesc::new("c", EntityType::DynamicMap).nullable(),
			],
		);
		let projection = project_record(&file, &requested, &ReadOptions::default()).unwrap();
		match &projection.root.fields[1].node {
			ProjNode::Group(group) => {
				assert_eq!(group.names, vec!["d", "e"]);
			}
			other => panic!("unexpected node: {:?}", other),
		}
		assert_eq!(projection.file_leaves, vec![0, 1, 2]);
	}

	#[test]
	fn snake_case_matching_lines_up_columns() {
		let mut options = WriteOptions::default();
		options.column_naming = crate::options::ColumnNaming::SnakeCase;
		let file_desc = RecordDesc::new("Rec", vec![prim("firstName", PrimitiveKind::Str)]);
		let file = derive_schema(&file_desc, &options).unwrap().schema;

		let requested = RecordDesc::new("Rec", vec![prim("firstName", PrimitiveKind::Str)]);
		assert!(matches!(
			project_record(&file, &requested, &ReadOptions::default()).unwrap_err(),
			Error::MissingColumn { .. }
		));
		let read_options = ReadOptions::default().with_field_matching(FieldMatching::SnakeCase);
		assert!(project_record(&file, &requested, &read_options).is_ok());
	}
}
