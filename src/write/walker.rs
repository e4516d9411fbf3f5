//! Traversal of one record value against the write plan, emitting consumer
//! events. Order follows the declaration order of the description; absent
//! (null) values emit nothing, which the striper turns into nulls at the
//! right definition level.

use crate::convert;
use crate::error::{Error, Result};
use crate::options::{ListLevels, TimeUnit};
use crate::schema_builder::{DecimalPhysical, FieldPlan, FieldPlanEntry, PrimitivePlan, RecordPlan};
use crate::value::Value;

use super::consumer::RecordConsumer;

pub(crate) struct RecordWalker {
	plan: RecordPlan,
}

impl RecordWalker {
	pub fn new(plan: RecordPlan) -> RecordWalker {
		RecordWalker { plan }
	}

	/// Emits one full row for `value`, which must be a record matching the
	/// plan's shape.
	pub fn write_row<C: RecordConsumer>(&self, value: &Value, out: &mut C) -> Result<()> {
		out.start_message()?;
		let mut trail = Vec::new();
		write_record(&self.plan, value, out, &mut trail)?;
		out.end_message()
	}
}

fn trail_path(trail: &[&str]) -> String {
	trail.join("/")
}

fn write_record<'a, C: RecordConsumer>(
	plan: &'a RecordPlan,
	value: &'a Value,
	out: &mut C,
	trail: &mut Vec<&'a str>,
) -> Result<()> {
	let fields = match value {
		Value::Record(fields) => fields,
		other => {
			return Err(Error::mismatch(
				trail_path(trail),
				format!("expected a record value, got {}", other.kind_name()),
			))
		}
	};
	if fields.len() != plan.fields.len() {
		return Err(Error::mismatch(
			trail_path(trail),
			format!("record value has {} fields, the schema has {}", fields.len(), plan.fields.len()),
		));
	}

	for (index, (entry, (_, field_value))) in plan.fields.iter().zip(fields).enumerate() {
		write_field(entry, index, field_value, out, trail)?;
	}
	Ok(())
}

fn write_field<'a, C: RecordConsumer>(
	entry: &'a FieldPlanEntry,
	index: usize,
	value: &'a Value,
	out: &mut C,
	trail: &mut Vec<&'a str>,
) -> Result<()> {
	trail.push(&entry.wire_name);
	let result = (|| {
		if value.is_null() {
			if !entry.nullable {
				return Err(Error::NullInRequired { path: trail_path(trail) });
			}
			return Ok(());
		}

		// A 1-level list has no wrapper group: every element repeats the
		// field itself under the outer column name.
		if let FieldPlan::List { levels: ListLevels::One, element, .. } = &entry.plan {
			let items = expect_list(value, trail)?;
			for item in items {
				if item.is_null() {
					return Err(Error::NullInRequired {
						path: format!("{}/<element>", trail_path(trail)),
					});
				}
				out.start_field(&entry.wire_name, index)?;
				write_payload(element, item, out, trail)?;
				out.end_field(&entry.wire_name, index)?;
			}
			return Ok(());
		}

		out.start_field(&entry.wire_name, index)?;
		write_payload(&entry.plan, value, out, trail)?;
		out.end_field(&entry.wire_name, index)
	})();
	trail.pop();
	result
}

fn expect_list<'a>(value: &'a Value, trail: &[&str]) -> Result<&'a Vec<Value>> {
	match value {
		Value::List(items) => Ok(items),
		other => Err(Error::mismatch(
			trail_path(trail),
			format!("expected a list value, got {}", other.kind_name()),
		)),
	}
}

fn write_payload<'a, C: RecordConsumer>(
	plan: &'a FieldPlan,
	value: &'a Value,
	out: &mut C,
	trail: &mut Vec<&'a str>,
) -> Result<()> {
	match plan {
		FieldPlan::Primitive(p) => write_primitive(p, value, out, trail),
		FieldPlan::Record(record_plan) => {
			out.start_group()?;
			write_record(record_plan, value, out, trail)?;
			out.end_group()
		}
		FieldPlan::List { levels, element, element_nullable } => {
			let items = expect_list(value, trail)?;
			out.start_group()?;
			match levels {
				ListLevels::One => unreachable!("1-level lists are handled at the field position"),
				ListLevels::Two => {
					for item in items {
						if item.is_null() {
							return Err(Error::NullInRequired {
								path: format!("{}/element", trail_path(trail)),
							});
						}
						out.start_field("element", 0)?;
						write_payload(element, item, out, trail)?;
						out.end_field("element", 0)?;
					}
				}
				ListLevels::Three => {
					for item in items {
						out.start_field("list", 0)?;
						out.start_group()?;
						if item.is_null() {
							if !element_nullable {
								return Err(Error::NullInRequired {
									path: format!("{}/list/element", trail_path(trail)),
								});
							}
						} else {
							out.start_field("element", 0)?;
							write_payload(element, item, out, trail)?;
							out.end_field("element", 0)?;
						}
						out.end_group()?;
						out.end_field("list", 0)?;
					}
				}
			}
			out.end_group()
		}
		FieldPlan::Map { key, value: value_plan, value_nullable } => {
			let entries = match value {
				Value::Map(entries) => entries,
				other => {
					return Err(Error::mismatch(
						trail_path(trail),
						format!("expected a map value, got {}", other.kind_name()),
					))
				}
			};
			out.start_group()?;
			for (entry_key, entry_value) in entries {
				if entry_key.is_null() {
					return Err(Error::NullMapKey { path: trail_path(trail) });
				}
				out.start_field("key_value", 0)?;
				out.start_group()?;
				out.start_field("key", 0)?;
				write_payload(key, entry_key, out, trail)?;
				out.end_field("key", 0)?;
				if entry_value.is_null() {
					if !value_nullable {
						return Err(Error::NullInRequired {
							path: format!("{}/key_value/value", trail_path(trail)),
						});
					}
				} else {
					out.start_field("value", 1)?;
					write_payload(value_plan, entry_value, out, trail)?;
					out.end_field("value", 1)?;
				}
				out.end_group()?;
				out.end_field("key_value", 0)?;
			}
			out.end_group()
		}
		FieldPlan::Variant => {
			let (metadata, variant_value) = match value {
				Value::Variant { metadata, value } => (metadata, value),
				other => {
					return Err(Error::mismatch(
						trail_path(trail),
						format!("expected a variant value, got {}", other.kind_name()),
					))
				}
			};
			out.start_group()?;
			out.start_field("metadata", 0)?;
			out.add_binary(metadata)?;
			out.end_field("metadata", 0)?;
			out.start_field("value", 1)?;
			out.add_binary(variant_value)?;
			out.end_field("value", 1)?;
			out.end_group()
		}
	}
}

fn int_value(value: &Value) -> Option<i64> {
	match value {
		Value::I8(v) => Some(*v as i64),
		Value::I16(v) => Some(*v as i64),
		Value::I32(v) => Some(*v as i64),
		Value::I64(v) => Some(*v),
		_ => None,
	}
}

fn write_int<C: RecordConsumer>(
	value: &Value,
	min: i64,
	max: i64,
	wide: bool,
	out: &mut C,
	trail: &[&str],
) -> Result<()> {
	let v = int_value(value).ok_or_else(|| {
		Error::mismatch(trail_path(trail), format!("expected an integer value, got {}", value.kind_name()))
	})?;
	if v < min || v > max {
		return Err(Error::mismatch(
			trail_path(trail),
			format!("integer {} does not fit the declared width", v),
		));
	}
	if wide {
		out.add_i64(v)
	} else {
		out.add_i32(v as i32)
	}
}

fn write_primitive<C: RecordConsumer>(
	plan: &PrimitivePlan,
	value: &Value,
	out: &mut C,
	trail: &mut Vec<&str>,
) -> Result<()> {
	let wrong = |expected: &str| {
		Error::mismatch(trail_path(trail), format!("expected {}, got {}", expected, value.kind_name()))
	};

	match plan {
		PrimitivePlan::Bool => match value {
			Value::Bool(v) => out.add_bool(*v),
			_ => Err(wrong("bool")),
		},
		PrimitivePlan::I8 => write_int(value, i8::MIN as i64, i8::MAX as i64, false, out, trail),
		PrimitivePlan::I16 => write_int(value, i16::MIN as i64, i16::MAX as i64, false, out, trail),
		PrimitivePlan::I32 => write_int(value, i32::MIN as i64, i32::MAX as i64, false, out, trail),
		PrimitivePlan::I64 => write_int(value, i64::MIN, i64::MAX, true, out, trail),
		PrimitivePlan::F32 => match value {
			Value::F32(v) => out.add_f32(*v),
			_ => Err(wrong("f32")),
		},
		PrimitivePlan::F64 => match value {
			Value::F64(v) => out.add_f64(*v),
			Value::F32(v) => out.add_f64(*v as f64),
			_ => Err(wrong("f64")),
		},
		PrimitivePlan::Utf8 => match value {
			Value::Str(v) | Value::Json(v) | Value::Enum(v) => out.add_binary(v.as_bytes()),
			_ => Err(wrong("string")),
		},
		PrimitivePlan::EnumUtf8 { constants } => match value {
			Value::Enum(v) | Value::Str(v) => {
				if let Some(constants) = constants {
					convert::check_enum_constant(constants, v, &trail_path(trail))?;
				}
				out.add_binary(v.as_bytes())
			}
			_ => Err(wrong("enum")),
		},
		PrimitivePlan::Bytes => match value {
			Value::Bytes(v) | Value::Bson(v) => out.add_binary(v),
			_ => Err(wrong("binary")),
		},
		PrimitivePlan::Uuid => match value {
			Value::Uuid(v) => out.add_binary(&convert::uuid_to_bytes(*v)),
			_ => Err(wrong("uuid")),
		},
		PrimitivePlan::Date => match value {
			Value::Date(v) => out.add_i32(convert::days_from_date(*v)),
			_ => Err(wrong("date")),
		},
		PrimitivePlan::Time { unit } => match value {
			Value::Time(v) => {
				let encoded = convert::time_of_day_to_unit(*v, *unit);
				match unit {
					TimeUnit::Millis => out.add_i32(encoded as i32),
					TimeUnit::Micros | TimeUnit::Nanos => out.add_i64(encoded),
				}
			}
			_ => Err(wrong("time")),
		},
		PrimitivePlan::Timestamp { unit } => {
			let (secs, nanos) = match value {
				Value::Timestamp(v) => (v.timestamp(), v.timestamp_subsec_nanos()),
				Value::LocalTimestamp(v) => {
					let utc = v.and_utc();
					(utc.timestamp(), utc.timestamp_subsec_nanos())
				}
				_ => return Err(wrong("timestamp")),
			};
			out.add_i64(convert::instant_to_unit(secs, nanos, *unit)?)
		}
		PrimitivePlan::Decimal { precision, scale, rounding, physical } => match value {
			Value::Decimal(v) => {
				let rescaled = convert::rescale_decimal(v, *scale as i64, *rounding)?;
				match physical {
					DecimalPhysical::Int32 => out.add_i32(convert::decimal_unscaled_i32(rescaled, *precision)?),
					DecimalPhysical::Int64 => out.add_i64(convert::decimal_unscaled_i64(rescaled, *precision)?),
					DecimalPhysical::Binary => {
						out.add_binary(&convert::decimal_unscaled_bytes(rescaled, *precision)?)
					}
				}
			}
			_ => Err(wrong("decimal")),
		},
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use crate::descriptor::{EntityType, FieldDesc, PrimitiveKind, RecordDesc};
	use crate::options::WriteOptions;
	use crate::schema_builder::derive_schema;

	use super::*;

	#[derive(Default)]
	struct RecordingConsumer {
		events: Vec<String>,
	}

	impl RecordConsumer for RecordingConsumer {
		fn start_message(&mut self) -> Result<()> {
			self.events.push("start_message".into());
			Ok(())
		}
		fn end_message(&mut self) -> Result<()> {
			self.events.push("end_message".into());
			Ok(())
		}
		fn start_field(&mut self, name: &str, index: usize) -> Result<()> {
			self.events.push(format!("start_field({},{})", name, index));
			Ok(())
		}
		fn end_field(&mut self, name: &str, index: usize) -> Result<()> {
			self.events.push(format!("end_field({},{})", name, index));
			Ok(())
		}
		fn start_group(&mut self) -> Result<()> {
			self.events.push("start_group".into());
			Ok(())
		}
		fn end_group(&mut self) -> Result<()> {
			self.events.push("end_group".into());
			Ok(())
		}
		fn add_bool(&mut self, value: bool) -> Result<()> {
			self.events.push(format!("bool({})", value));
			Ok(())
		}
		fn add_i32(&mut self, value: i32) -> Result<()> {
			self.events.push(format!("i32({})", value));
			Ok(())
		}
		fn add_i64(&mut self, value: i64) -> Result<()> {
			self.events.push(format!("i64({})", value));
			Ok(())
		}
		fn add_f32(&mut self, value: f32) -> Result<()> {
			self.events.push(format!("f32({})", value));
			Ok(())
		}
		fn add_f64(&mut self, value: f64) -> Result<()> {
			self.events.push(format!("f64({})", value));
			Ok(())
		}
		fn add_binary(&mut self, value: &[u8]) -> Result<()> {
			self.events.push(format!("binary({})", String::from_utf8_lossy(value)));
			Ok(())
		}
	}

	fn events_for(desc: &Arc<RecordDesc>, options: &WriteOptions, value: Value) -> Vec<String> {
		let derived = derive_schema(desc, options).unwrap();
		let walker = RecordWalker::new(derived.plan);
		let mut consumer = RecordingConsumer::default();
		walker.write_row(&value, &mut consumer).unwrap();
		consumer.events
	}

	fn record(fields: Vec<(&str, Value)>) -> Value {
		Value::Record(fields.into_iter().map(|(n, v)| (n.to_string(), v)).collect())
	}

	#[test]
	fn flat_record_with_null_skips_the_field() {
		let desc = RecordDesc::new(
			"Rec",
			vec![
				FieldDesc::new("id", EntityType::Primitive(PrimitiveKind::I64)),
				FieldDesc::new("name", EntityType::Primitive(PrimitiveKind::Str)).nullable(),
			],
		);
		let events = events_for(
			&desc,
			&WriteOptions::default(),
			record(vec![("id", Value::I64(1)), ("name", Value::Null)]),
		);
		assert_eq!(
			events,
			vec![
				"start_message",
				"start_field(id,0)",
				"i64(1)",
				"end_field(id,0)",
				"end_message",
			]
		);
	}

	#[test]
	fn null_in_required_field_fails() {
		let desc = RecordDesc::new(
			"Rec",
			vec![FieldDesc::new("id", EntityType::Primitive(PrimitiveKind::I64))],
		);
		let derived = derive_schema(&desc, &WriteOptions::default()).unwrap();
		let walker = RecordWalker::new(derived.plan);
		let mut consumer = RecordingConsumer::default();
		let err = walker
			.write_row(&record(vec![("id", Value::Null)]), &mut consumer)
			.unwrap_err();
		assert!(matches!(err, Error::NullInRequired { .. }));
	}

	#[test]
	fn three_level_list_frames_each_element() {
		let desc = RecordDesc::new(
			"Rec",
			vec![FieldDesc::new("tags", EntityType::list(EntityType::Primitive(PrimitiveKind::Str)))],
		);
		let events = events_for(
			&desc,
			&WriteOptions::default(),
			record(vec![("tags", Value::List(vec![Value::Str("a".into()), Value::Null]))]),
		);
		assert_eq!(
			events,
			vec![
				"start_message",
				"start_field(tags,0)",
				"start_group",
				"start_field(list,0)",
				"start_group",
				"start_field(element,0)",
				"binary(a)",
				"end_field(element,0)",
				"end_group",
				"end_field(list,0)",
				"start_field(list,0)",
				"start_group",
				"end_group",
				"end_field(list,0)",
				"end_group",
				"end_field(tags,0)",
				"end_message",
			]
		);
	}

	#[test]
	fn one_level_list_repeats_the_column_name() {
		let desc = RecordDesc::new(
			"Rec",
			vec![FieldDesc::new("tags", EntityType::list(EntityType::Primitive(PrimitiveKind::I32)))],
		);
		let options = WriteOptions::default().with_list_levels(crate::options::ListLevels::One);
		let events = events_for(
			&desc,
			&options,
			record(vec![("tags", Value::List(vec![Value::I32(1), Value::I32(2)]))]),
		);
		assert_eq!(
			events,
			vec![
				"start_message",
				"start_field(tags,0)",
				"i32(1)",
				"end_field(tags,0)",
				"start_field(tags,0)",
				"i32(2)",
				"end_field(tags,0)",
				"end_message",
			]
		);
	}

	#[test]
	fn one_level_list_rejects_null_elements() {
		let desc = RecordDesc::new(
			"Rec",
			vec![FieldDesc::new("tags", EntityType::list(EntityType::Primitive(PrimitiveKind::I32)))],
		);
		let options = WriteOptions::default().with_list_levels(crate::options::ListLevels::One);
		let derived = derive_schema(&desc, &options).unwrap();
		let walker = RecordWalker::new(derived.plan);
		let mut consumer = RecordingConsumer::default();
		let err = walker
			.write_row(&record(vec![("tags", Value::List(vec![Value::Null]))]), &mut consumer)
			.unwrap_err();
		assert!(matches!(err, Error::NullInRequired { .. }));
	}

	#[test]
	fn map_entries_bracket_key_and_value() {
		let desc = RecordDesc::new(
			"Rec",
			vec![FieldDesc::new(
				"m",
				EntityType::map(
					EntityType::Primitive(PrimitiveKind::Str),
					EntityType::Primitive(PrimitiveKind::I64),
				),
			)],
		);
		let events = events_for(
			&desc,
			&WriteOptions::default(),
			record(vec![(
				"m",
				Value::Map(vec![
					(Value::Str("k".into()), Value::I64(7)),
					(Value::Str("n".into()), Value::Null),
				]),
			)]),
		);
		assert_eq!(
			events,
			vec![
				"start_message",
				"start_field(m,0)",
				"start_group",
				"start_field(key_value,0)",
				"start_group",
				"start_field(key,0)",
				"binary(k)",
				"end_field(key,0)",
				"start_field(value,1)",
				"i64(7)",
				"end_field(value,1)",
				"end_group",
				"end_field(key_value,0)",
				"start_field(key_value,0)",
				"start_group",
				"start_field(key,0)",
				"binary(n)",
				"end_field(key,0)",
				"end_group",
				"end_field(key_value,0)",
				"end_group",
				"end_field(m,0)",
				"end_message",
			]
		);
	}

	#[test]
	fn null_map_key_fails() {
		let desc = RecordDesc::new(
			"Rec",
			vec![FieldDesc::new(
				"m",
				EntityType::map(
					EntityType::Primitive(PrimitiveKind::Str),
					EntityType::Primitive(PrimitiveKind::I64),
				),
			)],
		);
		let derived = derive_schema(&desc, &WriteOptions::default()).unwrap();
		let walker = RecordWalker::new(derived.plan);
		let mut consumer = RecordingConsumer::default();
		let err = walker
			.write_row(
				&record(vec![("m", Value::Map(vec![(Value::Null, Value::I64(1))]))]),
				&mut consumer,
			)
			.unwrap_err();
		assert!(matches!(err, Error::NullMapKey { .. }));
	}

	#[test]
	fn nested_record_emits_groups() {
		let child = RecordDesc::new(
			"Child",
			vec![FieldDesc::new("d", EntityType::Primitive(PrimitiveKind::I8))],
		);
		let desc = RecordDesc::new(
			"Outer",
			vec![
				FieldDesc::new("a", EntityType::Primitive(PrimitiveKind::Str)),
				FieldDesc::new("c", EntityType::record(child)).nullable(),
			],
		);
		let events = events_for(
			&desc,
			&WriteOptions::default(),
			record(vec![
				("a", Value::Str("A".into())),
				("c", record(vec![("d", Value::I8(1))])),
			]),
		);
		assert_eq!(
			events,
			vec![
				"start_message",
				"start_field(a,0)",
				"binary(A)",
				"end_field(a,0)",
				"start_field(c,1)",
				"start_group",
				"start_field(d,0)",
				"i32(1)",
				"end_field(d,0)",
				"end_group",
				"end_field(c,1)",
				"end_message",
			]
		);
	}

	#[test]
	fn enum_values_are_validated_against_constants() {
		let desc = RecordDesc::new(
			"Rec",
			vec![FieldDesc::new(
				"color",
				EntityType::Primitive(PrimitiveKind::enumeration(["RED", "GREEN"])),
			)],
		);
		let derived = derive_schema(&desc, &WriteOptions::default()).unwrap();
		let walker = RecordWalker::new(derived.plan);
		let mut consumer = RecordingConsumer::default();
		let err = walker
			.write_row(&record(vec![("color", Value::Enum("BLUE".into()))]), &mut consumer)
			.unwrap_err();
		assert!(matches!(err, Error::UnknownEnumConstant { .. }));
	}
}
