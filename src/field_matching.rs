//! Matching of requested record fields to file columns, and the wire-name
//! derivation used on the write side.

use parquet::schema::types::TypePtr;

use crate::descriptor::FieldDesc;
use crate::error::{Error, Result};
use crate::options::{ColumnNaming, FieldMatching};

/// `camelCase` / `PascalCase` -> `snake_case`. Runs of upper-case letters
/// are kept together ("parseHTTPHeader" -> "parse_http_header").
pub(crate) fn to_snake_case(name: &str) -> String {
	let mut out = String::with_capacity(name.len() + 4);
	let chars: Vec<char> = name.chars().collect();
	for (i, &c) in chars.iter().enumerate() {
		if c.is_uppercase() {
			let prev_lower = i > 0 && chars[i - 1].is_lowercase();
			let next_lower = i + 1 < chars.len() && chars[i + 1].is_lowercase();
			let prev_upper = i > 0 && chars[i - 1].is_uppercase();
			if prev_lower || (prev_upper && next_lower) {
				out.push('_');
			}
			out.extend(c.to_lowercase());
		} else {
			out.push(c);
		}
	}
	out
}

/// Wire name of a field on the write side: alias, else the naming policy
/// applied to the logical name.
pub(crate) fn wire_name(field: &FieldDesc, naming: ColumnNaming) -> String {
	if let Some(alias) = &field.annotations.alias {
		return alias.clone();
	}
	match naming {
		ColumnNaming::AsIs => field.logical_name.clone(),
		ColumnNaming::SnakeCase => to_snake_case(&field.logical_name),
	}
}

/// Finds the file column a requested field maps to. Returns the child index
/// within `columns` so projections can preserve file order. An exact match
/// (alias or logical name) always beats a transformed-name match; with
/// `BestEffort`, several distinct transformed-name candidates are an error.
pub(crate) fn match_column<'a>(
	field: &FieldDesc,
	columns: &'a [TypePtr],
	strategy: FieldMatching,
	path: &str,
) -> Result<Option<(usize, &'a TypePtr)>> {
	let exact_target = field.annotations.alias.as_deref().unwrap_or(&field.logical_name);
	if let Some(found) = columns.iter().enumerate().find(|(_, c)| c.name() == exact_target) {
		return Ok(Some((found.0, found.1)));
	}

	let snake = to_snake_case(&field.logical_name);
	match strategy {
		FieldMatching::FieldName => Ok(None),
		FieldMatching::SnakeCase => {
			Ok(columns.iter().enumerate().find(|(_, c)| c.name() == snake))
		}
		FieldMatching::BestEffort => {
			let candidates: Vec<(usize, &TypePtr)> = columns
				.iter()
				.enumerate()
				.filter(|(_, c)| to_snake_case(c.name()) == snake)
				.collect();
			match candidates.len() {
				0 => Ok(None),
				1 => Ok(Some(candidates[0])),
				n => Err(Error::mismatch(
					path,
					format!("{} file columns match `{}` ambiguously", n, field.logical_name),
				)),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use parquet::basic::{Repetition, Type as PhysicalType};
	use parquet::schema::types::Type;

	use crate::descriptor::{EntityType, PrimitiveKind};

	use super::*;

	#[test]
	fn snake_case_forms() {
		assert_eq!(to_snake_case("firstName"), "first_name");
		assert_eq!(to_snake_case("FirstName"), "first_name");
		assert_eq!(to_snake_case("already_snake"), "already_snake");
		assert_eq!(to_snake_case("parseHTTPHeader"), "parse_http_header");
		assert_eq!(to_snake_case("x"), "x");
	}

	fn column(name: &str) -> TypePtr {
		Arc::new(
			Type::primitive_type_builder(name, PhysicalType::INT32)
				.with_repetition(Repetition::OPTIONAL)
				.build()
				.unwrap(),
		)
	}

	fn field(name: &str) -> FieldDesc {
		FieldDesc::new(name, EntityType::Primitive(PrimitiveKind::I32))
	}

	#[test]
	fn exact_match_beats_transformed() {
		let columns = vec![column("first_name"), column("firstName")];
		let m = match_column(&field("firstName"), &columns, FieldMatching::BestEffort, "r").unwrap();
		assert_eq!(m.unwrap().0, 1);
	}

	#[test]
	fn alias_takes_precedence() {
		let columns = vec![column("renamed")];
		let f = field("firstName").with_alias("renamed");
		let m = match_column(&f, &columns, FieldMatching::FieldName, "r").unwrap();
		assert_eq!(m.unwrap().0, 0);
	}

	#[test]
	fn snake_strategy_matches_derived_name() {
		let columns = vec![column("first_name")];
		assert!(match_column(&field("firstName"), &columns, FieldMatching::FieldName, "r").unwrap().is_none());
		let m = match_column(&field("firstName"), &columns, FieldMatching::SnakeCase, "r").unwrap();
		assert_eq!(m.unwrap().0, 0);
	}

	#[test]
	fn best_effort_rejects_ambiguity() {
		// neither is an exact match, both snake-case to the same name
		let columns = vec![column("firstName"), column("FirstName")];
		let f = field("first_name");
		assert!(match_column(&f, &columns, FieldMatching::BestEffort, "r").is_err());
	}
}
