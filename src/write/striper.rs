//! The crate's own `RecordConsumer`: turns the walker's event stream into
//! per-column triplet stripes. Fields never visited during a row are
//! back-filled with nulls at the definition level of their deepest present
//! ancestor when the enclosing group closes.

use std::io::Write;

use parquet::errors::ParquetError;
use parquet::file::writer::SerializedRowGroupWriter;

use crate::error::{Error, Result};
use crate::layout::ColumnLayout;

use super::consumer::RecordConsumer;
use super::stripe::ColumnStripe;

struct Frame {
	node: usize,
	written: Vec<bool>,
	/// Occurrence counts per child, for the element indices of repeated
	/// fields.
	occurrences: Vec<usize>,
}

pub(crate) struct ColumnStriper {
	layout: ColumnLayout,
	stripes: Vec<ColumnStripe>,
	/// Element index per repetition level; entry 0 is the row ordinal.
	path: Vec<usize>,
	frames: Vec<Frame>,
	/// Node ids of the currently open fields, innermost last.
	open_fields: Vec<usize>,
	rows: usize,
}

impl ColumnStriper {
	pub fn new(layout: ColumnLayout) -> ColumnStriper {
		let mut stripes = Vec::with_capacity(layout.leaf_count);
		for node in &layout.nodes {
			if let Some(leaf) = &node.leaf {
				debug_assert_eq!(leaf.ordinal, stripes.len());
				stripes.push(ColumnStripe::new(leaf, node.def_level, node.rep_level));
			}
		}
		ColumnStriper { layout, stripes, path: Vec::new(), frames: Vec::new(), open_fields: Vec::new(), rows: 0 }
	}

	pub fn pending_bytes(&self) -> usize {
		self.stripes.iter().map(|s| s.raw_bytes()).sum()
	}

	#[cfg(test)]
	pub fn stripe(&self, ordinal: usize) -> &ColumnStripe {
		&self.stripes[ordinal]
	}

	fn push_frame(&mut self, node: usize) {
		let children = self.layout.node(node).children.len();
		self.frames.push(Frame { node, written: vec![false; children], occurrences: vec![0; children] });
	}

	fn current_leaf(&self) -> Result<usize> {
		match self.open_fields.last() {
			Some(&node) if self.layout.node(node).is_leaf() => Ok(node),
			_ => Err(Error::Parquet(ParquetError::General(
				"primitive value outside of a primitive field".to_string(),
			))),
		}
	}

	/// Nulls every column under `node` at definition level `dl`. The path is
	/// cut back to the enclosing repetition context; deeper levels count as
	/// virtual index zero.
	fn null_subtree(&mut self, node: usize, dl: i16, context_rl: i16) {
		let prefix_len = (context_rl as usize + 1).min(self.path.len());
		let prefix = &self.path[..prefix_len];
		for ordinal in self.layout.leaves_of(node) {
			self.stripes[ordinal].push_null(dl, prefix);
		}
	}

	fn close_frame(&mut self) {
		let frame = self.frames.pop().expect("unbalanced group events");
		let node = self.layout.node(frame.node);
		let (dl, rl) = (node.def_level, node.rep_level);
		let children = node.children.clone();
		for (i, child) in children.into_iter().enumerate() {
			if !frame.written[i] {
				self.null_subtree(child, dl, rl);
			}
		}
	}

	/// Hands every buffered stripe to the next serialized column, in leaf
	/// order, and closes the columns.
	pub fn flush<W: Write + Send>(&mut self, row_group: &mut SerializedRowGroupWriter<'_, W>) -> Result<()> {
		for stripe in self.stripes.iter_mut() {
			let mut column = row_group
				.next_column()?
				.ok_or_else(|| ParquetError::General("row group has fewer columns than the schema".to_string()))?;
			stripe.flush(&mut column)?;
			column.close()?;
		}
		Ok(())
	}
}

impl RecordConsumer for ColumnStriper {
	fn start_message(&mut self) -> Result<()> {
		debug_assert!(self.frames.is_empty() && self.open_fields.is_empty());
		self.path.clear();
		self.path.push(self.rows);
		self.push_frame(self.layout.root);
		Ok(())
	}

	fn end_message(&mut self) -> Result<()> {
		self.close_frame();
		debug_assert!(self.frames.is_empty());
		self.rows += 1;
		Ok(())
	}

	fn start_field(&mut self, name: &str, index: usize) -> Result<()> {
		let frame = self.frames.last_mut().expect("field event outside of a message");
		let parent = frame.node;
		let occurrence = frame.occurrences[index];
		frame.occurrences[index] += 1;

		let child = self.layout.node(parent).children[index];
		let node = self.layout.node(child);
		debug_assert_eq!(node.name, name);
		if node.repetition == parquet::basic::Repetition::REPEATED {
			self.path.truncate(node.rep_level as usize);
			self.path.push(occurrence);
		}
		self.open_fields.push(child);
		Ok(())
	}

	fn end_field(&mut self, _name: &str, index: usize) -> Result<()> {
		self.open_fields.pop().expect("unbalanced field events");
		let frame = self.frames.last_mut().expect("field event outside of a message");
		frame.written[index] = true;
		Ok(())
	}

	fn start_group(&mut self) -> Result<()> {
		let node = *self.open_fields.last().expect("group event outside of a field");
		self.push_frame(node);
		Ok(())
	}

	fn end_group(&mut self) -> Result<()> {
		self.close_frame();
		Ok(())
	}

	fn add_bool(&mut self, value: bool) -> Result<()> {
		let node = self.current_leaf()?;
		let ordinal = leaf_target(&self.layout, node);
		self.stripes[ordinal].push_bool(value, &self.path);
		Ok(())
	}

	fn add_i32(&mut self, value: i32) -> Result<()> {
		let node = self.current_leaf()?;
		let ordinal = leaf_target(&self.layout, node);
		self.stripes[ordinal].push_i32(value, &self.path);
		Ok(())
	}

	fn add_i64(&mut self, value: i64) -> Result<()> {
		let node = self.current_leaf()?;
		let ordinal = leaf_target(&self.layout, node);
		self.stripes[ordinal].push_i64(value, &self.path);
		Ok(())
	}

	fn add_f32(&mut self, value: f32) -> Result<()> {
		let node = self.current_leaf()?;
		let ordinal = leaf_target(&self.layout, node);
		self.stripes[ordinal].push_f32(value, &self.path);
		Ok(())
	}

	fn add_f64(&mut self, value: f64) -> Result<()> {
		let node = self.current_leaf()?;
		let ordinal = leaf_target(&self.layout, node);
		self.stripes[ordinal].push_f64(value, &self.path);
		Ok(())
	}

	fn add_binary(&mut self, value: &[u8]) -> Result<()> {
		let node = self.current_leaf()?;
		let ordinal = leaf_target(&self.layout, node);
		self.stripes[ordinal].push_bytes(value, &self.path);
		Ok(())
	}
}

fn leaf_target(layout: &ColumnLayout, node: usize) -> usize {
	layout.node(node).leaf.as_ref().expect("leaf_target on a group node").ordinal
}

#[cfg(test)]
mod tests {
	use crate::descriptor::{EntityType, FieldDesc, PrimitiveKind, RecordDesc};
	use crate::options::WriteOptions;
	use crate::schema_builder::derive_schema;
	use crate::value::Value;
	use crate::write::walker::RecordWalker;

	use super::*;

	fn record(fields: Vec<(&str, Value)>) -> Value {
		Value::Record(fields.into_iter().map(|(n, v)| (n.to_string(), v)).collect())
	}

	fn stripe_rows(desc: &std::sync::Arc<RecordDesc>, rows: Vec<Value>) -> ColumnStriper {
		let derived = derive_schema(desc, &WriteOptions::default()).unwrap();
		let walker = RecordWalker::new(derived.plan);
		let mut striper = ColumnStriper::new(ColumnLayout::build(&derived.schema));
		for row in &rows {
			walker.write_row(row, &mut striper).unwrap();
		}
		striper
	}

	#[test]
	fn optional_list_levels_match_the_dremel_encoding() {
		// tags: List<String>, 3-level: max_dl = 3 (field, list, element), max_rl = 1
		let desc = RecordDesc::new(
			"Rec",
			vec![FieldDesc::new("tags", EntityType::list(EntityType::Primitive(PrimitiveKind::Str)))],
		);
		let rows = vec![
			record(vec![("tags", Value::List(vec![Value::Str("a".into()), Value::Str("b".into())]))]),
			record(vec![("tags", Value::List(vec![]))]),
			record(vec![("tags", Value::Null)]),
			record(vec![("tags", Value::List(vec![Value::Str("c".into()), Value::Null]))]),
		];
		let striper = stripe_rows(&desc, rows);
		let (dls, rls) = striper.stripe(0).levels();
		assert_eq!(dls, vec![3, 3, 1, 0, 3, 2]);
		assert_eq!(rls, vec![0, 1, 0, 0, 0, 1]);
		assert_eq!(striper.stripe(0).utf8_values(), vec!["a", "b", "c"]);
	}

	#[test]
	fn absent_nested_record_nulls_every_leaf() {
		// c: Child { d: i8 required, e: i64 optional } — c itself optional
		let child = RecordDesc::new(
			"Child",
			vec![
				FieldDesc::new("d", EntityType::Primitive(PrimitiveKind::I8)),
				FieldDesc::new("e", EntityType::Primitive(PrimitiveKind::I64)).nullable(),
			],
		);
		let desc = RecordDesc::new(
			"Outer",
			vec![
				FieldDesc::new("a", EntityType::Primitive(PrimitiveKind::I64)),
				FieldDesc::new("c", EntityType::record(child)).nullable(),
			],
		);
		let rows = vec![
			record(vec![
				("a", Value::I64(1)),
				("c", record(vec![("d", Value::I8(5)), ("e", Value::I64(23))])),
			]),
			record(vec![("a", Value::I64(2)), ("c", Value::Null)]),
			record(vec![
				("a", Value::I64(3)),
				("c", record(vec![("d", Value::I8(6)), ("e", Value::Null)])),
			]),
		];
		let striper = stripe_rows(&desc, rows);

		// leaf 0: a (required, dl 0) — no level data at all
		let (dls_a, rls_a) = striper.stripe(0).levels();
		assert!(dls_a.is_empty() && rls_a.is_empty());
		assert_eq!(striper.stripe(0).i64_values(), vec![1, 2, 3]);

		// leaf 1: c.d (dl: c=1, d required) — null only when c is absent
		let (dls_d, _) = striper.stripe(1).levels();
		assert_eq!(dls_d, vec![1, 0, 1]);

		// leaf 2: c.e (dl: c=1, e=2)
		let (dls_e, _) = striper.stripe(2).levels();
		assert_eq!(dls_e, vec![2, 0, 1]);
		assert_eq!(striper.stripe(2).i64_values(), vec![23]);
	}

	#[test]
	fn map_levels_cover_null_values() {
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
		let rows = vec![record(vec![(
			"m",
			Value::Map(vec![
				(Value::Str("k1".into()), Value::I64(1)),
				(Value::Str("k2".into()), Value::Null),
			]),
		)])];
		let striper = stripe_rows(&desc, rows);

		// keys: m=1, key_value=2, key required → dl 2 when present
		let (dls_k, rls_k) = striper.stripe(0).levels();
		assert_eq!(dls_k, vec![2, 2]);
		assert_eq!(rls_k, vec![0, 1]);
		// values: value optional → dl 3; the null entry sits at dl 2
		let (dls_v, rls_v) = striper.stripe(1).levels();
		assert_eq!(dls_v, vec![3, 2]);
		assert_eq!(rls_v, vec![0, 1]);
	}

	#[test]
	fn unvisited_optional_fields_are_backfilled() {
		let desc = RecordDesc::new(
			"Rec",
			vec![
				FieldDesc::new("a", EntityType::Primitive(PrimitiveKind::I64)).nullable(),
				FieldDesc::new("b", EntityType::Primitive(PrimitiveKind::Str)).nullable(),
			],
		);
		let rows = vec![
			record(vec![("a", Value::Null), ("b", Value::Str("x".into()))]),
			record(vec![("a", Value::I64(9)), ("b", Value::Null)]),
		];
		let striper = stripe_rows(&desc, rows);
		let (dls_a, _) = striper.stripe(0).levels();
		assert_eq!(dls_a, vec![0, 1]);
		let (dls_b, _) = striper.stripe(1).levels();
		assert_eq!(dls_b, vec![1, 0]);
	}
}
