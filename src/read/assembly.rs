//! Striped-to-record assembly: walks the projected schema and the converter
//! tree in lockstep, consuming one (value, definition level, repetition
//! level) triplet stream per leaf column. Presence is decided by comparing
//! definition levels against each node's level; repetition by peeking the
//! next repetition level on the first leaf of the repeated subtree.

use parquet::basic::Repetition;
use parquet::data_type::{ByteArray, FixedLenByteArray};
use parquet::errors::ParquetError;

use crate::error::{Error, Result};
use crate::layout::ColumnLayout;
use crate::value::Value;

use super::materializer::Converter;
use super::primitives::PrimitiveConverter;

#[derive(Debug)]
pub(crate) enum RawValues {
	Bool(Vec<bool>),
	I32(Vec<i32>),
	I64(Vec<i64>),
	F32(Vec<f32>),
	F64(Vec<f64>),
	Bytes(Vec<ByteArray>),
	Fixed(Vec<FixedLenByteArray>),
}

/// One column's worth of decoded triplets for the current row group.
#[derive(Debug)]
pub(crate) struct Triplets {
	values: RawValues,
	dls: Vec<i16>,
	rls: Vec<i16>,
	max_dl: i16,
	max_rl: i16,
	len: usize,
	pos: usize,
	vpos: usize,
}

impl Triplets {
	pub fn new(values: RawValues, dls: Vec<i16>, rls: Vec<i16>, max_dl: i16, max_rl: i16) -> Triplets {
		let value_count = match &values {
			RawValues::Bool(v) => v.len(),
			RawValues::I32(v) => v.len(),
			RawValues::I64(v) => v.len(),
			RawValues::F32(v) => v.len(),
			RawValues::F64(v) => v.len(),
			RawValues::Bytes(v) => v.len(),
			RawValues::Fixed(v) => v.len(),
		};
		let len = if max_dl > 0 { dls.len() } else { value_count };
		Triplets { values, dls, rls, max_dl, max_rl, len, pos: 0, vpos: 0 }
	}

	fn truncated(&self) -> Error {
		Error::Parquet(ParquetError::General("column data ended before the row did".to_string()))
	}

	fn peek_dl(&self) -> Result<i16> {
		if self.pos >= self.len {
			return Err(self.truncated());
		}
		Ok(if self.max_dl > 0 { self.dls[self.pos] } else { self.max_dl })
	}

	/// Repetition level of the next unconsumed triplet, `None` at the end of
	/// the row group.
	fn peek_rl(&self) -> Option<i16> {
		if self.pos >= self.len {
			return None;
		}
		Some(if self.max_rl > 0 { self.rls[self.pos] } else { 0 })
	}

	/// Consumes one triplet without a value (a null at some ancestor level).
	fn skip(&mut self) -> Result<()> {
		let dl = self.peek_dl()?;
		debug_assert!(dl < self.max_dl);
		self.pos += 1;
		Ok(())
	}

	/// Consumes one defined triplet, dispatching the value event.
	fn consume_into(&mut self, converter: &mut PrimitiveConverter) -> Result<()> {
		let dl = self.peek_dl()?;
		if dl != self.max_dl {
			return Err(Error::Parquet(ParquetError::General(
				"definition levels out of step with the schema".to_string(),
			)));
		}
		match &self.values {
			RawValues::Bool(v) => converter.add_bool(v[self.vpos])?,
			RawValues::I32(v) => converter.add_i32(v[self.vpos])?,
			RawValues::I64(v) => converter.add_i64(v[self.vpos])?,
			RawValues::F32(v) => converter.add_f32(v[self.vpos])?,
			RawValues::F64(v) => converter.add_f64(v[self.vpos])?,
			RawValues::Bytes(v) => converter.add_binary(v[self.vpos].data())?,
			RawValues::Fixed(v) => converter.add_binary(v[self.vpos].data())?,
		}
		self.vpos += 1;
		self.pos += 1;
		Ok(())
	}
}

pub(crate) struct RowAssembler<'a> {
	layout: &'a ColumnLayout,
	columns: &'a mut [Triplets],
}

impl<'a> RowAssembler<'a> {
	pub fn new(layout: &'a ColumnLayout, columns: &'a mut [Triplets]) -> RowAssembler<'a> {
		RowAssembler { layout, columns }
	}

	/// Assembles the next row into a value.
	pub fn read_row(&mut self, root: &mut Converter) -> Result<Value> {
		let root_id = self.layout.root;
		self.read_instance(root_id, root)?;
		Ok(root.take().unwrap_or(Value::Null))
	}

	/// Whether the node is present (defined at or below its level) in the
	/// next triplet of its subtree.
	fn defined(&self, node: usize) -> Result<bool> {
		let n = self.layout.node(node);
		let dl = self.columns[n.leaf_start].peek_dl()?;
		Ok(dl >= n.def_level)
	}

	/// Consumes one null triplet from every column under the node.
	fn consume_nulls(&mut self, node: usize) -> Result<()> {
		for ordinal in self.layout.leaves_of(node) {
			self.columns[ordinal].skip()?;
		}
		Ok(())
	}

	/// One defined occurrence of a node.
	fn read_instance(&mut self, node_id: usize, conv: &mut Converter) -> Result<()> {
		let node = self.layout.node(node_id);
		if node.is_leaf() {
			let ordinal = node.leaf.as_ref().unwrap().ordinal;
			return match conv {
				Converter::Primitive(p) => self.columns[ordinal].consume_into(p),
				_ => unreachable!("leaf node paired with a group converter"),
			};
		}

		let children = node.children.clone();
		match conv {
			Converter::Struct(group) => {
				for ((_, child_conv), child_id) in group.children.iter_mut().zip(&children) {
					self.read_field(*child_id, child_conv)?;
				}
				group.end()
			}
			Converter::Variant(variant) => {
				for (child_conv, child_id) in variant.children.iter_mut().zip(&children) {
					self.read_field(*child_id, child_conv)?;
				}
				variant.end()
			}
			Converter::List(list) => {
				// node is the LIST wrapper; its single child repeats.
				list.start();
				self.read_elements(children[0], list)?;
				list.end();
				Ok(())
			}
			Converter::ListEntry(entry) => {
				self.read_field(children[0], entry.element.as_mut())?;
				entry.end();
				Ok(())
			}
			Converter::Map(map) => {
				map.start();
				self.read_entries(children[0], map)?;
				map.end();
				Ok(())
			}
			Converter::MapEntry(entry) => {
				debug_assert_eq!(children.len(), 2);
				self.read_field(children[0], entry.key.as_mut())?;
				self.read_field(children[1], entry.value.as_mut())?;
				entry.end()
			}
			Converter::Primitive(_) => unreachable!("group node paired with a primitive converter"),
		}
	}

	/// One field position under a present parent.
	fn read_field(&mut self, node_id: usize, conv: &mut Converter) -> Result<()> {
		let node = self.layout.node(node_id);
		match node.repetition {
			Repetition::REQUIRED => self.read_instance(node_id, conv),
			Repetition::OPTIONAL => {
				if self.defined(node_id)? {
					self.read_instance(node_id, conv)
				} else {
					self.consume_nulls(node_id)
				}
			}
			Repetition::REPEATED => {
				// a repeated field directly at a record position: 1-level list
				match conv {
					Converter::List(list) => {
						if self.defined(node_id)? {
							list.start();
							self.element_loop(node_id, list)?;
							list.end();
							Ok(())
						} else {
							// absent: empty and null are indistinguishable here
							self.consume_nulls(node_id)
						}
					}
					_ => unreachable!("repeated field paired with a non-list converter"),
				}
			}
		}
	}

	/// Elements of a list wrapper's repeated child.
	fn read_elements(&mut self, repeated_id: usize, list: &mut super::materializer::ListConverter) -> Result<()> {
		if !self.defined(repeated_id)? {
			// present but empty list
			return self.consume_nulls(repeated_id);
		}
		self.element_loop(repeated_id, list)
	}

	fn element_loop(&mut self, repeated_id: usize, list: &mut super::materializer::ListConverter) -> Result<()> {
		let node = self.layout.node(repeated_id);
		let first_leaf = node.leaf_start;
		let rep_level = node.rep_level;
		loop {
			self.read_instance(repeated_id, list.inner.as_mut())?;
			list.push_element();
			match self.columns[first_leaf].peek_rl() {
				Some(rl) if rl == rep_level => continue,
				_ => break,
			}
		}
		Ok(())
	}

	fn read_entries(&mut self, repeated_id: usize, map: &mut super::materializer::MapConverter) -> Result<()> {
		if !self.defined(repeated_id)? {
			return self.consume_nulls(repeated_id);
		}
		let node = self.layout.node(repeated_id);
		let first_leaf = node.leaf_start;
		let rep_level = node.rep_level;
		loop {
			self.read_instance(repeated_id, map.entry.as_mut())?;
			map.push_entry()?;
			match self.columns[first_leaf].peek_rl() {
				Some(rl) if rl == rep_level => continue,
				_ => break,
			}
		}
		Ok(())
	}

}
