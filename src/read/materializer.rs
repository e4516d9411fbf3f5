//! Converter tree assembling record values from the row-assembly event
//! stream. One tree is built per open file, mirroring the projected schema,
//! and reused for every row; children hand their finished value to the
//! parent at each instance boundary.

use crate::error::{Error, Result};
use crate::schema_filter::{ProjField, ProjGroup, ProjListLevels, ProjNode, Projection};
use crate::value::Value;
use crate::variant;

use super::primitives::PrimitiveConverter;

pub(crate) enum Converter {
	Primitive(PrimitiveConverter),
	Struct(StructConverter),
	List(ListConverter),
	/// The repeated element wrapper of a 3-level list.
	ListEntry(ListEntryConverter),
	Map(MapConverter),
	MapEntry(MapEntryConverter),
	Variant(VariantConverter),
}

impl Converter {
	pub fn build(projection: &Projection) -> Converter {
		build_group(&projection.root, "")
	}

	pub(crate) fn from_node(node: &ProjNode, path: &str) -> Converter {
		match node {
			ProjNode::Primitive { plan } => {
				Converter::Primitive(PrimitiveConverter::new(plan.clone(), path.to_string()))
			}
			ProjNode::Group(group) => build_group(group, path),
			ProjNode::List { levels, element } => {
				let inner = match levels {
					ProjListLevels::Three => Converter::ListEntry(ListEntryConverter {
						element: Box::new(Converter::from_node(element, path)),
						out: None,
					}),
					_ => Converter::from_node(element, path),
				};
				Converter::List(ListConverter { inner: Box::new(inner), buf: Vec::new(), out: None })
			}
			ProjNode::Map { key, value } => Converter::Map(MapConverter {
				entry: Box::new(Converter::MapEntry(MapEntryConverter {
					key: Box::new(Converter::from_node(key, path)),
					value: Box::new(Converter::from_node(value, path)),
					path: path.to_string(),
					out: None,
				})),
				entries: Vec::new(),
				out: None,
			}),
			ProjNode::Variant { metadata_index, value_index } => {
				Converter::Variant(VariantConverter::new(*metadata_index, *value_index, path))
			}
		}
	}

	/// The finished value of the last instance, if one was produced.
	pub(crate) fn take(&mut self) -> Option<Value> {
		match self {
			Converter::Primitive(c) => c.take(),
			Converter::Struct(c) => c.out.take(),
			Converter::List(c) => c.out.take(),
			Converter::ListEntry(c) => c.out.take(),
			Converter::Map(c) => c.out.take(),
			Converter::MapEntry(c) => c.out.take(),
			Converter::Variant(c) => c.out.take(),
		}
	}
}

fn build_group(group: &ProjGroup, path: &str) -> Converter {
	let children = group
		.fields
		.iter()
		.map(|ProjField { slot, node }| {
			let name = &group.names[*slot];
			let child_path = if path.is_empty() { name.clone() } else { format!("{}/{}", path, name) };
			(*slot, Converter::from_node(node, &child_path))
		})
		.collect();
	Converter::Struct(StructConverter {
		children,
		names: group.names.clone(),
		defaults: group.defaults.clone(),
		strict_null: group.strict_null.clone(),
		path: path.to_string(),
		out: None,
	})
}

pub(crate) struct StructConverter {
	/// Converters in file order, each tagged with its declaration-order slot.
	pub children: Vec<(usize, Converter)>,
	names: Vec<String>,
	defaults: Vec<Value>,
	strict_null: Vec<bool>,
	path: String,
	out: Option<Value>,
}

impl StructConverter {
	/// Finalizes one instance: pulls every child's value into its slot (or
	/// the default) and publishes the assembled record.
	pub fn end(&mut self) -> Result<()> {
		let mut slots = self.defaults.clone();
		for (slot, child) in self.children.iter_mut() {
			match child.take() {
				Some(value) => slots[*slot] = value,
				None => {
					if self.strict_null[*slot] {
						let name = &self.names[*slot];
						let path = if self.path.is_empty() {
							name.clone()
						} else {
							format!("{}/{}", self.path, name)
						};
						return Err(Error::NullForPrimitive { path });
					}
				}
			}
		}
		let fields = self.names.iter().cloned().zip(slots).collect();
		self.out = Some(Value::Record(fields));
		Ok(())
	}
}

pub(crate) struct ListConverter {
	pub inner: Box<Converter>,
	buf: Vec<Value>,
	out: Option<Value>,
}

impl ListConverter {
	pub fn start(&mut self) {
		self.buf.clear();
	}

	/// Appends the element the inner converter just finished.
	pub fn push_element(&mut self) {
		let element = self.inner.take().unwrap_or(Value::Null);
		self.buf.push(element);
	}

	pub fn end(&mut self) {
		self.out = Some(Value::List(std::mem::take(&mut self.buf)));
	}
}

pub(crate) struct ListEntryConverter {
	pub element: Box<Converter>,
	out: Option<Value>,
}

impl ListEntryConverter {
	/// A 3-level entry holds exactly one optional element; a missing value
	/// is a null list slot.
	pub fn end(&mut self) {
		self.out = Some(self.element.take().unwrap_or(Value::Null));
	}
}

pub(crate) struct MapConverter {
	pub entry: Box<Converter>,
	entries: Vec<(Value, Value)>,
	out: Option<Value>,
}

impl MapConverter {
	pub fn start(&mut self) {
		self.entries.clear();
	}

	pub fn push_entry(&mut self) -> Result<()> {
		match self.entry.take() {
			Some(Value::List(mut pair)) if pair.len() == 2 => {
				let value = pair.pop().unwrap_or(Value::Null);
				let key = pair.pop().unwrap_or(Value::Null);
				self.entries.push((key, value));
				Ok(())
			}
			_ => unreachable!("map entry converter yields a key/value pair"),
		}
	}

	pub fn end(&mut self) {
		self.out = Some(Value::Map(std::mem::take(&mut self.entries)));
	}
}

pub(crate) struct MapEntryConverter {
	pub key: Box<Converter>,
	pub value: Box<Converter>,
	path: String,
	out: Option<Value>,
}

impl MapEntryConverter {
	pub fn end(&mut self) -> Result<()> {
		let key = match self.key.take() {
			Some(key) => key,
			None => return Err(Error::NullMapKey { path: self.path.clone() }),
		};
		let value = self.value.take().unwrap_or(Value::Null);
		self.out = Some(Value::List(vec![key, value]));
		Ok(())
	}
}

pub(crate) struct VariantConverter {
	/// Binary converters for both leaves, in file order.
	pub children: Vec<Converter>,
	metadata_index: usize,
	value_index: usize,
	path: String,
	out: Option<Value>,
}

impl VariantConverter {
	fn new(metadata_index: usize, value_index: usize, path: &str) -> VariantConverter {
		let leaf = |suffix: &str| {
			Converter::Primitive(PrimitiveConverter::new(
				crate::schema_filter::DecodePlan::Bytes,
				format!("{}/{}", path, suffix),
			))
		};
		let mut children = vec![leaf("metadata"), leaf("value")];
		if metadata_index > value_index {
			children.swap(0, 1);
		}
		VariantConverter { children, metadata_index, value_index, path: path.to_string(), out: None }
	}

	/// Decodes the self-describing pair into a dynamic value tree.
	pub fn end(&mut self) -> Result<()> {
		let metadata = self.children[self.metadata_index].take();
		let value = self.children[self.value_index].take();
		match (metadata, value) {
			(Some(Value::Bytes(metadata)), Some(Value::Bytes(value))) => {
				self.out = Some(variant::decode(&metadata, &value).map_err(|e| match e {
					Error::TypeMismatch { detail, .. } => Error::mismatch(&self.path, detail),
					other => other,
				})?);
				Ok(())
			}
			_ => Err(Error::mismatch(&self.path, "variant column is missing metadata or value bytes")),
		}
	}
}
