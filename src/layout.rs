//! Flattened view of a Parquet schema tree with the definition and
//! repetition levels of every node and the depth-first ordinal of every leaf
//! column. Both the write-side column striper and the read-side row
//! assembler navigate through this arena.

use parquet::basic::{Repetition, Type as PhysicalType};
use parquet::schema::types::{Type as ParquetType, TypePtr};

#[derive(Debug, Clone)]
pub(crate) struct LeafInfo {
	pub ordinal: usize,
	pub physical: PhysicalType,
	pub type_length: i32,
}

#[derive(Debug, Clone)]
pub(crate) struct IoNode {
	pub name: String,
	pub repetition: Repetition,
	pub def_level: i16,
	pub rep_level: i16,
	pub children: Vec<usize>,
	pub leaf: Option<LeafInfo>,
	/// Half-open range of leaf ordinals under this node.
	pub leaf_start: usize,
	pub leaf_end: usize,
}

impl IoNode {
	pub fn is_leaf(&self) -> bool {
		self.leaf.is_some()
	}
}

#[derive(Debug, Clone)]
pub(crate) struct ColumnLayout {
	pub nodes: Vec<IoNode>,
	pub root: usize,
	pub leaf_count: usize,
}

impl ColumnLayout {
	/// Builds the arena from a schema root (a message group).
	pub fn build(schema: &TypePtr) -> ColumnLayout {
		let mut layout = ColumnLayout { nodes: Vec::new(), root: 0, leaf_count: 0 };
		let root = layout.add_node(schema, 0, 0, true);
		layout.root = root;
		layout
	}

	fn add_node(&mut self, ty: &TypePtr, parent_dl: i16, parent_rl: i16, is_root: bool) -> usize {
		let info = ty.get_basic_info();
		let repetition = if is_root { Repetition::REQUIRED } else { info.repetition() };
		let def_level = parent_dl + (repetition != Repetition::REQUIRED) as i16;
		let rep_level = parent_rl + (repetition == Repetition::REPEATED) as i16;

		let id = self.nodes.len();
		self.nodes.push(IoNode {
			name: info.name().to_string(),
			repetition,
			def_level,
			rep_level,
			children: Vec::new(),
			leaf: None,
			leaf_start: self.leaf_count,
			leaf_end: self.leaf_count,
		});

		match ty.as_ref() {
			ParquetType::PrimitiveType { physical_type, type_length, .. } => {
				let ordinal = self.leaf_count;
				self.leaf_count += 1;
				let node = &mut self.nodes[id];
				node.leaf = Some(LeafInfo { ordinal, physical: *physical_type, type_length: *type_length });
				node.leaf_end = self.leaf_count;
			}
			ParquetType::GroupType { fields, .. } => {
				let mut children = Vec::with_capacity(fields.len());
				for field in fields {
					children.push(self.add_node(field, def_level, rep_level, false));
				}
				let leaf_end = self.leaf_count;
				let node = &mut self.nodes[id];
				node.children = children;
				node.leaf_end = leaf_end;
			}
		}
		id
	}

	pub fn node(&self, id: usize) -> &IoNode {
		&self.nodes[id]
	}

	pub fn root_node(&self) -> &IoNode {
		&self.nodes[self.root]
	}

	/// Ordinals of every leaf column under a node.
	pub fn leaves_of(&self, id: usize) -> std::ops::Range<usize> {
		let n = &self.nodes[id];
		n.leaf_start..n.leaf_end
	}
}
