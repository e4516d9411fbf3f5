use crate::error::Result;

/// Event-receiving contract of the column writer. The record walker drives
/// one of these per row: `start_message`/`end_message` bracket the row,
/// `start_field`/`end_field` bracket every present field position (absent —
/// null — fields emit nothing at all), `start_group`/`end_group` bracket
/// nested records, list wrappers and map entries, and the `add_*` calls
/// deliver primitive values converted to their physical form.
pub trait RecordConsumer {
	fn start_message(&mut self) -> Result<()>;
	fn end_message(&mut self) -> Result<()>;

	fn start_field(&mut self, name: &str, index: usize) -> Result<()>;
	fn end_field(&mut self, name: &str, index: usize) -> Result<()>;

	fn start_group(&mut self) -> Result<()>;
	fn end_group(&mut self) -> Result<()>;

	fn add_bool(&mut self, value: bool) -> Result<()>;
	fn add_i32(&mut self, value: i32) -> Result<()>;
	fn add_i64(&mut self, value: i64) -> Result<()>;
	fn add_f32(&mut self, value: f32) -> Result<()>;
	fn add_f64(&mut self, value: f64) -> Result<()>;
	fn add_binary(&mut self, value: &[u8]) -> Result<()>;
}
