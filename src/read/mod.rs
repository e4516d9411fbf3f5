mod assembly;
mod materializer;
mod primitives;
mod reader;

pub use primitives::{Dictionary, PrimitiveConverter};
pub use reader::{read_dynamic, read_file, read_file_with, DynamicIter, RecordIter};
