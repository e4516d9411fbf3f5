mod consumer;
mod levels;
mod stripe;
mod striper;
mod walker;
mod writer;

pub use consumer::RecordConsumer;
pub use writer::{write_file, write_record_to_consumer, RecordWriter, WriterStats};
