// File log module - rotating text log and its serialized write queue

mod handler;
mod writer;

pub use handler::FileLogHandler;
pub use writer::RotatingFileWriter;
