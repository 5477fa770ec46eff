// Library exports for the netlog capture store

pub mod config;
pub mod error;
pub mod filelog;
pub mod filter;
pub mod ingest;
pub mod model;
pub mod persist;
pub mod store;

pub use config::LoggerConfig;
pub use error::{DiagnosticHook, NetlogError, Result};
pub use filelog::{FileLogHandler, RotatingFileWriter};
pub use filter::RequestFilter;
pub use ingest::NetLogger;
pub use model::{LifecycleState, LogEntry, LogSummary, RequestInfo, ResponseData};
pub use persist::EntryStore;
pub use store::{LogEvent, LogStore};
