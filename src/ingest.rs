use crate::config::LoggerConfig;
use crate::error::DiagnosticHook;
use crate::filelog::{FileLogHandler, RotatingFileWriter};
use crate::filter::RequestFilter;
use crate::model::{LogEntry, LogSummary, ResponseData};
use crate::persist::EntryStore;
use crate::store::{LogEvent, LogStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Ingestion coordinator and public face of the capture pipeline.
///
/// Receives raw events from the capture mechanism and fans them into the
/// in-memory store (always), the rotating file log, and the per-entry
/// persistence service (both optional, per configuration). Constructed
/// explicitly and injected where needed; there is no global instance.
///
/// Must be created within a tokio runtime: the file writer and the
/// persistence queue each run on a dedicated background task.
pub struct NetLogger {
    store: LogStore,
    file_log: Option<FileLogHandler>,
}

impl NetLogger {
    pub fn new(config: LoggerConfig) -> Self {
        Self::build(config, None)
    }

    /// Like [`NetLogger::new`], with a hook observing swallowed disk
    /// failures
    pub fn with_diagnostics(config: LoggerConfig, hook: DiagnosticHook) -> Self {
        Self::build(config, Some(hook))
    }

    fn build(config: LoggerConfig, diagnostics: Option<DiagnosticHook>) -> Self {
        let config = config.normalized();

        let persistence = config
            .persist_entries
            .then(|| Arc::new(EntryStore::new(config.resolved_entries_directory())));

        let file_log = config.file_log_enabled.then(|| {
            let mut writer = RotatingFileWriter::new(
                config.resolved_directory(),
                &config.file_name,
                config.max_file_size_kb,
                config.max_file_count,
            );
            if let Some(hook) = &diagnostics {
                writer = writer.with_diagnostics(Arc::clone(hook));
            }
            FileLogHandler::spawn(writer)
        });

        Self {
            store: LogStore::with_diagnostics(persistence, diagnostics),
            file_log,
        }
    }

    /// Append a filter predicate consulted before file-log lines are
    /// written. Has no effect when the file log is disabled.
    pub fn add_filter(&self, filter: Arc<dyn RequestFilter>) {
        if let Some(file_log) = &self.file_log {
            file_log.add_filter(filter);
        }
    }

    /// Move the rotating file log to another directory. A leading `~` is
    /// expanded and the directory eagerly created; takes effect for
    /// subsequent appends. No effect when the file log is disabled.
    pub fn set_log_directory(&self, directory: impl Into<std::path::PathBuf>) {
        if let Some(file_log) = &self.file_log {
            file_log.set_directory(directory);
        }
    }

    /// Fire-and-forget delivery of a request-started event
    pub async fn request_started(&self, entry: LogEntry) {
        if let Some(file_log) = &self.file_log {
            file_log.log_request(&entry);
        }
        self.store.record_request_start(entry).await;
    }

    /// Fire-and-forget delivery of a response-received event. A response
    /// for an identifier never seen as a request-start is ignored.
    pub async fn response_received(&self, id: &str, response: ResponseData) {
        let updated = self.store.record_response(id, response).await;
        if let (Some(file_log), Some(entry)) = (&self.file_log, updated) {
            file_log.log_response(&entry);
        }
    }

    /// Subscribe to change notifications (one per settled mutation,
    /// carrying the identifier and whether it was a response update)
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.store.subscribe()
    }

    /// Identifiers in insertion (oldest-first) order
    pub async fn snapshot_ids(&self) -> Vec<String> {
        self.store.snapshot_ids().await
    }

    /// Copy of the identifier → summary mapping
    pub async fn snapshot_summaries(&self) -> HashMap<String, LogSummary> {
        self.store.snapshot_summaries().await
    }

    /// Summary at a presentation position, 0 = most recent request
    pub async fn summary_at(&self, external_index: usize) -> Option<LogSummary> {
        self.store.summary_at(external_index).await
    }

    /// Full captured entry for an identifier
    pub async fn entry(&self, id: &str) -> Option<LogEntry> {
        self.store.entry(id).await
    }

    /// Number of captured entries in the store
    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    /// Whether the store holds no entries
    pub async fn is_empty(&self) -> bool {
        self.store.is_empty().await
    }

    /// Remove the entry at a presentation position (0 = newest) along
    /// with its persisted unit; out of range is a no-op
    pub async fn remove_at(&self, external_index: usize) -> Option<String> {
        self.store.remove_at(external_index).await
    }

    /// Drop every captured entry: empties the store, deletes the
    /// persisted-entries directory, and deletes the rotating log
    /// directory
    pub async fn clear_all(&self) {
        self.store.clear().await;
        if let Some(file_log) = &self.file_log {
            file_log.clear_log_files();
        }
    }
}
