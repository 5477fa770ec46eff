use crate::filelog::RotatingFileWriter;
use crate::filter::RequestFilter;
use crate::model::{LogEntry, RequestInfo};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// Work queued behind the writer task. Appends and directory-structural
/// operations go through the same queue so a clear never races a rotation.
enum WriteCommand {
    Append(String),
    Clear,
    SetDirectory(PathBuf),
}

/// Fans captured calls into a [`RotatingFileWriter`] owned by a single
/// background task, so file I/O for one writer is never interleaved.
///
/// Before composing a line the handler consults its ordered filter set
/// over the request; the first accepting filter wins, and an empty set
/// accepts everything. Ingestion never blocks on disk.
pub struct FileLogHandler {
    tx: mpsc::UnboundedSender<WriteCommand>,
    filters: RwLock<Vec<Arc<dyn RequestFilter>>>,
}

impl FileLogHandler {
    /// Spawn the background task owning `writer`. Must be called from
    /// within a tokio runtime.
    pub fn spawn(writer: RotatingFileWriter) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(writer, rx));
        Self {
            tx,
            filters: RwLock::new(Vec::new()),
        }
    }

    /// Append a filter predicate to the ordered set
    pub fn add_filter(&self, filter: Arc<dyn RequestFilter>) {
        if let Ok(mut filters) = self.filters.write() {
            filters.push(filter);
        }
    }

    fn accepts(&self, request: &RequestInfo) -> bool {
        match self.filters.read() {
            Ok(filters) => {
                filters.is_empty() || filters.iter().any(|f| f.should_log(request))
            }
            Err(_) => false,
        }
    }

    /// Queue a request line, subject to filtering
    pub fn log_request(&self, entry: &LogEntry) {
        if !self.accepts(&entry.request) {
            return;
        }
        let line = format!("Request {} {}", entry.request.method, entry.request.url);
        let _ = self.tx.send(WriteCommand::Append(line));
    }

    /// Queue a response line for a finished entry, subject to filtering
    /// on its request
    pub fn log_response(&self, entry: &LogEntry) {
        if !self.accepts(&entry.request) {
            return;
        }
        let outcome = match entry.response.as_ref() {
            Some(response) => match (&response.error, response.status_code) {
                (Some(error), _) => format!("error: {}", error),
                (None, Some(status)) => status.to_string(),
                (None, None) => "no status".to_string(),
            },
            None => "no response".to_string(),
        };
        let duration = entry
            .duration_string()
            .unwrap_or_else(|| "-".to_string());
        let line = format!(
            "Response {} {} -> {} ({})",
            entry.request.method, entry.request.url, outcome, duration
        );
        let _ = self.tx.send(WriteCommand::Append(line));
    }

    /// Queue deletion of the whole log directory
    pub fn clear_log_files(&self) {
        let _ = self.tx.send(WriteCommand::Clear);
    }

    /// Queue a directory change; takes effect for subsequent appends
    pub fn set_directory(&self, directory: impl Into<PathBuf>) {
        let _ = self.tx.send(WriteCommand::SetDirectory(directory.into()));
    }
}

async fn run_writer(mut writer: RotatingFileWriter, mut rx: mpsc::UnboundedReceiver<WriteCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            WriteCommand::Append(line) => writer.write(&line).await,
            WriteCommand::Clear => writer.clear_log_files().await,
            WriteCommand::SetDirectory(directory) => writer.set_directory(directory),
        }
    }
}
