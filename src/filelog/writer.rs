use crate::config::expand_home;
use crate::error::{DiagnosticHook, NetlogError, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Appends timestamped text lines to a capped-size file set
/// (`<file_name>-<index>.log`, index 0 = active file) with rotation by
/// cascading rename and pruning of the oldest file.
///
/// All filesystem failures are swallowed: logged, reported to the optional
/// diagnostic hook, and never returned to the caller. A failed write means
/// the line is simply not persisted this time.
pub struct RotatingFileWriter {
    directory: PathBuf,
    file_name: String,
    /// Rotation threshold in kilobytes; 0 disables rotation
    max_file_size_kb: u64,
    /// Retention window; 0 disables rotation and pruning
    max_file_count: u32,
    diagnostics: Option<DiagnosticHook>,
}

impl RotatingFileWriter {
    pub fn new(
        directory: impl Into<PathBuf>,
        file_name: impl Into<String>,
        max_file_size_kb: u64,
        max_file_count: u32,
    ) -> Self {
        let writer = Self {
            directory: directory.into(),
            file_name: file_name.into(),
            max_file_size_kb,
            max_file_count,
            diagnostics: None,
        };
        writer.create_log_directory();
        writer
    }

    /// Install a hook observing swallowed filesystem failures
    pub fn with_diagnostics(mut self, hook: DiagnosticHook) -> Self {
        self.diagnostics = Some(hook);
        self
    }

    /// Change the log directory, expanding a leading `~` and eagerly
    /// (re)creating the directory. Creation failure is logged, not raised.
    pub fn set_directory(&mut self, directory: impl AsRef<Path>) {
        self.directory = expand_home(directory.as_ref());
        self.create_log_directory();
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the active (index 0) log file
    pub fn current_path(&self) -> PathBuf {
        self.directory.join(self.log_name(0))
    }

    fn log_name(&self, index: u32) -> String {
        format!("{}-{}.log", self.file_name, index)
    }

    fn log_path(&self, index: u32) -> PathBuf {
        self.directory.join(self.log_name(index))
    }

    fn create_log_directory(&self) {
        if let Err(e) = std::fs::create_dir_all(&self.directory) {
            self.report(NetlogError::LogDirectoryError(format!(
                "Failed to create log directory {}: {}",
                self.directory.display(),
                e
            )));
        }
    }

    /// Append a timestamped line to the active file, then run cleanup.
    /// Never fails from the caller's perspective.
    pub async fn write(&self, text: &str) {
        match self.append_line(text).await {
            Ok(()) => self.cleanup().await,
            Err(e) => self.report(e),
        }
    }

    async fn append_line(&self, text: &str) -> Result<()> {
        if !self.directory.exists() {
            self.create_log_directory();
        }

        let path = self.current_path();
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let line = format!("[{}]: {}\n", timestamp, text);

        // The handle is scoped to this block and released on every exit
        // path, including write errors.
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                NetlogError::LogFileError(format!("Failed to open {}: {}", path.display(), e))
            })?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| NetlogError::LogFileError(format!("Failed to write log line: {}", e)))?;

        file.flush()
            .await
            .map_err(|e| NetlogError::LogFileError(format!("Failed to flush log file: {}", e)))?;

        // Push the append to stable storage before returning
        file.sync_all()
            .await
            .map_err(|e| NetlogError::LogFileError(format!("Failed to sync log file: {}", e)))?;

        Ok(())
    }

    /// Rotate-then-prune once the active file crosses the size threshold.
    /// A threshold or retention count of 0 disables rotation entirely.
    async fn cleanup(&self) {
        let max_size = self.max_file_size_kb * 1024;
        if max_size == 0 || self.max_file_count == 0 {
            return;
        }

        let size = file_size(&self.current_path()).await;
        if size == 0 || size < max_size {
            return;
        }

        self.rotate().await;
        self.prune().await;
    }

    /// Shift every occupied index up by one, highest first, so the active
    /// file becomes index 1 and a fresh index 0 is created on next write
    async fn rotate(&self) {
        let mut highest = 0u32;
        while tokio::fs::metadata(self.log_path(highest + 1)).await.is_ok() {
            highest += 1;
        }

        for index in (0..=highest).rev() {
            let from = self.log_path(index);
            let to = self.log_path(index + 1);
            if let Err(e) = tokio::fs::rename(&from, &to).await {
                self.report(NetlogError::LogRotationError(format!(
                    "Failed to move {} to {}: {}",
                    from.display(),
                    to.display(),
                    e
                )));
            }
        }
        debug!(directory = %self.directory.display(), "rotated log files");
    }

    /// Delete the file one past the retention window, if present
    async fn prune(&self) {
        let path = self.log_path(self.max_file_count);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "pruned oldest log file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => self.report(NetlogError::LogRotationError(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Delete the entire log directory, best-effort
    pub async fn clear_log_files(&self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.directory).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                self.report(NetlogError::LogDirectoryError(format!(
                    "Failed to remove log directory {}: {}",
                    self.directory.display(),
                    e
                )));
            }
        }
    }

    fn report(&self, error: NetlogError) {
        warn!(error = %error, "file log operation failed");
        if let Some(hook) = &self.diagnostics {
            hook(&error);
        }
    }
}

/// Size of a file in bytes; an unreadable attribute set counts as 0 so a
/// stat failure never blocks writing
async fn file_size(path: &Path) -> u64 {
    tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
}
