use crate::error::{NetlogError, Result};
use crate::model::LogEntry;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the scratch directory used for atomic writes
const TEMP_DIR_NAME: &str = ".tmp";

/// Persists each captured entry as an individual JSON unit under
/// `<directory>/<identifier>`.
///
/// Writes are idempotent: re-saving an identifier replaces the prior unit.
/// Each write goes through a scratch file and a rename so readers never
/// observe a half-written unit.
pub struct EntryStore {
    directory: PathBuf,
    temp_directory: PathBuf,
}

impl EntryStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        let directory = directory.as_ref().to_path_buf();
        let temp_directory = directory.join(TEMP_DIR_NAME);
        Self {
            directory,
            temp_directory,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Identifiers become file names verbatim, so anything that could
    /// escape the entries directory is rejected up front
    fn unit_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
            return Err(NetlogError::PersistError(
                id.to_string(),
                "identifier is not a valid unit name".to_string(),
            ));
        }
        Ok(self.directory.join(id))
    }

    /// Serialize one entry to its per-identifier unit, replacing any
    /// previous unit for the same identifier
    pub async fn save(&self, entry: &LogEntry) -> Result<()> {
        let unit_path = self.unit_path(&entry.id)?;

        tokio::fs::create_dir_all(&self.temp_directory)
            .await
            .map_err(|e| {
                NetlogError::PersistError(
                    entry.id.clone(),
                    format!("Failed to create entries directory: {}", e),
                )
            })?;

        let json = serde_json::to_vec(entry)
            .map_err(|e| NetlogError::SerializationError(e.to_string()))?;

        let temp_path = self.temp_directory.join(&entry.id);
        tokio::fs::write(&temp_path, &json).await.map_err(|e| {
            NetlogError::PersistError(entry.id.clone(), format!("Failed to write unit: {}", e))
        })?;

        tokio::fs::rename(&temp_path, &unit_path)
            .await
            .map_err(|e| {
                NetlogError::PersistError(
                    entry.id.clone(),
                    format!("Failed to move unit into place: {}", e),
                )
            })?;

        debug!(id = %entry.id, "persisted log entry");
        Ok(())
    }

    /// Read a persisted entry back
    pub async fn load(&self, id: &str) -> Result<LogEntry> {
        let path = self.unit_path(id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(NetlogError::EntryNotFound(id.to_string()))
            }
            Err(e) => {
                return Err(NetlogError::PersistError(
                    id.to_string(),
                    format!("Failed to read unit: {}", e),
                ))
            }
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| NetlogError::DeserializationError(e.to_string()))
    }

    /// Whether a unit exists for the identifier
    pub async fn contains(&self, id: &str) -> bool {
        match self.unit_path(id) {
            Ok(path) => tokio::fs::metadata(path).await.is_ok(),
            Err(_) => false,
        }
    }

    /// Delete the unit for one identifier; a missing unit is not an error
    pub async fn remove_entry(&self, id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.unit_path(id)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NetlogError::PersistError(
                id.to_string(),
                format!("Failed to delete unit: {}", e),
            )),
        }
    }

    /// Delete the whole persisted-entries directory, scratch space included
    pub async fn remove_all(&self) -> Result<()> {
        for dir in [&self.temp_directory, &self.directory] {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(NetlogError::PersistError(
                        dir.display().to_string(),
                        format!("Failed to remove directory: {}", e),
                    ))
                }
            }
        }
        Ok(())
    }
}
