use crate::error::{NetlogError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Fixed subfolder appended to the platform document directory when no
/// explicit log directory is configured
const DEFAULT_SUBFOLDER: &str = "netlog";

/// Configuration for a capture logger instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Base name for rotating log files (`<file_name>-<index>.log`)
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Directory for the rotating text log; defaults to the platform
    /// document directory plus a fixed subfolder
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Max size of one log file in kilobytes before rotation; 0 disables
    /// rotation
    #[serde(default = "default_max_file_size_kb")]
    pub max_file_size_kb: u64,

    /// Max number of rotated files kept on disk; once exceeded the oldest
    /// file is deleted. 0 disables rotation and pruning.
    #[serde(default = "default_max_file_count")]
    pub max_file_count: u32,

    /// Whether captured calls are appended to the rotating text log
    #[serde(default = "default_enabled")]
    pub file_log_enabled: bool,

    /// Whether each entry is persisted as an individual unit on disk
    #[serde(default = "default_enabled")]
    pub persist_entries: bool,

    /// Directory for per-entry persisted units; defaults to a sibling of
    /// the rotating-log directory so clearing one never touches the other
    #[serde(default)]
    pub entries_directory: Option<PathBuf>,
}

fn default_file_name() -> String {
    "NLNetworkLog".to_string()
}

fn default_max_file_size_kb() -> u64 {
    1024
}

fn default_max_file_count() -> u32 {
    4
}

fn default_enabled() -> bool {
    true
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            file_name: default_file_name(),
            directory: None,
            max_file_size_kb: default_max_file_size_kb(),
            max_file_count: default_max_file_count(),
            file_log_enabled: true,
            persist_entries: true,
            entries_directory: None,
        }
    }
}

impl LoggerConfig {
    /// Load a configuration from a file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| NetlogError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let config: LoggerConfig = match extension {
            "toml" => toml::from_str(&contents)
                .map_err(|e| NetlogError::InvalidConfig(format!("Failed to parse TOML: {}", e)))?,
            "json" => serde_json::from_str(&contents)
                .map_err(|e| NetlogError::InvalidConfig(format!("Failed to parse JSON: {}", e)))?,
            _ => {
                return Err(NetlogError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        Ok(config.normalized())
    }

    /// Substitute invariant-threatening values with defaults rather than
    /// rejecting them: an empty file name falls back to the default.
    pub fn normalized(mut self) -> Self {
        if self.file_name.trim().is_empty() {
            self.file_name = default_file_name();
        }
        self
    }

    /// Resolve the rotating-log directory, expanding a leading `~` in a
    /// configured path and falling back to the platform default
    pub fn resolved_directory(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => expand_home(dir),
            None => default_directory(),
        }
    }

    /// Directory holding per-entry persisted units, a sibling of the
    /// rotating-log directory
    pub fn resolved_entries_directory(&self) -> PathBuf {
        if let Some(dir) = &self.entries_directory {
            return expand_home(dir);
        }
        let base = self.resolved_directory();
        let name = base
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_SUBFOLDER);
        base.with_file_name(format!("{}-entries", name))
    }
}

/// Platform document directory plus the fixed subfolder, falling back to
/// the OS temp dir when no document directory exists (headless hosts)
pub fn default_directory() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(DEFAULT_SUBFOLDER)
}

/// Expand a leading `~` or `~/` to the user's home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Some(s) = path.to_str() else {
        return path.to_path_buf();
    };
    if s == "~" {
        return dirs::home_dir().unwrap_or_else(|| path.to_path_buf());
    }
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
