use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration from tasktree.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Task file; the extension picks the format (json, csv, ics)
    #[serde(default = "default_file")]
    pub file: PathBuf,
    /// Write the tree back after every successful edit
    #[serde(default = "default_true")]
    pub autosave: bool,
    /// Name of the root created when the task file is missing or unreadable
    #[serde(default = "default_root_name")]
    pub root_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            file: default_file(),
            autosave: true,
            root_name: default_root_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// tracing filter directive used when RUST_LOG is unset
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_level(),
        }
    }
}

fn default_file() -> PathBuf {
    PathBuf::from("tasks.json")
}

fn default_true() -> bool {
    true
}

fn default_root_name() -> String {
    "Main".to_string()
}

fn default_level() -> String {
    "warn".to_string()
}
