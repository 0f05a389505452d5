use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::model::task::Task;
use crate::ops::controller::ChangeHook;
use crate::parse::{csv, ics};

/// Error type for loading and saving task files
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::CsvError),
    #[error("invalid iCalendar: {0}")]
    Ics(#[from] ics::IcsError),
    #[error("unknown task file format: {0} (expected .json, .csv or .ics)")]
    UnknownFormat(PathBuf),
}

/// On-disk representation, picked from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Csv,
    Ics,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Format, StoreError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(Format::Json),
            Some("csv") => Ok(Format::Csv),
            Some("ics") => Ok(Format::Ics),
            _ => Err(StoreError::UnknownFormat(path.to_path_buf())),
        }
    }
}

pub fn serialize_tree(root: &Task, format: Format) -> Result<String, StoreError> {
    Ok(match format {
        Format::Json => {
            let mut text = serde_json::to_string_pretty(root)?;
            text.push('\n');
            text
        }
        Format::Csv => csv::serialize_csv(root)?,
        Format::Ics => ics::serialize_ics(root),
    })
}

pub fn parse_tree(text: &str, format: Format) -> Result<Task, StoreError> {
    Ok(match format {
        Format::Json => serde_json::from_str(text)?,
        Format::Csv => csv::parse_csv(text)?,
        Format::Ics => ics::parse_ics(text)?,
    })
}

/// Read a tree, reporting any failure
pub fn try_load_tree(path: &Path) -> Result<Task, StoreError> {
    let format = Format::from_path(path)?;
    let text = fs::read_to_string(path).map_err(|e| StoreError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let tree = parse_tree(&text, format)?;
    debug!(path = %path.display(), tasks = tree.descendant_count(), "loaded task tree");
    Ok(tree)
}

/// Read a tree, falling back to a lone root named `root_name` when the file
/// is missing or cannot be parsed.
pub fn load_tree(path: &Path, root_name: &str) -> Task {
    match try_load_tree(path) {
        Ok(tree) => tree,
        Err(StoreError::ReadError { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no task file yet, starting empty");
            Task::new(root_name)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load tasks, starting empty");
            Task::new(root_name)
        }
    }
}

/// Write a tree in the format implied by `path`.
pub fn save_tree(path: &Path, root: &Task) -> Result<(), StoreError> {
    let format = Format::from_path(path)?;
    let text = serialize_tree(root, format)?;
    atomic_write(path, text.as_bytes()).map_err(|e| StoreError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!(path = %path.display(), "saved task tree");
    Ok(())
}

/// Write to a temp file in the same directory, then rename over the target,
/// so readers never observe a half-written file.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Build an `on_change` hook that saves the whole tree to `path`.
pub fn autosave_hook(path: impl Into<PathBuf>) -> ChangeHook {
    let path = path.into();
    Box::new(move |root: &Task| {
        save_tree(&path, root)?;
        Ok(())
    })
}
