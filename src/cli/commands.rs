use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::task::parse_path;

#[derive(Parser)]
#[command(name = "tt", about = concat!("tasktree v", env!("CARGO_PKG_VERSION"), " - a to-do list that nests"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Task file to use (overrides storage.file; .json, .csv or .ics)
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    /// Config file (default: $TASKTREE_CONFIG, then ./tasktree.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the sub-tasks of one level
    List(ListArgs),
    /// Show a task and everything below it
    Show(ShowArgs),
    /// Add a task at the end of a level
    Add(AddArgs),
    /// Rename a task
    Edit(EditArgs),
    /// Delete a task and its sub-tasks
    Rm(IndexArgs),
    /// Move a task to another position in its level
    Mv(MvArgs),
    /// Mark a task completed
    Done(IndexArgs),
    /// Mark a task not completed
    Undone(IndexArgs),
    /// Set or clear a due date
    Due(DueArgs),
    /// Set or clear a priority
    Priority(PriorityArgs),
    /// Sort a level by priority or due date
    Sort(SortArgs),
    /// Write the whole tree to another file
    Export(FileArgs),
    /// Replace the tree with the contents of another file
    Import(FileArgs),
    /// Interactive editing with undo/redo
    Shell,
}

/// The level a command operates on
#[derive(Args, Clone, Debug, Default)]
pub struct LevelArg {
    /// Dot-separated path of the parent task, e.g. 0.2 (default: root)
    #[arg(long = "in", value_name = "PATH", value_parser = parse_path_arg)]
    pub level: Option<::std::vec::Vec<usize>>,
}

impl LevelArg {
    pub fn path(&self) -> &[usize] {
        self.level.as_deref().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub at: LevelArg,
    /// Only tasks whose name contains this text (case-insensitive)
    #[arg(long)]
    pub search: Option<String>,
    /// Hide completed tasks
    #[arg(long, conflicts_with = "completed")]
    pub hide_completed: bool,
    /// Only completed tasks
    #[arg(long)]
    pub completed: bool,
    /// Only tasks due before this date
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    pub due_before: Option<NaiveDate>,
    /// Only tasks due after this date
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    pub due_after: Option<NaiveDate>,
    /// Only tasks whose priority value is greater than N
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub priority_above: Option<i64>,
    /// Only tasks whose priority value is less than N
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub priority_below: Option<i64>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Path of the task to show (default: root)
    #[arg(value_parser = parse_path_arg)]
    pub path: Option<::std::vec::Vec<usize>>,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Task name
    pub name: String,
    /// Due date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub due: Option<NaiveDate>,
    /// Priority (lower sorts first)
    #[arg(long, allow_negative_numbers = true)]
    pub priority: Option<i64>,
    #[command(flatten)]
    pub at: LevelArg,
}

#[derive(Args)]
pub struct IndexArgs {
    /// Index of the task within its level
    pub index: usize,
    #[command(flatten)]
    pub at: LevelArg,
}

#[derive(Args)]
pub struct EditArgs {
    pub index: usize,
    /// New name
    pub name: String,
    #[command(flatten)]
    pub at: LevelArg,
}

#[derive(Args)]
pub struct MvArgs {
    pub from: usize,
    /// Target index; `len` moves to the end, anything larger is rejected
    pub to: usize,
    #[command(flatten)]
    pub at: LevelArg,
}

#[derive(Args)]
pub struct DueArgs {
    pub index: usize,
    /// New due date (YYYY-MM-DD); omit to clear
    #[arg(value_parser = parse_date)]
    pub date: Option<NaiveDate>,
    #[command(flatten)]
    pub at: LevelArg,
}

#[derive(Args)]
pub struct PriorityArgs {
    pub index: usize,
    /// New priority; omit to clear
    #[arg(allow_negative_numbers = true)]
    pub priority: Option<i64>,
    #[command(flatten)]
    pub at: LevelArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    Priority,
    Due,
}

#[derive(Args)]
pub struct SortArgs {
    pub key: SortKey,
    #[command(flatten)]
    pub at: LevelArg,
}

#[derive(Args)]
pub struct FileArgs {
    /// File path; the extension picks the format
    pub path: PathBuf,
}

// ---------------------------------------------------------------------------
// Value parsers
// ---------------------------------------------------------------------------

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}' (expected YYYY-MM-DD)", s))
}

pub fn parse_path_arg(s: &str) -> Result<Vec<usize>, String> {
    parse_path(s).ok_or_else(|| format!("invalid task path '{}' (expected e.g. 0.2.1)", s))
}
