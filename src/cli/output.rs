use chrono::NaiveDate;
use serde::Serialize;

use crate::model::task::{format_path, Task};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

/// One row of `list --json`
#[derive(Serialize)]
pub struct TaskLineJson<'a> {
    pub index: usize,
    pub path: String,
    pub name: &'a str,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<i64>,
    pub completed: bool,
    pub overdue: bool,
    pub sub_tasks: usize,
}

pub fn task_line_json<'a>(path: &[usize], task: &'a Task, today: NaiveDate) -> TaskLineJson<'a> {
    TaskLineJson {
        index: path.last().copied().unwrap_or(0),
        path: format_path(path),
        name: &task.name,
        due_date: task.due_date,
        priority: task.priority,
        completed: task.completed,
        overdue: task.is_overdue(today),
        sub_tasks: task.sub_tasks.len(),
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

fn check_char(task: &Task) -> char {
    if task.completed { 'x' } else { ' ' }
}

/// `[x] Name  due 2025-12-31  p1  +2  OVERDUE`
pub fn format_task_line(task: &Task, today: NaiveDate) -> String {
    let mut line = format!("[{}] {}", check_char(task), task.name);
    if let Some(due) = task.due_date {
        line.push_str(&format!("  due {}", due.format("%Y-%m-%d")));
    }
    if let Some(priority) = task.priority {
        line.push_str(&format!("  p{}", priority));
    }
    if !task.sub_tasks.is_empty() {
        line.push_str(&format!("  +{}", task.sub_tasks.len()));
    }
    if task.is_overdue(today) {
        line.push_str("  OVERDUE");
    }
    line
}

/// A level listing: one line per visible child, prefixed with its index
pub fn format_listing<'a>(
    rows: impl IntoIterator<Item = (usize, &'a Task)>,
    today: NaiveDate,
) -> Vec<String> {
    rows.into_iter()
        .map(|(i, t)| format!("{:>3}  {}", i, format_task_line(t, today)))
        .collect()
}

/// A task and all its descendants, indented by depth, with dotted paths
pub fn format_task_tree(task: &Task, today: NaiveDate) -> Vec<String> {
    let mut lines = vec![format_task_line(task, today)];
    for entry in task.walk() {
        lines.push(format!(
            "{}{} {}",
            "  ".repeat(entry.depth()),
            format_path(&entry.path),
            format_task_line(entry.task, today)
        ));
    }
    lines
}
