use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Error type for tree primitives
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(String),
}

/// A node in the to-do tree.
///
/// Children are owned exclusively by their parent's `sub_tasks` list; a task
/// has no pointer back to its parent. Callers that need parent identity
/// derive it from a path (see [`Task::walk`] and [`parent_index`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Display name (never empty when created through the controller)
    #[serde(default = "default_name")]
    pub name: String,
    /// Optional due date, stored as `YYYY-MM-DD`
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Optional priority; lower value = more urgent
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub completed: bool,
    /// Children in display order
    #[serde(default)]
    pub sub_tasks: Vec<Task>,
}

fn default_name() -> String {
    "Unnamed".to_string()
}

impl Task {
    /// Create a task with no due date, no priority and no children
    pub fn new(name: impl Into<String>) -> Self {
        Task {
            name: name.into(),
            due_date: None,
            priority: None,
            completed: false,
            sub_tasks: Vec::new(),
        }
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Append a child. Appending is always legal.
    pub fn add_child(&mut self, task: Task) {
        self.sub_tasks.push(task);
    }

    /// Remove the first child equal to `task` and hand it back.
    pub fn remove_child(&mut self, task: &Task) -> Result<Task, TaskError> {
        let pos = self
            .sub_tasks
            .iter()
            .position(|t| t == task)
            .ok_or_else(|| TaskError::NotFound(task.name.clone()))?;
        Ok(self.sub_tasks.remove(pos))
    }

    /// The live ordered list of children
    pub fn children(&self) -> &[Task] {
        &self.sub_tasks
    }

    /// Mutable access to the children. Callers must not introduce cycles
    /// (ownership makes that impossible) and should prefer the controller.
    pub fn children_mut(&mut self) -> &mut Vec<Task> {
        &mut self.sub_tasks
    }

    pub fn set_due_date(&mut self, due_date: Option<NaiveDate>) {
        self.due_date = due_date;
    }

    pub fn set_priority(&mut self, priority: Option<i64>) {
        self.priority = priority;
    }

    pub fn mark_completed(&mut self) {
        self.completed = true;
    }

    pub fn mark_incomplete(&mut self) {
        self.completed = false;
    }

    /// Incomplete and due strictly before `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|d| d < today)
    }

    /// Diagnostic rendering: `Main {Sub1 (Completed) {SubSub}, Sub2}`.
    /// Not used for persistence.
    pub fn describe(&self) -> String {
        let mut out = self.name.clone();
        if self.completed {
            out.push_str(" (Completed)");
        }
        if !self.sub_tasks.is_empty() {
            let children: Vec<String> = self.sub_tasks.iter().map(Task::describe).collect();
            out.push_str(" {");
            out.push_str(&children.join(", "));
            out.push('}');
        }
        out
    }

    /// Resolve a path of child indices. The empty path is `self`.
    pub fn get(&self, path: &[usize]) -> Option<&Task> {
        let mut current = self;
        for &idx in path {
            current = current.sub_tasks.get(idx)?;
        }
        Some(current)
    }

    pub fn get_mut(&mut self, path: &[usize]) -> Option<&mut Task> {
        let mut current = self;
        for &idx in path {
            current = current.sub_tasks.get_mut(idx)?;
        }
        Some(current)
    }

    /// Every descendant in pre-order, with its path from `self`.
    pub fn walk(&self) -> Vec<TaskEntry<'_>> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        collect_entries(self, &mut path, &mut out);
        out
    }

    /// Number of descendants (not counting `self`)
    pub fn descendant_count(&self) -> usize {
        self.sub_tasks
            .iter()
            .map(|t| 1 + t.descendant_count())
            .sum()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// One node visited by [`Task::walk`]
#[derive(Debug, Clone)]
pub struct TaskEntry<'a> {
    /// Child indices from the walk root to this node
    pub path: Vec<usize>,
    pub task: &'a Task,
}

impl TaskEntry<'_> {
    /// Depth below the walk root (direct children are depth 1)
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

fn collect_entries<'a>(task: &'a Task, path: &mut Vec<usize>, out: &mut Vec<TaskEntry<'a>>) {
    for (i, child) in task.sub_tasks.iter().enumerate() {
        path.push(i);
        out.push(TaskEntry {
            path: path.clone(),
            task: child,
        });
        collect_entries(child, path, out);
        path.pop();
    }
}

/// Path of the parent of the node at `path`; `None` for the root itself.
pub fn parent_index(path: &[usize]) -> Option<&[usize]> {
    path.split_last().map(|(_, parent)| parent)
}

/// Parse a dotted path like `0.2.1`. The empty string is the root.
pub fn parse_path(s: &str) -> Option<Vec<usize>> {
    let s = s.trim();
    if s.is_empty() {
        return Some(Vec::new());
    }
    s.split('.').map(|part| part.trim().parse().ok()).collect()
}

/// Render a path in the dotted form accepted by [`parse_path`]
pub fn format_path(path: &[usize]) -> String {
    path.iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(".")
}
