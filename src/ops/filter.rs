use chrono::NaiveDate;

use crate::model::task::Task;

/// Which tasks of one level a view shows.
///
/// All criteria combine with AND; the default filter shows everything.
/// Date and priority bounds are strict, and a task lacking the field is
/// hidden while the bound is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Case-insensitive substring of the name
    pub text: Option<String>,
    pub hide_completed: bool,
    pub completed_only: bool,
    pub due_before: Option<NaiveDate>,
    pub due_after: Option<NaiveDate>,
    /// Keep tasks whose priority value is greater than this
    pub priority_above: Option<i64>,
    /// Keep tasks whose priority value is less than this
    pub priority_below: Option<i64>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
        self
    }

    pub fn hide_completed(mut self, on: bool) -> Self {
        self.hide_completed = on;
        self
    }

    pub fn completed_only(mut self, on: bool) -> Self {
        self.completed_only = on;
        self
    }

    pub fn due_before(mut self, date: Option<NaiveDate>) -> Self {
        self.due_before = date;
        self
    }

    pub fn due_after(mut self, date: Option<NaiveDate>) -> Self {
        self.due_after = date;
        self
    }

    pub fn priority_above(mut self, priority: Option<i64>) -> Self {
        self.priority_above = priority;
        self
    }

    pub fn priority_below(mut self, priority: Option<i64>) -> Self {
        self.priority_below = priority;
        self
    }

    /// True when no criterion is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(text) = &self.text
            && !task.name.to_lowercase().contains(&text.to_lowercase())
        {
            return false;
        }
        if self.hide_completed && task.completed {
            return false;
        }
        if self.completed_only && !task.completed {
            return false;
        }
        if let Some(before) = self.due_before
            && !task.due_date.is_some_and(|d| d < before)
        {
            return false;
        }
        if let Some(after) = self.due_after
            && !task.due_date.is_some_and(|d| d > after)
        {
            return false;
        }
        if let Some(above) = self.priority_above
            && !task.priority.is_some_and(|p| p > above)
        {
            return false;
        }
        if let Some(below) = self.priority_below
            && !task.priority.is_some_and(|p| p < below)
        {
            return false;
        }
        true
    }

    /// Visible tasks with their index in `tasks`, so a view can map a
    /// selection back to controller indices.
    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<(usize, &'a Task)> {
        tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| self.matches(t))
            .collect()
    }
}
