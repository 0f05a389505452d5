use std::borrow::{Borrow, BorrowMut};
use std::error::Error;

use chrono::NaiveDate;

use crate::model::task::Task;
use crate::ops::history::{check_index, FieldValue, HistoryEntry, UndoStack};

/// Error type for controller operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("invalid task index: {0}")]
    InvalidIndex(usize),
    #[error("task name must not be empty")]
    EmptyName,
}

/// Callback invoked with the controller's task after every successful edit.
/// Errors are logged and dropped; they never reach the editing caller.
pub type ChangeHook = Box<dyn FnMut(&Task) -> Result<(), Box<dyn Error>>>;

/// Mediates every mutation of one task's children and keeps the
/// undo/redo history for that level.
///
/// `T` is either an owned [`Task`] (the usual root controller) or a
/// `&mut Task` borrowed from a parent controller, see
/// [`EditController::subtask_controller`]. Each controller has its own
/// history; nested controllers share nothing with their parent.
///
/// Every index-taking operation validates before mutating. A rejected call
/// leaves the tree and both stacks untouched.
pub struct EditController<T = Task> {
    task: T,
    history: UndoStack,
    on_change: Option<ChangeHook>,
}

impl<T: BorrowMut<Task>> EditController<T> {
    pub fn new(task: T) -> Self {
        EditController {
            task,
            history: UndoStack::new(),
            on_change: None,
        }
    }

    /// Attach an auto-save hook
    pub fn with_on_change<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&Task) -> Result<(), Box<dyn Error>> + 'static,
    {
        self.on_change = Some(Box::new(hook));
        self
    }

    pub fn set_on_change(&mut self, hook: Option<ChangeHook>) {
        self.on_change = hook;
    }

    /// The task this controller edits
    pub fn task(&self) -> &Task {
        self.task.borrow()
    }

    pub fn into_inner(self) -> T {
        self.task
    }

    pub fn task_name(&self) -> &str {
        &self.task().name
    }

    /// Live ordered view of the children
    pub fn sub_tasks(&self) -> &[Task] {
        &self.task().sub_tasks
    }

    pub fn history(&self) -> &UndoStack {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_len(&self) -> usize {
        self.history.undo_len()
    }

    pub fn redo_len(&self) -> usize {
        self.history.redo_len()
    }

    fn children_mut(&mut self) -> &mut Vec<Task> {
        let task: &mut Task = self.task.borrow_mut();
        &mut task.sub_tasks
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    /// Append a new task. Returns the index it landed at.
    pub fn add_task(
        &mut self,
        name: impl Into<String>,
        due_date: Option<NaiveDate>,
        priority: Option<i64>,
    ) -> Result<usize, EditError> {
        let name = name.into();
        validate_name(&name)?;
        let mut task = Task::new(name);
        task.due_date = due_date;
        task.priority = priority;

        let children = self.children_mut();
        children.push(task);
        let index = children.len() - 1;
        self.commit(HistoryEntry::Delete { index });
        Ok(index)
    }

    pub fn edit_task(&mut self, index: usize, new_name: impl Into<String>) -> Result<(), EditError> {
        check_index(index, self.sub_tasks().len())?;
        let new_name = new_name.into();
        validate_name(&new_name)?;
        self.set_fields(index, vec![FieldValue::Name(new_name)])
    }

    pub fn delete_task(&mut self, index: usize) -> Result<(), EditError> {
        let inverse = HistoryEntry::Delete { index }.apply(self.children_mut())?;
        self.commit(inverse);
        Ok(())
    }

    /// Pop the task at `from` and reinsert it at `to` in the shortened list.
    /// `to == len` moves the task to the end.
    pub fn move_task(&mut self, from: usize, to: usize) -> Result<(), EditError> {
        let len = self.sub_tasks().len();
        check_index(from, len)?;
        if to > len {
            return Err(EditError::InvalidIndex(to));
        }
        // After the pop there are len - 1 tasks, so `len` lands at len - 1
        let landed = to.min(len - 1);
        let inverse = HistoryEntry::Move { from, to: landed }.apply(self.children_mut())?;
        self.commit(inverse);
        Ok(())
    }

    pub fn mark_completed(&mut self, index: usize) -> Result<(), EditError> {
        self.set_fields(index, vec![FieldValue::Completed(true)])
    }

    pub fn mark_incomplete(&mut self, index: usize) -> Result<(), EditError> {
        self.set_fields(index, vec![FieldValue::Completed(false)])
    }

    pub fn toggle_completed(&mut self, index: usize) -> Result<(), EditError> {
        let completed = self
            .sub_tasks()
            .get(index)
            .ok_or(EditError::InvalidIndex(index))?
            .completed;
        self.set_fields(index, vec![FieldValue::Completed(!completed)])
    }

    pub fn set_due_date(&mut self, index: usize, due_date: Option<NaiveDate>) -> Result<(), EditError> {
        self.set_fields(index, vec![FieldValue::DueDate(due_date)])
    }

    pub fn set_priority(&mut self, index: usize, priority: Option<i64>) -> Result<(), EditError> {
        self.set_fields(index, vec![FieldValue::Priority(priority)])
    }

    /// Overwrite several fields of one task as a single undo step
    pub fn set_fields(&mut self, index: usize, values: Vec<FieldValue>) -> Result<(), EditError> {
        if values
            .iter()
            .any(|v| matches!(v, FieldValue::Name(n) if n.trim().is_empty()))
        {
            check_index(index, self.sub_tasks().len())?;
            return Err(EditError::EmptyName);
        }
        let inverse = HistoryEntry::SetFields { index, values }.apply(self.children_mut())?;
        self.commit(inverse);
        Ok(())
    }

    /// Stable sort by priority, unprioritized last. Returns whether the
    /// order changed; an unchanged list records no history.
    pub fn sort_by_priority(&mut self) -> bool {
        self.reorder_by(|t| (t.priority.is_none(), t.priority))
    }

    /// Stable sort by due date, undated last.
    pub fn sort_by_due_date(&mut self) -> bool {
        self.reorder_by(|t| (t.due_date.is_none(), t.due_date))
    }

    fn reorder_by<K: Ord>(&mut self, key: impl Fn(&Task) -> K) -> bool {
        let tasks = self.sub_tasks();
        let mut order: Vec<usize> = (0..tasks.len()).collect();
        // sort_by_key is stable: equal keys keep their relative order
        order.sort_by_key(|&i| key(&tasks[i]));
        if order.iter().enumerate().all(|(i, &o)| i == o) {
            return false;
        }
        let Ok(inverse) = (HistoryEntry::Reorder { order }).apply(self.children_mut()) else {
            return false;
        };
        self.commit(inverse);
        true
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Revert the most recent edit. `Ok(false)` if there was nothing to undo.
    pub fn undo(&mut self) -> Result<bool, EditError> {
        let task: &mut Task = self.task.borrow_mut();
        let undone = self.history.undo(&mut task.sub_tasks)?;
        if undone {
            self.notify_change();
        }
        Ok(undone)
    }

    /// Re-apply the most recently undone edit. `Ok(false)` if there was none.
    pub fn redo(&mut self) -> Result<bool, EditError> {
        let task: &mut Task = self.task.borrow_mut();
        let redone = self.history.redo(&mut task.sub_tasks)?;
        if redone {
            self.notify_change();
        }
        Ok(redone)
    }

    // -----------------------------------------------------------------------
    // Nesting and hooks
    // -----------------------------------------------------------------------

    /// A controller over the child at `index`, with its own empty history
    /// and no hook. Edits made through it are not undoable from `self`.
    pub fn subtask_controller(&mut self, index: usize) -> Result<EditController<&mut Task>, EditError> {
        check_index(index, self.sub_tasks().len())?;
        Ok(EditController::new(&mut self.children_mut()[index]))
    }

    /// Run the change hook now. Failures are logged and swallowed.
    pub fn notify_change(&mut self) {
        let task: &Task = self.task.borrow();
        if let Some(hook) = self.on_change.as_mut()
            && let Err(e) = hook(task)
        {
            tracing::warn!(error = %e, "auto-save failed; continuing without saving");
        }
    }

    fn commit(&mut self, inverse: HistoryEntry) {
        tracing::debug!(
            kind = inverse.kind(),
            task = self.task_name(),
            "recorded edit"
        );
        self.history.push(inverse);
        self.notify_change();
    }
}

fn validate_name(name: &str) -> Result<(), EditError> {
    if name.trim().is_empty() {
        Err(EditError::EmptyName)
    } else {
        Ok(())
    }
}
