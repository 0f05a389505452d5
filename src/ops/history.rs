use chrono::NaiveDate;

use crate::model::task::Task;
use crate::ops::controller::EditError;

/// A single field value of a task, as recorded by `SetFields`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Name(String),
    DueDate(Option<NaiveDate>),
    Priority(Option<i64>),
    Completed(bool),
}

impl FieldValue {
    /// Returns the field name this value belongs to
    pub fn field(&self) -> &'static str {
        match self {
            FieldValue::Name(_) => "name",
            FieldValue::DueDate(_) => "due_date",
            FieldValue::Priority(_) => "priority",
            FieldValue::Completed(_) => "completed",
        }
    }

    /// Store this value into `task`, returning the value it replaced
    pub fn swap_into(self, task: &mut Task) -> FieldValue {
        match self {
            FieldValue::Name(v) => FieldValue::Name(std::mem::replace(&mut task.name, v)),
            FieldValue::DueDate(v) => FieldValue::DueDate(std::mem::replace(&mut task.due_date, v)),
            FieldValue::Priority(v) => {
                FieldValue::Priority(std::mem::replace(&mut task.priority, v))
            }
            FieldValue::Completed(v) => {
                FieldValue::Completed(std::mem::replace(&mut task.completed, v))
            }
        }
    }
}

/// One recorded, invertible mutation of a sibling list.
///
/// Applying an entry performs it and yields the entry that reverts it, so
/// undo and redo are the same replay run in opposite directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEntry {
    /// Insert `task` at `index`
    Add { index: usize, task: Task },
    /// Remove the task at `index`. The removed node travels back in the
    /// returned `Add`, so the entry itself holds no copy.
    Delete { index: usize },
    /// Overwrite fields of the task at `index`, in order
    SetFields { index: usize, values: Vec<FieldValue> },
    /// Pop the task at `from`, then insert it at `to` in the shortened list
    Move { from: usize, to: usize },
    /// New position `i` receives the task previously at `order[i]`
    Reorder { order: Vec<usize> },
}

impl HistoryEntry {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            HistoryEntry::Add { .. } => "add",
            HistoryEntry::Delete { .. } => "delete",
            HistoryEntry::SetFields { .. } => "set_fields",
            HistoryEntry::Move { .. } => "move",
            HistoryEntry::Reorder { .. } => "reorder",
        }
    }

    /// Name of the edit this entry performs, such as `set priority`
    pub fn label(&self) -> String {
        match self {
            HistoryEntry::SetFields { values, .. } => {
                let fields: Vec<&str> = values.iter().map(FieldValue::field).collect();
                format!("set {}", fields.join(", "))
            }
            HistoryEntry::Reorder { .. } => "sort".to_string(),
            other => other.kind().to_string(),
        }
    }

    /// Check that this entry can be applied to a list of `len` tasks
    pub fn validate(&self, len: usize) -> Result<(), EditError> {
        match self {
            HistoryEntry::Add { index, .. } => {
                if *index > len {
                    return Err(EditError::InvalidIndex(*index));
                }
            }
            HistoryEntry::Delete { index } | HistoryEntry::SetFields { index, .. } => {
                check_index(*index, len)?;
            }
            HistoryEntry::Move { from, to } => {
                check_index(*from, len)?;
                check_index(*to, len)?;
            }
            HistoryEntry::Reorder { order } => {
                if order.len() != len {
                    return Err(EditError::InvalidIndex(order.len()));
                }
                let mut seen = vec![false; len];
                for &i in order {
                    match seen.get_mut(i) {
                        Some(slot) if !*slot => *slot = true,
                        _ => return Err(EditError::InvalidIndex(i)),
                    }
                }
            }
        }
        Ok(())
    }

    /// Perform the entry on `tasks` and return its inverse.
    /// Nothing is mutated when validation fails.
    pub fn apply(self, tasks: &mut Vec<Task>) -> Result<HistoryEntry, EditError> {
        self.validate(tasks.len())?;
        let inverse = match self {
            HistoryEntry::Add { index, task } => {
                tasks.insert(index, task);
                HistoryEntry::Delete { index }
            }
            HistoryEntry::Delete { index } => {
                let task = tasks.remove(index);
                HistoryEntry::Add { index, task }
            }
            HistoryEntry::SetFields { index, values } => {
                let task = &mut tasks[index];
                let mut previous: Vec<FieldValue> =
                    values.into_iter().map(|v| v.swap_into(task)).collect();
                // Restoring in reverse order keeps repeated fields correct
                previous.reverse();
                HistoryEntry::SetFields {
                    index,
                    values: previous,
                }
            }
            HistoryEntry::Move { from, to } => {
                let task = tasks.remove(from);
                tasks.insert(to, task);
                HistoryEntry::Move { from: to, to: from }
            }
            HistoryEntry::Reorder { order } => {
                let mut slots: Vec<Option<Task>> =
                    std::mem::take(tasks).into_iter().map(Some).collect();
                tasks.extend(order.iter().filter_map(|&i| slots[i].take()));
                HistoryEntry::Reorder {
                    order: invert_permutation(&order),
                }
            }
        };
        Ok(inverse)
    }
}

/// Valid element index: `0 <= index < len`
pub fn check_index(index: usize, len: usize) -> Result<(), EditError> {
    if index < len {
        Ok(())
    } else {
        Err(EditError::InvalidIndex(index))
    }
}

/// `inv[order[i]] = i`
pub fn invert_permutation(order: &[usize]) -> Vec<usize> {
    let mut inv = vec![0; order.len()];
    for (i, &o) in order.iter().enumerate() {
        inv[o] = i;
    }
    inv
}

/// Linear undo/redo history for one sibling list.
///
/// Both stacks are LIFO and grow without a fixed bound. Pushing a fresh
/// entry invalidates everything on the redo stack.
#[derive(Debug, Default)]
pub struct UndoStack {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
}

impl UndoStack {
    pub fn new() -> Self {
        UndoStack {
            undo: Vec::new(),
            redo: Vec::new(),
        }
    }

    /// Record the inverse of a fresh edit. Clears the redo stack.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
        self.redo.clear();
    }

    /// Replay the newest undo entry onto `tasks`, moving its inverse to the
    /// redo stack. `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self, tasks: &mut Vec<Task>) -> Result<bool, EditError> {
        replay(&mut self.undo, &mut self.redo, tasks)
    }

    /// Replay the newest redo entry, moving its inverse back to the undo stack.
    pub fn redo(&mut self, tasks: &mut Vec<Task>) -> Result<bool, EditError> {
        replay(&mut self.redo, &mut self.undo, tasks)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// The entry the next `redo` would apply
    pub fn peek_redo(&self) -> Option<&HistoryEntry> {
        self.redo.last()
    }
}

fn replay(
    from: &mut Vec<HistoryEntry>,
    to: &mut Vec<HistoryEntry>,
    tasks: &mut Vec<Task>,
) -> Result<bool, EditError> {
    let Some(entry) = from.pop() else {
        return Ok(false);
    };
    if let Err(e) = entry.validate(tasks.len()) {
        // Leave the history exactly as it was
        from.push(entry);
        return Err(e);
    }
    tracing::debug!(kind = entry.kind(), "replaying history entry");
    let inverse = entry.apply(tasks)?;
    to.push(inverse);
    Ok(true)
}
