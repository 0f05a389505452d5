use std::borrow::BorrowMut;

use chrono::NaiveDate;

use crate::cli::commands::SortKey;
use crate::model::task::Task;
use crate::ops::controller::{EditController, EditError};

/// One controller call, shared by the one-shot commands and the shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Add {
        name: String,
        due_date: Option<NaiveDate>,
        priority: Option<i64>,
    },
    Rename { index: usize, name: String },
    Delete { index: usize },
    Move { from: usize, to: usize },
    Complete { index: usize },
    Reopen { index: usize },
    Toggle { index: usize },
    Due { index: usize, date: Option<NaiveDate> },
    Priority { index: usize, priority: Option<i64> },
    Sort(SortKey),
    Undo,
    Redo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do (empty history, already sorted)
    Unchanged,
    Changed,
    /// A task was added at this index
    Added(usize),
}

impl Outcome {
    pub fn changed(self) -> bool {
        self != Outcome::Unchanged
    }
}

impl Edit {
    pub fn apply<T: BorrowMut<Task>>(&self, ctl: &mut EditController<T>) -> Result<Outcome, EditError> {
        let changed = |did: bool| if did { Outcome::Changed } else { Outcome::Unchanged };
        match self {
            Edit::Add {
                name,
                due_date,
                priority,
            } => ctl
                .add_task(name.clone(), *due_date, *priority)
                .map(Outcome::Added),
            Edit::Rename { index, name } => ctl.edit_task(*index, name.clone()).map(|_| Outcome::Changed),
            Edit::Delete { index } => ctl.delete_task(*index).map(|_| Outcome::Changed),
            Edit::Move { from, to } => ctl.move_task(*from, *to).map(|_| Outcome::Changed),
            Edit::Complete { index } => ctl.mark_completed(*index).map(|_| Outcome::Changed),
            Edit::Reopen { index } => ctl.mark_incomplete(*index).map(|_| Outcome::Changed),
            Edit::Toggle { index } => ctl.toggle_completed(*index).map(|_| Outcome::Changed),
            Edit::Due { index, date } => ctl.set_due_date(*index, *date).map(|_| Outcome::Changed),
            Edit::Priority { index, priority } => {
                ctl.set_priority(*index, *priority).map(|_| Outcome::Changed)
            }
            Edit::Sort(SortKey::Priority) => Ok(changed(ctl.sort_by_priority())),
            Edit::Sort(SortKey::Due) => Ok(changed(ctl.sort_by_due_date())),
            Edit::Undo => ctl.undo().map(changed),
            Edit::Redo => ctl.redo().map(changed),
        }
    }
}

/// Apply `edit` to the level at `path` below `ctl`, opening one nested
/// controller per step. Each parent is notified once its child changed, so
/// a hook on the root sees nested edits too.
pub fn apply_at<T: BorrowMut<Task>>(
    ctl: &mut EditController<T>,
    path: &[usize],
    edit: &Edit,
) -> Result<Outcome, EditError> {
    let Some((&first, rest)) = path.split_first() else {
        return edit.apply(ctl);
    };
    let outcome = {
        let mut child = ctl.subtask_controller(first)?;
        apply_at(&mut child, rest, edit)?
    };
    if outcome.changed() {
        ctl.notify_change();
    }
    Ok(outcome)
}
