use std::borrow::BorrowMut;
use std::io::{self, BufRead, Write};

use chrono::NaiveDate;

use crate::cli::commands::{parse_date, SortKey};
use crate::cli::edit::{Edit, Outcome};
use crate::cli::output::{format_listing, format_task_tree};
use crate::model::task::{format_path, Task};
use crate::ops::controller::EditController;
use crate::ops::history::HistoryEntry;
use crate::ops::filter::TaskFilter;

const HELP: &str = "\
commands:
  ls [TEXT]            list this level, optionally filtered by name
  show                 show this task and everything below it
  add NAME             add a task at the end
  edit I NAME          rename task I
  rm I                 delete task I
  mv I J               move task I to position J
  done I | undone I    mark task I completed or not
  toggle I             flip task I's completion
  due I [DATE|-]       set or clear a due date (YYYY-MM-DD)
  prio I [N|-]         set or clear a priority
  sort priority|due    sort this level
  undo | redo          step through this level's history
  cd I | up            enter task I's sub-tasks, or go back
  quit                 leave the shell";

/// Error type for shell input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid number '{0}'")]
    BadNumber(String),
    #[error("{0}")]
    BadDate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Edit(Edit),
    List(Option<String>),
    Show,
    Cd(usize),
    Up,
    Help,
    Quit,
    Empty,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

pub fn parse_line(line: &str) -> Result<ShellCommand, CommandError> {
    let line = line.trim();
    let (cmd, rest) = line
        .split_once(char::is_whitespace)
        .map(|(c, r)| (c, r.trim()))
        .unwrap_or((line, ""));
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match cmd {
        "" => ShellCommand::Empty,
        "ls" | "list" => ShellCommand::List((!rest.is_empty()).then(|| rest.to_string())),
        "show" => ShellCommand::Show,
        "add" => {
            if rest.is_empty() {
                return Err(CommandError::Usage("add NAME"));
            }
            ShellCommand::Edit(Edit::Add {
                name: rest.to_string(),
                due_date: None,
                priority: None,
            })
        }
        "edit" | "rename" => {
            let Some((index, name)) = rest.split_once(char::is_whitespace) else {
                return Err(CommandError::Usage("edit I NAME"));
            };
            ShellCommand::Edit(Edit::Rename {
                index: parse_index(index)?,
                name: name.trim().to_string(),
            })
        }
        "rm" | "del" => ShellCommand::Edit(Edit::Delete {
            index: single_index(&args, "rm I")?,
        }),
        "mv" => match args.as_slice() {
            [from, to] => ShellCommand::Edit(Edit::Move {
                from: parse_index(from)?,
                to: parse_index(to)?,
            }),
            _ => return Err(CommandError::Usage("mv I J")),
        },
        "done" => ShellCommand::Edit(Edit::Complete {
            index: single_index(&args, "done I")?,
        }),
        "undone" => ShellCommand::Edit(Edit::Reopen {
            index: single_index(&args, "undone I")?,
        }),
        "toggle" => ShellCommand::Edit(Edit::Toggle {
            index: single_index(&args, "toggle I")?,
        }),
        "due" => match args.as_slice() {
            [index] | [index, "-"] => ShellCommand::Edit(Edit::Due {
                index: parse_index(index)?,
                date: None,
            }),
            [index, date] => ShellCommand::Edit(Edit::Due {
                index: parse_index(index)?,
                date: Some(parse_date(date).map_err(CommandError::BadDate)?),
            }),
            _ => return Err(CommandError::Usage("due I [DATE|-]")),
        },
        "prio" | "priority" => match args.as_slice() {
            [index] | [index, "-"] => ShellCommand::Edit(Edit::Priority {
                index: parse_index(index)?,
                priority: None,
            }),
            [index, priority] => ShellCommand::Edit(Edit::Priority {
                index: parse_index(index)?,
                priority: Some(
                    priority
                        .parse()
                        .map_err(|_| CommandError::BadNumber(priority.to_string()))?,
                ),
            }),
            _ => return Err(CommandError::Usage("prio I [N|-]")),
        },
        "sort" => match args.as_slice() {
            ["priority" | "prio"] => ShellCommand::Edit(Edit::Sort(SortKey::Priority)),
            ["due"] => ShellCommand::Edit(Edit::Sort(SortKey::Due)),
            _ => return Err(CommandError::Usage("sort priority|due")),
        },
        "undo" => ShellCommand::Edit(Edit::Undo),
        "redo" => ShellCommand::Edit(Edit::Redo),
        "cd" => ShellCommand::Cd(single_index(&args, "cd I")?),
        "up" | ".." => ShellCommand::Up,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(command)
}

fn parse_index(s: &str) -> Result<usize, CommandError> {
    s.parse().map_err(|_| CommandError::BadNumber(s.to_string()))
}

fn single_index(args: &[&str], usage: &'static str) -> Result<usize, CommandError> {
    match args {
        [index] => parse_index(index),
        _ => Err(CommandError::Usage(usage)),
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

struct LevelExit {
    quit: bool,
    changed: bool,
}

/// Line-oriented editor over a task tree. Each level entered with `cd`
/// gets its own controller, so `undo` only reverts edits made at the
/// current level.
pub struct Shell<R, W> {
    input: R,
    out: W,
    today: NaiveDate,
}

impl<R: BufRead, W: Write> Shell<R, W> {
    pub fn new(input: R, out: W, today: NaiveDate) -> Self {
        Shell { input, out, today }
    }

    /// Run until `quit` or end of input. Returns whether the tree changed.
    pub fn run(&mut self, ctl: &mut EditController<Task>) -> io::Result<bool> {
        let mut path = Vec::new();
        let exit = self.run_level(ctl, &mut path)?;
        Ok(exit.changed)
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn run_level<T: BorrowMut<Task>>(
        &mut self,
        ctl: &mut EditController<T>,
        path: &mut Vec<usize>,
    ) -> io::Result<LevelExit> {
        let mut changed = false;
        loop {
            if path.is_empty() {
                write!(self.out, "{}> ", ctl.task_name())?;
            } else {
                write!(self.out, "{} [{}]> ", ctl.task_name(), format_path(path))?;
            }
            self.out.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.out)?;
                return Ok(LevelExit { quit: true, changed });
            }
            let command = match parse_line(&line) {
                Ok(command) => command,
                Err(e) => {
                    writeln!(self.out, "error: {}", e)?;
                    continue;
                }
            };

            match command {
                ShellCommand::Empty => {}
                ShellCommand::Help => writeln!(self.out, "{}", HELP)?,
                ShellCommand::Quit => return Ok(LevelExit { quit: true, changed }),
                ShellCommand::Up if path.is_empty() => {
                    writeln!(self.out, "already at the top level")?;
                }
                ShellCommand::Up => return Ok(LevelExit { quit: false, changed }),
                ShellCommand::List(text) => {
                    let filter = TaskFilter::new().text(text.unwrap_or_default());
                    let rows = filter.apply(ctl.sub_tasks());
                    if rows.is_empty() {
                        writeln!(self.out, "(no tasks)")?;
                    }
                    for line in format_listing(rows, self.today) {
                        writeln!(self.out, "{}", line)?;
                    }
                }
                ShellCommand::Show => {
                    for line in format_task_tree(ctl.task(), self.today) {
                        writeln!(self.out, "{}", line)?;
                    }
                }
                ShellCommand::Cd(index) => {
                    let exit = match ctl.subtask_controller(index) {
                        Ok(mut child) => {
                            path.push(index);
                            let exit = self.run_level(&mut child, path);
                            path.pop();
                            exit?
                        }
                        Err(e) => {
                            writeln!(self.out, "error: {}", e)?;
                            continue;
                        }
                    };
                    if exit.changed {
                        changed = true;
                        ctl.notify_change();
                    }
                    if exit.quit {
                        return Ok(LevelExit { quit: true, changed });
                    }
                }
                ShellCommand::Edit(edit) => {
                    // The redo top names the edit about to be redone
                    let redoing = match edit {
                        Edit::Redo => ctl.history().peek_redo().map(HistoryEntry::label),
                        _ => None,
                    };
                    match edit.apply(ctl) {
                        Ok(Outcome::Added(index)) => {
                            changed = true;
                            let mut added = path.clone();
                            added.push(index);
                            writeln!(self.out, "added {}", format_path(&added))?;
                        }
                        Ok(Outcome::Changed) => {
                            changed = true;
                            // After an undo the redo top is the edit just reverted
                            let report = match edit {
                                Edit::Undo => ctl
                                    .history()
                                    .peek_redo()
                                    .map(|e| format!("undid {}", e.label())),
                                Edit::Redo => redoing.map(|label| format!("redid {}", label)),
                                _ => None,
                            };
                            if let Some(report) = report {
                                writeln!(self.out, "{}", report)?;
                            }
                        }
                        Ok(Outcome::Unchanged) => {
                            let message = match edit {
                                Edit::Undo => "nothing to undo",
                                Edit::Redo => "nothing to redo",
                                _ => "already sorted",
                            };
                            writeln!(self.out, "{}", message)?;
                        }
                        Err(e) => writeln!(self.out, "error: {}", e)?,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn run_script(ctl: &mut EditController<Task>, script: &str) -> (bool, String) {
        let mut shell = Shell::new(script.as_bytes(), Vec::new(), today());
        let changed = shell.run(ctl).unwrap();
        (changed, String::from_utf8(shell.into_output()).unwrap())
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_line("  "), Ok(ShellCommand::Empty));
        assert_eq!(
            parse_line("add Buy milk and eggs"),
            Ok(ShellCommand::Edit(Edit::Add {
                name: "Buy milk and eggs".into(),
                due_date: None,
                priority: None,
            }))
        );
        assert_eq!(
            parse_line("edit 2 New  name"),
            Ok(ShellCommand::Edit(Edit::Rename {
                index: 2,
                name: "New  name".into(),
            }))
        );
        assert_eq!(
            parse_line("mv 0 3"),
            Ok(ShellCommand::Edit(Edit::Move { from: 0, to: 3 }))
        );
        assert_eq!(
            parse_line("due 1 -"),
            Ok(ShellCommand::Edit(Edit::Due { index: 1, date: None }))
        );
        assert_eq!(
            parse_line("prio 1 -3"),
            Ok(ShellCommand::Edit(Edit::Priority {
                index: 1,
                priority: Some(-3),
            }))
        );
        assert_eq!(parse_line("sort due"), Ok(ShellCommand::Edit(Edit::Sort(SortKey::Due))));
        assert_eq!(parse_line("ls milk"), Ok(ShellCommand::List(Some("milk".into()))));
        assert_eq!(parse_line("cd 4"), Ok(ShellCommand::Cd(4)));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_line("frobnicate"), Err(CommandError::Unknown("frobnicate".into())));
        assert_eq!(parse_line("add"), Err(CommandError::Usage("add NAME")));
        assert_eq!(parse_line("rm x"), Err(CommandError::BadNumber("x".into())));
        assert_eq!(parse_line("mv 1"), Err(CommandError::Usage("mv I J")));
        assert!(matches!(parse_line("due 0 tomorrow"), Err(CommandError::BadDate(_))));
        assert_eq!(parse_line("sort name"), Err(CommandError::Usage("sort priority|due")));
    }

    #[test]
    fn test_edit_undo_redo_session() {
        let mut ctl = EditController::new(Task::new("Main"));
        let (changed, out) = run_script(
            &mut ctl,
            "add A\nadd B\nadd C\nmv 0 3\nundo\nrm 1\nundo\nredo\nquit\n",
        );
        assert!(changed);
        assert!(out.contains("added 2"));
        assert!(out.contains("undid move"));
        assert!(out.contains("undid delete"));
        assert!(out.contains("redid delete"));
        assert_eq!(ctl.task().describe(), "Main {A, C}");
    }

    #[test]
    fn test_undo_reports_changed_fields_and_sorts() {
        let mut main = Task::new("Main");
        main.add_child(Task::new("B").with_priority(2));
        main.add_child(Task::new("A").with_priority(1));
        let mut ctl = EditController::new(main);
        let (_, out) = run_script(
            &mut ctl,
            "done 0\npriority 1 3\nundo\nundo\nredo\nsort priority\nundo\nquit\n",
        );
        assert!(out.contains("undid set priority"));
        assert!(out.contains("undid set completed"));
        assert!(out.contains("redid set completed"));
        assert!(out.contains("undid sort"));
        assert_eq!(ctl.task().describe(), "Main {B (Completed), A}");
    }

    #[test]
    fn test_nested_levels_keep_separate_history() {
        let mut main = Task::new("Main");
        main.add_child(Task::new("A"));
        let mut ctl = EditController::new(main);
        let (_, out) = run_script(&mut ctl, "cd 0\nadd A1\nadd A2\nundo\nup\nundo\nshow\n");
        assert!(out.contains("added 0.0"));
        assert!(out.contains("A [0]> "));
        // the root's history is empty: the nested edits belong to level 0
        assert!(out.contains("nothing to undo"));
        assert_eq!(ctl.task().describe(), "Main {A {A1}}");
    }

    #[test]
    fn test_nested_change_reaches_root_hook() {
        let mut main = Task::new("Main");
        main.add_child(Task::new("A"));
        let saved = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&saved);
        let mut ctl = EditController::new(main).with_on_change(move |t: &Task| {
            log.lock().unwrap().push(t.describe());
            Ok(())
        });
        run_script(&mut ctl, "cd 0\nadd A1\nup\nquit\n");
        assert_eq!(*saved.lock().unwrap(), vec!["Main {A {A1}}".to_string()]);
    }

    #[test]
    fn test_errors_are_reported_and_session_continues() {
        let mut ctl = EditController::new(Task::new("Main"));
        let (changed, out) = run_script(&mut ctl, "rm 0\ncd 3\nbogus\nup\nsort due\nadd X\n");
        assert!(out.contains("error: invalid task index: 0"));
        assert!(out.contains("error: invalid task index: 3"));
        assert!(out.contains("error: unknown command 'bogus'"));
        assert!(out.contains("already at the top level"));
        assert!(out.contains("already sorted"));
        assert!(changed);
        assert_eq!(ctl.task().describe(), "Main {X}");
    }

    #[test]
    fn test_ls_filters_by_text() {
        let mut main = Task::new("Main");
        main.add_child(Task::new("Buy milk"));
        main.add_child(Task::new("Call mom"));
        let mut ctl = EditController::new(main);
        let (changed, out) = run_script(&mut ctl, "ls MILK\nls nothing-matches\n");
        assert!(!changed);
        assert!(out.contains("  0  [ ] Buy milk"));
        assert!(!out.contains("Call mom"));
        assert!(out.contains("(no tasks)"));
    }
}
