use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::task::{format_path, Task};

const PRODID: &str = "-//tasktree//tasktree//EN";
/// RFC 5545 content lines are folded at 75 octets
const FOLD_WIDTH: usize = 75;

/// Error type for iCalendar parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IcsError {
    #[error("no VTODO components found")]
    NoTasks,
    #[error("line {line}: VTODO is not closed")]
    UnterminatedTodo { line: usize },
    #[error("line {line}: invalid {field} {value:?}")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("duplicate UID {0}")]
    DuplicateUid(String),
    #[error("RELATED-TO refers to unknown UID {0}")]
    UnknownParent(String),
    #[error("expected exactly one root VTODO, found {0}")]
    RootCount(usize),
    #[error("{0} VTODO(s) are not connected to the root")]
    Detached(usize),
}

// ---------------------------------------------------------------------------
// Serialize
// ---------------------------------------------------------------------------

/// Serialize a tree as a VCALENDAR with one VTODO per task, pre-order.
/// Children point at their parent through RELATED-TO.
pub fn serialize_ics(root: &Task) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{}", PRODID),
    ];
    let mut path = Vec::new();
    serialize_todo(root, &mut path, None, &mut lines);
    lines.push("END:VCALENDAR".to_string());

    let mut out = String::new();
    for line in &lines {
        out.push_str(&fold_line(line));
        out.push_str("\r\n");
    }
    out
}

fn uid_for(path: &[usize]) -> String {
    if path.is_empty() {
        "task-root@tasktree".to_string()
    } else {
        format!("task-{}@tasktree", format_path(path))
    }
}

fn serialize_todo(task: &Task, path: &mut Vec<usize>, parent: Option<&str>, lines: &mut Vec<String>) {
    let uid = uid_for(path);
    lines.push("BEGIN:VTODO".to_string());
    lines.push(format!("UID:{}", uid));
    lines.push(format!("SUMMARY:{}", escape_text(&task.name)));
    if let Some(due) = task.due_date {
        lines.push(format!("DUE:{}T000000Z", due.format("%Y%m%d")));
    }
    if let Some(priority) = task.priority {
        lines.push(format!("PRIORITY:{}", priority));
    }
    let status = if task.completed { "COMPLETED" } else { "NEEDS-ACTION" };
    lines.push(format!("STATUS:{}", status));
    if let Some(parent) = parent {
        lines.push(format!("RELATED-TO:{}", parent));
    }
    lines.push("END:VTODO".to_string());

    for (i, child) in task.sub_tasks.iter().enumerate() {
        path.push(i);
        serialize_todo(child, path, Some(&uid), lines);
        path.pop();
    }
}

/// RFC 5545 TEXT has no escape for a bare carriage return, so `\r` is
/// dropped and a `\r\n` line break comes back as `\n`.
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Fold a content line so no physical line exceeds 75 octets. Continuation
/// lines start with a single space, which counts toward the limit.
fn fold_line(line: &str) -> String {
    if line.len() <= FOLD_WIDTH {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + line.len() / FOLD_WIDTH * 3);
    let mut width = 0;
    for c in line.chars() {
        let n = c.len_utf8();
        if width + n > FOLD_WIDTH {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += n;
    }
    out
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Todo {
    uid: Option<String>,
    parent: Option<String>,
    task: Task,
}

/// Parse a VCALENDAR produced by [`serialize_ics`] (or another tool that
/// links VTODOs through RELATED-TO) into a tree.
///
/// Exactly one VTODO may lack RELATED-TO; it becomes the root.
pub fn parse_ics(text: &str) -> Result<Task, IcsError> {
    let mut todos: Vec<Todo> = Vec::new();
    let mut current: Option<(usize, Todo)> = None;
    // Depth of components nested inside the current VTODO (e.g. VALARM)
    let mut nested = 0usize;

    for (line, content) in unfold(text) {
        let Some((head, value)) = content.split_once(':') else {
            continue;
        };
        let name = head.split(';').next().unwrap_or("").trim().to_ascii_uppercase();

        let Some((_, todo)) = current.as_mut() else {
            if name == "BEGIN" && value.trim().eq_ignore_ascii_case("VTODO") {
                current = Some((
                    line,
                    Todo {
                        uid: None,
                        parent: None,
                        task: Task::new("Unnamed"),
                    },
                ));
            }
            continue;
        };

        match name.as_str() {
            "BEGIN" => nested += 1,
            "END" if nested > 0 => nested -= 1,
            "END" => {
                if let Some((_, todo)) = current.take() {
                    todos.push(todo);
                }
            }
            _ if nested > 0 => {}
            "UID" => todo.uid = Some(value.trim().to_string()),
            "RELATED-TO" => todo.parent = Some(value.trim().to_string()),
            "SUMMARY" => todo.task.name = unescape_text(value),
            "DUE" => todo.task.due_date = Some(parse_due(line, value)?),
            "PRIORITY" => {
                let v = value.trim();
                todo.task.priority = Some(v.parse().map_err(|_| IcsError::InvalidField {
                    line,
                    field: "PRIORITY",
                    value: v.to_string(),
                })?);
            }
            "STATUS" => todo.task.completed = value.trim().eq_ignore_ascii_case("COMPLETED"),
            _ => {}
        }
    }

    if let Some((line, _)) = current {
        return Err(IcsError::UnterminatedTodo { line });
    }
    build_tree(todos)
}

/// Accepts `20251231T000000Z`, `20251231T090000` and date-only `20251231`
fn parse_due(line: usize, value: &str) -> Result<NaiveDate, IcsError> {
    let v = value.trim();
    v.get(..8)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
        .ok_or_else(|| IcsError::InvalidField {
            line,
            field: "DUE",
            value: v.to_string(),
        })
}

/// Join folded lines. Returns `(first_physical_line, logical_line)` pairs.
fn unfold(text: &str) -> Vec<(usize, String)> {
    let mut out: Vec<(usize, String)> = Vec::new();
    for (i, raw) in text.split('\n').enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(cont) = raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t'))
            && let Some((_, last)) = out.last_mut()
        {
            last.push_str(cont);
            continue;
        }
        if !raw.is_empty() {
            out.push((i + 1, raw.to_string()));
        }
    }
    out
}

fn build_tree(todos: Vec<Todo>) -> Result<Task, IcsError> {
    if todos.is_empty() {
        return Err(IcsError::NoTasks);
    }

    let mut by_uid: HashMap<String, usize> = HashMap::new();
    for (i, todo) in todos.iter().enumerate() {
        if let Some(uid) = &todo.uid
            && by_uid.insert(uid.clone(), i).is_some()
        {
            return Err(IcsError::DuplicateUid(uid.clone()));
        }
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); todos.len()];
    let mut roots = Vec::new();
    for (i, todo) in todos.iter().enumerate() {
        match &todo.parent {
            Some(parent) => {
                let &p = by_uid
                    .get(parent)
                    .ok_or_else(|| IcsError::UnknownParent(parent.clone()))?;
                children[p].push(i);
            }
            None => roots.push(i),
        }
    }
    if roots.len() != 1 {
        return Err(IcsError::RootCount(roots.len()));
    }

    let total = todos.len();
    let mut slots: Vec<Option<Task>> = todos.into_iter().map(|t| Some(t.task)).collect();
    let mut placed = 0;
    let root = assemble(roots[0], &mut slots, &children, &mut placed);
    match root {
        Some(root) if placed == total => Ok(root),
        _ => Err(IcsError::Detached(total - placed)),
    }
}

fn assemble(
    i: usize,
    slots: &mut [Option<Task>],
    children: &[Vec<usize>],
    placed: &mut usize,
) -> Option<Task> {
    let mut task = slots[i].take()?;
    *placed += 1;
    for &c in &children[i] {
        if let Some(child) = assemble(c, slots, children, placed) {
            task.sub_tasks.push(child);
        }
    }
    Some(task)
}
