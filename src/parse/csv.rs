use chrono::NaiveDate;

use crate::model::task::Task;

/// Column order of the CSV format. One row per task, pre-order, with the
/// root at depth 0.
pub const CSV_HEADER: [&str; 5] = ["Name", "Due Date", "Priority", "Completed", "Depth"];

/// Error type for CSV parsing. Line numbers are 1-based and point at the
/// first line of the offending record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CsvError {
    #[error("no task rows found")]
    Empty,
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("failed to write CSV: {0}")]
    Write(String),
    #[error("line {line}: expected {expected} fields, found {found}", expected = CSV_HEADER.len())]
    FieldCount { line: usize, found: usize },
    #[error("line {line}: invalid {field} {value:?}")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("line {line}: depth {depth} has no parent row")]
    DepthJump { line: usize, depth: usize },
    #[error("line {line}: a second root task (depth 0) was found")]
    MultipleRoots { line: usize },
}

impl From<::csv::Error> for CsvError {
    fn from(e: ::csv::Error) -> Self {
        let line = e.position().map_or(0, |p| p.line() as usize);
        CsvError::Malformed {
            line,
            message: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serialize
// ---------------------------------------------------------------------------

/// Serialize a tree to CSV with a header row and CRLF line endings.
pub fn serialize_csv(root: &Task) -> Result<String, CsvError> {
    let mut wtr = ::csv::WriterBuilder::new()
        .terminator(::csv::Terminator::CRLF)
        .from_writer(Vec::new());
    wtr.write_record(CSV_HEADER)
        .map_err(|e| CsvError::Write(e.to_string()))?;
    serialize_row(root, 0, &mut wtr)?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| CsvError::Write(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CsvError::Write(e.to_string()))
}

fn serialize_row(
    task: &Task,
    depth: usize,
    wtr: &mut ::csv::Writer<Vec<u8>>,
) -> Result<(), CsvError> {
    let due = task
        .due_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let priority = task.priority.map(|p| p.to_string()).unwrap_or_default();
    let completed = if task.completed { "1" } else { "0" };
    wtr.write_record([
        task.name.as_str(),
        due.as_str(),
        priority.as_str(),
        completed,
        depth.to_string().as_str(),
    ])
    .map_err(|e| CsvError::Write(e.to_string()))?;
    for child in &task.sub_tasks {
        serialize_row(child, depth + 1, wtr)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

/// Parse CSV produced by [`serialize_csv`] back into a tree.
///
/// The header row is optional and may follow a UTF-8 byte-order mark. Depth
/// must start at 0 and may grow by at most one per row.
pub fn parse_csv(text: &str) -> Result<Task, CsvError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rdr = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    // stack[d] is the open task at depth d
    let mut stack: Vec<Task> = Vec::new();
    let mut first = true;
    for result in rdr.records() {
        let record = result?;
        if std::mem::take(&mut first) && is_header(&record) {
            continue;
        }
        let line = record.position().map_or(0, |p| p.line() as usize);
        if record.len() != CSV_HEADER.len() {
            return Err(CsvError::FieldCount {
                line,
                found: record.len(),
            });
        }
        let depth: usize = record[4].trim().parse().map_err(|_| CsvError::InvalidField {
            line,
            field: "depth",
            value: record[4].to_string(),
        })?;
        let task = parse_row(line, &record)?;

        if depth == 0 && !stack.is_empty() {
            return Err(CsvError::MultipleRoots { line });
        }
        if depth > stack.len() {
            return Err(CsvError::DepthJump { line, depth });
        }
        while stack.len() > depth {
            close_top(&mut stack);
        }
        stack.push(task);
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    stack.pop().ok_or(CsvError::Empty)
}

fn close_top(stack: &mut Vec<Task>) {
    if let Some(child) = stack.pop()
        && let Some(parent) = stack.last_mut()
    {
        parent.sub_tasks.push(child);
    }
}

fn is_header(record: &::csv::StringRecord) -> bool {
    record.len() == CSV_HEADER.len()
        && record
            .iter()
            .zip(CSV_HEADER)
            .all(|(f, h)| f.trim().eq_ignore_ascii_case(h))
}

fn parse_row(line: usize, record: &::csv::StringRecord) -> Result<Task, CsvError> {
    let invalid = |field: &'static str, value: &str| CsvError::InvalidField {
        line,
        field,
        value: value.to_string(),
    };

    let name = if record[0].is_empty() {
        "Unnamed"
    } else {
        &record[0]
    };
    let mut task = Task::new(name);

    let due = record[1].trim();
    if !due.is_empty() {
        task.due_date = Some(
            NaiveDate::parse_from_str(due, "%Y-%m-%d").map_err(|_| invalid("due date", due))?,
        );
    }

    let priority = record[2].trim();
    if !priority.is_empty() {
        task.priority = Some(priority.parse().map_err(|_| invalid("priority", priority))?);
    }

    task.completed = match record[3].trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => true,
        "0" | "false" | "no" | "" => false,
        other => return Err(invalid("completed flag", other)),
    };
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_tree() -> Task {
        let mut main = Task::new("Main")
            .with_due_date(date("2025-12-31"))
            .with_priority(1);
        main.add_child(Task::new("Sub1").with_completed(true));
        main.add_child(Task::new("Sub2").with_due_date(date("2026-01-01")));
        main
    }

    #[test]
    fn test_serialize_rows() {
        let text = serialize_csv(&sample_tree()).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines[0], "Name,Due Date,Priority,Completed,Depth");
        assert_eq!(lines[1], "Main,2025-12-31,1,0,0");
        assert_eq!(lines[2], "Sub1,,,1,1");
        assert_eq!(lines[3], "Sub2,2026-01-01,,0,1");
        assert_eq!(lines[4], "");
    }

    #[test]
    fn test_round_trip_nested() {
        let mut main = sample_tree();
        let mut deep = Task::new("SubSub1");
        deep.add_child(Task::new("Deep").with_priority(3));
        main.sub_tasks[0].add_child(deep);
        main.add_child(Task::new("Tail"));

        assert_eq!(parse_csv(&serialize_csv(&main).unwrap()).unwrap(), main);
    }

    #[test]
    fn test_quoting_names() {
        let mut main = Task::new("Main");
        main.add_child(Task::new("Buy milk, eggs"));
        main.add_child(Task::new("Say \"hi\""));
        main.add_child(Task::new("two\nlines"));
        let text = serialize_csv(&main).unwrap();
        assert!(text.contains("\"Buy milk, eggs\""));
        assert!(text.contains("\"Say \"\"hi\"\"\""));
        assert_eq!(parse_csv(&text).unwrap(), main);
    }

    #[test]
    fn test_header_is_optional_and_lf_accepted() {
        let task = parse_csv("Main,,,0,0\nChild,,2,true,1\n").unwrap();
        assert_eq!(task.name, "Main");
        assert_eq!(task.sub_tasks[0].priority, Some(2));
        assert!(task.sub_tasks[0].completed);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let task = parse_csv("Name,Due Date,Priority,Completed,Depth\n\nMain,,,0,0\n\n").unwrap();
        assert_eq!(task, Task::new("Main"));
    }

    #[test]
    fn test_byte_order_mark_before_header() {
        let text = "\u{feff}Name,Due Date,Priority,Completed,Depth\r\nMain,,,0,0\r\nA,,,0,1\r\n";
        let task = parse_csv(text).unwrap();
        assert_eq!(task.describe(), "Main {A}");

        let task = parse_csv("\u{feff}Main,,,0,0\nA,,,0,1\n").unwrap();
        assert_eq!(task.describe(), "Main {A}");
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_csv(""), Err(CsvError::Empty));
        assert_eq!(
            parse_csv("Main,,,0,0\nOrphan,,,0,2\n"),
            Err(CsvError::DepthJump { line: 2, depth: 2 })
        );
        assert_eq!(
            parse_csv("Main,,,0,0\nOther,,,0,0\n"),
            Err(CsvError::MultipleRoots { line: 2 })
        );
        assert_eq!(
            parse_csv("Main,,,0\n"),
            Err(CsvError::FieldCount { line: 1, found: 4 })
        );
        // An unclosed quote swallows the rest of the input into one field
        assert_eq!(
            parse_csv("\"Main,,,0,0\n"),
            Err(CsvError::FieldCount { line: 1, found: 1 })
        );
        assert!(matches!(
            parse_csv("Main,31/12/2025,,0,0\n"),
            Err(CsvError::InvalidField { field: "due date", .. })
        ));
        assert!(matches!(
            parse_csv("Main,,high,0,0\n"),
            Err(CsvError::InvalidField { field: "priority", .. })
        ));
        assert!(matches!(
            parse_csv("Main,,,maybe,0\n"),
            Err(CsvError::InvalidField { field: "completed flag", .. })
        ));
    }

    #[test]
    fn test_child_before_root_is_depth_jump() {
        assert_eq!(
            parse_csv("Child,,,0,1\n"),
            Err(CsvError::DepthJump { line: 1, depth: 1 })
        );
    }
}
