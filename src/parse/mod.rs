pub mod csv;
pub mod ics;

pub use self::csv::{parse_csv, serialize_csv, CsvError};
pub use self::ics::{parse_ics, serialize_ics, IcsError};
