pub mod controller;
pub mod filter;
pub mod history;

pub use controller::{ChangeHook, EditController, EditError};
pub use filter::TaskFilter;
pub use history::{FieldValue, HistoryEntry, UndoStack};
