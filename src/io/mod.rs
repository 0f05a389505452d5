pub mod config_io;
pub mod store;

pub use config_io::{load_config, ConfigError};
pub use store::{autosave_hook, load_tree, save_tree, try_load_tree, Format, StoreError};
