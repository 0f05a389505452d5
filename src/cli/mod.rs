pub mod commands;
pub mod edit;
pub mod handlers;
pub mod output;
pub mod shell;
