//! Daybook persistence library
//!
//! This library stores diary entries, templates and contexts behind one
//! [`Storage`] contract with two interchangeable backends (flat files and
//! SQLite), and keeps a separate day/block journal.

mod atomic;
mod cli;
mod config;
mod day;
mod day_store;
mod entry;
mod errors;
mod file_store;
mod helper;
mod sqlite_store;
mod storage;
mod types;

// Re-export key components
pub use atomic::*;
pub use cli::*;
pub use config::*;
pub use day::*;
pub use day_store::*;
pub use entry::*;
pub use errors::*;
pub use file_store::*;
pub use helper::*;
pub use sqlite_store::*;
pub use storage::*;
pub use types::*;
