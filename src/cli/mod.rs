//! CLI module
//!
//! Command-line interface for searching a catalog.
//!
//! # Commands
//!
//! - `search` - Print every entity matching a query, one per line
//! - `count` - Print the approximate number of matches

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
