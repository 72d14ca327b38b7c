//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Catalog search CLI
#[derive(Parser, Debug)]
#[command(name = "catalog-search")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Client configuration file (YAML); falls back to CATALOG_* variables
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a search and print every matching entity
    Search {
        /// Query DSL file, or `-` for stdin
        #[arg(short, long)]
        query: String,

        /// Sort keys as `field` or `field:asc|desc`
        #[arg(short, long)]
        sort: Vec<String>,

        /// Entities per request
        #[arg(long)]
        page_size: Option<u64>,

        /// Use timestamp paging from the first page
        #[arg(long)]
        bulk: bool,

        /// Fetch the next page while printing the current one
        #[arg(long)]
        prefetch: bool,

        /// Stop after this many entities
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the approximate number of matches
    Count {
        /// Query DSL file, or `-` for stdin
        #[arg(short, long)]
        query: String,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one entity per line)
    Json,
    /// Human-readable output
    Pretty,
}
