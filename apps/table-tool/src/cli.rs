use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use table_row_core::StoreConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a catalog and print its tables and columns
    Validate {
        /// Catalog JSON file
        #[arg(short, long)]
        catalog: PathBuf,
    },

    /// Build a row, initialize it, apply edits and print it
    NewRow {
        /// Catalog JSON file
        #[arg(short, long)]
        catalog: PathBuf,

        /// Table to create the row in
        #[arg(short, long)]
        table: String,

        /// Column assignment, `column=value`; picklists take a code
        #[arg(short, long = "set", value_name = "COLUMN=VALUE")]
        set: Vec<String>,

        /// Save the row to the store
        #[arg(long, requires = "data_dir")]
        save: bool,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Print the stored rows of a table
    List {
        /// Catalog JSON file
        #[arg(short, long)]
        catalog: PathBuf,

        /// Table to list
        #[arg(short, long)]
        table: String,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Bump and save the version of a stored row
    BumpVersion {
        /// Catalog JSON file
        #[arg(short, long)]
        catalog: PathBuf,

        /// Table holding the row
        #[arg(short, long)]
        table: String,

        /// Storage id of the row
        #[arg(long)]
        id: u64,

        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(Args, Clone)]
pub struct StoreArgs {
    /// Directory holding the table files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Maximum retry attempts for transient I/O errors
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Delay between retry attempts in milliseconds
    #[arg(long, default_value_t = 100)]
    pub retry_delay_ms: u64,
}

impl StoreArgs {
    /// Store configuration, when a data directory was given.
    pub fn config(&self) -> Option<StoreConfig> {
        self.data_dir.as_ref().map(|data_dir| StoreConfig {
            data_dir: data_dir.clone(),
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
        })
    }
}
