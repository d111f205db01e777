//! CLI argument definitions for `vtab`.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "vtab",
    version,
    about = "Browse and export views over folders of CSV tables",
    long_about = "Load every CSV file of a folder as a table, then list, display or \
                  export tables and the views defined over them.\n\n\
                  Views are JSON definitions with select, where, derived variables \
                  and entity mapping."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Runtime configuration file (TOML).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// CSV field delimiter (overrides the configuration file).
    #[arg(long = "delimiter", value_name = "CHAR", global = true)]
    pub delimiter: Option<char>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the tables and views of a CSV folder.
    Tables(TablesArgs),

    /// Print a table or view.
    Show(ShowArgs),

    /// Write a table or view to a CSV file.
    Export(ExportArgs),
}

#[derive(Args)]
pub struct TablesArgs {
    /// Folder of CSV files.
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,
}

#[derive(Args)]
pub struct TableArgs {
    /// Folder of CSV files.
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Table or registered view to read.
    #[arg(value_name = "TABLE")]
    pub table: String,

    /// Build an ad hoc view from a JSON definition over TABLE.
    #[arg(long = "view", value_name = "FILE")]
    pub view: Option<PathBuf>,
}

#[derive(Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub table: TableArgs,

    /// Maximum number of rows to print.
    #[arg(long = "limit", default_value_t = 20)]
    pub limit: usize,
}

#[derive(Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub table: TableArgs,

    /// Output CSV file (default: <TABLE>.csv in the current directory).
    #[arg(long = "out", value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Copy worker threads (overrides the configuration file).
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<NonZeroUsize>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
