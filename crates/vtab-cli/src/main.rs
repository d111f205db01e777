//! `vtab` command-line entry point.

use clap::{ColorChoice, Parser};
use std::io::{self, IsTerminal};
use tracing::error;
use tracing::level_filters::LevelFilter;
use vtab_cli::commands::{Session, load_config, run_export, run_show, run_tables};
use vtab_cli::logging::{LogConfig, LogFormat, init_logging};

mod cli;
mod summary;

use crate::cli::{Cli, Command, LogFormatArg, LogLevelArg, TableArgs};
use crate::summary::{print_export, print_show, print_tables};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match run(&cli) {
        Ok(()) => 0,
        Err(error) => {
            error!("{error:#}");
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref(), cli.delimiter)?;
    match &cli.command {
        Command::Tables(args) => {
            let session = Session::open(&args.dir, config)?;
            print_tables(&run_tables(&session)?);
            session.shutdown()
        }
        Command::Show(args) => {
            let TableArgs { dir, table, view } = &args.table;
            let session = Session::open(dir, config)?;
            print_show(&run_show(&session, table, view.as_deref(), args.limit)?);
            session.shutdown()
        }
        Command::Export(args) => {
            let TableArgs { dir, table, view } = &args.table;
            let session = Session::open(dir, config)?;
            let result = run_export(
                &session,
                table,
                view.as_deref(),
                args.out.as_deref(),
                args.workers,
            )?;
            print_export(&result);
            session.shutdown()
        }
    }
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
