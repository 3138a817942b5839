//! tmsync - Robot Framework / test-management registry sync
//!
//! Imports suite inventories into the registry and writes learned test ids
//! back into the suite files, strips ids, and reports run results.

mod commands;
mod results;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tmsync_common::{LogConfig, SyncConfig, init_logging};

#[derive(Parser)]
#[command(name = "tmsync")]
#[command(author, version, about = "Sync Robot Framework suites with a test-management registry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.config/tmsync/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Registry base URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload suites to the registry and write learned ids back into them
    Import {
        /// Suite files or directories to scan for *.robot files
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Do not mark registry tests missing from this upload as detached
        #[arg(long)]
        no_detach: bool,

        /// Do not create empty suites
        #[arg(long)]
        no_empty: bool,

        /// Create tests that do not exist in the registry yet
        #[arg(long)]
        create: bool,

        /// Mirror the local directory structure in the registry
        #[arg(long)]
        structure: bool,

        /// Prefix for file names when --structure is off
        #[arg(long)]
        directory: Option<String>,

        /// Labels attached to every uploaded test (comma separated)
        #[arg(long, value_delimiter = ',')]
        labels: Vec<String>,
    },

    /// Remove every test id from suite files (no network access)
    StripIds {
        /// Suite files or directories to scan for *.robot files
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,
    },

    /// Report results from a JSON results file into a run
    Report {
        /// JSON array of {title, suite, file, status, run_time}
        results: PathBuf,

        /// Report into an existing run instead of creating one
        #[arg(long)]
        run_id: Option<String>,

        /// Run title
        #[arg(long)]
        title: Option<String>,

        /// Run group title
        #[arg(long)]
        group_title: Option<String>,

        /// Make the run publicly viewable
        #[arg(long)]
        publish: bool,

        /// Report each result individually instead of in batches
        #[arg(long)]
        no_batch: bool,
    },

    /// Print the effective configuration (API key masked)
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    if cli.log_json {
        log_config = log_config.with_json(true);
    }
    let _logging_guards = init_logging(&log_config)?;

    let mut config = SyncConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(url) = cli.url {
        config.registry.url = url;
    }

    match cli.command {
        Commands::Import {
            paths,
            no_detach,
            no_empty,
            create,
            structure,
            directory,
            labels,
        } => {
            let options = tmsync_common::ImportOptions {
                no_empty,
                no_detach,
                structure,
                create,
                directory,
                labels,
            };
            commands::import(&config, &paths, options)?;
        }
        Commands::StripIds { paths } => {
            commands::strip_ids(&config, &paths)?;
        }
        Commands::Report {
            results,
            run_id,
            title,
            group_title,
            publish,
            no_batch,
        } => {
            let run = &mut config.run;
            run.run_id = run_id.or(run.run_id.take());
            run.title = title.or(run.title.take());
            run.group_title = group_title.or(run.group_title.take());
            run.publish |= publish;
            run.batch_upload_disabled |= no_batch;
            commands::report(&config, &results)?;
        }
        Commands::Config => {
            print!("{}", config.to_redacted_toml()?);
        }
    }

    Ok(())
}
