//! rebar-merge: merge per-leg rebar rows into one summary row per tower.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rebar_merge::EnumNumericCoerceMode;
use rebar_merge_cli::config::{SpecJobConfig, load_batch_config, load_job_config};
use rebar_merge_cli::{logging, run_job, run_jobs};

#[derive(Parser)]
#[command(name = "rebar-merge")]
#[command(
    author,
    version,
    about = "Merge tower leg rebar rows into per-tower summaries"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge one workbook
    Run {
        /// Input workbook (xlsx, xls, xlsb, ods)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output workbook (overwritten)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Job config (TOML); flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Input sheet name (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Truncate fractional lengths/counts instead of failing
        #[arg(long)]
        truncate: bool,

        /// Do not fill blank tower ids from the row above
        #[arg(long)]
        no_fill_down: bool,
    },

    /// Run every job of a batch config
    Batch {
        /// Batch config (TOML) with [[jobs]] tables
        #[arg(short, long)]
        config: PathBuf,

        /// Override num_workers_max
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    match cli.command {
        Commands::Run {
            input,
            output,
            config,
            sheet,
            truncate,
            no_fill_down,
        } => {
            let mut cfg_job = match &config {
                Some(path) => load_job_config(path)
                    .with_context(|| format!("Failed to load '{}'", path.display()))?,
                None => SpecJobConfig::default(),
            };
            if let Some(path) = input {
                cfg_job.file_in = path;
            }
            if let Some(path) = output {
                cfg_job.file_out = path;
            }
            if sheet.is_some() {
                cfg_job.sheet_in = sheet;
            }
            if truncate {
                cfg_job.merge.numeric_coerce = EnumNumericCoerceMode::Truncate;
            }
            if no_fill_down {
                cfg_job.if_fill_down_tower_id = false;
            }
            run_single(&cfg_job)
        }
        Commands::Batch { config, workers } => {
            let mut cfg_batch = load_batch_config(&config)
                .with_context(|| format!("Failed to load '{}'", config.display()))?;
            if workers.is_some() {
                cfg_batch.num_workers_max = workers;
            }
            let report = run_jobs(&cfg_batch);
            for outcome in &report.outcomes {
                match &outcome.result {
                    Ok(report_job) => println!("{report_job}"),
                    Err(err) => eprintln!("{}: {err}", outcome.path_file_in.display()),
                }
            }
            println!("{report}");
            if !report.is_ok() {
                bail!("{} of {} job(s) failed", report.cnt_failed(), report.outcomes.len());
            }
            Ok(())
        }
    }
}

fn run_single(cfg_job: &SpecJobConfig) -> Result<()> {
    let report_job = run_job(cfg_job)
        .with_context(|| format!("Failed to merge '{}'", cfg_job.file_in.display()))?;
    for c_warning in &report_job.report_merge.warnings {
        eprintln!("Warning: {c_warning}");
    }
    println!("{report_job}");
    Ok(())
}
