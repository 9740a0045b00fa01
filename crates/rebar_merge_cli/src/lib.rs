//! `rebar_merge_cli` v1:
//! Job configuration and runners behind the `rebar-merge` binary.
//!
//! Module layout:
//! - `config`  : TOML-loadable job/batch configuration
//! - `job`     : one read -> merge -> write job
//! - `batch`   : independent jobs on a rayon pool
//! - `logging` : tracing subscriber setup
pub mod batch;
pub mod config;
pub mod job;
pub mod logging;

pub use batch::{ReportBatch, SpecJobOutcome, calculate_worker_limit, run_jobs};
pub use config::{
    ConfigError, SpecBatchConfig, SpecJobConfig, load_batch_config, load_job_config,
    parse_batch_config, parse_job_config,
};
pub use job::{JobError, ReportJob, run_job};
