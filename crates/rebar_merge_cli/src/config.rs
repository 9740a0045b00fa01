//! Job configuration: explicit structs, loadable from TOML.

use std::fs;
use std::path::{Path, PathBuf};

use rebar_merge::{SpecMergeColumns, SpecMergeOptions};
use serde::Deserialize;
use thiserror::Error;

/// Sheet name used for output when none is configured.
pub const C_SHEET_OUT_DEFAULT: &str = "Sheet1";

/// One read -> merge -> write job.
///
/// ```toml
/// file_in = "工作簿1.xlsx"
/// file_out = "整理后_钢筋数据.xlsx"
///
/// [columns]
/// length = "长度"
///
/// [merge]
/// numeric_coerce = "truncate"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecJobConfig {
    /// Source workbook.
    pub file_in: PathBuf,
    /// Destination workbook (overwritten).
    pub file_out: PathBuf,
    /// Source sheet; first sheet when unset.
    pub sheet_in: Option<String>,
    /// Destination sheet name.
    pub sheet_out: String,
    /// Zero-based header row within the source sheet's used range.
    pub header_row: usize,
    /// Fill blank tower ids from the row above (merged cells).
    pub if_fill_down_tower_id: bool,
    /// Input/output column names.
    pub columns: SpecMergeColumns,
    /// Aggregation options.
    pub merge: SpecMergeOptions,
}

impl Default for SpecJobConfig {
    fn default() -> Self {
        Self {
            file_in: PathBuf::new(),
            file_out: PathBuf::new(),
            sheet_in: None,
            sheet_out: C_SHEET_OUT_DEFAULT.to_string(),
            header_row: 0,
            if_fill_down_tower_id: true,
            columns: SpecMergeColumns::default(),
            merge: SpecMergeOptions::default(),
        }
    }
}

impl SpecJobConfig {
    /// Check that paths are set and distinct.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file_in.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("`file_in` is required.".to_string()));
        }
        if self.file_out.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("`file_out` is required.".to_string()));
        }
        if self.file_in == self.file_out {
            return Err(ConfigError::Invalid(format!(
                "`file_in` and `file_out` must differ: {}",
                self.file_in.display()
            )));
        }
        Ok(())
    }
}

/// Several independent jobs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct SpecBatchConfig {
    /// Worker threads; `None` picks `min(cpus, 8)`, `1` runs serially.
    pub num_workers_max: Option<usize>,
    /// Jobs in submission order.
    pub jobs: Vec<SpecJobConfig>,
}

/// Configuration load failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file unreadable.
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Config file is not valid TOML for the expected shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// Semantically invalid values.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Parse a single-job config from TOML text.
pub fn parse_job_config(text: &str) -> Result<SpecJobConfig, ConfigError> {
    Ok(toml::from_str(text)?)
}

impl SpecBatchConfig {
    /// Check worker count, every job, and that no two jobs touch the same file
    /// for writing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers_max == Some(0) {
            return Err(ConfigError::Invalid(
                "`num_workers_max` must be >= 1 or unset.".to_string(),
            ));
        }
        for (n_idx, cfg_job) in self.jobs.iter().enumerate() {
            cfg_job
                .validate()
                .map_err(|err| ConfigError::Invalid(format!("jobs[{n_idx}]: {err}")))?;
        }
        validate_job_paths_disjoint(&self.jobs)
    }
}

/// Jobs may run concurrently, so an output path must not be another job's
/// output or input.
fn validate_job_paths_disjoint(jobs: &[SpecJobConfig]) -> Result<(), ConfigError> {
    for (n_idx_i, cfg_i) in jobs.iter().enumerate() {
        for (n_idx_j, cfg_j) in jobs.iter().enumerate().skip(n_idx_i + 1) {
            let c_conflict = if cfg_i.file_out == cfg_j.file_out {
                format!("both write {}", cfg_i.file_out.display())
            } else if cfg_i.file_out == cfg_j.file_in {
                format!(
                    "jobs[{n_idx_i}] writes the input of jobs[{n_idx_j}]: {}",
                    cfg_i.file_out.display()
                )
            } else if cfg_i.file_in == cfg_j.file_out {
                format!(
                    "jobs[{n_idx_j}] writes the input of jobs[{n_idx_i}]: {}",
                    cfg_j.file_out.display()
                )
            } else {
                continue;
            };
            return Err(ConfigError::Invalid(format!(
                "jobs[{n_idx_i}] and jobs[{n_idx_j}] conflict: {c_conflict}"
            )));
        }
    }
    Ok(())
}

/// Parse a batch config from TOML text; the whole batch is validated.
pub fn parse_batch_config(text: &str) -> Result<SpecBatchConfig, ConfigError> {
    let cfg_batch: SpecBatchConfig = toml::from_str(text)?;
    cfg_batch.validate()?;
    Ok(cfg_batch)
}

/// Load a single-job config file.
pub fn load_job_config(path: &Path) -> Result<SpecJobConfig, ConfigError> {
    parse_job_config(&read_text(path)?)
}

/// Load a batch config file.
pub fn load_batch_config(path: &Path) -> Result<SpecBatchConfig, ConfigError> {
    parse_batch_config(&read_text(path)?)
}

fn read_text(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
