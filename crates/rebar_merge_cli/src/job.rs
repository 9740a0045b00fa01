//! Single batch job: read sheet, merge legs, write workbook.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rebar_io_xlsx::{
    SpecXlsxReadOptions, SpecXlsxReport, SpecXlsxSheetWriteOptions, XlsxIoError, XlsxWriter,
    read_sheet,
};
use rebar_merge::{MergeError, ReportMerge, merge_dataframe};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, SpecJobConfig};

/// Failure of one job.
#[derive(Debug, Error)]
pub enum JobError {
    /// Invalid job configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Workbook read/write failure.
    #[error(transparent)]
    Xlsx(#[from] XlsxIoError),
    /// Schema or data error during aggregation.
    #[error(transparent)]
    Merge(#[from] MergeError),
    /// Output directory could not be created.
    #[error("Failed to create output directory {}: {source}", .path.display())]
    OutputDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Outcome of one successful job.
#[derive(Debug, Clone)]
pub struct ReportJob {
    /// Source workbook.
    pub path_file_in: PathBuf,
    /// Written workbook.
    pub path_file_out: PathBuf,
    /// Aggregation counters.
    pub report_merge: ReportMerge,
    /// Per-sheet writer reports.
    pub reports_xlsx: Vec<SpecXlsxReport>,
}

impl fmt::Display for ReportJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.report_merge.format("[JOB]"),
            self.path_file_out.display()
        )
    }
}

/// Run one job end to end. Nothing is written when reading or merging fails.
pub fn run_job(cfg_job: &SpecJobConfig) -> Result<ReportJob, JobError> {
    cfg_job.validate()?;
    info!(
        file_in = %cfg_job.file_in.display(),
        file_out = %cfg_job.file_out.display(),
        "job started"
    );

    let df_in = read_sheet(
        &cfg_job.file_in,
        &SpecXlsxReadOptions {
            sheet_name: cfg_job.sheet_in.clone(),
            header_row: cfg_job.header_row,
        },
    )?;
    let (df_out, report_merge) = merge_dataframe(
        &df_in,
        &cfg_job.columns,
        &cfg_job.merge,
        cfg_job.if_fill_down_tower_id,
    )?;
    if report_merge.cnt_rows_dropped > 0 {
        warn!(
            cnt_rows_dropped = report_merge.cnt_rows_dropped,
            "rows with missing core fields were skipped"
        );
    }

    let path_dir_out = cfg_job.file_out.parent().unwrap_or(Path::new(""));
    if !path_dir_out.as_os_str().is_empty() {
        fs::create_dir_all(path_dir_out).map_err(|source| JobError::OutputDir {
            path: path_dir_out.to_path_buf(),
            source,
        })?;
    }

    let mut writer = XlsxWriter::with_defaults(cfg_job.file_out.clone());
    writer.write_sheet(
        &df_out,
        &cfg_job.sheet_out,
        &SpecXlsxSheetWriteOptions::default(),
    )?;
    writer.close()?;

    let report_job = ReportJob {
        path_file_in: cfg_job.file_in.clone(),
        path_file_out: writer.file_out().to_path_buf(),
        report_merge,
        reports_xlsx: writer.report(),
    };
    info!("{report_job}");
    Ok(report_job)
}
