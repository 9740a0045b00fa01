//! Batch runner: independent jobs, optionally on a rayon pool.

use std::fmt;
use std::path::PathBuf;

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::{SpecBatchConfig, SpecJobConfig};
use crate::job::{JobError, ReportJob, run_job};

/// Result of one job within a batch.
#[derive(Debug)]
pub struct SpecJobOutcome {
    pub path_file_in: PathBuf,
    pub result: Result<ReportJob, JobError>,
}

/// Per-job outcomes in submission order.
#[derive(Debug, Default)]
pub struct ReportBatch {
    pub outcomes: Vec<SpecJobOutcome>,
    pub n_workers: usize,
    pub warnings: Vec<String>,
}

impl ReportBatch {
    pub fn cnt_ok(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn cnt_failed(&self) -> usize {
        self.outcomes.len() - self.cnt_ok()
    }

    pub fn is_ok(&self) -> bool {
        self.cnt_failed() == 0
    }

    /// Failed jobs as `(input path, error)` pairs.
    pub fn failures(&self) -> Vec<(&PathBuf, &JobError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|err| (&o.path_file_in, err)))
            .collect()
    }

    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} jobs={} ok={} failed={} workers={} warnings={}",
            self.outcomes.len(),
            self.cnt_ok(),
            self.cnt_failed(),
            self.n_workers,
            self.warnings.len()
        )
    }
}

impl fmt::Display for ReportBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[BATCH]"))
    }
}

/// Worker count: explicit value clamped to `[1, cpus]`, else `min(cpus, 8)`.
pub fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, 8),
    }
}

fn run_one(cfg_job: &SpecJobConfig) -> SpecJobOutcome {
    let result = run_job(cfg_job);
    if let Err(err) = &result {
        warn!(file_in = %cfg_job.file_in.display(), error = %err, "job failed");
    }
    SpecJobOutcome {
        path_file_in: cfg_job.file_in.clone(),
        result,
    }
}

/// Run every job; one failure never stops the others.
pub fn run_jobs(cfg_batch: &SpecBatchConfig) -> ReportBatch {
    let n_workers = calculate_worker_limit(cfg_batch.num_workers_max);
    let mut report = ReportBatch {
        n_workers,
        ..ReportBatch::default()
    };
    info!(
        cnt_jobs = cfg_batch.jobs.len(),
        n_workers, "batch started"
    );

    if n_workers <= 1 || cfg_batch.jobs.len() <= 1 {
        report.n_workers = 1;
        report.outcomes = cfg_batch.jobs.iter().map(run_one).collect();
        info!("{report}");
        return report;
    }

    let Ok(thread_pool) = ThreadPoolBuilder::new().num_threads(n_workers).build() else {
        report.warnings.push(format!(
            "Failed to initialize thread pool (workers={n_workers}); fallback to serial run."
        ));
        warn!(n_workers, "thread pool unavailable; running jobs serially");
        report.n_workers = 1;
        report.outcomes = cfg_batch.jobs.iter().map(run_one).collect();
        info!("{report}");
        return report;
    };

    // `collect` on an indexed parallel iterator keeps submission order.
    report.outcomes = thread_pool.install(|| cfg_batch.jobs.par_iter().map(run_one).collect());
    info!("{report}");
    report
}

#[cfg(test)]
mod tests {
    use crate::job::tests::write_input_workbook;

    use super::*;

    #[test]
    fn worker_limit_clamps_explicit_values() {
        assert_eq!(calculate_worker_limit(Some(1)), 1);
        assert!(calculate_worker_limit(Some(10_000)) >= 1);
        let n_default = calculate_worker_limit(None);
        assert!((1..=8).contains(&n_default));
    }

    #[test]
    fn failing_job_does_not_stop_others() {
        let dir_tmp = tempfile::tempdir().expect("tempdir");
        let path_in_ok = dir_tmp.path().join("ok.xlsx");
        write_input_workbook(&path_in_ok);

        let cfg_batch = SpecBatchConfig {
            num_workers_max: Some(2),
            jobs: vec![
                SpecJobConfig {
                    file_in: dir_tmp.path().join("missing.xlsx"),
                    file_out: dir_tmp.path().join("missing_out.xlsx"),
                    ..SpecJobConfig::default()
                },
                SpecJobConfig {
                    file_in: path_in_ok.clone(),
                    file_out: dir_tmp.path().join("ok_out.xlsx"),
                    ..SpecJobConfig::default()
                },
            ],
        };
        let report = run_jobs(&cfg_batch);

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.cnt_ok(), 1);
        assert_eq!(report.cnt_failed(), 1);
        assert!(!report.is_ok());
        assert!(matches!(
            report.outcomes[0].result,
            Err(JobError::Xlsx(rebar_io_xlsx::XlsxIoError::Open { .. }))
        ));
        assert_eq!(report.outcomes[1].path_file_in, path_in_ok);
        assert!(dir_tmp.path().join("ok_out.xlsx").exists());
        assert_eq!(report.failures().len(), 1);
        assert!(report.to_string().starts_with("[BATCH] jobs=2 ok=1 failed=1"));
    }

    #[test]
    fn serial_run_keeps_submission_order() {
        let dir_tmp = tempfile::tempdir().expect("tempdir");
        let l_jobs: Vec<SpecJobConfig> = ["b", "a", "c"]
            .iter()
            .map(|c_name| {
                let path_in = dir_tmp.path().join(format!("{c_name}.xlsx"));
                write_input_workbook(&path_in);
                SpecJobConfig {
                    file_in: path_in,
                    file_out: dir_tmp.path().join(format!("{c_name}_out.xlsx")),
                    ..SpecJobConfig::default()
                }
            })
            .collect();
        let cfg_batch = SpecBatchConfig {
            num_workers_max: Some(1),
            jobs: l_jobs.clone(),
        };
        let report = run_jobs(&cfg_batch);

        assert_eq!(report.n_workers, 1);
        assert!(report.is_ok());
        let l_paths: Vec<&PathBuf> = report.outcomes.iter().map(|o| &o.path_file_in).collect();
        let l_expected: Vec<&PathBuf> = l_jobs.iter().map(|j| &j.file_in).collect();
        assert_eq!(l_paths, l_expected);
    }

    #[test]
    fn empty_batch_is_ok() {
        let report = run_jobs(&SpecBatchConfig::default());
        assert!(report.outcomes.is_empty());
        assert!(report.is_ok());
    }
}
