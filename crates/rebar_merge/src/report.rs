//! Merge report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

/// Aggregate counters and diagnostics for one `aggregate` run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportMerge {
    /// Rows handed to the aggregator.
    pub cnt_rows_input: u64,
    /// Rows dropped for a missing core field.
    pub cnt_rows_dropped: u64,
    /// Rows that ended up in a tower's slot map.
    pub cnt_rows_merged: u64,
    /// Rows overwritten by a later row for the same tower and leg.
    pub cnt_legs_duplicate: u64,
    /// Distinct towers emitted.
    pub cnt_towers: u64,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl ReportMerge {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_rows_input".to_string(), self.cnt_rows_input);
        dict_counts.insert("cnt_rows_dropped".to_string(), self.cnt_rows_dropped);
        dict_counts.insert("cnt_rows_merged".to_string(), self.cnt_rows_merged);
        dict_counts.insert("cnt_legs_duplicate".to_string(), self.cnt_legs_duplicate);
        dict_counts.insert("cnt_towers".to_string(), self.cnt_towers);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} rows={} dropped={} merged={} duplicates={} towers={} warnings={}",
            self.cnt_rows_input,
            self.cnt_rows_dropped,
            self.cnt_rows_merged,
            self.cnt_legs_duplicate,
            self.cnt_towers,
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportMerge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[MERGE]"))
    }
}

/// Mutable accumulator for merge statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportMergeBuilder {
    cnt_rows_input: u64,
    cnt_rows_dropped: u64,
    cnt_rows_merged: u64,
    cnt_legs_duplicate: u64,
    cnt_towers: u64,
    warnings: Vec<String>,
}

impl ReportMergeBuilder {
    pub fn add_input(&mut self) {
        self.cnt_rows_input += 1;
    }

    pub fn add_dropped(&mut self) {
        self.cnt_rows_dropped += 1;
    }

    /// Record `n` rows kept in a finished tower.
    pub fn add_merged(&mut self, n: u64) {
        self.cnt_rows_merged += n;
    }

    pub fn add_duplicate(&mut self) {
        self.cnt_legs_duplicate += 1;
    }

    pub fn add_tower(&mut self) {
        self.cnt_towers += 1;
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportMerge {
        ReportMerge {
            cnt_rows_input: self.cnt_rows_input,
            cnt_rows_dropped: self.cnt_rows_dropped,
            cnt_rows_merged: self.cnt_rows_merged,
            cnt_legs_duplicate: self.cnt_legs_duplicate,
            cnt_towers: self.cnt_towers,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ReportMerge, ReportMergeBuilder};

    #[test]
    fn report_merge_format_lists_all_counters() {
        let mut builder = ReportMergeBuilder::default();
        for _ in 0..5 {
            builder.add_input();
        }
        builder.add_dropped();
        builder.add_merged(3);
        builder.add_duplicate();
        builder.add_tower();
        builder.add_tower();
        builder.add_warning("w".to_string());
        let report = builder.build();

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_rows_input"], 5);
        assert_eq!(dict_counts["cnt_rows_dropped"], 1);
        assert_eq!(dict_counts["cnt_rows_merged"], 3);
        assert_eq!(dict_counts["cnt_legs_duplicate"], 1);
        assert_eq!(dict_counts["cnt_towers"], 2);
        assert_eq!(dict_counts["cnt_warnings"], 1);

        assert_eq!(
            report.to_string(),
            "[MERGE] rows=5 dropped=1 merged=3 duplicates=1 towers=2 warnings=1"
        );
    }

    #[test]
    fn report_merge_default_is_empty() {
        assert_eq!(
            ReportMerge::default().format("[X]"),
            "[X] rows=0 dropped=0 merged=0 duplicates=0 towers=0 warnings=0"
        );
    }
}
