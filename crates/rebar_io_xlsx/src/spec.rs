//! Shared XLSX specification models and error types.

use std::path::PathBuf;

use polars::prelude::PolarsError;
use rust_xlsxwriter::XlsxError;
use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification; `None` fields inherit from the base format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
        }
    }
}

/// Normalized cell value during read/write.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Autofit rule for column width inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumAutofitColumnsRule {
    /// Disable autofit.
    None,
    /// Infer width from header cells only.
    Header,
    /// Infer width from body cells only.
    Body,
    /// Infer width from both header and body cells (default).
    #[default]
    All,
}

/// Autofit policy for per-sheet write call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Autofit width inference rule.
    pub rule_columns: EnumAutofitColumnsRule,
    /// Max body rows inspected when body-based inference is active.
    pub height_body_inferred_max: Option<usize>,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            rule_columns: EnumAutofitColumnsRule::All,
            height_body_inferred_max: Some(20_000),
            width_cell_min: 8,
            width_cell_max: 80,
            width_cell_padding: 2,
        }
    }
}

/// Writer-wide options controlling value conversion and formatting defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxWriteOptions {
    /// Replacement text for missing values when `keep_missing_values` is set.
    pub missing_value_str: String,
    /// Write `missing_value_str` instead of a blank cell.
    pub keep_missing_values: bool,
    /// Infer integer columns from dtypes and apply the integer format.
    pub infer_integer_cols: bool,
}

impl Default for SpecXlsxWriteOptions {
    fn default() -> Self {
        Self {
            missing_value_str: "NA".to_string(),
            keep_missing_values: false,
            infer_integer_cols: true,
        }
    }
}

/// Per-sheet call options.
#[derive(Default, Debug, Clone)]
pub struct SpecXlsxSheetWriteOptions {
    /// Number of frozen columns.
    pub col_freeze: usize,
    /// Frozen row index; defaults to the header row when `None`.
    pub row_freeze: Option<usize>,
    /// Column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReadOptions

/// Worksheet reader options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxReadOptions {
    /// Sheet to read; first sheet when `None`.
    pub sheet_name: Option<String>,
    /// Zero-based row (within the used range) holding column names.
    pub header_row: usize,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Per-write call report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxReport {
    /// Actual unique sheet name in workbook.
    pub sheet_name: String,
    /// Body rows written.
    pub n_rows: usize,
    /// Columns written.
    pub n_cols: usize,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Workbook read/write failures.
#[derive(Debug, Error)]
pub enum XlsxIoError {
    /// Workbook could not be opened or parsed.
    #[error("Failed to open workbook {}: {message}", .path.display())]
    Open {
        /// Workbook path.
        path: PathBuf,
        /// Underlying reader error text.
        message: String,
    },
    /// Requested sheet does not exist.
    #[error("Sheet not found: {name:?} (available: {})", .available.join(", "))]
    SheetNotFound {
        /// Requested sheet name.
        name: String,
        /// Sheet names present in the workbook.
        available: Vec<String>,
    },
    /// Workbook has no sheets at all.
    #[error("Workbook contains no sheets: {}", .0.display())]
    NoSheets(PathBuf),
    /// Header row index beyond the sheet's used range.
    #[error("Header row {header_row} is out of range (sheet has {n_rows} rows)")]
    HeaderRowOutOfRange {
        /// Requested header row.
        header_row: usize,
        /// Rows in the used range.
        n_rows: usize,
    },
    /// Column names repeat.
    #[error("{0}")]
    DuplicateColumns(String),
    /// Invalid writer or policy configuration.
    #[error("{0}")]
    InvalidOptions(String),
    /// Write attempted after `close()`.
    #[error("Cannot write after close().")]
    Closed,
    /// Table exceeds worksheet limits.
    #[error("Table too large for one worksheet: {n_rows} rows x {n_cols} columns")]
    TooLarge {
        /// Body rows.
        n_rows: usize,
        /// Columns.
        n_cols: usize,
    },
    /// rust_xlsxwriter failure.
    #[error("xlsx write error: {0}")]
    Write(#[from] XlsxError),
    /// DataFrame access or construction failure.
    #[error("DataFrame error: {0}")]
    Frame(#[from] PolarsError),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
