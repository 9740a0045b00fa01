//! Merge specification models, options, and top-level error types.

use indexmap::IndexMap;
use polars::prelude::PolarsError;
use rebar_io_xlsx::{EnumCellValue, render_number};
use thiserror::Error;

use crate::conf::{
    C_DELIMITER_MERGE_DEFAULT, C_SEP_LEG_DISPLAY, C_SEP_MERGE_PREFIX, TUP_LEGS_SLOT_DEFAULT,
};

////////////////////////////////////////////////////////////////////////////////
// #region FieldValues

/// One raw cell value of a core field, before normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumFieldValue {
    /// Missing/blank cell.
    #[default]
    Missing,
    /// Text cell.
    Text(String),
    /// Numeric cell.
    Number(f64),
}

impl EnumFieldValue {
    /// Whether the value counts as missing (blank text and NaN included).
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(n) => n.is_nan(),
        }
    }

    /// Trimmed display text; numbers with no fractional part drop the `.0`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Missing => None,
            Self::Text(s) => {
                let c_text = s.trim();
                (!c_text.is_empty()).then(|| c_text.to_string())
            }
            Self::Number(n) if n.is_nan() => None,
            Self::Number(n) => Some(render_number(*n)),
        }
    }
}

impl From<&str> for EnumFieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EnumFieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for EnumFieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for EnumFieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for EnumFieldValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<EnumCellValue> for EnumFieldValue {
    fn from(value: EnumCellValue) -> Self {
        match value {
            EnumCellValue::None => Self::Missing,
            EnumCellValue::String(s) => Self::Text(s),
            EnumCellValue::Number(n) => Self::Number(n),
        }
    }
}

impl<T: Into<EnumFieldValue>> From<Option<T>> for EnumFieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Into::into)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RowsAndRecords

/// One input row as read from the source table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRawRow {
    /// Zero-based row index in the source table (diagnostics only).
    pub row_idx: usize,
    /// Tower identifier.
    pub tower_id: EnumFieldValue,
    /// Leg label.
    pub leg_id: EnumFieldValue,
    /// Rebar specification code.
    pub spec: EnumFieldValue,
    /// Length in millimeters.
    pub length: EnumFieldValue,
    /// Piece count.
    pub count: EnumFieldValue,
}

impl SpecRawRow {
    /// Build a row from any values convertible into [`EnumFieldValue`].
    pub fn new(
        row_idx: usize,
        tower_id: impl Into<EnumFieldValue>,
        leg_id: impl Into<EnumFieldValue>,
        spec: impl Into<EnumFieldValue>,
        length: impl Into<EnumFieldValue>,
        count: impl Into<EnumFieldValue>,
    ) -> Self {
        Self {
            row_idx,
            tower_id: tower_id.into(),
            leg_id: leg_id.into(),
            spec: spec.into(),
            length: length.into(),
            count: count.into(),
        }
    }
}

/// Normalized row with integer length/count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecLegRow {
    /// Source row index.
    pub row_idx: usize,
    /// Trimmed tower identifier.
    pub tower_id: String,
    /// Trimmed, uppercased leg label.
    pub leg_id: String,
    /// Trimmed spec code.
    pub spec: String,
    /// Length in millimeters.
    pub length: i64,
    /// Piece count.
    pub count: i64,
}

impl SpecLegRow {
    /// Per-leg display text, e.g. `A：C22*6900*28`.
    pub fn display(&self) -> String {
        format!(
            "{}{C_SEP_LEG_DISPLAY}{}*{}*{}",
            self.leg_id, self.spec, self.length, self.count
        )
    }
}

/// Legs of one tower sharing identical `(spec, length)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMergeGroup {
    /// Member leg labels, sorted lexicographically.
    pub legs: Vec<String>,
    /// Shared spec code.
    pub spec: String,
    /// Shared length.
    pub length: i64,
    /// Summed count over member legs.
    pub count_total: i64,
}

impl SpecMergeGroup {
    /// Concatenated sorted leg labels (`"ACD"`).
    pub fn prefix(&self) -> String {
        self.legs.concat()
    }

    /// Rendered group text, e.g. `AB:C22*6900*56`.
    pub fn render(&self) -> String {
        format!(
            "{}{C_SEP_MERGE_PREFIX}{}*{}*{}",
            self.prefix(),
            self.spec,
            self.length,
            self.count_total
        )
    }
}

/// Aggregated output for one tower.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTowerRecord {
    /// Tower identifier.
    pub tower_id: String,
    /// Leg label -> per-leg display text, in first-appearance order.
    pub legs: IndexMap<String, String>,
    /// Merge groups in first-encountered `(spec, length)` order.
    pub groups: Vec<SpecMergeGroup>,
    /// Merge groups joined by the configured delimiter.
    pub merged: String,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Conversion policy for numeric cells with a fractional part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EnumNumericCoerceMode {
    /// Reject fractional values as a data-quality error.
    #[default]
    Strict,
    /// Truncate toward zero.
    Truncate,
}

/// Policy for a leg label repeated within one tower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EnumDuplicateLegRule {
    /// Later row overwrites the earlier one; a warning is recorded.
    #[default]
    LastWins,
    /// Abort with [`MergeError::DuplicateLeg`].
    Error,
}

/// Column names of the input and output tables.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SpecMergeColumns {
    /// Tower identifier column (input and output).
    pub tower_id: String,
    /// Leg label column.
    pub leg_id: String,
    /// Spec code column.
    pub spec: String,
    /// Length column.
    pub length: String,
    /// Count column.
    pub count: String,
    /// Output slot column prefix; slot name is `<prefix><leg>`.
    pub slot_prefix: String,
    /// Output merged summary column.
    pub merged: String,
}

impl Default for SpecMergeColumns {
    fn default() -> Self {
        Self {
            tower_id: "塔号".to_string(),
            leg_id: "塔腿".to_string(),
            spec: "规格".to_string(),
            length: "长度(mm)".to_string(),
            count: "数量".to_string(),
            slot_prefix: "塔腿".to_string(),
            merged: "合并".to_string(),
        }
    }
}

impl SpecMergeColumns {
    /// Required input column names, in tower/leg/spec/length/count order.
    pub fn required(&self) -> [&str; 5] {
        [
            self.tower_id.as_str(),
            self.leg_id.as_str(),
            self.spec.as_str(),
            self.length.as_str(),
            self.count.as_str(),
        ]
    }

    /// Output slot column name for `leg`.
    pub fn slot(&self, leg: &str) -> String {
        format!("{}{leg}", self.slot_prefix)
    }
}

/// Aggregation options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SpecMergeOptions {
    /// Fractional length/count handling.
    pub numeric_coerce: EnumNumericCoerceMode,
    /// Repeated leg handling.
    pub duplicate_leg: EnumDuplicateLegRule,
    /// Separator between rendered merge groups.
    pub delimiter: String,
    /// Slot labels always emitted as output columns, even when unused.
    pub legs_slot_default: Vec<String>,
}

impl Default for SpecMergeOptions {
    fn default() -> Self {
        Self {
            numeric_coerce: EnumNumericCoerceMode::Strict,
            duplicate_leg: EnumDuplicateLegRule::LastWins,
            delimiter: C_DELIMITER_MERGE_DEFAULT.to_string(),
            legs_slot_default: TUP_LEGS_SLOT_DEFAULT
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Fatal aggregation errors. Data-quality drops are not errors.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Required columns absent from the input schema.
    #[error("Missing required column(s): {}", .missing.join(", "))]
    Schema {
        /// Every missing column name.
        missing: Vec<String>,
    },
    /// Length/count text that does not parse as a number.
    #[error("Non-numeric {field} {value:?} at row {row_idx} (tower {tower_id:?})")]
    NumericCoercion {
        /// Logical field name (`length` or `count`).
        field: &'static str,
        /// Offending cell text.
        value: String,
        /// Source row index.
        row_idx: usize,
        /// Tower of the offending row.
        tower_id: String,
    },
    /// Length/count with a fractional part under strict coercion.
    #[error("Fractional {field} {value} at row {row_idx} (tower {tower_id:?})")]
    FractionalNumber {
        /// Logical field name (`length` or `count`).
        field: &'static str,
        /// Offending value.
        value: f64,
        /// Source row index.
        row_idx: usize,
        /// Tower of the offending row.
        tower_id: String,
    },
    /// Leg repeated within a tower under [`EnumDuplicateLegRule::Error`].
    #[error("Duplicate leg {leg_id:?} for tower {tower_id:?} at rows {row_idx_first} and {row_idx}")]
    DuplicateLeg {
        /// Tower identifier.
        tower_id: String,
        /// Repeated leg label.
        leg_id: String,
        /// Row of the first occurrence.
        row_idx_first: usize,
        /// Row of the repeat.
        row_idx: usize,
    },
    /// Summed count of one merge group exceeds `i64::MAX`.
    #[error("Count total overflows for tower {tower_id:?} group {spec}*{length}")]
    CountOverflow {
        /// Tower identifier.
        tower_id: String,
        /// Spec code of the group.
        spec: String,
        /// Length of the group.
        length: i64,
    },
    /// DataFrame access or construction failure.
    #[error("DataFrame error: {0}")]
    Frame(#[from] PolarsError),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
