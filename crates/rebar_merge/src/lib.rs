//! `rebar_merge` v1:
//! Tower leg-merge aggregation kernel.
//!
//! Module layout:
//! - `conf`   : constants and default presets
//! - `spec`   : rows/records/options/errors
//! - `merge`  : aggregation over raw rows
//! - `frame`  : polars `DataFrame` adapters
//! - `report` : run-time report model
pub mod conf;
pub mod frame;
pub mod merge;
pub mod report;
pub mod spec;

pub use conf::{C_DELIMITER_MERGE_DEFAULT, TUP_LEGS_SLOT_DEFAULT};
pub use frame::{
    derive_dataframe_from_towers, derive_rows_from_dataframe, derive_slot_labels, merge_dataframe,
};
pub use merge::{SpecMergeOutput, aggregate, normalize_row};
pub use report::{ReportMerge, ReportMergeBuilder};
pub use spec::{
    EnumDuplicateLegRule, EnumFieldValue, EnumNumericCoerceMode, MergeError, SpecLegRow,
    SpecMergeColumns, SpecMergeGroup, SpecMergeOptions, SpecRawRow, SpecTowerRecord,
};
