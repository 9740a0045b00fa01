//! `rebar_io_xlsx` v1:
//! Worksheet <-> polars `DataFrame` I/O.
//!
//! Module layout:
//! - `conf`   : constants and default presets
//! - `spec`   : specs/models/options/errors
//! - `util`   : pure helper functions
//! - `reader` : calamine-backed worksheet reader
//! - `writer` : rust_xlsxwriter-backed workbook writer
pub mod conf;
pub mod reader;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
    derive_default_xlsx_formats, derive_default_xlsx_write_options,
};
pub use reader::{derive_dataframe_from_range, read_sheet};
pub use spec::{
    EnumAutofitColumnsRule, EnumCellValue, SpecAutofitCellsPolicy, SpecCellFormat,
    SpecXlsxReadOptions, SpecXlsxReport, SpecXlsxSheetWriteOptions, SpecXlsxWriteOptions,
    XlsxIoError,
};
pub use util::{
    derive_cell_value_from_any_value, render_number, sanitize_sheet_name, validate_unique_columns,
};
pub use writer::XlsxWriter;
