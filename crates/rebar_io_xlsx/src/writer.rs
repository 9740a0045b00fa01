//! XLSX writer kernel that converts DataFrames into workbook output.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use tracing::debug;

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::spec::{
    EnumAutofitColumnsRule, EnumCellValue, SpecAutofitCellsPolicy, SpecCellFormat,
    SpecXlsxReport, SpecXlsxSheetWriteOptions, SpecXlsxWriteOptions, XlsxIoError,
};
use crate::util::{
    convert_cell_value, derive_cell_value_from_any_value, derive_unique_sheet_name,
    estimate_unicode_string_width, estimate_width_len, sanitize_sheet_name,
    validate_unique_columns,
};

/// Stateful workbook writer.
pub struct XlsxWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    fmt_text: SpecCellFormat,
    fmt_integer: SpecCellFormat,
    fmt_header: SpecCellFormat,
    write_options: SpecXlsxWriteOptions,
    set_sheet_names_existing: BTreeSet<String>,
    l_reports: Vec<SpecXlsxReport>,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create writer bound to output path and format/options presets.
    ///
    /// The workbook is buffered in memory until [`Self::close`] is called.
    pub fn new(
        path_file_out: PathBuf,
        fmt_text: SpecCellFormat,
        fmt_integer: SpecCellFormat,
        fmt_header: SpecCellFormat,
        write_options: SpecXlsxWriteOptions,
    ) -> Self {
        Self {
            path_file_out,
            workbook: Workbook::new(),
            fmt_text,
            fmt_integer,
            fmt_header,
            write_options,
            set_sheet_names_existing: BTreeSet::new(),
            l_reports: Vec::new(),
            if_closed: false,
        }
    }

    /// Writer with the preset formats from [`crate::conf::derive_default_xlsx_formats`].
    pub fn with_defaults(path_file_out: PathBuf) -> Self {
        let dict_fmt = crate::conf::derive_default_xlsx_formats();
        let fmt_of = |key: &str| dict_fmt.get(key).cloned().unwrap_or_default();
        Self::new(
            path_file_out,
            fmt_of("text"),
            fmt_of("integer"),
            fmt_of("header"),
            crate::conf::derive_default_xlsx_write_options(),
        )
    }

    /// Destination workbook path.
    pub fn file_out(&self) -> &Path {
        &self.path_file_out
    }

    /// Return immutable snapshot of per-sheet write reports.
    pub fn report(&self) -> Vec<SpecXlsxReport> {
        self.l_reports.clone()
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<(), XlsxIoError> {
        if self.if_closed {
            return Ok(());
        }
        if self.set_sheet_names_existing.is_empty() {
            // An xlsx file needs at least one worksheet.
            self.workbook.add_worksheet();
        }
        self.workbook.save(&self.path_file_out)?;
        self.if_closed = true;
        debug!(path = %self.path_file_out.display(), "workbook saved");
        Ok(())
    }

    /// Write one sheet from an in-memory dataframe.
    pub fn write_sheet(
        &mut self,
        df_data: &DataFrame,
        sheet_name: &str,
        options: &SpecXlsxSheetWriteOptions,
    ) -> Result<(), XlsxIoError> {
        if self.if_closed {
            return Err(XlsxIoError::Closed);
        }
        validate_policy_autofit(&options.policy_autofit)?;

        let l_colnames_df: Vec<String> = df_data
            .get_column_names_str()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        validate_unique_columns(&l_colnames_df)?;

        let n_width_df = l_colnames_df.len();
        let n_height_df = df_data.height();
        if n_height_df >= N_NROWS_EXCEL_MAX || n_width_df > N_NCOLS_EXCEL_MAX {
            return Err(XlsxIoError::TooLarge {
                n_rows: n_height_df,
                n_cols: n_width_df,
            });
        }

        let mut report = SpecXlsxReport {
            n_rows: n_height_df,
            n_cols: n_width_df,
            ..Default::default()
        };
        let c_sheet_name_clean = sanitize_sheet_name(sheet_name, "_");
        if c_sheet_name_clean != sheet_name {
            report.warn(format!(
                "Sheet name {sheet_name:?} sanitized to {c_sheet_name_clean:?}."
            ));
        }
        let sheet_name_unique =
            derive_unique_sheet_name(&c_sheet_name_clean, &self.set_sheet_names_existing);
        self.set_sheet_names_existing
            .insert(sheet_name_unique.clone());

        let set_cols_idx_integer: BTreeSet<usize> = if self.write_options.infer_integer_cols {
            df_data
                .get_columns()
                .iter()
                .enumerate()
                .filter(|(_, col)| col.dtype().is_integer())
                .map(|(n_idx, _)| n_idx)
                .collect()
        } else {
            BTreeSet::new()
        };

        let l_fmt_data_by_col: Vec<Format> = (0..n_width_df)
            .map(|n_idx_col| {
                if set_cols_idx_integer.contains(&n_idx_col) {
                    derive_rust_xlsx_format(&self.fmt_integer)
                } else {
                    derive_rust_xlsx_format(&self.fmt_text)
                }
            })
            .collect();
        let fmt_header = derive_rust_xlsx_format(&self.fmt_header);

        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(&sheet_name_unique)?;

        let policy_autofit = &options.policy_autofit;
        let if_autofit_header = matches!(
            policy_autofit.rule_columns,
            EnumAutofitColumnsRule::Header | EnumAutofitColumnsRule::All
        );
        let if_autofit_body = matches!(
            policy_autofit.rule_columns,
            EnumAutofitColumnsRule::Body | EnumAutofitColumnsRule::All
        );
        let mut l_width_by_col = vec![0usize; n_width_df];

        for (n_idx_col, c_name) in l_colnames_df.iter().enumerate() {
            worksheet.write_string_with_format(0, cast_col_num(n_idx_col)?, c_name, &fmt_header)?;
            if if_autofit_header {
                l_width_by_col[n_idx_col] = estimate_unicode_string_width(c_name);
            }
        }

        worksheet.set_freeze_panes(
            cast_row_num(options.row_freeze.unwrap_or(1))?,
            cast_col_num(options.col_freeze)?,
        )?;

        let n_rows_autofit = policy_autofit
            .height_body_inferred_max
            .unwrap_or(n_height_df);
        for (n_idx_col, col) in df_data.get_columns().iter().enumerate() {
            let if_is_integer_col = set_cols_idx_integer.contains(&n_idx_col);
            for n_idx_row in 0..n_height_df {
                let value = convert_cell_value(
                    &derive_cell_value_from_any_value(col.get(n_idx_row)?),
                    self.write_options.keep_missing_values,
                    &self.write_options.missing_value_str,
                );

                if if_autofit_body && n_idx_row < n_rows_autofit {
                    l_width_by_col[n_idx_col] = usize::max(
                        l_width_by_col[n_idx_col],
                        estimate_width_len(&value, if_is_integer_col),
                    );
                }

                write_cell_with_format(
                    worksheet,
                    n_idx_row + 1,
                    n_idx_col,
                    &value,
                    &l_fmt_data_by_col[n_idx_col],
                )?;
            }
        }

        if !matches!(policy_autofit.rule_columns, EnumAutofitColumnsRule::None) {
            let n_min = usize::max(1, policy_autofit.width_cell_min);
            let n_max = usize::min(255, usize::max(n_min, policy_autofit.width_cell_max));
            for (n_idx_col, n_width_recorded) in l_width_by_col.iter().enumerate() {
                let n_width_final = usize::min(
                    n_max,
                    usize::max(n_min, n_width_recorded + policy_autofit.width_cell_padding),
                );
                worksheet.set_column_width(cast_col_num(n_idx_col)?, n_width_final as f64)?;
            }
        }

        debug!(
            sheet = %sheet_name_unique,
            rows = n_height_df,
            cols = n_width_df,
            "sheet written"
        );
        report.sheet_name = sheet_name_unique;
        self.l_reports.push(report);
        Ok(())
    }
}

fn validate_policy_autofit(policy_autofit: &SpecAutofitCellsPolicy) -> Result<(), XlsxIoError> {
    if policy_autofit.width_cell_min == 0 {
        return Err(XlsxIoError::InvalidOptions(
            "policy_autofit.width_cell_min must be >= 1.".to_string(),
        ));
    }
    if policy_autofit.width_cell_max < policy_autofit.width_cell_min {
        return Err(XlsxIoError::InvalidOptions(
            "policy_autofit.width_cell_max must be >= policy_autofit.width_cell_min.".to_string(),
        ));
    }
    Ok(())
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), XlsxIoError> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    match value {
        EnumCellValue::None => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
        EnumCellValue::Number(val) => {
            worksheet.write_number_with_format(n_row, n_col, *val, format)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, XlsxIoError> {
    u32::try_from(value)
        .map_err(|_| XlsxIoError::InvalidOptions(format!("row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> Result<u16, XlsxIoError> {
    u16::try_from(value)
        .map_err(|_| XlsxIoError::InvalidOptions(format!("column index overflow: {value}")))
}

#[cfg(test)]
mod tests {
    use polars::prelude::{Column, DataFrame, NamedFrom};

    use super::*;
    use crate::reader::read_sheet;
    use crate::spec::SpecXlsxReadOptions;

    fn df_output() -> DataFrame {
        DataFrame::new(vec![
            Column::new("塔号".into(), &["N1", "N2"]),
            Column::new("塔腿A".into(), &["A：C22*6900*28", "A：C25*7400*12"]),
            Column::new("塔腿B".into(), &["B：C22*6900*28", ""]),
            Column::new("合并".into(), &["AB:C22*6900*56", "A:C25*7400*12"]),
            Column::new("根数".into(), &[Some(56i64), None]),
        ])
        .expect("df")
    }

    #[test]
    fn write_then_read_back_preserves_cells() {
        let dir_tmp = tempfile::tempdir().expect("tempdir");
        let path_out = dir_tmp.path().join("out.xlsx");

        let mut writer = XlsxWriter::with_defaults(path_out.clone());
        assert_eq!(writer.file_out(), path_out.as_path());
        writer
            .write_sheet(&df_output(), "汇总", &SpecXlsxSheetWriteOptions::default())
            .expect("write");
        writer.close().expect("close");

        let df = read_sheet(
            &path_out,
            &SpecXlsxReadOptions {
                sheet_name: Some("汇总".to_string()),
                header_row: 0,
            },
        )
        .expect("read");

        assert_eq!(
            df.get_column_names_str(),
            vec!["塔号", "塔腿A", "塔腿B", "合并", "根数"]
        );
        assert_eq!(df.height(), 2);
        let col_merged = df.column("合并").expect("merged");
        assert_eq!(
            col_merged.get(0).expect("cell").to_string().trim_matches('"'),
            "AB:C22*6900*56"
        );
        let col_count = df.column("根数").expect("count");
        assert_eq!(
            col_count.get(0).expect("cell").extract::<f64>(),
            Some(56.0)
        );
        assert!(col_count.get(1).expect("cell").is_null());
    }

    #[test]
    fn sheet_names_are_sanitized_and_unique() {
        let dir_tmp = tempfile::tempdir().expect("tempdir");
        let mut writer = XlsxWriter::with_defaults(dir_tmp.path().join("out.xlsx"));
        let options = SpecXlsxSheetWriteOptions::default();

        writer.write_sheet(&df_output(), "a/b", &options).expect("first");
        writer.write_sheet(&df_output(), "a_b", &options).expect("second");

        let l_reports = writer.report();
        assert_eq!(l_reports[0].sheet_name, "a_b");
        assert_eq!(l_reports[0].warnings.len(), 1);
        assert_eq!(l_reports[1].sheet_name, "a_b__2");
        assert_eq!(l_reports[1].n_rows, 2);
        assert_eq!(l_reports[1].n_cols, 5);
    }

    #[test]
    fn write_after_close_is_rejected() {
        let dir_tmp = tempfile::tempdir().expect("tempdir");
        let mut writer = XlsxWriter::with_defaults(dir_tmp.path().join("out.xlsx"));
        writer.close().expect("close");
        writer.close().expect("close is idempotent");

        let err = writer
            .write_sheet(&df_output(), "x", &SpecXlsxSheetWriteOptions::default())
            .expect_err("closed");
        assert!(matches!(err, XlsxIoError::Closed));
    }

    #[test]
    fn invalid_autofit_policy_is_rejected() {
        let dir_tmp = tempfile::tempdir().expect("tempdir");
        let mut writer = XlsxWriter::with_defaults(dir_tmp.path().join("out.xlsx"));
        let options = SpecXlsxSheetWriteOptions {
            policy_autofit: SpecAutofitCellsPolicy {
                width_cell_min: 10,
                width_cell_max: 5,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = writer
            .write_sheet(&df_output(), "x", &options)
            .expect_err("invalid policy");
        assert!(matches!(err, XlsxIoError::InvalidOptions(_)));
    }
}
