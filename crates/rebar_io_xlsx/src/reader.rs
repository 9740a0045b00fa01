//! Worksheet reader: calamine range -> polars `DataFrame`.

use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};
use polars::prelude::{Column, DataFrame, NamedFrom};
use tracing::debug;

use crate::spec::{EnumCellValue, SpecXlsxReadOptions, XlsxIoError};
use crate::util::{derive_header_names, render_number, validate_unique_columns};

/// Read one worksheet of an `xlsx`/`xls`/`xlsb`/`ods` workbook.
///
/// The row at `options.header_row` supplies column names; every row below it
/// becomes a body row. Columns whose non-blank cells are all numeric become
/// `Float64`; any other column becomes `String`, with numbers rendered the way
/// the spreadsheet shows them.
pub fn read_sheet<P: AsRef<Path>>(
    path: P,
    options: &SpecXlsxReadOptions,
) -> Result<DataFrame, XlsxIoError> {
    let path_file_in = path.as_ref();
    let mut workbook = open_workbook_auto(path_file_in).map_err(|err| XlsxIoError::Open {
        path: path_file_in.to_path_buf(),
        message: err.to_string(),
    })?;

    let l_sheet_names = workbook.sheet_names();
    let c_sheet_name = match &options.sheet_name {
        Some(name) => {
            if !l_sheet_names.contains(name) {
                return Err(XlsxIoError::SheetNotFound {
                    name: name.clone(),
                    available: l_sheet_names,
                });
            }
            name.clone()
        }
        None => l_sheet_names
            .first()
            .cloned()
            .ok_or_else(|| XlsxIoError::NoSheets(path_file_in.to_path_buf()))?,
    };

    let range = workbook
        .worksheet_range(&c_sheet_name)
        .map_err(|err| XlsxIoError::Open {
            path: path_file_in.to_path_buf(),
            message: format!("sheet {c_sheet_name:?}: {err}"),
        })?;
    debug!(
        path = %path_file_in.display(),
        sheet = %c_sheet_name,
        height = range.height(),
        width = range.width(),
        "read worksheet range"
    );

    derive_dataframe_from_range(&range, options.header_row)
}

/// Convert a used range into a `DataFrame`, taking names from `header_row`.
pub fn derive_dataframe_from_range(
    range: &Range<Data>,
    header_row: usize,
) -> Result<DataFrame, XlsxIoError> {
    let l_rows: Vec<&[Data]> = range.rows().collect();
    if header_row >= l_rows.len() {
        return Err(XlsxIoError::HeaderRowOutOfRange {
            header_row,
            n_rows: l_rows.len(),
        });
    }

    let l_header_cells: Vec<EnumCellValue> = l_rows[header_row]
        .iter()
        .map(derive_cell_value_from_data)
        .collect();
    let l_colnames = derive_header_names(&l_header_cells);
    validate_unique_columns(&l_colnames)?;

    let l_rows_body = &l_rows[header_row + 1..];
    let mut l_cols = Vec::with_capacity(l_colnames.len());
    for (n_idx_col, c_name) in l_colnames.iter().enumerate() {
        let l_values: Vec<EnumCellValue> = l_rows_body
            .iter()
            .map(|row| {
                row.get(n_idx_col)
                    .map_or(EnumCellValue::None, derive_cell_value_from_data)
            })
            .collect();
        l_cols.push(derive_column(c_name, l_values));
    }

    Ok(DataFrame::new(l_cols)?)
}

fn derive_column(name: &str, l_values: Vec<EnumCellValue>) -> Column {
    let if_is_numeric = l_values
        .iter()
        .all(|value| !matches!(value, EnumCellValue::String(_)));

    if if_is_numeric {
        let l_numbers: Vec<Option<f64>> = l_values
            .into_iter()
            .map(|value| match value {
                EnumCellValue::Number(n) => Some(n),
                _ => None,
            })
            .collect();
        return Column::new(name.into(), l_numbers);
    }

    let l_texts: Vec<Option<String>> = l_values
        .into_iter()
        .map(|value| match value {
            EnumCellValue::None => None,
            EnumCellValue::String(s) => Some(s),
            EnumCellValue::Number(n) => Some(render_number(n)),
        })
        .collect();
    Column::new(name.into(), l_texts)
}

fn derive_cell_value_from_data(value: &Data) -> EnumCellValue {
    match value {
        Data::Empty | Data::Error(_) => EnumCellValue::None,
        Data::Int(val) => EnumCellValue::Number(*val as f64),
        Data::Float(val) => EnumCellValue::Number(*val),
        Data::String(val) => EnumCellValue::String(val.clone()),
        Data::Bool(val) => EnumCellValue::String(if *val { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTimeIso(val) | Data::DurationIso(val) => EnumCellValue::String(val.clone()),
        Data::DateTime(_) => EnumCellValue::String(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use calamine::{Data, Range};

    use super::*;

    fn range_sample() -> Range<Data> {
        let mut range = Range::new((0, 0), (3, 4));
        let l_header = ["塔号", "塔腿", "规格", "长度(mm)", "数量"];
        for (n_idx, c_name) in l_header.iter().enumerate() {
            range.set_value((0, n_idx as u32), Data::String(c_name.to_string()));
        }
        range.set_value((1, 0), Data::Int(1));
        range.set_value((1, 1), Data::String("A".to_string()));
        range.set_value((1, 2), Data::String("C22".to_string()));
        range.set_value((1, 3), Data::Float(6900.0));
        range.set_value((1, 4), Data::Int(28));

        range.set_value((2, 1), Data::String("B".to_string()));
        range.set_value((2, 2), Data::String("C22".to_string()));
        range.set_value((2, 3), Data::Float(6900.0));
        range.set_value((2, 4), Data::Int(28));

        range.set_value((3, 0), Data::String("N2".to_string()));
        range.set_value((3, 1), Data::String("A".to_string()));
        range.set_value((3, 2), Data::String("C25".to_string()));
        range.set_value((3, 3), Data::Float(7400.0));
        range.set_value((3, 4), Data::Int(12));
        range
    }

    #[test]
    fn range_to_dataframe_types_columns() {
        let df = derive_dataframe_from_range(&range_sample(), 0).expect("df");

        assert_eq!(
            df.get_column_names_str(),
            vec!["塔号", "塔腿", "规格", "长度(mm)", "数量"]
        );
        assert_eq!(df.height(), 3);

        let col_tower = df.column("塔号").expect("tower");
        assert!(!col_tower.dtype().is_numeric());
        assert_eq!(
            col_tower.get(0).expect("cell").to_string().trim_matches('"'),
            "1"
        );
        assert!(col_tower.get(1).expect("cell").is_null());

        let col_length = df.column("长度(mm)").expect("length");
        assert!(col_length.dtype().is_float());
    }

    #[test]
    fn header_row_beyond_range_is_error() {
        let err = derive_dataframe_from_range(&range_sample(), 9).expect_err("out of range");
        assert!(matches!(
            err,
            XlsxIoError::HeaderRowOutOfRange {
                header_row: 9,
                n_rows: 4
            }
        ));
    }

    #[test]
    fn duplicate_header_names_are_rejected() {
        let mut range = Range::new((0, 0), (1, 1));
        range.set_value((0, 0), Data::String("塔号".to_string()));
        range.set_value((0, 1), Data::String("塔号".to_string()));
        let err = derive_dataframe_from_range(&range, 0).expect_err("duplicate");
        assert!(matches!(err, XlsxIoError::DuplicateColumns(_)));
    }

    #[test]
    fn read_missing_file_is_open_error() {
        let err = read_sheet("/nonexistent/dir/book.xlsx", &SpecXlsxReadOptions::default())
            .expect_err("missing");
        assert!(matches!(err, XlsxIoError::Open { .. }));
    }
}
