//! Stateless helper utilities used by the XLSX reader and writer.

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::AnyValue;

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, N_WIDTH_NON_ASCII, TUP_EXCEL_ILLEGAL};
use crate::spec::{EnumCellValue, XlsxIoError};

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Resolve missing/non-finite values according to the keep-missing policy.
pub fn convert_cell_value(
    value: &EnumCellValue,
    if_keep_missing_values: bool,
    missing_value_str: &str,
) -> EnumCellValue {
    let if_is_missing = match value {
        EnumCellValue::None => true,
        EnumCellValue::Number(n) => !n.is_finite(),
        EnumCellValue::String(_) => false,
    };
    if !if_is_missing {
        return value.clone();
    }
    if if_keep_missing_values {
        EnumCellValue::String(missing_value_str.to_string())
    } else {
        EnumCellValue::None
    }
}

/// Render a number the way a spreadsheet shows it (`28.0` -> `"28"`).
pub fn render_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Map one polars cell onto the spreadsheet cell model.
///
/// Booleans become `TRUE`/`FALSE` text; numeric dtypes outside the common
/// ones go through `extract`, anything else through its display text.
pub fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => {
            EnumCellValue::String(if val { "TRUE" } else { "FALSE" }.to_string())
        }
        AnyValue::Int32(val) => EnumCellValue::Number(f64::from(val)),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(f64::from(val)),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(f64::from(val)),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        other => match other.extract::<f64>() {
            Some(val) => EnumCellValue::Number(val),
            None => EnumCellValue::String(other.to_string()),
        },
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnNames

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[String]) -> Result<(), XlsxIoError> {
    if columns.len() == columns.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter(|(_, l_pos)| l_pos.len() > 1)
        .map(|(c_name, l_pos)| format!("{c_name:?} x{} at indices {:?}", l_pos.len(), l_pos))
        .collect::<Vec<_>>()
        .join("; ");

    Err(XlsxIoError::DuplicateColumns(format!(
        "Duplicate column names detected: {c_msg}"
    )))
}

/// Turn raw header cells into column names; blank cells become `Unnamed: <idx>`.
pub fn derive_header_names(l_cells: &[EnumCellValue]) -> Vec<String> {
    l_cells
        .iter()
        .enumerate()
        .map(|(n_idx, value)| {
            let c_name = match value {
                EnumCellValue::None => String::new(),
                EnumCellValue::String(s) => s.trim().to_string(),
                EnumCellValue::Number(n) => render_number(*n),
            };
            if c_name.is_empty() {
                format!("Unnamed: {n_idx}")
            } else {
                c_name
            }
        })
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Pick `name` or the first free `name__N` variant, respecting the length cap.
pub fn derive_unique_sheet_name(name: &str, set_existing: &BTreeSet<String>) -> String {
    if !set_existing.contains(name) {
        return name.to_string();
    }

    let base_name: String = name
        .chars()
        .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
        .collect();

    let mut n_idx = 2usize;
    loop {
        let candidate: String = format!("{base_name}__{n_idx}")
            .chars()
            .take(N_LEN_EXCEL_SHEET_NAME_MAX)
            .collect();
        if !set_existing.contains(&candidate) {
            return candidate;
        }
        n_idx += 1;
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Autofit

/// Estimate displayed width units; non-ASCII characters count wider.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * N_WIDTH_NON_ASCII).round() as usize
}

/// Estimate displayed width units for one normalized cell value.
pub fn estimate_width_len(value: &EnumCellValue, if_is_integer_col: bool) -> usize {
    match value {
        EnumCellValue::None => 0,
        EnumCellValue::String(s) => estimate_unicode_string_width(s),
        EnumCellValue::Number(n) if if_is_integer_col => (*n as i64).to_string().len(),
        EnumCellValue::Number(n) => render_number(*n).len(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_value_maps_to_cell_model() {
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::Null),
            EnumCellValue::None
        );
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::String("N1")),
            EnumCellValue::String("N1".to_string())
        );
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::Int64(28)),
            EnumCellValue::Number(28.0)
        );
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::Boolean(true)),
            EnumCellValue::String("TRUE".to_string())
        );
    }

    #[test]
    fn test_render_number_drops_integral_fraction() {
        assert_eq!(render_number(6900.0), "6900");
        assert_eq!(render_number(-3.0), "-3");
        assert_eq!(render_number(1.5), "1.5");
    }

    #[test]
    fn test_sanitize_sheet_name_replaces_illegal_and_caps_length() {
        assert_eq!(sanitize_sheet_name("a/b:c", "_"), "a_b_c");
        assert_eq!(sanitize_sheet_name("   ", "_"), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40), "_").len(), 31);
    }

    #[test]
    fn test_derive_unique_sheet_name_appends_suffix() {
        let mut set_existing = BTreeSet::new();
        assert_eq!(derive_unique_sheet_name("汇总", &set_existing), "汇总");
        set_existing.insert("汇总".to_string());
        assert_eq!(derive_unique_sheet_name("汇总", &set_existing), "汇总__2");
        set_existing.insert("汇总__2".to_string());
        assert_eq!(derive_unique_sheet_name("汇总", &set_existing), "汇总__3");
    }

    #[test]
    fn test_validate_unique_columns_reports_positions() {
        let l_cols = vec!["塔号".to_string(), "塔腿".to_string(), "塔号".to_string()];
        let err = validate_unique_columns(&l_cols).expect_err("duplicate");
        assert_eq!(
            err.to_string(),
            "Duplicate column names detected: \"塔号\" x2 at indices [0, 2]"
        );
        assert!(validate_unique_columns(&l_cols[..2]).is_ok());
    }

    #[test]
    fn test_derive_header_names_fills_blanks() {
        let l_cells = vec![
            EnumCellValue::String(" 塔号 ".to_string()),
            EnumCellValue::None,
            EnumCellValue::Number(2024.0),
        ];
        assert_eq!(
            derive_header_names(&l_cells),
            vec!["塔号".to_string(), "Unnamed: 1".to_string(), "2024".to_string()]
        );
    }

    #[test]
    fn test_estimate_width_weights_cjk() {
        assert_eq!(estimate_unicode_string_width("AB"), 2);
        assert_eq!(estimate_unicode_string_width("合并"), 3);
        assert_eq!(estimate_width_len(&EnumCellValue::Number(6900.0), true), 4);
    }

    #[test]
    fn test_convert_cell_value_keep_missing() {
        assert_eq!(
            convert_cell_value(&EnumCellValue::Number(f64::NAN), true, "NA"),
            EnumCellValue::String("NA".to_string())
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::None, false, "NA"),
            EnumCellValue::None
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::Number(1.0), false, "NA"),
            EnumCellValue::Number(1.0)
        );
    }
}
