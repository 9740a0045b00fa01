//! Adapters between polars `DataFrame`s and merge rows/records.

use polars::prelude::{AnyValue, Column, DataFrame, NamedFrom};
use rebar_io_xlsx::derive_cell_value_from_any_value;
use tracing::debug;

use crate::merge::aggregate;
use crate::report::ReportMerge;
use crate::spec::{
    EnumFieldValue, MergeError, SpecMergeColumns, SpecMergeOptions, SpecRawRow, SpecTowerRecord,
};

/// Read the five core columns of `df` into raw rows.
///
/// Fails with [`MergeError::Schema`] naming every required column that is not
/// present. With `if_fill_down_tower_id`, a missing tower id takes the last
/// non-missing tower id above it (merged spreadsheet cells only carry a value
/// in their first row).
pub fn derive_rows_from_dataframe(
    df: &DataFrame,
    columns: &SpecMergeColumns,
    if_fill_down_tower_id: bool,
) -> Result<Vec<SpecRawRow>, MergeError> {
    validate_required_columns(df, columns)?;

    let col_tower_id = df.column(&columns.tower_id)?;
    let col_leg_id = df.column(&columns.leg_id)?;
    let col_spec = df.column(&columns.spec)?;
    let col_length = df.column(&columns.length)?;
    let col_count = df.column(&columns.count)?;

    let mut l_rows = Vec::with_capacity(df.height());
    let mut value_tower_id_last = EnumFieldValue::Missing;
    for n_idx_row in 0..df.height() {
        let mut tower_id = derive_field_value_from_any_value(col_tower_id.get(n_idx_row)?);
        if if_fill_down_tower_id {
            if tower_id.is_missing() {
                tower_id = value_tower_id_last.clone();
            } else {
                value_tower_id_last = tower_id.clone();
            }
        }

        l_rows.push(SpecRawRow {
            row_idx: n_idx_row,
            tower_id,
            leg_id: derive_field_value_from_any_value(col_leg_id.get(n_idx_row)?),
            spec: derive_field_value_from_any_value(col_spec.get(n_idx_row)?),
            length: derive_field_value_from_any_value(col_length.get(n_idx_row)?),
            count: derive_field_value_from_any_value(col_count.get(n_idx_row)?),
        });
    }

    Ok(l_rows)
}

/// Build the output table: tower id, one slot column per leg label, merged.
///
/// Slot columns are `options.legs_slot_default` followed by any other label
/// seen in `towers`, in first-appearance order. The tower column stays numeric
/// when every id is a plain integer, so `1`, `2` are written as number cells.
pub fn derive_dataframe_from_towers(
    towers: &[SpecTowerRecord],
    columns: &SpecMergeColumns,
    options: &SpecMergeOptions,
) -> Result<DataFrame, MergeError> {
    let l_slot_labels = derive_slot_labels(towers, &options.legs_slot_default);

    let mut l_cols = Vec::with_capacity(l_slot_labels.len() + 2);
    l_cols.push(derive_tower_id_column(&columns.tower_id, towers));

    for c_label in &l_slot_labels {
        let l_values: Vec<String> = towers
            .iter()
            .map(|t| t.legs.get(c_label).cloned().unwrap_or_default())
            .collect();
        l_cols.push(Column::new(columns.slot(c_label).as_str().into(), l_values));
    }

    let l_merged: Vec<String> = towers.iter().map(|t| t.merged.clone()).collect();
    l_cols.push(Column::new(columns.merged.as_str().into(), l_merged));

    Ok(DataFrame::new(l_cols)?)
}

/// Frame in, frame out: read rows, aggregate, build the output table.
pub fn merge_dataframe(
    df: &DataFrame,
    columns: &SpecMergeColumns,
    options: &SpecMergeOptions,
    if_fill_down_tower_id: bool,
) -> Result<(DataFrame, ReportMerge), MergeError> {
    let l_rows = derive_rows_from_dataframe(df, columns, if_fill_down_tower_id)?;
    let output = aggregate(&l_rows, options)?;
    let df_out = derive_dataframe_from_towers(&output.towers, columns, options)?;
    debug!(
        height_in = df.height(),
        height_out = df_out.height(),
        "merged dataframe"
    );
    Ok((df_out, output.report))
}

fn derive_tower_id_column(name: &str, towers: &[SpecTowerRecord]) -> Column {
    // Round-trip check keeps ids like `007` or `+1` as text.
    let l_ids_integer: Option<Vec<i64>> = towers
        .iter()
        .map(|t| {
            t.tower_id
                .parse::<i64>()
                .ok()
                .filter(|n| n.to_string() == t.tower_id)
        })
        .collect();
    match l_ids_integer {
        Some(l_ids) if !l_ids.is_empty() => Column::new(name.into(), l_ids),
        _ => {
            let l_ids: Vec<String> = towers.iter().map(|t| t.tower_id.clone()).collect();
            Column::new(name.into(), l_ids)
        }
    }
}

/// Default labels first, then unseen labels in first-appearance order.
pub fn derive_slot_labels(towers: &[SpecTowerRecord], legs_slot_default: &[String]) -> Vec<String> {
    let mut l_labels: Vec<String> = Vec::with_capacity(legs_slot_default.len());
    for c_label in legs_slot_default {
        if !l_labels.contains(c_label) {
            l_labels.push(c_label.clone());
        }
    }
    for tower in towers {
        for c_label in tower.legs.keys() {
            if !l_labels.contains(c_label) {
                l_labels.push(c_label.clone());
            }
        }
    }
    l_labels
}

fn validate_required_columns(df: &DataFrame, columns: &SpecMergeColumns) -> Result<(), MergeError> {
    let l_colnames_df: Vec<&str> = df.get_column_names_str();
    let missing: Vec<String> = columns
        .required()
        .into_iter()
        .filter(|c_name| !l_colnames_df.contains(c_name))
        .map(ToString::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MergeError::Schema { missing })
    }
}

fn derive_field_value_from_any_value(value: AnyValue<'_>) -> EnumFieldValue {
    EnumFieldValue::from(derive_cell_value_from_any_value(value))
}

#[cfg(test)]
mod tests {
    use polars::prelude::{Column, DataFrame, NamedFrom};

    use super::*;

    fn df_input() -> DataFrame {
        DataFrame::new(vec![
            Column::new("塔号".into(), &[Some("N1"), None, Some("N2"), None, Some("N1")]),
            Column::new("塔腿".into(), &["a", "B", "A", "C", "E"]),
            Column::new("规格".into(), &["C22", "C22", "C25", "C25", "C16"]),
            Column::new(
                "长度(mm)".into(),
                &[6900.0, 6900.0, 7400.0, 7400.0, 3000.0],
            ),
            Column::new("数量".into(), &[28i64, 28, 12, 12, 4]),
        ])
        .expect("df")
    }

    #[test]
    fn schema_error_names_all_missing_columns() {
        let df = DataFrame::new(vec![
            Column::new("塔号".into(), &["N1"]),
            Column::new("塔腿".into(), &["A"]),
            Column::new("长度(mm)".into(), &[6900.0]),
        ])
        .expect("df");

        let err = derive_rows_from_dataframe(&df, &SpecMergeColumns::default(), false)
            .expect_err("schema");
        match err {
            MergeError::Schema { missing } => {
                assert_eq!(missing, vec!["规格".to_string(), "数量".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rows_keep_missing_tower_without_fill_down() {
        let l_rows =
            derive_rows_from_dataframe(&df_input(), &SpecMergeColumns::default(), false)
                .expect("rows");

        assert_eq!(l_rows.len(), 5);
        assert_eq!(l_rows[1].tower_id, EnumFieldValue::Missing);
        assert_eq!(l_rows[1].row_idx, 1);
        assert_eq!(l_rows[0].length, EnumFieldValue::Number(6900.0));
        assert_eq!(l_rows[2].count, EnumFieldValue::Number(12.0));
    }

    #[test]
    fn fill_down_copies_previous_tower_id() {
        let l_rows = derive_rows_from_dataframe(&df_input(), &SpecMergeColumns::default(), true)
            .expect("rows");

        assert_eq!(l_rows[1].tower_id, EnumFieldValue::Text("N1".to_string()));
        assert_eq!(l_rows[3].tower_id, EnumFieldValue::Text("N2".to_string()));
    }

    #[test]
    fn merge_dataframe_builds_slot_and_merged_columns() {
        let (df_out, report) = merge_dataframe(
            &df_input(),
            &SpecMergeColumns::default(),
            &SpecMergeOptions::default(),
            true,
        )
        .expect("merge");

        assert_eq!(
            df_out.get_column_names_str(),
            vec!["塔号", "塔腿A", "塔腿B", "塔腿C", "塔腿D", "塔腿E", "合并"]
        );
        assert_eq!(df_out.height(), 2);
        assert_eq!(report.cnt_towers, 2);

        let col_merged = df_out.column("合并").expect("merged");
        assert_eq!(
            col_merged.get(0).expect("cell").to_string().trim_matches('"'),
            "AB:C22*6900*56、E:C16*3000*4"
        );
        assert_eq!(
            col_merged.get(1).expect("cell").to_string().trim_matches('"'),
            "AC:C25*7400*24"
        );

        let col_slot_d = df_out.column("塔腿D").expect("slot D");
        assert_eq!(col_slot_d.get(0).expect("cell").to_string().trim_matches('"'), "");
        let col_slot_a = df_out.column("塔腿A").expect("slot A");
        assert_eq!(
            col_slot_a.get(0).expect("cell").to_string().trim_matches('"'),
            "A：C22*6900*28"
        );
    }

    #[test]
    fn merge_dataframe_without_fill_down_drops_blank_tower_rows() {
        let (df_out, report) = merge_dataframe(
            &df_input(),
            &SpecMergeColumns::default(),
            &SpecMergeOptions::default(),
            false,
        )
        .expect("merge");

        assert_eq!(report.cnt_rows_dropped, 2);
        let col_merged = df_out.column("合并").expect("merged");
        assert_eq!(
            col_merged.get(0).expect("cell").to_string().trim_matches('"'),
            "A:C22*6900*28、E:C16*3000*4"
        );
    }

    fn df_with_tower_ids(l_tower_ids: Column) -> DataFrame {
        let n_height = l_tower_ids.len();
        DataFrame::new(vec![
            l_tower_ids,
            Column::new("塔腿".into(), vec!["A"; n_height]),
            Column::new("规格".into(), vec!["C22"; n_height]),
            Column::new("长度(mm)".into(), vec![6900.0; n_height]),
            Column::new("数量".into(), vec![28i64; n_height]),
        ])
        .expect("df")
    }

    #[test]
    fn numeric_tower_ids_stay_numeric() {
        let df = df_with_tower_ids(Column::new("塔号".into(), &[1.0, 2.0, 1.0]));
        let (df_out, _) = merge_dataframe(
            &df,
            &SpecMergeColumns::default(),
            &SpecMergeOptions::default(),
            false,
        )
        .expect("merge");

        let col_tower = df_out.column("塔号").expect("tower");
        assert!(col_tower.dtype().is_integer());
        assert_eq!(col_tower.get(0).expect("cell").extract::<i64>(), Some(1));
        assert_eq!(col_tower.get(1).expect("cell").extract::<i64>(), Some(2));
    }

    #[test]
    fn mixed_or_padded_tower_ids_stay_text() {
        for l_ids in [vec!["1", "N2"], vec!["007", "8"]] {
            let df = df_with_tower_ids(Column::new("塔号".into(), l_ids.clone()));
            let (df_out, _) = merge_dataframe(
                &df,
                &SpecMergeColumns::default(),
                &SpecMergeOptions::default(),
                false,
            )
            .expect("merge");

            let col_tower = df_out.column("塔号").expect("tower");
            assert!(!col_tower.dtype().is_numeric());
            assert_eq!(
                col_tower.get(0).expect("cell").to_string().trim_matches('"'),
                l_ids[0]
            );
        }
    }

    #[test]
    fn slot_labels_start_with_defaults() {
        let l_default: Vec<String> = ["A", "B"].iter().map(ToString::to_string).collect();
        assert_eq!(derive_slot_labels(&[], &l_default), l_default);
    }
}
