//! Leg-merge aggregation: rows -> one record per tower.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::conf::{C_FIELD_COUNT, C_FIELD_LENGTH};
use crate::report::{ReportMerge, ReportMergeBuilder};
use crate::spec::{
    EnumDuplicateLegRule, EnumFieldValue, EnumNumericCoerceMode, MergeError, SpecLegRow,
    SpecMergeGroup, SpecMergeOptions, SpecRawRow, SpecTowerRecord,
};

/// Towers plus run diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMergeOutput {
    /// One record per distinct tower, in first-appearance order.
    pub towers: Vec<SpecTowerRecord>,
    /// Counters and warnings for this run.
    pub report: ReportMerge,
}

/// Aggregate leg rows into per-tower records.
///
/// Rows with any missing core field are dropped before grouping and counted in
/// the report. Towers keep the order in which their identifiers first appear;
/// inside a tower, merge groups keep the order in which their `(spec, length)`
/// key first appears among the tower's legs.
///
/// Returns an error on the first non-numeric or (in strict mode) fractional
/// length/count, and on repeated legs under [`EnumDuplicateLegRule::Error`].
/// No partial output is produced in that case.
pub fn aggregate(
    rows: &[SpecRawRow],
    options: &SpecMergeOptions,
) -> Result<SpecMergeOutput, MergeError> {
    let mut builder_report = ReportMergeBuilder::default();
    let mut dict_rows_by_tower: IndexMap<String, Vec<SpecLegRow>> = IndexMap::new();

    for raw_row in rows {
        builder_report.add_input();
        let Some(leg_row) = normalize_row(raw_row, options.numeric_coerce)? else {
            debug!(row_idx = raw_row.row_idx, "dropped row with missing core field");
            builder_report.add_dropped();
            continue;
        };
        dict_rows_by_tower
            .entry(leg_row.tower_id.clone())
            .or_default()
            .push(leg_row);
    }

    let mut l_towers = Vec::with_capacity(dict_rows_by_tower.len());
    for (tower_id, l_leg_rows) in dict_rows_by_tower {
        l_towers.push(build_tower_record(
            tower_id,
            l_leg_rows,
            options,
            &mut builder_report,
        )?);
        builder_report.add_tower();
    }

    let report = builder_report.build();
    debug!(%report, "aggregation finished");
    Ok(SpecMergeOutput {
        towers: l_towers,
        report,
    })
}

/// Normalize one raw row; `Ok(None)` means the row is dropped.
pub fn normalize_row(
    raw_row: &SpecRawRow,
    rule_coerce: EnumNumericCoerceMode,
) -> Result<Option<SpecLegRow>, MergeError> {
    let l_fields = [
        &raw_row.tower_id,
        &raw_row.leg_id,
        &raw_row.spec,
        &raw_row.length,
        &raw_row.count,
    ];
    if l_fields.iter().any(|value| value.is_missing()) {
        return Ok(None);
    }

    let (Some(tower_id), Some(leg_id), Some(spec)) = (
        raw_row.tower_id.to_text(),
        raw_row.leg_id.to_text(),
        raw_row.spec.to_text(),
    ) else {
        return Ok(None);
    };

    let length = coerce_integer(
        &raw_row.length,
        C_FIELD_LENGTH,
        raw_row.row_idx,
        &tower_id,
        rule_coerce,
    )?;
    let count = coerce_integer(
        &raw_row.count,
        C_FIELD_COUNT,
        raw_row.row_idx,
        &tower_id,
        rule_coerce,
    )?;

    Ok(Some(SpecLegRow {
        row_idx: raw_row.row_idx,
        tower_id,
        leg_id: leg_id.to_uppercase(),
        spec,
        length,
        count,
    }))
}

fn coerce_integer(
    value: &EnumFieldValue,
    field: &'static str,
    row_idx: usize,
    tower_id: &str,
    rule_coerce: EnumNumericCoerceMode,
) -> Result<i64, MergeError> {
    let err_non_numeric = |c_value: String| MergeError::NumericCoercion {
        field,
        value: c_value,
        row_idx,
        tower_id: tower_id.to_string(),
    };

    let n_value = match value {
        EnumFieldValue::Number(n) => *n,
        EnumFieldValue::Text(s) => {
            let c_text = s.trim();
            if let Ok(n) = c_text.parse::<i64>() {
                return Ok(n);
            }
            c_text
                .parse::<f64>()
                .map_err(|_| err_non_numeric(c_text.to_string()))?
        }
        EnumFieldValue::Missing => return Err(err_non_numeric(String::new())),
    };

    // i64::MAX as f64 rounds up to 2^63, so the bound is exclusive.
    if !n_value.is_finite() || n_value.abs() >= 9_223_372_036_854_775_808.0 {
        return Err(err_non_numeric(n_value.to_string()));
    }
    if n_value.fract() != 0.0 && rule_coerce == EnumNumericCoerceMode::Strict {
        return Err(MergeError::FractionalNumber {
            field,
            value: n_value,
            row_idx,
            tower_id: tower_id.to_string(),
        });
    }
    Ok(n_value.trunc() as i64)
}

fn build_tower_record(
    tower_id: String,
    l_leg_rows: Vec<SpecLegRow>,
    options: &SpecMergeOptions,
    builder_report: &mut ReportMergeBuilder,
) -> Result<SpecTowerRecord, MergeError> {
    let mut dict_slots: IndexMap<String, SpecLegRow> = IndexMap::new();
    for leg_row in l_leg_rows {
        if let Some(leg_row_prev) = dict_slots.get(&leg_row.leg_id) {
            if options.duplicate_leg == EnumDuplicateLegRule::Error {
                return Err(MergeError::DuplicateLeg {
                    tower_id,
                    leg_id: leg_row.leg_id,
                    row_idx_first: leg_row_prev.row_idx,
                    row_idx: leg_row.row_idx,
                });
            }
            let c_msg = format!(
                "Tower {tower_id:?} leg {:?}: row {} overwrites row {}.",
                leg_row.leg_id, leg_row.row_idx, leg_row_prev.row_idx
            );
            warn!("{c_msg}");
            builder_report.add_duplicate();
            builder_report.add_warning(c_msg);
        }
        // Existing keys keep their position; only the value is replaced.
        dict_slots.insert(leg_row.leg_id.clone(), leg_row);
    }
    builder_report.add_merged(dict_slots.len() as u64);

    let mut dict_groups: IndexMap<(&str, i64), SpecMergeGroup> = IndexMap::new();
    for leg_row in dict_slots.values() {
        let group = dict_groups
            .entry((leg_row.spec.as_str(), leg_row.length))
            .or_insert_with(|| SpecMergeGroup {
                legs: Vec::new(),
                spec: leg_row.spec.clone(),
                length: leg_row.length,
                count_total: 0,
            });
        group.count_total = group.count_total.checked_add(leg_row.count).ok_or_else(|| {
            MergeError::CountOverflow {
                tower_id: tower_id.clone(),
                spec: leg_row.spec.clone(),
                length: leg_row.length,
            }
        })?;
        group.legs.push(leg_row.leg_id.clone());
    }

    let l_groups: Vec<SpecMergeGroup> = dict_groups
        .into_values()
        .map(|mut group| {
            group.legs.sort();
            group
        })
        .collect();
    let merged = l_groups
        .iter()
        .map(SpecMergeGroup::render)
        .collect::<Vec<_>>()
        .join(&options.delimiter);

    let legs = dict_slots
        .iter()
        .map(|(leg_id, leg_row)| (leg_id.clone(), leg_row.display()))
        .collect();

    Ok(SpecTowerRecord {
        tower_id,
        legs,
        groups: l_groups,
        merged,
    })
}
