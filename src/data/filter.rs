use log::debug;

use super::model::CandidateTable;
use crate::config::Threshold;
use crate::error::Result;
use crate::stats::quantile;

// ---------------------------------------------------------------------------
// Threshold predicate: a column and the value a row must reach
// ---------------------------------------------------------------------------

/// A [`Threshold`] rule resolved to a concrete cutoff on one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Cutoff {
    pub column: String,
    pub quantile: f64,
    /// NaN when the column had no values; no row reaches a NaN cutoff.
    pub value: f64,
}

/// Resolve every rule against `table` as it is now.
///
/// All cutoffs come from the same table state. Filtering afterwards, in any
/// order, is then a plain conjunction of the rules.
pub fn compute_cutoffs(table: &CandidateTable, rules: &[Threshold]) -> Result<Vec<Cutoff>> {
    rules
        .iter()
        .map(|rule| {
            let values: Vec<f64> = table
                .numeric_values(&rule.column)?
                .into_iter()
                .flatten()
                .collect();
            let value = quantile(&values, rule.quantile);
            debug!(
                "cutoff for '{}' at q{} over {} values: {value}",
                rule.column,
                rule.quantile,
                values.len()
            );
            Ok(Cutoff {
                column: rule.column.clone(),
                quantile: rule.quantile,
                value,
            })
        })
        .collect()
}

/// Return which rows pass all cutoffs.
///
/// A row passes a cutoff when its value is present and `>=` the cutoff.
/// Nulls never pass.
pub fn passing_mask(table: &CandidateTable, cutoffs: &[Cutoff]) -> Result<Vec<bool>> {
    let mut keep = vec![true; table.len()];
    for cutoff in cutoffs {
        let values = table.numeric_values(&cutoff.column)?;
        for (flag, value) in keep.iter_mut().zip(values) {
            *flag = *flag && value.is_some_and(|v| v >= cutoff.value);
        }
    }
    Ok(keep)
}

/// Narrow `table` in place; returns how many rows were dropped.
pub fn apply_cutoffs(table: &mut CandidateTable, cutoffs: &[Cutoff]) -> Result<usize> {
    let keep = passing_mask(table, cutoffs)?;
    let before = table.len();
    table.retain_mask(&keep);
    Ok(before - table.len())
}
