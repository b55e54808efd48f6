use std::cmp::Ordering;

use log::{info, warn};

use crate::config::{Blend, PipelineConfig};
use crate::data::filter::{Cutoff, apply_cutoffs, compute_cutoffs};
use crate::data::model::{CandidateTable, CellValue};
use crate::error::{CandidateError, Result};

// ---------------------------------------------------------------------------
// Pipeline run
// ---------------------------------------------------------------------------

/// Result of one filter-and-rank run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Surviving rows with the derived columns appended.
    pub table: CandidateTable,
    /// Cutoffs as computed on the deduplicated table.
    pub cutoffs: Vec<Cutoff>,
    pub duplicates_removed: usize,
    /// Indices into `table.rows`, best first, at most `top_n` long.
    pub ranking: Vec<usize>,
    pub rank_by: String,
}

impl PipelineOutcome {
    /// The ranked rows as a table of their own.
    pub fn top(&self) -> CandidateTable {
        self.table.select(&self.ranking)
    }
}

/// Deduplicate, filter, derive and rank.
///
/// Cutoffs are all computed before any row is dropped, so the order of the
/// threshold rules never changes which rows survive.
pub fn run(mut table: CandidateTable, config: &PipelineConfig) -> Result<PipelineOutcome> {
    config.validate()?;

    let duplicates_removed = table.dedup();
    info!("removed {duplicates_removed} duplicate rows, {} remain", table.len());

    let cutoffs = compute_cutoffs(&table, &config.thresholds)?;
    for c in &cutoffs {
        info!("'{}' >= {} (q{})", c.column, c.value, c.quantile);
    }
    let dropped = apply_cutoffs(&mut table, &cutoffs)?;
    info!("thresholds dropped {dropped} rows, {} survive", table.len());
    if table.is_empty() {
        warn!("no candidate meets every threshold");
    }

    derive_period(&mut table, &config.multiplier_column, &config.period_column)?;
    if let Some(blend) = &config.blend {
        derive_blend(&mut table, blend, &config.period_column)?;
    }

    let ranking = rank(&table, &config.rank_by, config.top_n)?;

    Ok(PipelineOutcome {
        table,
        cutoffs,
        duplicates_removed,
        ranking,
        rank_by: config.rank_by.clone(),
    })
}

// ---------------------------------------------------------------------------
// Derived columns
// ---------------------------------------------------------------------------

/// Parse a hex multiplier. Accepts surrounding whitespace and a `0x` prefix.
pub fn parse_multiplier(text: &str) -> Option<u64> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() || digits.starts_with('+') {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// `multiplier / 2^64`, always in `[0, 1)`.
///
/// Only the top 53 bits are kept so the division is exact; a plain
/// `m as f64` rounds multipliers near `u64::MAX` up to 2^64.
pub fn period(multiplier: u64) -> f64 {
    (multiplier >> 11) as f64 / (1u64 << 53) as f64
}

/// Append (or overwrite) the period column from the multiplier column.
pub fn derive_period(table: &mut CandidateTable, multiplier_column: &str, period_column: &str) -> Result<()> {
    let idx = table.require_column(multiplier_column)?;
    let periods = table
        .rows
        .iter()
        .map(|rec| {
            let cell = &rec.cells[idx];
            let parsed = match cell {
                CellValue::Null => None,
                other => parse_multiplier(&other.to_string()),
            };
            parsed
                .map(|m| CellValue::Float(period(m)))
                .ok_or_else(|| CandidateError::InvalidMultiplier {
                    row: rec.source_row,
                    value: cell.to_string(),
                })
        })
        .collect::<Result<Vec<_>>>()?;
    table.set_column(period_column, periods);
    Ok(())
}

/// Append the weighted sum and its product with the period.
/// A null term or period makes both results null for that row.
pub fn derive_blend(table: &mut CandidateTable, blend: &Blend, period_column: &str) -> Result<()> {
    let mut sums: Vec<Option<f64>> = vec![Some(0.0); table.len()];
    for term in &blend.terms {
        let values = table.numeric_values(&term.column)?;
        for (acc, value) in sums.iter_mut().zip(values) {
            *acc = (*acc).zip(value).map(|(a, v)| a + term.weight * v);
        }
    }
    let periods = table.numeric_values(period_column)?;
    let scores: Vec<CellValue> = sums
        .iter()
        .zip(periods)
        .map(|(sum, p)| CellValue::from_f64((*sum).zip(p).map(|(s, p)| s * p)))
        .collect();

    table.set_column(
        &blend.output_column,
        sums.into_iter().map(CellValue::from_f64).collect(),
    );
    table.set_column(&blend.score_column, scores);
    Ok(())
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Indices of the `top_n` rows with the highest `key`, descending.
/// Ties keep table order; nulls go last.
pub fn rank(table: &CandidateTable, key: &str, top_n: usize) -> Result<Vec<usize>> {
    let keys = table.numeric_values(key)?;
    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by(|&a, &b| match (keys[a], keys[b]) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    order.truncate(top_n);
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Preset, SCORE, SPECTRAL};

    fn text(s: &str) -> CellValue {
        CellValue::String(s.to_string())
    }

    #[test]
    fn period_stays_below_one() {
        for hex in ["0000000000000000", "8000000000000000", "ffffffffffffffff", "fffffffffffff800"] {
            let p = period(parse_multiplier(hex).unwrap());
            assert!((0.0..1.0).contains(&p), "{hex} -> {p}");
        }
        assert_eq!(period(0x8000_0000_0000_0000), 0.5);
    }

    #[test]
    fn parse_multiplier_accepts_prefix_and_rejects_junk() {
        assert_eq!(parse_multiplier(" 0xff "), Some(255));
        assert_eq!(parse_multiplier("C000000000000000"), Some(0xc000_0000_0000_0000));
        assert_eq!(parse_multiplier("xyz"), None);
        assert_eq!(parse_multiplier(""), None);
        assert_eq!(parse_multiplier("+ff"), None);
        assert_eq!(parse_multiplier("1ffffffffffffffff"), None);
    }

    #[test]
    fn invalid_multiplier_names_the_row() {
        let mut table = CandidateTable::from_rows(
            vec!["Multiplier".into()],
            vec![vec![text("c0")], vec![text("zz")]],
        );
        match derive_period(&mut table, "Multiplier", "Period") {
            Err(CandidateError::InvalidMultiplier { row, value }) => {
                assert_eq!(row, 1);
                assert_eq!(value, "zz");
            }
            other => panic!("expected InvalidMultiplier, got {other:?}"),
        }
    }

    #[test]
    fn score_is_blend_times_period() {
        let mut table = CandidateTable::from_rows(
            vec![
                "Multiplier".into(),
                "Spectral mod B".into(),
                "Spectral lag-1 mod M".into(),
                "Spectral lag-2 mod M".into(),
            ],
            vec![vec![
                text("8000000000000000"),
                CellValue::Float(1.0),
                CellValue::Float(1.0),
                CellValue::Float(1.0),
            ]],
        );
        let config = Preset::Lagged.config();
        derive_period(&mut table, "Multiplier", "Period").unwrap();
        derive_blend(&mut table, config.blend.as_ref().unwrap(), "Period").unwrap();

        let spectral = table.numeric_values(SPECTRAL).unwrap();
        let score = table.numeric_values(SCORE).unwrap();
        assert!((spectral[0].unwrap() - 1.0).abs() < 1e-12);
        assert!((score[0].unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rank_is_descending_stable_and_truncated() {
        let keys = [Some(0.2), Some(0.9), None, Some(0.9), Some(0.5)];
        let table = CandidateTable::from_rows(
            vec!["Period".into()],
            keys.iter().map(|k| vec![CellValue::from_f64(*k)]).collect(),
        );
        assert_eq!(rank(&table, "Period", 50).unwrap(), vec![1, 3, 4, 0, 2]);
        assert_eq!(rank(&table, "Period", 2).unwrap(), vec![1, 3]);
    }
}
