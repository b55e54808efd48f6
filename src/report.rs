use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;

use crate::data::model::{CandidateTable, CellValue, ColumnKind};
use crate::error::Result;
use crate::pipeline::PipelineOutcome;
use crate::stats::ColumnSummary;

// ---------------------------------------------------------------------------
// Summary block
// ---------------------------------------------------------------------------

/// `describe()`-style statistics, one column per numeric column of `table`.
pub fn summary(table: &CandidateTable) -> Result<String> {
    let mut fields = vec![Field::new("", DataType::Utf8, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(ColumnSummary::LABELS.to_vec()))];

    for name in table.numeric_columns() {
        let stats = ColumnSummary::of(&table.numeric_values(&name)?);
        fields.push(Field::new(name, DataType::Float64, true));
        arrays.push(Arc::new(Float64Array::from(stats.values().to_vec())));
    }

    render(fields, arrays)
}

// ---------------------------------------------------------------------------
// Ranked block
// ---------------------------------------------------------------------------

/// The ranked rows with every original and derived column. The leading
/// column is each row's position in the input file.
pub fn ranked(outcome: &PipelineOutcome) -> Result<String> {
    let top = outcome.top();

    let mut fields = vec![Field::new("", DataType::UInt64, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(UInt64Array::from_iter_values(
        top.rows.iter().map(|r| r.source_row as u64),
    ))];

    for (idx, name) in top.columns.iter().enumerate() {
        let (data_type, array) = column_array(&top, idx);
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }

    let mut out = render(fields, arrays)?;
    out.push_str(&format!(
        "\n[{} of {} rows by {}, descending]",
        top.len(),
        outcome.table.len(),
        outcome.rank_by
    ));
    Ok(out)
}

/// Renders by the column's stored kind, so a slice of rows never changes
/// how a column prints.
fn column_array(table: &CandidateTable, idx: usize) -> (DataType, ArrayRef) {
    let cells = table.rows.iter().map(|r| &r.cells[idx]);

    match table.kinds[idx] {
        ColumnKind::Integer => {
            let array: Int64Array = cells
                .map(|c| match c {
                    CellValue::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect();
            (DataType::Int64, Arc::new(array))
        }
        ColumnKind::Float => {
            let array: Float64Array = cells.map(|c| c.as_f64()).collect();
            (DataType::Float64, Arc::new(array))
        }
        ColumnKind::Text => {
            let array: StringArray = cells
                .map(|c| if c.is_null() { None } else { Some(c.to_string()) })
                .collect();
            (DataType::Utf8, Arc::new(array))
        }
    }
}

fn render(fields: Vec<Field>, arrays: Vec<ArrayRef>) -> Result<String> {
    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::run;

    fn table() -> CandidateTable {
        CandidateTable::from_rows(
            vec!["Multiplier".into(), "Spectral score".into()],
            vec![
                vec![CellValue::String("c000000000000000".into()), CellValue::Float(0.5)],
                vec![CellValue::String("8000000000000000".into()), CellValue::Float(0.9)],
            ],
        )
    }

    #[test]
    fn summary_lists_numeric_columns_only() {
        let out = summary(&table()).unwrap();
        assert!(out.contains("Spectral score"));
        assert!(!out.contains("Multiplier"));
        for label in ColumnSummary::LABELS {
            assert!(out.contains(label), "missing {label}");
        }
    }

    #[test]
    fn ranked_prints_all_columns_with_source_rows() {
        let outcome = run(table(), &PipelineConfig::empty()).unwrap();
        let out = ranked(&outcome).unwrap();
        assert!(out.contains("Multiplier"));
        assert!(out.contains("Period"));
        assert!(out.contains("c000000000000000"));
        assert!(out.contains("0.75"));
        assert!(out.contains("[2 of 2 rows by Period, descending]"));
    }

    #[test]
    fn empty_table_renders_headers() {
        let config = PipelineConfig::empty().with_threshold("Spectral score", 1.0);
        let mut t = table();
        t.rows.truncate(0);
        let outcome = run(t, &config).unwrap();
        let out = ranked(&outcome).unwrap();
        assert!(out.contains("Period"));
        assert!(out.contains("[0 of 0 rows"));
        let stats = summary(&outcome.table).unwrap();
        assert!(stats.contains("count"));
        assert!(!stats.contains("Multiplier"));
    }

    #[test]
    fn float_column_renders_as_float_even_when_top_rows_are_whole() {
        let t = CandidateTable::from_rows(
            vec!["Multiplier".into(), "Spectral score".into()],
            vec![
                vec![CellValue::String("c000000000000000".into()), CellValue::Integer(2)],
                vec![CellValue::String("8000000000000000".into()), CellValue::Float(0.5)],
            ],
        );
        let outcome = run(t, &PipelineConfig::empty().with_top_n(1)).unwrap();
        let (data_type, _) = column_array(&outcome.top(), 1);
        assert_eq!(data_type, DataType::Float64);
    }
}
