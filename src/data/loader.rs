use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt32Type,
    UInt64Type,
};
use log::info;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CandidateTable, CellValue};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a candidate table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, comma separated (what the multiplier search writes)
/// * `.json`    – `[{ "Multiplier": "c3a5...", "Spectral score": 0.71, ... }, ...]`
/// * `.parquet` – flat scalar columns
///
/// Columns listed in `text_columns` keep their raw text and are never
/// type-inferred, so a hex multiplier like `1e10` stays a string.
pub fn load_file(path: &Path, text_columns: &[String]) -> Result<CandidateTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_csv(path, text_columns),
        "json" => load_json(path, text_columns),
        "parquet" | "pq" => load_parquet(path, text_columns),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    info!(
        "loaded {} rows x {} columns from {}",
        table.len(),
        table.columns.len(),
        path.display()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one candidate per line:
///
/// ```text
/// Multiplier,Spectral score
/// d1342543de82ef95,0.7317
/// ```
fn load_csv(path: &Path, text_columns: &[String]) -> Result<CandidateTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let columns: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let is_text: Vec<bool> = columns.iter().map(|c| text_columns.contains(c)).collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let cells = record
            .iter()
            .zip(&is_text)
            .map(|(value, &text)| {
                if text {
                    text_cell(value)
                } else {
                    guess_cell_type(value)
                }
            })
            .collect();
        rows.push(cells);
    }

    Ok(CandidateTable::from_rows(columns, rows))
}

/// Markers a pandas reader turns into missing values.
const NULL_MARKERS: &[&str] = &["", "NaN", "nan", "NA", "N/A", "null", "None"];

fn text_cell(s: &str) -> CellValue {
    if NULL_MARKERS.contains(&s) {
        CellValue::Null
    } else {
        CellValue::String(s.to_string())
    }
}

fn guess_cell_type(s: &str) -> CellValue {
    let s = s.trim();
    if NULL_MARKERS.contains(&s) {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    match s {
        "true" | "True" => CellValue::Bool(true),
        "false" | "False" => CellValue::Bool(false),
        _ => CellValue::String(s.to_string()),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Multiplier": "d1342543de82ef95", "Spectral score": 0.7317 },
///   ...
/// ]
/// ```
///
/// Columns are the union of all keys, in first-seen order. Absent keys are null.
fn load_json(path: &Path, text_columns: &[String]) -> Result<CandidateTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut columns: Vec<String> = Vec::new();
    let mut parsed: Vec<BTreeMap<String, CellValue>> = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let mut cells = BTreeMap::new();
        for (key, val) in obj {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
            let cell = if text_columns.contains(key) {
                json_to_text(val)
            } else {
                json_to_cell(val)
            };
            cells.insert(key.clone(), cell);
        }
        parsed.push(cells);
    }

    let rows = parsed
        .into_iter()
        .map(|mut cells| {
            columns
                .iter()
                .map(|col| cells.remove(col).unwrap_or(CellValue::Null))
                .collect()
        })
        .collect();

    Ok(CandidateTable::from_rows(columns, rows))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

fn json_to_text(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => text_cell(s),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one scalar column per candidate attribute.
///
/// Works with files written by **Pandas** (`df.to_parquet()`), **Polars**
/// and the `generate-candidates` binary.
fn load_parquet(path: &Path, text_columns: &[String]) -> Result<CandidateTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let is_text: Vec<bool> = columns.iter().map(|c| text_columns.contains(c)).collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            let cells = batch
                .columns()
                .iter()
                .zip(&is_text)
                .map(|(col, &text)| {
                    let cell = extract_cell_value(col, row);
                    match cell {
                        CellValue::Integer(_) | CellValue::Float(_) | CellValue::Bool(_)
                            if text =>
                        {
                            CellValue::String(cell.to_string())
                        }
                        _ => cell,
                    }
                })
                .collect();
            rows.push(cells);
        }
    }

    Ok(CandidateTable::from_rows(columns, rows))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell_value(col: &ArrayRef, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => CellValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int8 => CellValue::Integer(col.as_primitive::<Int8Type>().value(row) as i64),
        DataType::Int16 => CellValue::Integer(col.as_primitive::<Int16Type>().value(row) as i64),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::UInt32 => CellValue::Integer(col.as_primitive::<UInt32Type>().value(row) as i64),
        DataType::UInt64 => {
            let v = col.as_primitive::<UInt64Type>().value(row);
            i64::try_from(v)
                .map(CellValue::Integer)
                .unwrap_or_else(|_| CellValue::String(v.to_string()))
        }
        DataType::Float32 => {
            CellValue::from_f64(Some(col.as_primitive::<Float32Type>().value(row) as f64))
        }
        DataType::Float64 => CellValue::from_f64(Some(col.as_primitive::<Float64Type>().value(row))),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        other => CellValue::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guess_cell_type_follows_csv_inference() {
        assert_eq!(guess_cell_type("42"), CellValue::Integer(42));
        assert_eq!(guess_cell_type("0.75"), CellValue::Float(0.75));
        assert_eq!(guess_cell_type("True"), CellValue::Bool(true));
        assert_eq!(guess_cell_type("c3a5"), CellValue::String("c3a5".into()));
        assert_eq!(guess_cell_type(""), CellValue::Null);
        assert_eq!(guess_cell_type("NaN"), CellValue::Null);
    }

    #[test]
    fn text_columns_are_not_inferred() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidates.csv");
        std::fs::write(
            &path,
            "Multiplier,Spectral score\n1e10,0.5\n1234,0.25\nd1342543de82ef95,\n",
        )
        .unwrap();

        let table = load_file(&path, &["Multiplier".to_string()]).unwrap();
        assert_eq!(table.columns, vec!["Multiplier", "Spectral score"]);
        assert_eq!(table.rows[0].cells[0], CellValue::String("1e10".into()));
        assert_eq!(table.rows[1].cells[0], CellValue::String("1234".into()));
        assert!(table.rows[2].cells[1].is_null());
    }

    #[test]
    fn json_records_fill_missing_keys_with_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidates.json");
        std::fs::write(
            &path,
            r#"[{"Multiplier": "c1", "Spectral score": 0.5},
                {"Multiplier": "c2"}]"#,
        )
        .unwrap();

        let table = load_file(&path, &["Multiplier".to_string()]).unwrap();
        assert_eq!(table.len(), 2);
        let idx = table.column_index("Spectral score").unwrap();
        assert_eq!(table.rows[0].cells[idx], CellValue::Float(0.5));
        assert!(table.rows[1].cells[idx].is_null());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = load_file(Path::new("candidates.xlsx"), &[]).unwrap_err();
        assert!(err.to_string().contains("Unsupported file extension"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_file(&dir.path().join("absent.csv"), &[]).is_err());
    }
}
