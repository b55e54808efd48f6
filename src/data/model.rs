use std::collections::HashSet;
use std::fmt;

use crate::error::{CandidateError, Result};

// ---------------------------------------------------------------------------
// CellValue – a single cell of the candidate table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the dtypes a CSV reader infers.
/// Rows are deduplicated through a `HashSet`, so `CellValue` must be `Eq + Hash`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Floats compare by bit pattern so identical rows hash identically --

impl Eq for CellValue {}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::String(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => write!(f, "NaN"),
        }
    }
}

impl CellValue {
    /// Interpret the value as an `f64`. `None` for nulls and non-numeric cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// `Float`, or `Null` for `None` and NaN.
    pub fn from_f64(value: Option<f64>) -> Self {
        match value {
            Some(v) if !v.is_nan() => CellValue::Float(v),
            _ => CellValue::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnKind – the dtype of a whole column
// ---------------------------------------------------------------------------

/// Column dtype, decided once over every cell of the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Every cell is an integer; no nulls.
    Integer,
    /// Numbers, possibly with nulls. An all-null column is `Float`.
    Float,
    /// Anything else: strings, bools, or numbers mixed with either.
    Text,
}

impl ColumnKind {
    /// Infer the kind a CSV reader would give these cells.
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a CellValue>) -> Self {
        let (mut ints, mut floats, mut nulls, mut other) = (0usize, 0usize, 0usize, 0usize);
        for cell in cells {
            match cell {
                CellValue::Integer(_) => ints += 1,
                CellValue::Float(_) => floats += 1,
                CellValue::Null => nulls += 1,
                _ => other += 1,
            }
        }
        if other > 0 {
            ColumnKind::Text
        } else if ints > 0 && floats == 0 && nulls == 0 {
            ColumnKind::Integer
        } else {
            ColumnKind::Float
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }

    /// Bring a cell in line with the column kind. Integers in a float
    /// column become floats so `1` and `1.0` compare equal.
    fn coerce(self, cell: CellValue) -> CellValue {
        match (self, cell) {
            (ColumnKind::Float, CellValue::Integer(i)) => CellValue::Float(i as f64),
            (_, cell) => cell,
        }
    }
}

// ---------------------------------------------------------------------------
// CandidateRecord – one row of the table
// ---------------------------------------------------------------------------

/// A single candidate (one row of the input file).
#[derive(Debug, Clone)]
pub struct CandidateRecord {
    /// 0-based position in the loaded file. Survives filtering.
    pub source_row: usize,
    /// One cell per entry of [`CandidateTable::columns`].
    pub cells: Vec<CellValue>,
}

// ---------------------------------------------------------------------------
// CandidateTable – the complete loaded table
// ---------------------------------------------------------------------------

/// Column-named rows held fully in memory.
#[derive(Debug, Clone, Default)]
pub struct CandidateTable {
    /// Ordered column names, as read from the header.
    pub columns: Vec<String>,
    /// One kind per column, fixed at load time or when a column is derived.
    pub kinds: Vec<ColumnKind>,
    /// All records, in file order.
    pub rows: Vec<CandidateRecord>,
}

impl CandidateTable {
    /// Build a table from raw rows, numbering them in order.
    /// Short rows are padded with nulls. Column kinds are inferred here and
    /// every cell is coerced to its column's kind.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let mut rows: Vec<CandidateRecord> = rows
            .into_iter()
            .enumerate()
            .map(|(source_row, mut cells)| {
                cells.resize(width, CellValue::Null);
                CandidateRecord { source_row, cells }
            })
            .collect();

        let kinds: Vec<ColumnKind> = (0..width)
            .map(|idx| ColumnKind::infer(rows.iter().map(|r| &r.cells[idx])))
            .collect();
        for rec in &mut rows {
            for (cell, kind) in rec.cells.iter_mut().zip(&kinds) {
                *cell = kind.coerce(std::mem::replace(cell, CellValue::Null));
            }
        }

        CandidateTable {
            columns,
            kinds,
            rows,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no records.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| CandidateError::MissingColumn(name.to_string()))
    }

    /// Numeric view of a column: one entry per row, `None` for nulls.
    /// Fails on the first cell that is neither null nor a number.
    pub fn numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self.require_column(name)?;
        self.rows
            .iter()
            .map(|rec| match &rec.cells[idx] {
                CellValue::Null => Ok(None),
                cell => cell.as_f64().map(Some).ok_or_else(|| CandidateError::NonNumeric {
                    column: name.to_string(),
                    row: rec.source_row,
                    value: cell.to_string(),
                }),
            })
            .collect()
    }

    /// Whether the column's kind, fixed when it was created, is numeric.
    /// Filtering rows never changes the answer.
    pub fn is_numeric_column(&self, idx: usize) -> bool {
        self.kinds[idx].is_numeric()
    }

    /// Names of the numeric columns, in column order.
    pub fn numeric_columns(&self) -> Vec<String> {
        (0..self.columns.len())
            .filter(|&idx| self.is_numeric_column(idx))
            .map(|idx| self.columns[idx].clone())
            .collect()
    }

    /// Drop rows whose cells exactly repeat an earlier row, keeping first
    /// occurrences in order. Returns how many rows were removed.
    pub fn dedup(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen: HashSet<Vec<CellValue>> = HashSet::with_capacity(before);
        self.rows.retain(|rec| seen.insert(rec.cells.clone()));
        before - self.rows.len()
    }

    /// Keep only the rows for which `keep[i]` is true.
    pub fn retain_mask(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.rows.len());
        let mut flags = keep.iter();
        self.rows.retain(|_| flags.next().copied().unwrap_or(false));
    }

    /// Insert a column, or overwrite it when the name already exists.
    /// The column takes the kind inferred from `values`; overwriting with no
    /// rows keeps the existing kind.
    pub fn set_column(&mut self, name: &str, values: Vec<CellValue>) {
        debug_assert_eq!(values.len(), self.rows.len());
        let mut kind = ColumnKind::infer(&values);
        let idx = match self.column_index(name) {
            Some(idx) => {
                if values.is_empty() {
                    kind = self.kinds[idx];
                }
                self.kinds[idx] = kind;
                idx
            }
            None => {
                self.columns.push(name.to_string());
                self.kinds.push(kind);
                for rec in &mut self.rows {
                    rec.cells.push(CellValue::Null);
                }
                self.columns.len() - 1
            }
        };
        for (rec, value) in self.rows.iter_mut().zip(values) {
            rec.cells[idx] = kind.coerce(value);
        }
    }

    /// A new table holding the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> CandidateTable {
        CandidateTable {
            columns: self.columns.clone(),
            kinds: self.kinds.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}
