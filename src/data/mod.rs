/// Data layer: core types and loading.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → CandidateTable
///   └──────────┘
///        │
///        ▼
///   ┌────────────────┐
///   │ CandidateTable  │  column names, Vec<CandidateRecord>
///   └────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  quantile cutoffs → rows meeting every cutoff
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
