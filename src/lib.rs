//! Filter and rank 64-bit generator multipliers by spectral-test percentiles.
//!
//! ```no_run
//! use std::path::Path;
//! use choose_candidate::{config::Preset, data::loader, pipeline, report};
//!
//! let config = Preset::Lagged.config();
//! let table = loader::load_file(Path::new("candidates.csv"), &config.text_columns())?;
//! let outcome = pipeline::run(table, &config)?;
//! println!("{}", report::summary(&outcome.table)?);
//! println!("{}", report::ranked(&outcome)?);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod stats;
