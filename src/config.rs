use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{CandidateError, Result};

pub const MULTIPLIER: &str = "Multiplier";
pub const PERIOD: &str = "Period";
pub const SPECTRAL_SCORE: &str = "Spectral score";
pub const SPECTRAL_MOD_B: &str = "Spectral mod B";
pub const SPECTRAL_MOD_M: &str = "Spectral mod M";
pub const SPECTRAL_LAG1_MOD_M: &str = "Spectral lag-1 mod M";
pub const SPECTRAL_LAG2_MOD_M: &str = "Spectral lag-2 mod M";
pub const SPECTRAL: &str = "Spectral";
pub const SCORE: &str = "Score";

pub const DEFAULT_TOP_N: usize = 50;

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

/// Keep rows whose `column` is at least the `quantile` of that column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Threshold {
    pub column: String,
    pub quantile: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightedTerm {
    pub column: String,
    pub weight: f64,
}

/// Weighted sum of spectral columns, then multiplied by the period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Blend {
    /// Receives `Σ weight · column`.
    pub output_column: String,
    /// Receives `output_column · Period`.
    pub score_column: String,
    pub terms: Vec<WeightedTerm>,
}

/// Everything that distinguishes one filter-and-rank run from another.
///
/// Fields missing from a JSON config fall back to the
/// [`Preset::SpectralScore`] values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Hex-encoded multiplier column, kept as text when loading.
    pub multiplier_column: String,
    /// Receives the derived period.
    pub period_column: String,
    /// All quantiles are taken on the deduplicated table before any
    /// row is dropped.
    pub thresholds: Vec<Threshold>,
    pub blend: Option<Blend>,
    pub rank_by: String,
    pub top_n: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Preset::SpectralScore.config()
    }
}

impl PipelineConfig {
    /// A config with no thresholds, no blend, ranked by period.
    pub fn empty() -> Self {
        PipelineConfig {
            multiplier_column: MULTIPLIER.to_string(),
            period_column: PERIOD.to_string(),
            thresholds: Vec::new(),
            blend: None,
            rank_by: PERIOD.to_string(),
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn with_threshold(mut self, column: &str, quantile: f64) -> Self {
        self.thresholds.push(Threshold {
            column: column.to_string(),
            quantile,
        });
        self
    }

    pub fn with_blend(mut self, output_column: &str, score_column: &str, terms: &[(&str, f64)]) -> Self {
        self.blend = Some(Blend {
            output_column: output_column.to_string(),
            score_column: score_column.to_string(),
            terms: terms
                .iter()
                .map(|&(column, weight)| WeightedTerm {
                    column: column.to_string(),
                    weight,
                })
                .collect(),
        });
        self
    }

    pub fn ranked_by(mut self, column: &str) -> Self {
        self.rank_by = column.to_string();
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Read a JSON config file.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Columns the loader must keep as raw text.
    pub fn text_columns(&self) -> Vec<String> {
        vec![self.multiplier_column.clone()]
    }

    pub fn validate(&self) -> Result<()> {
        for t in &self.thresholds {
            if !(0.0..=1.0).contains(&t.quantile) {
                return Err(CandidateError::InvalidConfig(format!(
                    "quantile {} for '{}' is outside [0, 1]",
                    t.quantile, t.column
                )));
            }
        }
        if self.top_n == 0 {
            return Err(CandidateError::InvalidConfig("top_n must be positive".into()));
        }
        if let Some(blend) = &self.blend {
            if blend.terms.is_empty() {
                return Err(CandidateError::InvalidConfig("blend has no terms".into()));
            }
            if let Some(bad) = blend.terms.iter().find(|t| !t.weight.is_finite()) {
                return Err(CandidateError::InvalidConfig(format!(
                    "weight for '{}' is not finite",
                    bad.column
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// The three filter policies the ranker ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// `Spectral score` ≥ 95th percentile, ranked by period.
    SpectralScore,
    /// `Spectral mod B` and `Spectral mod M` ≥ 95th percentile, ranked by period.
    Modular,
    /// mod B, lag-1 and lag-2 ≥ 75th percentile, ranked by blended score.
    Lagged,
}

impl Preset {
    pub const NAMES: [&'static str; 3] = ["spectral-score", "modular", "lagged"];

    pub fn config(self) -> PipelineConfig {
        let base = PipelineConfig::empty();
        match self {
            Preset::SpectralScore => base.with_threshold(SPECTRAL_SCORE, 0.95),
            Preset::Modular => base
                .with_threshold(SPECTRAL_MOD_B, 0.95)
                .with_threshold(SPECTRAL_MOD_M, 0.95),
            Preset::Lagged => base
                .with_threshold(SPECTRAL_MOD_B, 0.75)
                .with_threshold(SPECTRAL_LAG1_MOD_M, 0.75)
                .with_threshold(SPECTRAL_LAG2_MOD_M, 0.75)
                .with_blend(
                    SPECTRAL,
                    SCORE,
                    &[
                        (SPECTRAL_MOD_B, 0.4),
                        (SPECTRAL_LAG1_MOD_M, 0.4),
                        (SPECTRAL_LAG2_MOD_M, 0.2),
                    ],
                )
                .ranked_by(SCORE),
        }
    }
}

impl FromStr for Preset {
    type Err = CandidateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "spectral-score" => Ok(Preset::SpectralScore),
            "modular" => Ok(Preset::Modular),
            "lagged" => Ok(Preset::Lagged),
            other => Err(CandidateError::InvalidConfig(format!(
                "unknown preset '{other}', expected one of {}",
                Preset::NAMES.join(", ")
            ))),
        }
    }
}
