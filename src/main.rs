use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use choose_candidate::config::{PipelineConfig, Preset};
use choose_candidate::data::loader;
use choose_candidate::{pipeline, report};

#[derive(Parser)]
#[command(name = "choose-candidate")]
#[command(about = "Filter candidate multipliers by spectral percentiles and rank them")]
#[command(version)]
struct Cli {
    /// Candidate table (.csv, .json or .parquet)
    #[arg(long, default_value = "candidates.csv")]
    input: PathBuf,

    /// Filter policy: spectral-score (default), modular, lagged
    #[arg(long, default_value = "spectral-score", value_parser = Preset::NAMES)]
    preset: String,

    /// JSON pipeline config; replaces --preset
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of ranked rows to print
    #[arg(long)]
    top: Option<usize>,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => self.preset.parse::<Preset>()?.config(),
        };
        if let Some(top) = self.top {
            config.top_n = top;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.pipeline_config()?;
    info!("running with {config:?}");

    let table = loader::load_file(&cli.input, &config.text_columns())?;
    let outcome = pipeline::run(table, &config).context("filtering candidates")?;

    println!("{}", report::summary(&outcome.table)?);
    println!("{}", report::ranked(&outcome)?);
    Ok(())
}
