use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;

use choose_candidate::config::{
    MULTIPLIER, SPECTRAL_LAG1_MOD_M, SPECTRAL_LAG2_MOD_M, SPECTRAL_MOD_B, SPECTRAL_MOD_M,
    SPECTRAL_SCORE,
};

/// Write a synthetic candidate table in the layout the multiplier search produces.
#[derive(Parser)]
#[command(name = "generate-candidates")]
struct Args {
    /// Output file (.csv or .parquet)
    #[arg(long, default_value = "candidates.csv")]
    output: PathBuf,

    /// Number of candidates
    #[arg(long, default_value = "1000")]
    count: usize,

    /// Seed for the multiplier stream
    #[arg(long, default_value = "42")]
    seed: u64,
}

/// SplitMix64, the stream the multiplier search draws candidates from.
struct SplitMix {
    state: u64,
}

impl SplitMix {
    const GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

    fn new(seed: u64) -> Self {
        SplitMix { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(Self::GAMMA);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform in (0, 1).
    fn next_unit(&mut self) -> f64 {
        ((self.next_u64() >> 11) as f64 + 0.5) / (1u64 << 53) as f64
    }
}

const SPECTRAL_COLUMNS: [&str; 5] = [
    SPECTRAL_SCORE,
    SPECTRAL_MOD_B,
    SPECTRAL_MOD_M,
    SPECTRAL_LAG1_MOD_M,
    SPECTRAL_LAG2_MOD_M,
];

struct Candidates {
    multipliers: Vec<String>,
    /// One vector per entry of `SPECTRAL_COLUMNS`.
    spectral: Vec<Vec<f64>>,
}

fn generate(count: usize, seed: u64) -> Candidates {
    let mut rng = SplitMix::new(seed);
    let mut multipliers = Vec::with_capacity(count);
    let mut spectral = vec![Vec::with_capacity(count); SPECTRAL_COLUMNS.len()];

    for _ in 0..count {
        // The search only considers multipliers with the two top bits set.
        let m = rng.next_u64() | 0xc000_0000_0000_0000;
        multipliers.push(format!("{m:x}"));
        for column in &mut spectral {
            column.push(rng.next_unit());
        }
    }

    Candidates {
        multipliers,
        spectral,
    }
}

fn write_csv(path: &Path, candidates: &Candidates) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    let mut header = vec![MULTIPLIER];
    header.extend(SPECTRAL_COLUMNS);
    writer.write_record(&header)?;

    for (row, m) in candidates.multipliers.iter().enumerate() {
        let mut record = vec![m.clone()];
        record.extend(candidates.spectral.iter().map(|col| col[row].to_string()));
        writer.write_record(&record)?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn write_parquet(path: &Path, candidates: &Candidates) -> Result<()> {
    let mut fields = vec![Field::new(MULTIPLIER, DataType::Utf8, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(
        candidates.multipliers.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
    ))];
    for (name, values) in SPECTRAL_COLUMNS.iter().zip(&candidates.spectral) {
        fields.push(Field::new(*name, DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from(values.clone())));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let candidates = generate(args.count, args.seed);

    let ext = args
        .output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => write_csv(&args.output, &candidates)?,
        "parquet" | "pq" => write_parquet(&args.output, &candidates)?,
        other => bail!("Unsupported output extension: .{other}"),
    }

    println!(
        "Wrote {} candidates to {}",
        args.count,
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitmix_matches_reference_stream() {
        // First outputs of SplitMix64 seeded with 0.
        let mut rng = SplitMix::new(0);
        assert_eq!(rng.next_u64(), 0xe220_a839_7b1d_cdaf);
        assert_eq!(rng.next_u64(), 0x6e78_9e6a_a1b9_65f4);
    }

    #[test]
    fn multipliers_have_top_bits_set() {
        let c = generate(64, 7);
        for m in &c.multipliers {
            assert_eq!(m.len(), 16);
            let v = u64::from_str_radix(m, 16).unwrap();
            assert_eq!(v >> 62, 0b11);
        }
        assert!(c.spectral.iter().flatten().all(|v| *v > 0.0 && *v < 1.0));
    }
}
