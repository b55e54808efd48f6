//! Descriptive statistics over a single numeric column.

/// Quantile `q` (in [0, 1]) with linear interpolation between the two
/// closest ranks. NaN for an empty slice.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    quantile_sorted(&sorted, q)
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// The eight statistics of a `describe()` row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

impl ColumnSummary {
    pub const LABELS: [&'static str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

    /// Summarize the non-null values of a column. An all-null column yields
    /// count 0 and NaN everywhere else.
    pub fn of(values: &[Option<f64>]) -> Self {
        let mut present: Vec<f64> = values.iter().flatten().copied().collect();
        present.sort_by(|a, b| a.total_cmp(b));

        let n = present.len();
        let mean = if n == 0 {
            f64::NAN
        } else {
            present.iter().sum::<f64>() / n as f64
        };
        let std = if n < 2 {
            f64::NAN
        } else {
            let ss: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        };

        ColumnSummary {
            count: n,
            mean,
            std,
            min: present.first().copied().unwrap_or(f64::NAN),
            q25: quantile_sorted(&present, 0.25),
            q50: quantile_sorted(&present, 0.50),
            q75: quantile_sorted(&present, 0.75),
            max: present.last().copied().unwrap_or(f64::NAN),
        }
    }

    /// Values in the order of [`ColumnSummary::LABELS`].
    pub fn values(&self) -> [f64; 8] {
        [
            self.count as f64,
            self.mean,
            self.std,
            self.min,
            self.q25,
            self.q50,
            self.q75,
            self.max,
        ]
    }
}
