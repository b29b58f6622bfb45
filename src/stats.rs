use serde::{Deserialize, Serialize};

/// Running mean, variance and range of a stream of values (Welford's method).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;

        self.min = self.min.min(val);
        self.max = self.max.max(val);
    }

    pub fn report(&self) -> AccumulatorReport {
        let empty = self.n_vals == 0;
        AccumulatorReport {
            n_vals: self.n_vals,
            mean: if empty { f64::NAN } else { self.mean },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
            min: if empty { f64::NAN } else { self.min },
            max: if empty { f64::NAN } else { self.max },
        }
    }
}

/// Fixed-width histogram over `[lo, hi]`; values outside are counted in the
/// edge bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub lo: f64,
    pub hi: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn new(lo: f64, hi: f64, n_bins: usize) -> Self {
        Self {
            lo,
            hi,
            counts: vec![0; n_bins.max(1)],
        }
    }

    pub fn add(&mut self, val: f64) {
        let n_bins = self.counts.len();
        let pos = (val - self.lo) / (self.hi - self.lo) * n_bins as f64;
        let bin = if pos <= 0.0 {
            0
        } else {
            (pos as usize).min(n_bins - 1)
        };
        self.counts[bin] += 1;
    }
}
