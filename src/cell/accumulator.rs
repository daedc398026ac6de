//! NaN-skipping weighted accumulators
//!
//! Every accumulator ignores samples whose value or weight is `NaN` and
//! combines to `NaN` while nothing has been accumulated.

/// Running weighted statistic over a stream of samples
pub trait NumberAccumulator: Send {
    fn accumulate(&mut self, value: f64, weight: f64);

    /// Number of samples accepted so far
    fn sample_count(&self) -> usize;

    fn combine(&self) -> f64;

    fn accumulate_unweighted(&mut self, value: f64) {
        self.accumulate(value, 1.0);
    }
}

fn accepts(value: f64, weight: f64) -> bool {
    !value.is_nan() && !weight.is_nan()
}

/// Weighted arithmetic mean `Σ(x·w) / Σw`
#[derive(Debug, Clone, Default)]
pub struct ArithmeticMean {
    sum_xw: f64,
    sum_w: f64,
    count: usize,
}

impl NumberAccumulator for ArithmeticMean {
    fn accumulate(&mut self, value: f64, weight: f64) {
        if !accepts(value, weight) {
            return;
        }
        self.sum_xw += value * weight;
        self.sum_w += weight;
        self.count += 1;
    }

    fn sample_count(&self) -> usize {
        self.count
    }

    fn combine(&self) -> f64 {
        if self.count == 0 || self.sum_w == 0.0 {
            return f64::NAN;
        }
        self.sum_xw / self.sum_w
    }
}

/// Uncertainty of a weighted mean of independent errors, `sqrt(Σ(x·w)²) / Σw`
#[derive(Debug, Clone, Default)]
pub struct WeightedUncertainty {
    sum_xw_sq: f64,
    sum_w: f64,
    count: usize,
}

impl NumberAccumulator for WeightedUncertainty {
    fn accumulate(&mut self, value: f64, weight: f64) {
        if !accepts(value, weight) {
            return;
        }
        let xw = value * weight;
        self.sum_xw_sq += xw * xw;
        self.sum_w += weight;
        self.count += 1;
    }

    fn sample_count(&self) -> usize {
        self.count
    }

    fn combine(&self) -> f64 {
        if self.count == 0 || self.sum_w == 0.0 {
            return f64::NAN;
        }
        self.sum_xw_sq.sqrt() / self.sum_w
    }
}
