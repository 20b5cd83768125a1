//! Fixed-size windowed statistics
//!
//! [`Windowed`] is a ring buffer that keeps a running sum, sum of squares and
//! NaN count so that `push`, `mean` and `stdev` are O(1). Absent samples are
//! pushed as NaN and do not contribute.
//!
//! `stdev` uses the single-pass identity `sqrt(n·Σx² − (Σx)²) / n`. It is not
//! the numerically stable two-pass form; the output matches Graphite's
//! reference implementation bit for bit and must stay this way.

/// Ring buffer of the last `capacity` samples
#[derive(Debug, Clone)]
pub struct Windowed {
    data: Vec<f64>,
    head: usize,
    sum: f64,
    sum_sq: f64,
    nans: usize,
}

impl Windowed {
    /// Create an empty window; every slot starts out as NaN
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: vec![f64::NAN; capacity],
            head: 0,
            sum: 0.0,
            sum_sq: 0.0,
            nans: capacity,
        }
    }

    /// Push a sample, evicting the oldest one
    pub fn push(&mut self, v: f64) {
        let old = self.data[self.head];
        self.data[self.head] = v;
        self.head = (self.head + 1) % self.data.len();

        if old.is_nan() {
            self.nans -= 1;
        } else {
            self.sum -= old;
            self.sum_sq -= old * old;
        }

        if v.is_nan() {
            self.nans += 1;
        } else {
            self.sum += v;
            self.sum_sq += v * v;
        }
    }

    /// Window capacity
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of non-NaN samples in the window
    pub fn len(&self) -> usize {
        self.data.len() - self.nans
    }

    /// True when no non-NaN sample is held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of non-NaN samples
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Mean of non-NaN samples (NaN when empty)
    pub fn mean(&self) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        self.sum / self.len() as f64
    }

    /// Population standard deviation, single-pass formula
    pub fn stdev(&self) -> f64 {
        let l = self.len();
        if l == 0 {
            return 0.0;
        }
        let n = l as f64;
        (n * self.sum_sq - self.sum * self.sum).sqrt() / n
    }

    /// Raw slot contents in ring order
    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

/// Exponentially weighted moving mean
///
/// The first sample seeds the mean; afterwards `m = α·x + (1 − α)·m`.
#[derive(Debug, Clone)]
pub struct ExpWeightedMean {
    alpha: f64,
    mean: Option<f64>,
}

impl ExpWeightedMean {
    /// Create with smoothing factor `alpha`
    pub fn new(alpha: f64) -> Self {
        Self { alpha, mean: None }
    }

    /// Fold a sample in
    pub fn push(&mut self, v: f64) {
        self.mean = Some(match self.mean {
            None => v,
            Some(m) => self.alpha * v + (1.0 - self.alpha) * m,
        });
    }

    /// Current mean (NaN before the first sample)
    pub fn mean(&self) -> f64 {
        self.mean.unwrap_or(f64::NAN)
    }
}

/// Pearson correlation of two equally long windows
///
/// An index is used only when both sides hold a number. Zero variance on
/// either side yields NaN.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());

    let pairs = || {
        a.iter()
            .zip(b.iter())
            .filter(|(x, y)| !x.is_nan() && !y.is_nan())
    };

    let (mut abar, mut bbar, mut n) = (0.0, 0.0, 0usize);
    for (x, y) in pairs() {
        abar += x;
        bbar += y;
        n += 1;
    }
    if n == 0 {
        return f64::NAN;
    }
    abar /= n as f64;
    bbar /= n as f64;

    let (mut numerator, mut sum_aa, mut sum_bb) = (0.0, 0.0, 0.0);
    for (x, y) in pairs() {
        numerator += (x - abar) * (y - bbar);
        sum_aa += (x - abar) * (x - abar);
        sum_bb += (y - bbar) * (y - bbar);
    }

    let denominator = sum_aa.sqrt() * sum_bb.sqrt();
    if denominator == 0.0 {
        return f64::NAN;
    }
    numerator / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_evicts_oldest() {
        let mut w = Windowed::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            w.push(v);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.sum(), 9.0);
        assert_eq!(w.mean(), 3.0);
    }

    #[test]
    fn test_window_nan_tracking() {
        let mut w = Windowed::new(3);
        w.push(1.0);
        w.push(f64::NAN);
        assert_eq!(w.len(), 1);
        w.push(3.0);
        w.push(5.0); // evicts 1.0
        assert_eq!(w.len(), 2);
        assert_eq!(w.sum(), 8.0);
        w.push(f64::NAN); // evicts NaN
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn test_stdev_single_pass() {
        let mut w = Windowed::new(4);
        for v in [2.0, 4.0, 4.0, 4.0] {
            w.push(v);
        }
        // population stdev of [2,4,4,4] = sqrt(0.75)
        assert!((w.stdev() - 0.75f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_stdev_empty_is_zero() {
        let w = Windowed::new(4);
        assert_eq!(w.stdev(), 0.0);
        assert!(w.mean().is_nan());
    }

    #[test]
    fn test_ewma() {
        let mut e = ExpWeightedMean::new(0.5);
        assert!(e.mean().is_nan());
        e.push(10.0);
        assert_eq!(e.mean(), 10.0);
        e.push(20.0);
        assert_eq!(e.mean(), 15.0);
    }

    #[test]
    fn test_pearson_perfect() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-12);

        let c = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&a, &c) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_ignores_unpaired() {
        let a = [1.0, f64::NAN, 3.0, 4.0];
        let b = [2.0, 100.0, 6.0, 8.0];
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_zero_variance() {
        let a = [1.0, 1.0, 1.0];
        let b = [1.0, 2.0, 3.0];
        assert!(pearson(&a, &b).is_nan());
    }
}
