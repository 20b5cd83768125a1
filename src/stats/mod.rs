//! Statistical primitives shared by the functions
//!
//! - [`percentile`]: percentile via partial selection with optional interpolation
//! - [`heap`]: typed selection heap for top/bottom-N functions
//! - [`window`]: ring-buffer windowed statistics, EWMA and Pearson correlation

pub mod heap;
pub mod percentile;
pub mod window;

pub use heap::{select_n, Direction, HeapElement, SelectionHeap};
pub use percentile::{percentile, percentile_of};
pub use window::{pearson, ExpWeightedMean, Windowed};

/// Summary statistic of a series' present values, used as a ranking key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Summary {
    /// Mean of present values
    Average,
    /// Last present value
    Current,
    /// Largest present value
    Max,
    /// Smallest present value
    Min,
    /// Sum of present values
    Total,
}

impl Summary {
    /// Reduce present values; NaN when there are none
    pub fn of<I: IntoIterator<Item = f64>>(&self, values: I) -> f64 {
        let mut count = 0usize;
        let mut acc = f64::NAN;
        for v in values {
            acc = match (self, count) {
                (_, 0) => v,
                (Summary::Average | Summary::Total, _) => acc + v,
                (Summary::Current, _) => v,
                (Summary::Max, _) => acc.max(v),
                (Summary::Min, _) => acc.min(v),
            };
            count += 1;
        }
        match self {
            Summary::Average if count > 0 => acc / count as f64,
            _ => acc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let v = [1.0, 4.0, 2.0];
        assert_eq!(Summary::Average.of(v), 7.0 / 3.0);
        assert_eq!(Summary::Current.of(v), 2.0);
        assert_eq!(Summary::Max.of(v), 4.0);
        assert_eq!(Summary::Min.of(v), 1.0);
        assert_eq!(Summary::Total.of(v), 7.0);
        assert!(Summary::Average.of(std::iter::empty()).is_nan());
    }
}
