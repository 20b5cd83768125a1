//! Triple exponential smoothing
//!
//! Level, trend and seasonal components are updated per sample with fixed
//! smoothing factors. An absent sample breaks the recurrence: its prediction
//! is still emitted, but level restarts from the next present sample.

/// Level smoothing factor
pub const ALPHA: f64 = 0.1;
/// Trend smoothing factor
pub const BETA: f64 = 0.0035;
/// Seasonal and deviation smoothing factor
pub const GAMMA: f64 = 0.1;

/// Smallest usable season length in samples
const MIN_SEASON_LENGTH: usize = 2;

/// Per-sample predictions and smoothed absolute deviations
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// One-step-ahead prediction for each sample (NaN when unknown)
    pub predictions: Vec<f64>,
    /// Seasonal deviation for each sample
    pub deviations: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
struct Components {
    intercept: f64,
    slope: f64,
    seasonal: f64,
    deviation: f64,
}

/// Run the analysis over `series` (absent samples as NaN)
///
/// Season length is `seasonality / step`, at least two samples.
pub fn analyze(series: &[f64], step: i64, seasonality: i64) -> Analysis {
    let season = ((seasonality / step.max(1)) as usize).max(MIN_SEASON_LENGTH);

    let mut history: Vec<Components> = Vec::with_capacity(series.len());
    let mut predictions = Vec::with_capacity(series.len());
    let mut next_prediction = f64::NAN;

    let seasonal_at = |h: &[Components], i: usize| -> f64 {
        i.checked_sub(season).map_or(0.0, |j| h[j].seasonal)
    };
    let deviation_at = |h: &[Components], i: usize| -> f64 {
        i.checked_sub(season).map_or(0.0, |j| h[j].deviation)
    };

    for (i, &actual) in series.iter().enumerate() {
        if actual.is_nan() {
            history.push(Components {
                intercept: f64::NAN,
                slope: 0.0,
                seasonal: 0.0,
                deviation: 0.0,
            });
            predictions.push(next_prediction);
            next_prediction = f64::NAN;
            continue;
        }

        let (last_intercept, last_slope, prediction) = match history.last() {
            None => (actual, 0.0, actual),
            Some(prev) if prev.intercept.is_nan() => (actual, prev.slope, next_prediction),
            Some(prev) => (prev.intercept, prev.slope, next_prediction),
        };

        let last_seasonal = seasonal_at(&history, i);
        let next_last_seasonal = seasonal_at(&history, i + 1);
        let last_deviation = deviation_at(&history, i);

        let intercept = ALPHA * (actual - last_seasonal) + (1.0 - ALPHA) * (last_intercept + last_slope);
        let slope = BETA * (intercept - last_intercept) + (1.0 - BETA) * last_slope;
        let seasonal = GAMMA * (actual - intercept) + (1.0 - GAMMA) * last_seasonal;
        let base = if prediction.is_nan() { 0.0 } else { prediction };
        let deviation = GAMMA * (actual - base).abs() + (1.0 - GAMMA) * last_deviation;

        next_prediction = intercept + slope + next_last_seasonal;

        history.push(Components {
            intercept,
            slope,
            seasonal,
            deviation,
        });
        predictions.push(prediction);
    }

    Analysis {
        predictions,
        deviations: history.iter().map(|c| c.deviation).collect(),
    }
}

/// Drop the bootstrap prefix when the series is long enough to hold it
pub fn trim_bootstrap<T: Clone>(values: &[T], bootstrap_points: usize) -> Vec<T> {
    if values.len() < bootstrap_points {
        values.to_vec()
    } else {
        values[bootstrap_points..].to_vec()
    }
}

/// Lower and upper confidence bands, `prediction ∓ delta·deviation`
///
/// Only the part after the bootstrap window is returned.
pub fn confidence_bands(
    series: &[f64],
    step: i64,
    delta: f64,
    bootstrap: i64,
    seasonality: i64,
) -> (Vec<f64>, Vec<f64>) {
    let analysis = analyze(series, step, seasonality);
    let points = (bootstrap / step.max(1)) as usize;
    let predictions = trim_bootstrap(&analysis.predictions, points);
    let deviations = trim_bootstrap(&analysis.deviations, points);

    predictions
        .iter()
        .zip(deviations.iter())
        .map(|(p, d)| {
            if p.is_nan() || d.is_nan() {
                (f64::NAN, f64::NAN)
            } else {
                (p - delta * d, p + delta * d)
            }
        })
        .unzip()
}
