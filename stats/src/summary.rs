#![allow(missing_docs)]

use ndarray::{Array1, ArrayView1};
use ndarray_stats::interpolate::Linear;
use ndarray_stats::Quantile1dExt;
use noisy_float::types::N64;
use num_traits::ToPrimitive;
use statrs::statistics::{Data, Median, Statistics};

/// Arithmetic mean, `NaN` when empty.
pub fn mean<T: ToPrimitive + Copy>(values: &[T]) -> f64 {
    values
        .iter()
        .map(|v| v.to_f64().unwrap_or(f64::NAN))
        .mean()
}

/// Sum of squared deviations from the mean.
pub fn sum_sq_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum()
}

/// Variance with `ddof` delta degrees of freedom. `NaN` when
/// `values.len() <= ddof`.
pub fn variance(values: &[f64], ddof: usize) -> f64 {
    if values.len() <= ddof {
        return f64::NAN;
    }
    ArrayView1::from(values).var(ddof as f64)
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    Data::new(values.to_vec()).median()
}

/// Percentile `q` in `[0, 100]` using linear interpolation between the
/// closest ranks. `NaN` when empty or when any value is `NaN`.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    let (Some(mut values), Some(q)) = (
        values.iter().map(|&v| N64::try_new(v)).collect::<Option<Array1<N64>>>(),
        N64::try_new((q / 100.0).clamp(0.0, 1.0)),
    ) else {
        return f64::NAN;
    };
    values.quantile_mut(q, &Linear).map_or(f64::NAN, N64::raw)
}

/// `num` evenly spaced values over `[start, stop]`, both ends included.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| {
                    if i == num - 1 {
                        stop
                    } else {
                        start + step * i as f64
                    }
                })
                .collect()
        }
    }
}
