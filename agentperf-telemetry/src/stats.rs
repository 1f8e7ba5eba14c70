//! Latency reduction: percentiles, mean and sample standard deviation.

use agentperf_common::TimingStatistics;

/// Pure functions over latency samples in milliseconds.
///
/// Percentiles use linear interpolation between the two nearest ranks:
/// for fraction `f` over `n` sorted values, `index = f * (n - 1)` and the
/// result blends `sorted[floor(index)]` with the next rank by the fractional
/// part. The median is the 0.5 percentile.
#[derive(Debug, Clone, Copy, Default)]
pub struct PercentileEngine;

impl PercentileEngine {
    /// Interpolated percentile of an ascending slice.
    ///
    /// `fraction` is clamped to `[0, 1]`. Returns 0.0 for an empty slice.
    pub fn percentile(sorted: &[f64], fraction: f64) -> f64 {
        let n = sorted.len();
        if n == 0 {
            return 0.0;
        }
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };

        let index = fraction * (n - 1) as f64;
        let lo = index.floor() as usize;
        let hi = (lo + 1).min(n - 1);
        let frac = index - lo as f64;

        let lower = sorted[lo];
        let upper = sorted[hi];
        // Algebraically lower*(1-frac) + upper*frac; may differ in the last
        // bit. Kept inside [lower, upper] so percentiles stay ordered.
        let value = lower + (upper - lower) * frac;
        if lower <= upper {
            value.max(lower).min(upper)
        } else {
            value
        }
    }

    /// Reduce raw samples to summary statistics.
    ///
    /// NaN and infinite samples are dropped and not counted. An input with
    /// no finite samples yields all-zero statistics with `sample_count == 0`.
    /// Standard deviation is the sample form (n - 1) and is 0 for fewer than
    /// two samples.
    pub fn reduce(samples: &[f64]) -> TimingStatistics {
        let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return TimingStatistics::default();
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let min = sorted[0];
        let max = sorted[n - 1];
        let mean = (sorted.iter().sum::<f64>() / n as f64).max(min).min(max);

        let stdev = if n < 2 {
            0.0
        } else {
            let sum_sq: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (sum_sq / (n - 1) as f64).sqrt()
        };

        TimingStatistics {
            sample_count: n as u64,
            mean,
            median: Self::percentile(&sorted, 0.5),
            min,
            max,
            p90: Self::percentile(&sorted, 0.90),
            p95: Self::percentile(&sorted, 0.95),
            p99: Self::percentile(&sorted, 0.99),
            stdev,
        }
    }
}
