//! Bounded cross-correlation alignment
//!
//! The lag is estimated on a short analysis window taken from the start of both
//! series, restricted to `±max_delay_ms`, and then applied to the full-length
//! series. Positive lag means the target is delayed relative to the reference.

use crate::downmix::MonoSeries;
use crate::{Result, ValidateError};
use num_complex::Complex64;
use realfft::RealFftPlanner;

/// Default length of the lag-estimation window
pub const DEFAULT_ANALYSIS_WINDOW_SECS: f64 = 5.0;

/// Correlation values within this fraction of the peak count as ties
const TIE_TOLERANCE: f64 = 1e-12;

/// Absorbs rounding in `rate * ms / 1000` so an exact sample period maps to one lag
const SAMPLE_EPSILON: f64 = 1e-9;

/// Delay-compensated pair, always of identical length
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentResult {
    lag: i64,
    reference: MonoSeries,
    target: MonoSeries,
}

impl AlignmentResult {
    /// Build from already-compensated series, truncating both to the shorter one
    pub fn new(lag: i64, reference: &[f64], target: &[f64]) -> Self {
        let len = reference.len().min(target.len());
        Self {
            lag,
            reference: MonoSeries::from(&reference[..len]),
            target: MonoSeries::from(&target[..len]),
        }
    }

    /// Estimated lag in samples
    pub fn lag(&self) -> i64 {
        self.lag
    }

    pub fn reference(&self) -> &[f64] {
        self.reference.as_slice()
    }

    pub fn target(&self) -> &[f64] {
        self.target.as_slice()
    }

    /// Length of each aligned series
    pub fn len(&self) -> usize {
        self.reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }
}

/// Lag estimator
#[derive(Debug, Clone)]
pub struct Aligner {
    max_delay_ms: f64,
    analysis_window_secs: f64,
}

impl Aligner {
    pub fn new(max_delay_ms: f64) -> Self {
        Self {
            max_delay_ms,
            analysis_window_secs: DEFAULT_ANALYSIS_WINDOW_SECS,
        }
    }

    /// Builder: set the lag-estimation window length
    pub fn with_analysis_window(mut self, secs: f64) -> Self {
        self.analysis_window_secs = secs;
        self
    }

    /// Largest lag magnitude searched, in samples at `sample_rate`
    pub fn max_lag_samples(&self, sample_rate: u32) -> Result<usize> {
        let samples = sample_rate as f64 * self.max_delay_ms / 1000.0;
        if !samples.is_finite() || samples + SAMPLE_EPSILON < 1.0 {
            return Err(ValidateError::AlignmentWindow {
                max_delay_ms: self.max_delay_ms,
                sample_rate,
            });
        }
        // Saturate far below usize::MAX so the bound survives the i64 lag domain
        Ok((samples + SAMPLE_EPSILON).floor().min(i64::MAX as f64) as usize)
    }

    /// Number of leading samples used for lag estimation
    pub fn analysis_window_samples(&self, sample_rate: u32) -> Result<usize> {
        if !self.analysis_window_secs.is_finite() || self.analysis_window_secs <= 0.0 {
            return Err(ValidateError::Config(format!(
                "analysis window must be a positive number of seconds, got {}",
                self.analysis_window_secs
            )));
        }
        let samples = (sample_rate as f64 * self.analysis_window_secs) as usize;
        if samples == 0 {
            return Err(ValidateError::Config(format!(
                "analysis window of {} s is shorter than one sample at {} Hz",
                self.analysis_window_secs, sample_rate
            )));
        }
        Ok(samples)
    }

    /// Estimate the lag between the two series and compensate it
    pub fn align(
        &self,
        reference: &MonoSeries,
        target: &MonoSeries,
        sample_rate: u32,
    ) -> Result<AlignmentResult> {
        let lag = self.estimate_lag(reference.as_slice(), target.as_slice(), sample_rate)?;
        let (aligned_ref, aligned_tgt) = compensate(reference.as_slice(), target.as_slice(), lag);
        let result = AlignmentResult::new(lag, aligned_ref, aligned_tgt);

        if result.is_empty() {
            log::warn!(
                "Lag {} leaves no overlap (reference {} samples, target {} samples)",
                lag,
                reference.len(),
                target.len()
            );
        }

        Ok(result)
    }

    /// Lag with the highest cross-correlation inside the search window
    pub fn estimate_lag(&self, reference: &[f64], target: &[f64], sample_rate: u32) -> Result<i64> {
        let max_lag = self.max_lag_samples(sample_rate)?;
        let window = self.analysis_window_samples(sample_rate)?;

        let n = reference.len().min(target.len()).min(window);
        if n == 0 {
            return Ok(0);
        }

        let correlation = cross_correlate(&target[..n], &reference[..n])?;
        let first_lag = -(n as i64 - 1);
        // No lag can exceed the overlap, so the bound never needs more than n - 1
        let bound = max_lag.min(n - 1) as i64;
        let lag = select_lag(&correlation, first_lag, bound).ok_or(
            ValidateError::AlignmentWindow {
                max_delay_ms: self.max_delay_ms,
                sample_rate,
            },
        )?;

        log::debug!(
            "Alignment: lag {} samples (window {} samples, search ±{} samples)",
            lag,
            n,
            max_lag
        );

        Ok(lag)
    }
}

/// Full cross-correlation `c[k] = Σ target[n + k] · reference[n]`
///
/// Index `i` holds lag `i - (reference.len() - 1)`, covering
/// `-(reference.len() - 1) ..= target.len() - 1`.
pub fn cross_correlate(target: &[f64], reference: &[f64]) -> Result<Vec<f64>> {
    if target.is_empty() || reference.is_empty() {
        return Ok(Vec::new());
    }

    let out_len = target.len() + reference.len() - 1;
    let fft_size = out_len.next_power_of_two().max(2);

    let mut planner = RealFftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(fft_size);
    let inverse = planner.plan_fft_inverse(fft_size);

    let spectrum_of = |samples: &[f64]| -> Result<Vec<Complex64>> {
        let mut input = vec![0.0; fft_size];
        input[..samples.len()].copy_from_slice(samples);
        let mut spectrum = vec![Complex64::new(0.0, 0.0); fft_size / 2 + 1];
        forward
            .process(&mut input, &mut spectrum)
            .map_err(|e| ValidateError::Fft(e.to_string()))?;
        Ok(spectrum)
    };

    let tgt_spec = spectrum_of(target)?;
    let ref_spec = spectrum_of(reference)?;

    let mut product: Vec<Complex64> = tgt_spec
        .iter()
        .zip(&ref_spec)
        .map(|(t, r)| t * r.conj())
        .collect();
    // DC and Nyquist bins of a real signal carry no imaginary part
    let last = product.len() - 1;
    product[0].im = 0.0;
    product[last].im = 0.0;

    let mut circular = vec![0.0; fft_size];
    inverse
        .process(&mut product, &mut circular)
        .map_err(|e| ValidateError::Fft(e.to_string()))?;

    let scale = 1.0 / fft_size as f64;
    let negative = reference.len() - 1;
    let correlation = (0..out_len)
        .map(|i| {
            let lag = i as i64 - negative as i64;
            let idx = if lag < 0 {
                (fft_size as i64 + lag) as usize
            } else {
                lag as usize
            };
            circular[idx] * scale
        })
        .collect();

    Ok(correlation)
}

/// Pick the best lag within `±max_abs_lag`
///
/// `values[i]` belongs to lag `first_lag + i`. Near-ties go to the smallest |lag|,
/// then to the negative side. `None` when no lag falls inside the window.
pub(crate) fn select_lag(values: &[f64], first_lag: i64, max_abs_lag: i64) -> Option<i64> {
    if values.is_empty() {
        return None;
    }

    let lo = first_lag.max(-max_abs_lag);
    let hi = (first_lag + values.len() as i64 - 1).min(max_abs_lag);
    if lo > hi {
        return None;
    }

    let candidates = || (lo..=hi).map(|lag| (lag, values[(lag - first_lag) as usize]));

    let peak = candidates()
        .map(|(_, v)| v)
        .filter(|v| !v.is_nan())
        .fold(f64::NEG_INFINITY, f64::max);

    if !peak.is_finite() {
        return Some(0.clamp(lo, hi));
    }

    let threshold = peak - peak.abs() * TIE_TOLERANCE;
    candidates()
        .filter(|&(_, v)| v >= threshold)
        .min_by_key(|&(lag, _)| (lag.unsigned_abs(), lag > 0))
        .map(|(lag, _)| lag)
}

/// Drop the samples the lag pushes outside the common overlap
fn compensate<'a>(reference: &'a [f64], target: &'a [f64], lag: i64) -> (&'a [f64], &'a [f64]) {
    let shift = lag.unsigned_abs() as usize;
    match lag.signum() {
        1 => (
            &reference[..reference.len().saturating_sub(shift)],
            &target[shift.min(target.len())..],
        ),
        -1 => (
            &reference[shift.min(reference.len())..],
            &target[..target.len().saturating_sub(shift)],
        ),
        _ => (reference, target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{delay, log_sweep};
    use crate::metrics::pearson;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    fn naive_cross_correlate(target: &[f64], reference: &[f64]) -> Vec<f64> {
        let first = -(reference.len() as i64 - 1);
        let last = target.len() as i64 - 1;
        (first..=last)
            .map(|k| {
                reference
                    .iter()
                    .enumerate()
                    .filter_map(|(n, r)| {
                        let idx = n as i64 + k;
                        (idx >= 0 && (idx as usize) < target.len())
                            .then(|| target[idx as usize] * r)
                    })
                    .sum()
            })
            .collect()
    }

    fn random_series(len: usize, seed: u64) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..len).map(|_| rng.random::<f64>() * 2.0 - 1.0).collect()
    }

    #[test]
    fn test_cross_correlate_matches_direct_sum() {
        let target = random_series(37, 1);
        let reference = random_series(23, 2);

        let fast = cross_correlate(&target, &reference).unwrap();
        let slow = naive_cross_correlate(&target, &reference);

        assert_eq!(fast.len(), slow.len());
        for (a, b) in fast.iter().zip(&slow) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn test_recovers_known_delay() {
        let reference = log_sweep(20.0, 20000.0, 48000, 1.0, 0.5);
        let target = delay(&reference, 300);

        let result = Aligner::new(50.0)
            .align(&reference.clone().into(), &target.into(), 48000)
            .unwrap();

        assert_eq!(result.lag(), 300);
        assert_eq!(result.len(), reference.len() - 300);
        assert!((pearson(result.reference(), result.target()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_recovers_negative_delay() {
        let reference = delay(&log_sweep(20.0, 20000.0, 44100, 0.5, 0.5), 150);
        let target = log_sweep(20.0, 20000.0, 44100, 0.5, 0.5);

        let lag = Aligner::new(50.0)
            .estimate_lag(&reference, &target, 44100)
            .unwrap();
        assert_eq!(lag, -150);
    }

    #[test]
    fn test_lag_outside_window_not_selected() {
        let reference = log_sweep(20.0, 3500.0, 8000, 0.5, 0.5);
        let target = delay(&reference, 80);

        // Unconstrained direct search finds the true delay
        let n = reference.len().min(target.len());
        let full = naive_cross_correlate(&target[..n], &reference[..n]);
        let unconstrained = full
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i as i64 - (n as i64 - 1))
            .unwrap();
        assert_eq!(unconstrained, 80);

        // 5 ms at 8 kHz = 40 samples
        let aligner = Aligner::new(5.0);
        let constrained = aligner
            .align(&reference.clone().into(), &target.clone().into(), 8000)
            .unwrap();
        assert_ne!(constrained.lag(), 80);
        assert!(constrained.lag().abs() <= 40);

        let wide = Aligner::new(50.0)
            .align(&reference.into(), &target.into(), 8000)
            .unwrap();
        assert_eq!(wide.lag(), 80);
        assert!(
            pearson(constrained.reference(), constrained.target())
                < pearson(wide.reference(), wide.target())
        );
    }

    #[test]
    fn test_huge_delay_window_searches_whole_overlap() {
        let reference = log_sweep(20.0, 3500.0, 8000, 0.5, 0.5);
        let target = delay(&reference, 80);

        let aligner = Aligner::new(1e300);
        assert!(aligner.max_lag_samples(8000).unwrap() as u64 <= i64::MAX as u64);

        let lag = aligner.estimate_lag(&reference, &target, 8000).unwrap();
        assert_eq!(lag, 80);
    }

    #[test]
    fn test_analysis_window_below_one_sample_is_error() {
        let reference = log_sweep(20.0, 3500.0, 8000, 0.5, 0.5);
        let target = delay(&reference, 80);

        let result = Aligner::new(50.0)
            .with_analysis_window(1e-5)
            .estimate_lag(&reference, &target, 8000);
        assert!(matches!(result, Err(ValidateError::Config(_))));

        // One and a half samples truncate to one, which is enough to run
        let one_sample = Aligner::new(50.0).with_analysis_window(1.5 / 8000.0);
        assert_eq!(one_sample.analysis_window_samples(8000).unwrap(), 1);
    }

    #[test]
    fn test_window_below_one_sample_is_error() {
        let series: MonoSeries = vec![0.1, 0.2, 0.3].into();
        let err = Aligner::new(0.01)
            .align(&series, &series, 48000)
            .unwrap_err();
        assert!(matches!(
            err,
            ValidateError::AlignmentWindow {
                sample_rate: 48000,
                ..
            }
        ));

        assert!(Aligner::new(-5.0).max_lag_samples(48000).is_err());
        assert!(Aligner::new(f64::NAN).max_lag_samples(48000).is_err());
    }

    #[test]
    fn test_one_sample_period_is_one_lag() {
        let aligner = Aligner::new(1000.0 / 48000.0);
        assert_eq!(aligner.max_lag_samples(48000).unwrap(), 1);
        assert_eq!(Aligner::new(50.0).max_lag_samples(48000).unwrap(), 2400);
        assert_eq!(Aligner::new(50.0).max_lag_samples(44100).unwrap(), 2205);
    }

    #[test]
    fn test_tie_prefers_smallest_magnitude() {
        // lags -2..=2
        assert_eq!(select_lag(&[1.0, 3.0, 2.0, 3.0, 1.0], -2, 2), Some(-1));
        assert_eq!(select_lag(&[3.0, 0.0, 3.0, 0.0, 0.0], -2, 2), Some(0));
        assert_eq!(select_lag(&[0.0, 0.0, 1.0, 0.0, 5.0], -2, 2), Some(2));
        // Ties beyond the window are ignored
        assert_eq!(select_lag(&[9.0, 1.0, 1.0, 1.0, 9.0], -2, 1), Some(0));
        // Differences far below the tolerance still count as ties
        assert_eq!(select_lag(&[1.0, 1.0 + 1e-15, 1.0], -1, 1), Some(0));
    }

    #[test]
    fn test_select_lag_edge_cases() {
        assert_eq!(select_lag(&[], 0, 10), None);
        assert_eq!(select_lag(&[0.0; 5], -2, 2), Some(0));
        assert_eq!(select_lag(&[f64::NAN; 3], -1, 1), Some(0));
        // Window entirely to the right of zero
        assert_eq!(select_lag(&[f64::NAN, f64::NAN], 3, 10), Some(3));
    }

    #[test]
    fn test_zero_lag_keeps_series() {
        let series = log_sweep(100.0, 7000.0, 16000, 0.25, 0.3);
        let result = Aligner::new(50.0)
            .align(&series.clone().into(), &series.clone().into(), 16000)
            .unwrap();

        assert_eq!(result.lag(), 0);
        assert_eq!(result.reference(), series.as_slice());
        assert_eq!(result.target(), series.as_slice());
    }

    #[test]
    fn test_compensation_directions() {
        let reference = [1.0, 2.0, 3.0, 4.0, 5.0];
        let target = [0.0, 0.0, 1.0, 2.0, 3.0, 4.0];

        let (r, t) = compensate(&reference, &target, 2);
        assert_eq!(r, &[1.0, 2.0, 3.0]);
        assert_eq!(t, &[1.0, 2.0, 3.0, 4.0]);

        let (r, t) = compensate(&reference, &target, -1);
        assert_eq!(r, &[2.0, 3.0, 4.0, 5.0]);
        assert_eq!(t, &[0.0, 0.0, 1.0, 2.0, 3.0]);

        let result = AlignmentResult::new(2, r, t);
        assert_eq!(result.reference().len(), result.target().len());
    }

    #[test]
    fn test_lag_beyond_length_leaves_empty_overlap() {
        let reference = [1.0, 2.0, 3.0];
        let target = [1.0, 2.0, 3.0, 4.0];

        let (r, t) = compensate(&reference, &target, 5);
        let result = AlignmentResult::new(5, r, t);
        assert!(result.is_empty());
        assert_eq!(result.target().len(), 0);

        let (r, t) = compensate(&reference, &target, -3);
        assert!(AlignmentResult::new(-3, r, t).is_empty());
    }

    #[test]
    fn test_lag_applied_to_full_length_series() {
        let reference = log_sweep(20.0, 3500.0, 8000, 3.0, 0.5);
        let target = delay(&reference, 40);

        let result = Aligner::new(50.0)
            .with_analysis_window(0.5)
            .align(&reference.clone().into(), &target.into(), 8000)
            .unwrap();

        assert_eq!(result.lag(), 40);
        assert_eq!(result.len(), reference.len() - 40);
    }

    #[test]
    fn test_empty_input_aligns_to_nothing() {
        let empty = MonoSeries::default();
        let other: MonoSeries = vec![0.5; 8].into();
        let result = Aligner::new(50.0).align(&empty, &other, 48000).unwrap();
        assert_eq!(result.lag(), 0);
        assert!(result.is_empty());
    }

    #[test]
    fn test_invalid_analysis_window() {
        let series: MonoSeries = vec![0.1; 16].into();
        let result = Aligner::new(50.0)
            .with_analysis_window(0.0)
            .align(&series, &series, 48000);
        assert!(matches!(result, Err(ValidateError::Config(_))));
    }
}
