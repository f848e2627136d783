//! Similarity metrics over an aligned pair

use crate::align::AlignmentResult;
use crate::spectral::spectral_similarity;
use crate::{Result, ValidateError};
use serde::Serialize;

/// Added to each RMS before the level ratio
pub const RMS_FLOOR: f64 = 1e-12;

/// The three similarity figures the gate judges
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSet {
    correlation: f64,
    spectral_similarity: f64,
    rms_db_diff: f64,
    compared_samples: usize,
}

impl MetricSet {
    /// Compute all metrics from an aligned pair
    pub fn calculate(aligned: &AlignmentResult) -> Result<Self> {
        let (reference, target) = (aligned.reference(), aligned.target());

        if aligned.is_empty() {
            log::warn!("Aligned series are empty; reporting maximal mismatch");
            return Ok(Self {
                correlation: 0.0,
                spectral_similarity: 0.0,
                rms_db_diff: 0.0,
                compared_samples: 0,
            });
        }

        let metrics = Self {
            correlation: pearson(reference, target),
            spectral_similarity: spectral_similarity(reference, target)?,
            rms_db_diff: rms_db_diff(reference, target),
            compared_samples: aligned.len(),
        };

        log::debug!("Metrics: {}", metrics.summary());
        Ok(metrics)
    }

    /// Build from known values, checking ranges
    pub fn from_values(
        correlation: f64,
        spectral_similarity: f64,
        rms_db_diff: f64,
        compared_samples: usize,
    ) -> Result<Self> {
        if !(-1.0..=1.0).contains(&correlation) {
            return Err(ValidateError::InvalidMetric(format!(
                "correlation {} outside [-1, 1]",
                correlation
            )));
        }
        if !(0.0..=1.0).contains(&spectral_similarity) {
            return Err(ValidateError::InvalidMetric(format!(
                "spectral similarity {} outside [0, 1]",
                spectral_similarity
            )));
        }
        if !rms_db_diff.is_finite() {
            return Err(ValidateError::InvalidMetric(format!(
                "RMS difference {} is not finite",
                rms_db_diff
            )));
        }

        Ok(Self {
            correlation,
            spectral_similarity,
            rms_db_diff,
            compared_samples,
        })
    }

    /// Pearson correlation coefficient, [-1, 1]
    pub fn correlation(&self) -> f64 {
        self.correlation
    }

    /// Cosine similarity of magnitude spectra, [0, 1]
    pub fn spectral_similarity(&self) -> f64 {
        self.spectral_similarity
    }

    /// `20·log10(rms_target / rms_reference)`
    pub fn rms_db_diff(&self) -> f64 {
        self.rms_db_diff
    }

    /// Length of the aligned overlap the figures were computed on
    pub fn compared_samples(&self) -> usize {
        self.compared_samples
    }

    /// Get human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Correlation: {:.4}, Spectral similarity: {:.4}, RMS diff: {:.2} dB",
            self.correlation, self.spectral_similarity, self.rms_db_diff
        )
    }
}

/// Pearson correlation; 0 for empty or constant input
pub fn pearson(reference: &[f64], target: &[f64]) -> f64 {
    let len = reference.len().min(target.len());
    if len == 0 {
        return 0.0;
    }
    let (reference, target) = (&reference[..len], &target[..len]);

    let ref_mean = reference.iter().sum::<f64>() / len as f64;
    let tgt_mean = target.iter().sum::<f64>() / len as f64;

    let mut cov = 0.0;
    let mut ref_var = 0.0;
    let mut tgt_var = 0.0;

    for (r, t) in reference.iter().zip(target) {
        let dr = r - ref_mean;
        let dt = t - tgt_mean;
        cov += dr * dt;
        ref_var += dr * dr;
        tgt_var += dt * dt;
    }

    let std_product = (ref_var * tgt_var).sqrt();
    if std_product > 0.0 && std_product.is_finite() {
        (cov / std_product).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Root-mean-square amplitude; 0 for empty input
pub fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64).sqrt()
}

/// Level of `target` relative to `reference` in dB, floored against silence
pub fn rms_db_diff(reference: &[f64], target: &[f64]) -> f64 {
    let ref_rms = rms(reference) + RMS_FLOOR;
    let tgt_rms = rms(target) + RMS_FLOOR;
    20.0 * (tgt_rms / ref_rms).log10()
}
