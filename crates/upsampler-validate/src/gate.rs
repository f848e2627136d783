//! Decision gate: metrics and structural facts against thresholds

use crate::config::Thresholds;
use crate::loader::AudioSignal;
use crate::metrics::MetricSet;
use serde::Serialize;

/// Sample rate and channel layout of both signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StructuralFacts {
    reference_rate: u32,
    target_rate: u32,
    reference_channels: usize,
    target_channels: usize,
}

impl StructuralFacts {
    pub fn new(
        reference_rate: u32,
        target_rate: u32,
        reference_channels: usize,
        target_channels: usize,
    ) -> Self {
        Self {
            reference_rate,
            target_rate,
            reference_channels,
            target_channels,
        }
    }

    pub fn from_signals(reference: &AudioSignal, target: &AudioSignal) -> Self {
        Self::new(
            reference.sample_rate(),
            target.sample_rate(),
            reference.num_channels(),
            target.num_channels(),
        )
    }

    pub fn sample_rate_match(&self) -> bool {
        self.reference_rate == self.target_rate
    }

    pub fn channels_match(&self) -> bool {
        self.reference_channels == self.target_channels
    }

    pub fn reference_rate(&self) -> u32 {
        self.reference_rate
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    pub fn reference_channels(&self) -> usize {
        self.reference_channels
    }

    pub fn target_channels(&self) -> usize {
        self.target_channels
    }
}

/// One gate condition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateCheck {
    /// Check name
    pub name: String,

    /// Whether this check passed
    pub passed: bool,

    /// Measured value
    pub actual: f64,

    /// Limit it was compared against
    pub limit: f64,

    /// Human-readable description
    pub description: String,
}

/// Terminal artifact of a validation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    sample_rate_match: bool,
    channels_match: bool,
    structural: StructuralFacts,
    lag: i64,
    metrics: MetricSet,
    thresholds: Thresholds,
    checks: Vec<GateCheck>,
    passed: bool,
}

impl ValidationResult {
    /// Overall verdict
    pub fn is_pass(&self) -> bool {
        self.passed
    }

    pub fn sample_rate_match(&self) -> bool {
        self.sample_rate_match
    }

    pub fn channels_match(&self) -> bool {
        self.channels_match
    }

    pub fn structural(&self) -> &StructuralFacts {
        &self.structural
    }

    /// Alignment lag in samples
    pub fn lag(&self) -> i64 {
        self.lag
    }

    pub fn metrics(&self) -> &MetricSet {
        &self.metrics
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Every check, passed or not
    pub fn checks(&self) -> &[GateCheck] {
        &self.checks
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &GateCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Get a summary string
    pub fn summary(&self) -> String {
        if self.passed {
            "PASS: all checks passed".to_string()
        } else {
            let failed: Vec<&str> = self.failed_checks().map(|c| c.name.as_str()).collect();
            format!("FAIL: failed checks: {}", failed.join(", "))
        }
    }
}

/// Turns metrics into a verdict
pub struct DecisionGate;

impl DecisionGate {
    /// Pass only if rates match, channels match, the aligned overlap is non-empty
    /// and every metric is within limits
    pub fn evaluate(
        structural: StructuralFacts,
        lag: i64,
        metrics: MetricSet,
        thresholds: &Thresholds,
    ) -> ValidationResult {
        let checks = Self::build_checks(&structural, &metrics, thresholds);
        let passed = checks.iter().all(|c| c.passed);

        if !structural.sample_rate_match() {
            log::warn!(
                "Sample rate mismatch: reference={}Hz, target={}Hz",
                structural.reference_rate,
                structural.target_rate
            );
        }
        if !structural.channels_match() {
            log::warn!(
                "Channel count mismatch: reference={}, target={}",
                structural.reference_channels,
                structural.target_channels
            );
        }
        log::info!(
            "Verdict: {} (lag {}, {})",
            if passed { "PASS" } else { "FAIL" },
            lag,
            metrics.summary()
        );

        ValidationResult {
            sample_rate_match: structural.sample_rate_match(),
            channels_match: structural.channels_match(),
            structural,
            lag,
            metrics,
            thresholds: *thresholds,
            checks,
            passed,
        }
    }

    fn build_checks(
        structural: &StructuralFacts,
        metrics: &MetricSet,
        thresholds: &Thresholds,
    ) -> Vec<GateCheck> {
        let mut checks = Vec::with_capacity(6);

        checks.push(GateCheck {
            name: "sample_rate".into(),
            passed: structural.sample_rate_match(),
            actual: structural.target_rate as f64,
            limit: structural.reference_rate as f64,
            description: format!(
                "Sample rate: target {} Hz (reference {} Hz)",
                structural.target_rate, structural.reference_rate
            ),
        });

        checks.push(GateCheck {
            name: "channels".into(),
            passed: structural.channels_match(),
            actual: structural.target_channels as f64,
            limit: structural.reference_channels as f64,
            description: format!(
                "Channels: target {} (reference {})",
                structural.target_channels, structural.reference_channels
            ),
        });

        checks.push(GateCheck {
            name: "overlap".into(),
            passed: metrics.compared_samples() > 0,
            actual: metrics.compared_samples() as f64,
            limit: 1.0,
            description: format!(
                "Aligned overlap: {} samples (min: 1)",
                metrics.compared_samples()
            ),
        });

        checks.push(GateCheck {
            name: "correlation".into(),
            passed: metrics.correlation() >= thresholds.min_correlation,
            actual: metrics.correlation(),
            limit: thresholds.min_correlation,
            description: format!(
                "Correlation: {:.4} (min: {:.4})",
                metrics.correlation(),
                thresholds.min_correlation
            ),
        });

        checks.push(GateCheck {
            name: "spectral_similarity".into(),
            passed: metrics.spectral_similarity() >= thresholds.min_spectral_similarity,
            actual: metrics.spectral_similarity(),
            limit: thresholds.min_spectral_similarity,
            description: format!(
                "Spectral similarity: {:.4} (min: {:.4})",
                metrics.spectral_similarity(),
                thresholds.min_spectral_similarity
            ),
        });

        checks.push(GateCheck {
            name: "rms_db_diff".into(),
            passed: metrics.rms_db_diff().abs() <= thresholds.max_rms_db_diff,
            actual: metrics.rms_db_diff(),
            limit: thresholds.max_rms_db_diff,
            description: format!(
                "RMS diff: {:.2} dB (max: ±{:.2} dB)",
                metrics.rms_db_diff(),
                thresholds.max_rms_db_diff
            ),
        });

        checks
    }
}
