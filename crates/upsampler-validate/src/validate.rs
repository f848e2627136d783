//! Main validation API
//!
//! Loader → Downmix → Aligner → Metrics → Gate. Each run is a pure function of
//! its two inputs and its configuration.

use crate::align::Aligner;
use crate::config::ValidatorConfig;
use crate::downmix::downmix;
use crate::gate::{DecisionGate, StructuralFacts, ValidationResult};
use crate::loader::{AudioSignal, SignalInfo};
use crate::metrics::MetricSet;
use crate::report::{format_result, ReportFormat};
use crate::{Result, ValidateError};
use serde::Serialize;
use std::path::Path;

/// Facts recorded as each stage completes
///
/// When a later stage fails, whatever is already here is still worth reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationTrace {
    pub reference: Option<SignalInfo>,
    pub target: Option<SignalInfo>,
    pub structural: Option<StructuralFacts>,
    pub lag: Option<i64>,
    pub metrics: Option<MetricSet>,
}

impl ValidationTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines for every fact computed so far
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        for (label, info) in [("Reference", &self.reference), ("Target", &self.target)] {
            if let Some(info) = info {
                output.push_str(&format!(
                    "{}: {} ({} Hz, {} ch, {:.3} s)\n",
                    label, info.path, info.sample_rate, info.num_channels, info.duration
                ));
            }
        }
        if let Some(structural) = &self.structural {
            output.push_str(&format!(
                "Sample rate match: {}\n",
                structural.sample_rate_match()
            ));
            output.push_str(&format!("Channels match: {}\n", structural.channels_match()));
        }
        if let Some(lag) = self.lag {
            output.push_str(&format!("Alignment lag (samples): {}\n", lag));
        }
        if let Some(metrics) = &self.metrics {
            output.push_str(&format!("Correlation: {:.4}\n", metrics.correlation()));
            output.push_str(&format!(
                "Spectral similarity: {:.4}\n",
                metrics.spectral_similarity()
            ));
            output.push_str(&format!("RMS dB diff: {:.2} dB\n", metrics.rms_db_diff()));
        }

        output
    }
}

/// Process exit status: the gate passed
pub const EXIT_PASS: u8 = 0;

/// Process exit status: the gate failed
pub const EXIT_FAIL: u8 = 1;

/// Process exit status: the run aborted before a verdict
pub const EXIT_ERROR: u8 = 2;

/// Everything a single `check` run hands back to the console
#[derive(Debug)]
pub struct CheckOutcome {
    /// One of [`EXIT_PASS`], [`EXIT_FAIL`], [`EXIT_ERROR`]
    pub exit_code: u8,

    /// Rendered result, or the facts computed before an error
    pub output: String,

    /// Why the run aborted, if it did
    pub error: Option<ValidateError>,
}

impl CheckOutcome {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Runs the full pipeline for one (reference, target) pair
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a captured file against its reference
    pub fn validate_files<P: AsRef<Path>>(&self, reference: P, target: P) -> Result<ValidationResult> {
        self.validate_files_traced(reference, target, &mut ValidationTrace::new())
    }

    /// Like [`Self::validate_files`], recording progress into `trace`
    pub fn validate_files_traced<P: AsRef<Path>>(
        &self,
        reference: P,
        target: P,
        trace: &mut ValidationTrace,
    ) -> Result<ValidationResult> {
        self.config.validate()?;

        let reference = AudioSignal::load(reference)?;
        trace.reference = Some(reference.info());

        let target = AudioSignal::load(target)?;
        trace.target = Some(target.info());

        self.run(&reference, &target, trace)
    }

    /// Validate two files and render the console output with its exit status
    ///
    /// On an error the output holds every fact computed before the failure.
    pub fn check_files<P: AsRef<Path>>(
        &self,
        reference: P,
        target: P,
        format: ReportFormat,
    ) -> CheckOutcome {
        let mut trace = ValidationTrace::new();
        match self.validate_files_traced(reference, target, &mut trace) {
            Ok(result) => CheckOutcome {
                exit_code: if result.is_pass() { EXIT_PASS } else { EXIT_FAIL },
                output: format_result(&result, format),
                error: None,
            },
            Err(e) => CheckOutcome {
                exit_code: EXIT_ERROR,
                output: trace.to_text(),
                error: Some(e),
            },
        }
    }

    /// Validate two in-memory signals
    pub fn validate_signals(
        &self,
        reference: &AudioSignal,
        target: &AudioSignal,
    ) -> Result<ValidationResult> {
        self.validate_signals_traced(reference, target, &mut ValidationTrace::new())
    }

    /// Like [`Self::validate_signals`], recording progress into `trace`
    pub fn validate_signals_traced(
        &self,
        reference: &AudioSignal,
        target: &AudioSignal,
        trace: &mut ValidationTrace,
    ) -> Result<ValidationResult> {
        self.config.validate()?;
        trace.reference = Some(reference.info());
        trace.target = Some(target.info());
        self.run(reference, target, trace)
    }

    fn run(
        &self,
        reference: &AudioSignal,
        target: &AudioSignal,
        trace: &mut ValidationTrace,
    ) -> Result<ValidationResult> {
        let thresholds = &self.config.thresholds;

        let structural = StructuralFacts::from_signals(reference, target);
        trace.structural = Some(structural);

        let reference_mono = downmix(reference)?;
        let target_mono = downmix(target)?;

        // Lag is searched at the reference rate
        let aligned = Aligner::new(thresholds.max_delay_ms)
            .with_analysis_window(self.config.analysis_window_secs)
            .align(&reference_mono, &target_mono, reference.sample_rate())?;
        trace.lag = Some(aligned.lag());

        let metrics = MetricSet::calculate(&aligned)?;
        trace.metrics = Some(metrics);

        Ok(DecisionGate::evaluate(
            structural,
            aligned.lag(),
            metrics,
            thresholds,
        ))
    }
}
