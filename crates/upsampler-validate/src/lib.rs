//! # upsampler-validate
//!
//! Round-trip validation for the upsampler daemon output: a reference waveform is
//! played through the daemon, the output is captured, and this crate decides whether
//! the capture is still "the same audio".
//!
//! ## Pipeline
//!
//! ```text
//! ┌────────┐   ┌──────────┐   ┌─────────┐   ┌─────────┐   ┌──────────────┐
//! │ Loader │ → │ Downmix  │ → │ Aligner │ → │ Metrics │ → │ Decision Gate│
//! │ (file) │   │ (mono)   │   │ (lag)   │   │ (3 vals)│   │ (pass/fail)  │
//! └────────┘   └──────────┘   └─────────┘   └─────────┘   └──────────────┘
//! ```
//!
//! - **Loader**: WAV via hound, everything else via symphonia, normalized to [-1, 1]
//! - **Aligner**: bounded cross-correlation lag search, delay-compensated copies
//! - **Metrics**: Pearson correlation, Hann-windowed spectral cosine similarity,
//!   RMS level difference in dB
//! - **Gate**: sample rate and channel match plus three thresholds
//!
//! ## Example
//!
//! ```rust,ignore
//! use upsampler_validate::{Thresholds, Validator, ValidatorConfig};
//!
//! let validator = Validator::new(ValidatorConfig::default());
//! let result = validator.validate_files("reference.wav", "captured.wav")?;
//!
//! if result.is_pass() {
//!     println!("Capture matches reference");
//! } else {
//!     println!("{}", result.summary());
//! }
//! ```

pub mod align;
pub mod batch;
pub mod config;
pub mod downmix;
pub mod fixtures;
pub mod gate;
pub mod loader;
pub mod metrics;
pub mod report;
pub mod spectral;
pub mod validate;

pub use align::{AlignmentResult, Aligner};
pub use batch::{BatchEntry, BatchManifest, BatchPair, BatchRunner};
pub use config::{Thresholds, ValidatorConfig};
pub use downmix::{downmix, MonoSeries};
pub use gate::{DecisionGate, GateCheck, StructuralFacts, ValidationResult};
pub use loader::{AudioSignal, SignalInfo};
pub use metrics::MetricSet;
pub use report::{ReportFormat, ValidationReport};
pub use validate::{CheckOutcome, ValidationTrace, Validator, EXIT_ERROR, EXIT_FAIL, EXIT_PASS};

use thiserror::Error;

/// Errors that can occur during a validation run
#[derive(Error, Debug)]
pub enum ValidateError {
    #[error("Failed to load audio file {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("Empty signal from {origin}: {channels} channel(s), {samples} sample(s) per channel")]
    EmptySignal {
        origin: String,
        channels: usize,
        samples: usize,
    },

    #[error(
        "Alignment window too small: max delay {max_delay_ms} ms is below one sample period at {sample_rate} Hz"
    )]
    AlignmentWindow { max_delay_ms: f64, sample_rate: u32 },

    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error("Invalid metric: {0}")]
    InvalidMetric(String),

    #[error("FFT error: {0}")]
    Fft(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ValidateError {
    pub(crate) fn load(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidateError>;

/// Validate a captured file against a reference with default thresholds
pub fn quick_validate<P: AsRef<std::path::Path>>(
    reference_path: P,
    target_path: P,
) -> Result<ValidationResult> {
    Validator::new(ValidatorConfig::default()).validate_files(reference_path, target_path)
}

/// Check whether a capture passes the default gate
pub fn files_match<P: AsRef<std::path::Path>>(reference_path: P, target_path: P) -> Result<bool> {
    Ok(quick_validate(reference_path, target_path)?.is_pass())
}
