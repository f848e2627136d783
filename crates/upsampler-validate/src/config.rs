//! Thresholds and validator configuration

use crate::align::DEFAULT_ANALYSIS_WINDOW_SECS;
use crate::{Result, ValidateError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Pass/fail limits for one validation run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum acceptable Pearson correlation
    pub min_correlation: f64,

    /// Minimum acceptable spectral cosine similarity
    pub min_spectral_similarity: f64,

    /// Maximum acceptable |RMS difference| in dB
    pub max_rms_db_diff: f64,

    /// Alignment search window in milliseconds
    pub max_delay_ms: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_correlation: 0.7,
            min_spectral_similarity: 0.8,
            max_rms_db_diff: 6.0,
            max_delay_ms: 50.0,
        }
    }
}

impl Thresholds {
    /// Tight limits for bit-transparent paths (no EQ, unity gain)
    pub fn strict() -> Self {
        Self {
            min_correlation: 0.95,
            min_spectral_similarity: 0.95,
            max_rms_db_diff: 1.0,
            max_delay_ms: 20.0,
        }
    }

    /// Loose limits for heavily equalized or long-latency paths
    pub fn relaxed() -> Self {
        Self {
            min_correlation: 0.5,
            min_spectral_similarity: 0.6,
            max_rms_db_diff: 12.0,
            max_delay_ms: 200.0,
        }
    }

    /// Builder pattern: set minimum correlation
    pub fn with_min_correlation(mut self, value: f64) -> Self {
        self.min_correlation = value;
        self
    }

    /// Builder pattern: set minimum spectral similarity
    pub fn with_min_spectral_similarity(mut self, value: f64) -> Self {
        self.min_spectral_similarity = value;
        self
    }

    /// Builder pattern: set maximum RMS difference
    pub fn with_max_rms_db_diff(mut self, db: f64) -> Self {
        self.max_rms_db_diff = db;
        self
    }

    /// Builder pattern: set alignment search window
    pub fn with_max_delay_ms(mut self, ms: f64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Reject values no comparison can be made against
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("min_correlation", self.min_correlation),
            ("min_spectral_similarity", self.min_spectral_similarity),
            ("max_rms_db_diff", self.max_rms_db_diff),
            ("max_delay_ms", self.max_delay_ms),
        ];

        match fields.iter().find(|(_, v)| !v.is_finite()) {
            Some((name, value)) => Err(ValidateError::Config(format!(
                "{} must be finite, got {}",
                name, value
            ))),
            None => Ok(()),
        }
    }
}

/// Everything a [`crate::Validator`] needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub thresholds: Thresholds,

    /// Leading seconds of each series used to estimate the lag
    pub analysis_window_secs: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            analysis_window_secs: DEFAULT_ANALYSIS_WINDOW_SECS,
        }
    }
}

impl ValidatorConfig {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            ..Default::default()
        }
    }

    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ValidateError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Builder pattern: set analysis window
    pub fn with_analysis_window(mut self, secs: f64) -> Self {
        self.analysis_window_secs = secs;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        if !self.analysis_window_secs.is_finite() || self.analysis_window_secs <= 0.0 {
            return Err(ValidateError::Config(format!(
                "analysis_window_secs must be positive, got {}",
                self.analysis_window_secs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_thresholds() {
        let t = Thresholds::default();
        assert_eq!(t.min_correlation, 0.7);
        assert_eq!(t.min_spectral_similarity, 0.8);
        assert_eq!(t.max_rms_db_diff, 6.0);
        assert_eq!(t.max_delay_ms, 50.0);
    }

    #[test]
    fn test_builder_pattern() {
        let t = Thresholds::default()
            .with_min_correlation(0.9)
            .with_max_delay_ms(10.0);

        assert_eq!(t.min_correlation, 0.9);
        assert_eq!(t.max_delay_ms, 10.0);
        assert_eq!(t.max_rms_db_diff, 6.0);
    }

    #[test]
    fn test_presets_ordered() {
        let (strict, relaxed) = (Thresholds::strict(), Thresholds::relaxed());
        assert!(strict.min_correlation > relaxed.min_correlation);
        assert!(strict.max_rms_db_diff < relaxed.max_rms_db_diff);
    }

    #[test]
    fn test_non_finite_rejected() {
        let t = Thresholds::default().with_min_spectral_similarity(f64::NAN);
        assert!(matches!(t.validate(), Err(ValidateError::Config(_))));
        assert!(Thresholds::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("validate.json");
        std::fs::write(&path, r#"{ "thresholds": { "max_delay_ms": 120.0 } }"#).unwrap();

        let config = ValidatorConfig::from_json_file(&path).unwrap();
        assert_eq!(config.thresholds.max_delay_ms, 120.0);
        assert_eq!(config.thresholds.min_correlation, 0.7);
        assert_eq!(config.analysis_window_secs, 5.0);
    }

    #[test]
    fn test_bad_json_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ thresholds: ").unwrap();

        assert!(matches!(
            ValidatorConfig::from_json_file(&path),
            Err(ValidateError::Json(_))
        ));
        assert!(ValidatorConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
