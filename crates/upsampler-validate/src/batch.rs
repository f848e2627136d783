//! Batch validation of many (reference, target) pairs
//!
//! Pairs are independent, so they run on a rayon pool and their outcomes are
//! collected in manifest order.

use crate::config::ValidatorConfig;
use crate::gate::ValidationResult;
use crate::report::ValidationReport;
use crate::validate::Validator;
use crate::{Result, ValidateError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One pair listed in a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPair {
    /// Display name; defaults to the target file stem
    #[serde(default)]
    pub name: Option<String>,
    pub reference: PathBuf,
    pub target: PathBuf,
}

impl BatchPair {
    pub fn new(reference: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            reference: reference.into(),
            target: target.into(),
        }
    }

    /// Builder pattern: set display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.target
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .unwrap_or_else(|| self.target.display().to_string())
        })
    }
}

/// Pairs plus an optional shared configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchManifest {
    pub pairs: Vec<BatchPair>,
    #[serde(default)]
    pub config: Option<ValidatorConfig>,
}

impl BatchManifest {
    /// Load a JSON manifest; relative paths resolve against its directory
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ValidateError::Config(format!("{}: {}", path.display(), e)))?;
        let mut manifest: Self = serde_json::from_str(&text)?;

        if let Some(base) = path.parent() {
            for pair in &mut manifest.pairs {
                pair.reference = base.join(&pair.reference);
                pair.target = base.join(&pair.target);
            }
        }
        if let Some(config) = &manifest.config {
            config.validate()?;
        }

        Ok(manifest)
    }
}

/// Outcome for one pair
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub name: String,
    pub reference: String,
    pub target: String,
    /// Present when the pipeline ran to a verdict
    pub result: Option<ValidationResult>,
    /// Present when the pipeline aborted
    pub error: Option<String>,
}

impl BatchEntry {
    pub fn passed(&self) -> bool {
        self.result.as_ref().is_some_and(ValidationResult::is_pass)
    }

    pub fn status(&self) -> &'static str {
        match (&self.result, &self.error) {
            (_, Some(_)) => "ERROR",
            (Some(r), None) if r.is_pass() => "PASS",
            _ => "FAIL",
        }
    }
}

/// Runs a manifest's pairs in parallel
pub struct BatchRunner {
    config: ValidatorConfig,
    max_parallel: usize,
}

impl BatchRunner {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            max_parallel: rayon::current_num_threads(),
        }
    }

    /// Set max parallel jobs
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max.max(1);
        self
    }

    /// Validate every pair; per-pair errors land in the report, not in `Err`
    pub fn run(&self, title: &str, pairs: &[BatchPair]) -> Result<ValidationReport> {
        self.config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_parallel)
            .build()
            .map_err(|e| ValidateError::Config(format!("thread pool: {}", e)))?;

        log::info!(
            "Validating {} pair(s) on {} thread(s)",
            pairs.len(),
            self.max_parallel
        );

        let validator = Validator::new(self.config.clone());
        let entries: Vec<BatchEntry> = pool.install(|| {
            pairs
                .par_iter()
                .map(|pair| Self::run_pair(&validator, pair))
                .collect()
        });

        let mut report = ValidationReport::new(title);
        for entry in entries {
            report.add_entry(entry);
        }
        Ok(report)
    }

    fn run_pair(validator: &Validator, pair: &BatchPair) -> BatchEntry {
        let name = pair.display_name();
        let (result, error) = match validator.validate_files(&pair.reference, &pair.target) {
            Ok(result) => (Some(result), None),
            Err(e) => {
                log::error!("{}: {}", name, e);
                (None, Some(e.to_string()))
            }
        };

        BatchEntry {
            name,
            reference: pair.reference.display().to_string(),
            target: pair.target.display().to_string(),
            result,
            error,
        }
    }
}
