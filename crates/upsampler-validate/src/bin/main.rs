//! Upsampler round-trip validator
//!
//! Usage:
//!   upsampler-validate check --input ref.wav --output captured.wav
//!   upsampler-validate batch --manifest pairs.json --format junit --report out.xml
//!   upsampler-validate generate --out-dir fixtures/
//!
//! Exit status: 0 pass, 1 fail, 2 error.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use upsampler_validate::fixtures::{generate_suite, FixtureConfig};
use upsampler_validate::{
    BatchManifest, BatchRunner, ReportFormat, Validator, ValidatorConfig, EXIT_ERROR, EXIT_FAIL,
    EXIT_PASS,
};

#[derive(Parser)]
#[command(
    name = "upsampler-validate",
    version,
    about = "Validate captured upsampler output against a reference"
)]
struct Cli {
    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one captured file against its reference
    Check {
        /// Reference file
        #[arg(short, long)]
        input: PathBuf,

        /// Captured daemon output
        #[arg(short, long)]
        output: PathBuf,

        /// JSON validator config; flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Minimum Pearson correlation [default: 0.7]
        #[arg(long)]
        min_correlation: Option<f64>,

        /// Minimum spectral similarity [default: 0.8]
        #[arg(long)]
        min_spectral_similarity: Option<f64>,

        /// Maximum |RMS difference| in dB [default: 6.0]
        #[arg(long)]
        max_rms_db_diff: Option<f64>,

        /// Alignment search window in ms [default: 50.0]
        #[arg(long)]
        max_delay_ms: Option<f64>,

        /// Seconds used for lag estimation [default: 5.0]
        #[arg(long)]
        analysis_window: Option<f64>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = CheckFormat::Text)]
        format: CheckFormat,

        /// Also write the report to this file
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
    /// Validate every pair in a JSON manifest
    Batch {
        /// Manifest with `pairs` and optional `config`
        #[arg(short, long)]
        manifest: PathBuf,

        /// Report format (text, json, markdown, junit)
        #[arg(short, long, default_value = "text")]
        format: ReportFormat,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Parallel jobs [default: number of CPUs]
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Write the standard reference fixture suite
    Generate {
        /// Output directory
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Sample rates, comma separated
        #[arg(long, value_delimiter = ',', default_values_t = [44100u32, 48000, 88200, 96000])]
        rates: Vec<u32>,

        /// Duration in seconds
        #[arg(long, default_value_t = 3.0)]
        duration: f64,

        /// Peak amplitude
        #[arg(long, default_value_t = 0.2)]
        amplitude: f64,

        /// Channel count
        #[arg(long, default_value_t = 2)]
        channels: u16,
    },
}

/// Formats a single check can render
#[derive(Clone, Copy, ValueEnum)]
enum CheckFormat {
    Text,
    Json,
}

impl From<CheckFormat> for ReportFormat {
    fn from(format: CheckFormat) -> Self {
        match format {
            CheckFormat::Text => ReportFormat::Text,
            CheckFormat::Json => ReportFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Commands::Check {
            input,
            output,
            config,
            min_correlation,
            min_spectral_similarity,
            max_rms_db_diff,
            max_delay_ms,
            analysis_window,
            format,
            report,
        } => {
            let overrides = Overrides {
                min_correlation,
                min_spectral_similarity,
                max_rms_db_diff,
                max_delay_ms,
                analysis_window,
            };
            run_check(&input, &output, config, overrides, format, report)
        }
        Commands::Batch {
            manifest,
            format,
            report,
            jobs,
        } => run_batch(&manifest, format, report, jobs),
        Commands::Generate {
            out_dir,
            rates,
            duration,
            amplitude,
            channels,
        } => run_generate(
            &out_dir,
            FixtureConfig {
                rates,
                duration,
                amplitude,
                channels,
            },
        ),
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Threshold flags given on the command line
struct Overrides {
    min_correlation: Option<f64>,
    min_spectral_similarity: Option<f64>,
    max_rms_db_diff: Option<f64>,
    max_delay_ms: Option<f64>,
    analysis_window: Option<f64>,
}

impl Overrides {
    fn apply(self, mut config: ValidatorConfig) -> ValidatorConfig {
        let t = &mut config.thresholds;
        if let Some(v) = self.min_correlation {
            t.min_correlation = v;
        }
        if let Some(v) = self.min_spectral_similarity {
            t.min_spectral_similarity = v;
        }
        if let Some(v) = self.max_rms_db_diff {
            t.max_rms_db_diff = v;
        }
        if let Some(v) = self.max_delay_ms {
            t.max_delay_ms = v;
        }
        if let Some(v) = self.analysis_window {
            config.analysis_window_secs = v;
        }
        config
    }
}

fn run_check(
    input: &Path,
    output: &Path,
    config_path: Option<PathBuf>,
    overrides: Overrides,
    format: CheckFormat,
    report: Option<PathBuf>,
) -> Result<u8> {
    let base = match config_path {
        Some(path) => ValidatorConfig::from_json_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ValidatorConfig::default(),
    };
    let config = overrides.apply(base);
    log::debug!("Thresholds: {:?}", config.thresholds);

    let outcome = Validator::new(config).check_files(input, output, format.into());
    print!("{}", outcome.output);

    match &outcome.error {
        Some(e) => eprintln!("Error: {}", e),
        None => {
            if let Some(path) = report {
                std::fs::write(&path, &outcome.output)
                    .with_context(|| format!("writing report {}", path.display()))?;
            }
        }
    }

    Ok(outcome.exit_code)
}

fn run_batch(
    manifest_path: &Path,
    format: ReportFormat,
    report_path: Option<PathBuf>,
    jobs: Option<usize>,
) -> Result<u8> {
    let manifest = BatchManifest::from_json_file(manifest_path)
        .with_context(|| format!("loading manifest {}", manifest_path.display()))?;

    let mut runner = BatchRunner::new(manifest.config.unwrap_or_default());
    if let Some(jobs) = jobs {
        runner = runner.with_max_parallel(jobs);
    }

    let title = format!("Round-trip validation: {}", manifest_path.display());
    let report = runner.run(&title, &manifest.pairs)?;

    match report_path {
        Some(path) => {
            report
                .save(&path, format)
                .with_context(|| format!("writing report {}", path.display()))?;
            println!(
                "{} pairs, {} passed, {} failed; report written to {}",
                report.total,
                report.passed,
                report.failed,
                path.display()
            );
        }
        None => print!("{}", report.generate(format)),
    }

    Ok(if report.all_passed() { EXIT_PASS } else { EXIT_FAIL })
}

fn run_generate(out_dir: &Path, config: FixtureConfig) -> Result<u8> {
    let written = generate_suite(out_dir, &config)
        .with_context(|| format!("generating fixtures in {}", out_dir.display()))?;

    for path in &written {
        println!("{}", path.display());
    }
    log::info!("Wrote {} fixture file(s)", written.len());

    Ok(EXIT_PASS)
}
