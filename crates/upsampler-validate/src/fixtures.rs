//! Reference signal synthesis
//!
//! Deterministic tones, sweeps and noise used as round-trip inputs, plus the WAV
//! writer that lays them out on disk for the daemon test rig.

use crate::{Result, ValidateError};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

/// Seed for white noise fixtures
pub const NOISE_SEED: u64 = 0;

fn num_samples(sample_rate: u32, duration: f64) -> usize {
    (sample_rate as f64 * duration).max(0.0) as usize
}

/// Sine tone
pub fn sine(freq_hz: f64, sample_rate: u32, duration: f64, amplitude: f64) -> Vec<f64> {
    (0..num_samples(sample_rate, duration))
        .map(|i| amplitude * (2.0 * PI * freq_hz * i as f64 / sample_rate as f64).sin())
        .collect()
}

/// Logarithmic sweep from `start_hz` to `end_hz` over `duration`
///
/// Phase law `2π·f0·T/ln(f1/f0)·((f1/f0)^(t/T) - 1)`, cosine shaped.
pub fn log_sweep(
    start_hz: f64,
    end_hz: f64,
    sample_rate: u32,
    duration: f64,
    amplitude: f64,
) -> Vec<f64> {
    let ratio = end_hz / start_hz;
    let k = 2.0 * PI * start_hz * duration / ratio.ln();

    (0..num_samples(sample_rate, duration))
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            amplitude * (k * (ratio.powf(t / duration) - 1.0)).cos()
        })
        .collect()
}

/// Gaussian noise with standard deviation `amplitude`
pub fn gaussian_noise(len: usize, amplitude: f64, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            // Box-Muller; u1 in (0, 1] keeps ln finite
            let u1 = 1.0 - rng.random::<f64>();
            let u2 = rng.random::<f64>();
            amplitude * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
        })
        .collect()
}

/// White noise fixture
pub fn white_noise(sample_rate: u32, duration: f64, amplitude: f64) -> Vec<f64> {
    gaussian_noise(num_samples(sample_rate, duration), amplitude, NOISE_SEED)
}

/// Prepend `samples_delay` zeros
pub fn delay(samples: &[f64], samples_delay: usize) -> Vec<f64> {
    let mut out = vec![0.0; samples_delay];
    out.extend_from_slice(samples);
    out
}

/// Add seeded Gaussian noise
pub fn add_noise(samples: &[f64], amplitude: f64, seed: u64) -> Vec<f64> {
    samples
        .iter()
        .zip(gaussian_noise(samples.len(), amplitude, seed))
        .map(|(s, n)| s + n)
        .collect()
}

/// Write a mono signal as 32-bit integer PCM, duplicated across `channels`
pub fn write_wav<P: AsRef<Path>>(
    path: P,
    samples: &[f64],
    sample_rate: u32,
    channels: u16,
) -> Result<()> {
    let path = path.as_ref();
    let path_str = path.display().to_string();

    if channels == 0 {
        return Err(ValidateError::Config("channel count must be positive".into()));
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Int,
    };

    let to_io = |e: hound::Error| match e {
        hound::Error::IoError(io) => ValidateError::Io(io),
        other => ValidateError::Config(format!("{}: {}", path_str, other)),
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(to_io)?;
    for &s in samples {
        let value = (s.clamp(-1.0, 1.0) * i32::MAX as f64).round() as i32;
        for _ in 0..channels {
            writer.write_sample(value).map_err(to_io)?;
        }
    }
    writer.finalize().map_err(to_io)?;

    Ok(())
}

/// Parameters of the standard fixture suite
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    pub rates: Vec<u32>,
    /// Seconds
    pub duration: f64,
    pub amplitude: f64,
    pub channels: u16,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            rates: vec![44100, 48000, 88200, 96000],
            duration: 3.0,
            amplitude: 0.2,
            channels: 2,
        }
    }
}

/// Write sine 440, sine 1k, 20-20k sweep and white noise for every rate
pub fn generate_suite<P: AsRef<Path>>(out_dir: P, config: &FixtureConfig) -> Result<Vec<PathBuf>> {
    let out_dir = out_dir.as_ref();
    std::fs::create_dir_all(out_dir)?;

    let mut written = Vec::with_capacity(config.rates.len() * 4);
    for &rate in &config.rates {
        let (duration, amplitude) = (config.duration, config.amplitude);
        let signals = [
            (format!("sine_440_{rate}.wav"), sine(440.0, rate, duration, amplitude)),
            (format!("sine_1k_{rate}.wav"), sine(1000.0, rate, duration, amplitude)),
            (
                format!("sweep_20_20k_{rate}.wav"),
                log_sweep(20.0, 20000.0, rate, duration, amplitude),
            ),
            (
                format!("white_noise_{rate}.wav"),
                white_noise(rate, duration, amplitude),
            ),
        ];

        for (name, samples) in signals {
            let path = out_dir.join(name);
            write_wav(&path, &samples, rate, config.channels)?;
            log::debug!("Wrote {}", path.display());
            written.push(path);
        }
    }

    Ok(written)
}
