//! Channel down-mixing

use crate::loader::AudioSignal;
use crate::{Result, ValidateError};

/// Single-channel sample series
///
/// Sample rate and channel metadata travel alongside, not inside.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonoSeries(Vec<f64>);

impl MonoSeries {
    pub fn new(samples: Vec<f64>) -> Self {
        Self(samples)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for MonoSeries {
    fn from(samples: Vec<f64>) -> Self {
        Self(samples)
    }
}

impl From<&[f64]> for MonoSeries {
    fn from(samples: &[f64]) -> Self {
        Self(samples.to_vec())
    }
}

/// Average all channels into one series
pub fn downmix(signal: &AudioSignal) -> Result<MonoSeries> {
    let num_channels = signal.num_channels();
    let num_samples = signal.num_samples();

    if num_channels == 0 || num_samples == 0 {
        return Err(ValidateError::EmptySignal {
            origin: signal.source().to_string(),
            channels: num_channels,
            samples: num_samples,
        });
    }

    let channels = signal.channels();
    if num_channels == 1 {
        return Ok(MonoSeries(channels[0].clone()));
    }

    let scale = 1.0 / num_channels as f64;
    let mono = (0..num_samples)
        .map(|i| channels.iter().map(|ch| ch[i]).sum::<f64>() * scale)
        .collect();

    Ok(MonoSeries(mono))
}
