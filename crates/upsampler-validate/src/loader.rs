//! Audio file loading

use crate::spectral::to_db;
use crate::{Result, ValidateError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded waveform, normalized to [-1, 1]
///
/// Every channel holds the same number of samples. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct AudioSignal {
    channels: Vec<Vec<f64>>,
    sample_rate: u32,
    num_samples: usize,
    source: String,
}

impl AudioSignal {
    /// Build a signal from per-channel sample planes
    pub fn from_channels(
        channels: Vec<Vec<f64>>,
        sample_rate: u32,
        source: impl Into<String>,
    ) -> Result<Self> {
        let source = source.into();

        if sample_rate == 0 {
            return Err(ValidateError::InvalidSignal(format!(
                "{}: sample rate must be positive",
                source
            )));
        }

        let num_samples = channels.first().map(|c| c.len()).unwrap_or(0);
        if let Some((idx, ch)) = channels
            .iter()
            .enumerate()
            .find(|(_, ch)| ch.len() != num_samples)
        {
            return Err(ValidateError::InvalidSignal(format!(
                "{}: channel {} has {} samples, channel 0 has {}",
                source,
                idx,
                ch.len(),
                num_samples
            )));
        }

        Ok(Self {
            channels,
            sample_rate,
            num_samples,
            source,
        })
    }

    /// Single-channel signal from a sample slice
    pub fn mono(samples: &[f64], sample_rate: u32, source: impl Into<String>) -> Result<Self> {
        Self::from_channels(vec![samples.to_vec()], sample_rate, source)
    }

    /// Load audio from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        if !path.is_file() {
            return Err(ValidateError::load(path_str, "file not found"));
        }

        let signal = match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("wav") => Self::load_wav(path, &path_str)?,
            _ => Self::load_symphonia(path, &path_str)?,
        };

        log::debug!(
            "Loaded {}: {} Hz, {} ch, {} samples",
            signal.source,
            signal.sample_rate,
            signal.num_channels(),
            signal.num_samples
        );

        Ok(signal)
    }

    /// WAV through hound (exact integer scaling, native 32-bit float)
    fn load_wav(path: &Path, path_str: &str) -> Result<Self> {
        let reader = hound::WavReader::open(path).map_err(|e| ValidateError::load(path_str, e))?;

        let spec = reader.spec();
        let num_channels = spec.channels as usize;
        if num_channels == 0 {
            return Err(ValidateError::EmptySignal {
                origin: path_str.to_string(),
                channels: 0,
                samples: 0,
            });
        }

        let samples: Vec<f64> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| v as f64))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| ValidateError::load(path_str, e))?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f64;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f64 * scale))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| ValidateError::load(path_str, e))?
            }
        };

        // Deinterleave, dropping a trailing partial frame
        let num_samples = samples.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(num_samples); num_channels];
        for (i, sample) in samples
            .into_iter()
            .take(num_samples * num_channels)
            .enumerate()
        {
            channels[i % num_channels].push(sample);
        }

        Self::from_channels(channels, spec.sample_rate, path_str)
            .map_err(|e| ValidateError::load(path_str, e))
    }

    /// Any other container/codec through symphonia
    fn load_symphonia(path: &Path, path_str: &str) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| ValidateError::load(path_str, e))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| ValidateError::load(path_str, e))?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| ValidateError::load(path_str, "no audio track"))?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| ValidateError::load(path_str, "unknown sample rate"))?;

        let num_channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .ok_or_else(|| ValidateError::load(path_str, "unknown channel layout"))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| ValidateError::load(path_str, e))?;

        let track_id = track.id;
        let mut channels = vec![Vec::new(); num_channels];

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(e) => return Err(ValidateError::load(path_str, e)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = decoder
                .decode(&packet)
                .map_err(|e| ValidateError::load(path_str, e))?;

            copy_samples(&decoded, &mut channels);
        }

        // Codecs with priming can leave planes ragged by a few samples
        let shortest = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        for ch in &mut channels {
            ch.truncate(shortest);
        }

        Self::from_channels(channels, sample_rate, path_str)
            .map_err(|e| ValidateError::load(path_str, e))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn channels(&self) -> &[Vec<f64>] {
        &self.channels
    }

    /// Where the signal came from (file path, or a label for in-memory signals)
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.num_samples as f64 / self.sample_rate as f64
    }

    /// Peak absolute sample over all channels
    pub fn peak(&self) -> f64 {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|s| s.abs())
            .fold(0.0, f64::max)
    }

    /// RMS over all channels
    pub fn rms(&self) -> f64 {
        let count = self.num_samples * self.channels.len();
        if count == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .channels
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|s| s * s)
            .sum();
        (sum / count as f64).sqrt()
    }

    /// Summary used in reports
    pub fn info(&self) -> SignalInfo {
        SignalInfo {
            path: self.source.clone(),
            sample_rate: self.sample_rate,
            num_channels: self.num_channels(),
            num_samples: self.num_samples,
            duration: self.duration(),
            peak_db: to_db(self.peak()),
            rms_db: to_db(self.rms()),
        }
    }
}

/// Copy a decoded packet into per-channel planes
fn copy_samples(buffer: &AudioBufferRef, channels: &mut [Vec<f64>]) {
    macro_rules! extend_planes {
        ($buf:expr, $convert:expr) => {{
            let available = $buf.spec().channels.count();
            for (ch_idx, channel) in channels.iter_mut().enumerate().take(available) {
                channel.extend($buf.chan(ch_idx).iter().map($convert));
            }
        }};
    }

    match buffer {
        AudioBufferRef::F32(buf) => extend_planes!(buf, |&s| s as f64),
        AudioBufferRef::F64(buf) => extend_planes!(buf, |&s| s),
        AudioBufferRef::S8(buf) => extend_planes!(buf, |&s| s as f64 / 128.0),
        AudioBufferRef::S16(buf) => extend_planes!(buf, |&s| s as f64 / 32768.0),
        AudioBufferRef::S24(buf) => extend_planes!(buf, |s| s.inner() as f64 / 8388608.0),
        AudioBufferRef::S32(buf) => extend_planes!(buf, |&s| s as f64 / 2147483648.0),
        AudioBufferRef::U8(buf) => extend_planes!(buf, |&s| (s as f64 - 128.0) / 128.0),
        AudioBufferRef::U16(buf) => extend_planes!(buf, |&s| (s as f64 - 32768.0) / 32768.0),
        AudioBufferRef::U24(buf) => {
            extend_planes!(buf, |s| (s.inner() as f64 - 8388608.0) / 8388608.0)
        }
        AudioBufferRef::U32(buf) => {
            extend_planes!(buf, |&s| (s as f64 - 2147483648.0) / 2147483648.0)
        }
    }
}

/// Basic facts about a loaded signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalInfo {
    pub path: String,
    pub sample_rate: u32,
    pub num_channels: usize,
    /// Samples per channel
    pub num_samples: usize,
    /// Seconds
    pub duration: f64,
    /// dBFS
    pub peak_db: f64,
    /// dBFS
    pub rms_db: f64,
}
