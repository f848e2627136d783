//! FFT helpers: windowing, magnitude spectra, dB levels

use crate::{Result, ValidateError};
use num_complex::Complex64;
use realfft::RealFftPlanner;

/// Symmetric Hann window (`0.5 - 0.5·cos(2πn/(N-1))`)
///
/// A one-sample window is `[1.0]`.
pub fn hann_window(len: usize) -> Vec<f64> {
    match len {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (len - 1) as f64;
            (0..len)
                .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / denom).cos())
                .collect()
        }
    }
}

/// Magnitude of the real FFT of the Hann-windowed series (`len/2 + 1` bins)
pub fn magnitude_spectrum(samples: &[f64]) -> Result<Vec<f64>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(samples.len());

    let mut input: Vec<f64> = samples
        .iter()
        .zip(hann_window(samples.len()))
        .map(|(s, w)| s * w)
        .collect();
    let mut spectrum = vec![Complex64::new(0.0, 0.0); samples.len() / 2 + 1];

    fft.process(&mut input, &mut spectrum)
        .map_err(|e| ValidateError::Fft(e.to_string()))?;

    Ok(spectrum.iter().map(|bin| bin.norm()).collect())
}

/// Normalized dot product; 0 when either vector has zero norm
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    let denom = norm_a * norm_b;

    if denom > 0.0 && denom.is_finite() {
        let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        dot / denom
    } else {
        0.0
    }
}

/// Cosine similarity of the two magnitude spectra, clamped to [0, 1]
pub fn spectral_similarity(reference: &[f64], target: &[f64]) -> Result<f64> {
    let ref_mag = magnitude_spectrum(reference)?;
    let tgt_mag = magnitude_spectrum(target)?;
    Ok(cosine_similarity(&ref_mag, &tgt_mag).clamp(0.0, 1.0))
}

/// Convert linear amplitude to dB
pub fn to_db(amplitude: f64) -> f64 {
    if amplitude <= 0.0 {
        -f64::INFINITY
    } else {
        20.0 * amplitude.log10()
    }
}
