//! End-to-end round trips through WAV files on disk

use tempfile::{tempdir, TempDir};
use upsampler_validate::fixtures::{add_noise, delay, log_sweep, sine, write_wav};
use upsampler_validate::{
    files_match, quick_validate, Thresholds, ValidateError, ValidationTrace, Validator,
    ValidatorConfig,
};

fn write(dir: &TempDir, name: &str, samples: &[f64], rate: u32, channels: u16) -> std::path::PathBuf {
    let path = dir.path().join(name);
    write_wav(&path, samples, rate, channels).unwrap();
    path
}

#[test]
fn identity_passes_at_every_rate() {
    let dir = tempdir().unwrap();

    for rate in [44100, 48000, 96000] {
        let sweep = log_sweep(20.0, 20000.0, rate, 0.5, 0.25);
        let path = write(&dir, &format!("sweep_{rate}.wav"), &sweep, rate, 2);

        let result = quick_validate(&path, &path).unwrap();
        assert!(result.is_pass(), "rate {rate}: {}", result.summary());
        assert_eq!(result.lag(), 0);
        assert!((result.metrics().correlation() - 1.0).abs() < 1e-9);
        assert!((result.metrics().spectral_similarity() - 1.0).abs() < 1e-9);
        assert_eq!(result.metrics().rms_db_diff(), 0.0);
    }
}

#[test]
fn known_delay_is_recovered_from_disk() {
    let dir = tempdir().unwrap();
    let rate = 48000;
    let sweep = log_sweep(20.0, 20000.0, rate, 1.0, 0.3);

    let reference = write(&dir, "ref.wav", &sweep, rate, 2);
    let captured = write(&dir, "out.wav", &delay(&sweep, 1234), rate, 2);

    let result = quick_validate(&reference, &captured).unwrap();
    assert_eq!(result.lag(), 1234);
    assert!(result.metrics().correlation() > 0.999);
    assert!(result.is_pass());
}

#[test]
fn delay_beyond_window_is_not_selected() {
    let dir = tempdir().unwrap();
    let rate = 48000;
    let sweep = log_sweep(20.0, 20000.0, rate, 1.0, 0.3);

    // 60 ms of latency against a 50 ms window
    let reference = write(&dir, "ref.wav", &sweep, rate, 1);
    let captured = write(&dir, "out.wav", &delay(&sweep, 2880), rate, 1);

    let narrow = quick_validate(&reference, &captured).unwrap();
    assert!(narrow.lag().unsigned_abs() <= 2400);
    assert!(!narrow.is_pass());

    let wide = Validator::new(ValidatorConfig::new(Thresholds::relaxed()))
        .validate_files(&reference, &captured)
        .unwrap();
    assert_eq!(wide.lag(), 2880);
    assert!(wide.metrics().correlation() > narrow.metrics().correlation());
}

#[test]
fn silence_fails_without_arithmetic_errors() {
    let dir = tempdir().unwrap();
    let silence = vec![0.0; 48000];
    let a = write(&dir, "a.wav", &silence, 48000, 2);
    let b = write(&dir, "b.wav", &silence, 48000, 2);

    let result = quick_validate(&a, &b).unwrap();
    assert_eq!(result.metrics().correlation(), 0.0);
    assert_eq!(result.metrics().spectral_similarity(), 0.0);
    assert!(result.metrics().rms_db_diff().is_finite());
    assert!(!result.is_pass());
}

#[test]
fn sample_rate_mismatch_forces_failure() {
    let dir = tempdir().unwrap();
    let tone = sine(1000.0, 48000, 0.5, 0.2);
    let reference = write(&dir, "ref.wav", &tone, 48000, 2);
    // Same samples, wrong header rate
    let captured = write(&dir, "out.wav", &tone, 44100, 2);

    let result = quick_validate(&reference, &captured).unwrap();
    assert!(!result.sample_rate_match());
    assert!(result.channels_match());
    assert!(result.metrics().correlation() > 0.99);
    assert!(!result.is_pass());
    assert!(!files_match(&reference, &captured).unwrap());
}

#[test]
fn channel_count_mismatch_forces_failure() {
    let dir = tempdir().unwrap();
    let tone = sine(440.0, 48000, 0.5, 0.2);
    let reference = write(&dir, "ref.wav", &tone, 48000, 2);
    let captured = write(&dir, "out.wav", &tone, 48000, 1);

    let result = quick_validate(&reference, &captured).unwrap();
    assert!(!result.channels_match());
    assert!(!result.is_pass());
}

#[test]
fn end_to_end_delayed_noisy_sine() {
    let dir = tempdir().unwrap();
    let rate = 48000;
    let reference_samples = sine(440.0, rate, 3.0, 0.2);
    let captured_samples = add_noise(&delay(&reference_samples, 240), 0.002, 42);

    let reference = write(&dir, "sine_440_48000.wav", &reference_samples, rate, 2);
    let captured = write(&dir, "sine_440_48000_out.wav", &captured_samples, rate, 2);

    let result = Validator::new(ValidatorConfig::default())
        .validate_files(&reference, &captured)
        .unwrap();

    assert_eq!(result.lag(), 240);
    assert!(result.metrics().correlation() > 0.99);
    assert!(result.metrics().spectral_similarity() > 0.99);
    assert!(result.metrics().rms_db_diff().abs() < 1.0);
    assert!(result.is_pass());
}

#[test]
fn attenuated_capture_fails_on_level_only() {
    let dir = tempdir().unwrap();
    let sweep = log_sweep(20.0, 20000.0, 44100, 0.5, 0.4);
    let quiet: Vec<f64> = sweep.iter().map(|s| s * 0.25).collect();

    let reference = write(&dir, "ref.wav", &sweep, 44100, 2);
    let captured = write(&dir, "out.wav", &quiet, 44100, 2);

    let result = quick_validate(&reference, &captured).unwrap();
    assert!((result.metrics().rms_db_diff() + 12.04).abs() < 0.01);
    let failed: Vec<&str> = result.failed_checks().map(|c| c.name.as_str()).collect();
    assert_eq!(failed, ["rms_db_diff"]);
}

#[test]
fn missing_target_reports_reference_facts() {
    let dir = tempdir().unwrap();
    let reference = write(&dir, "ref.wav", &sine(440.0, 48000, 0.2, 0.2), 48000, 2);
    let missing = dir.path().join("never_captured.wav");

    let mut trace = ValidationTrace::new();
    let err = Validator::default()
        .validate_files_traced(&reference, &missing, &mut trace)
        .unwrap_err();

    assert!(matches!(err, ValidateError::Load { .. }));
    assert_eq!(trace.reference.as_ref().unwrap().sample_rate, 48000);
    assert!(trace.target.is_none());
    assert!(trace.to_text().contains("Reference:"));
}

#[test]
fn too_small_window_is_alignment_error() {
    let dir = tempdir().unwrap();
    let tone = sine(440.0, 48000, 0.2, 0.2);
    let path = write(&dir, "ref.wav", &tone, 48000, 1);

    let config = ValidatorConfig::new(Thresholds::default().with_max_delay_ms(0.01));
    let mut trace = ValidationTrace::new();
    let err = Validator::new(config)
        .validate_files_traced(&path, &path, &mut trace)
        .unwrap_err();

    assert!(matches!(
        err,
        ValidateError::AlignmentWindow { sample_rate: 48000, .. }
    ));
    assert!(trace.structural.is_some());
}
