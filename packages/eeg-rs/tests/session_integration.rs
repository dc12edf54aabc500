use eeg_rs::pipeline::{self, PipelineConfig};
use eeg_rs::{
    CancellationToken, Channel, EegError, EegSession, MontageKind, ProcessingConfig, Recording,
    SessionEvent,
};
use std::cell::Cell;
use std::f64::consts::PI;
use std::fs;
use std::rc::Rc;
use tempfile::TempDir;

fn sine(freq: f64, amplitude: f64, rate: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| amplitude * (2.0 * PI * freq * i as f64 / rate).sin())
        .collect()
}

fn write_montage_csv(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("montage.csv");
    let mut content = String::from("Time,Fp1,F7,T3,T5,O1\n");
    for i in 0..500 {
        let t = i as f64 / 250.0;
        let alpha = (2.0 * PI * 10.0 * t).sin();
        let line_noise = 0.5 * (2.0 * PI * 50.0 * t).sin();
        content.push_str(&format!(
            "{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}\n",
            t,
            alpha + line_noise,
            2.0 * alpha,
            line_noise,
            -alpha,
            0.25
        ));
    }
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_open_process_save_reopen() {
    let dir = TempDir::new().unwrap();
    let input = write_montage_csv(&dir);

    let mut session = EegSession::open(
        &input,
        ProcessingConfig::default(),
        &CancellationToken::new(),
    )
    .unwrap();
    assert_eq!(session.channel_count(), 5);

    let changes = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&changes);
    session.subscribe(move |event| {
        if *event == SessionEvent::DataChanged {
            counter.set(counter.get() + 1);
        }
    });

    for ch in 0..session.channel_count() {
        session.apply_notch(ch, None).unwrap();
    }
    let report = session.apply_montage(MontageKind::Bipolar).unwrap();
    assert_eq!(report.channels_out, 4);
    assert_eq!(changes.get(), 6);

    let output = dir.path().join("bipolar.csv");
    session.save(&output).unwrap();

    let reopened = EegSession::open(
        &output,
        ProcessingConfig::default(),
        &CancellationToken::new(),
    )
    .unwrap();
    assert_eq!(
        reopened.recording().labels(),
        vec!["Fp1-F7", "F7-T3", "T3-T5", "T5-O1"]
    );
}

#[test]
fn test_alpha_dominates_after_bandpass() {
    let mut recording = Recording::new();
    let mut data = sine(10.0, 1.0, 250.0, 2000);
    for (x, noise) in data.iter_mut().zip(sine(45.0, 2.0, 250.0, 2000)) {
        *x += noise;
    }
    recording.add_channel(Channel::new("O1", 250.0, data));
    let mut session = EegSession::with_recording(recording, ProcessingConfig::default());

    assert_eq!(session.band_power(0).unwrap().dominant(), "gamma");
    session.apply_filter(0, 8.0, 13.0).unwrap();
    assert_eq!(session.band_power(0).unwrap().dominant(), "alpha");
}

#[test]
fn test_average_reference_zero_sum_across_session() {
    let mut recording = Recording::new();
    for (i, freq) in [3.0, 7.0, 11.0, 19.0].iter().enumerate() {
        recording.add_channel(Channel::new(
            format!("E{}", i),
            250.0,
            sine(*freq, i as f64 + 1.0, 250.0, 250),
        ));
    }
    let mut session = EegSession::with_recording(recording, ProcessingConfig::default());
    session.apply_montage(MontageKind::AverageReference).unwrap();

    for s in 0..250 {
        let sum: f64 = session
            .recording()
            .channels
            .iter()
            .map(|c| c.data[s])
            .sum();
        assert!(sum.abs() < 1e-9);
    }
}

#[test]
fn test_spectrogram_cancellation_through_session() {
    let mut recording = Recording::new();
    recording.add_channel(Channel::new("Cz", 250.0, sine(10.0, 1.0, 250.0, 4000)));
    let session = EegSession::with_recording(recording, ProcessingConfig::default());

    let cancel = CancellationToken::new();
    let spec = session.spectrogram(0, Some(256), Some(64), &cancel).unwrap();
    assert_eq!(spec.num_windows(), (4000 - 256) / 64 + 1);

    cancel.cancel();
    assert!(matches!(
        session.spectrogram(0, Some(256), Some(64), &cancel),
        Err(EegError::CancelledOperation)
    ));
}

#[test]
fn test_pipeline_over_decoded_file() {
    let dir = TempDir::new().unwrap();
    let input = write_montage_csv(&dir);
    let mut session = EegSession::open(
        &input,
        ProcessingConfig::default(),
        &CancellationToken::new(),
    )
    .unwrap();

    let config = PipelineConfig {
        montage: Some(MontageKind::Laplacian),
        ..PipelineConfig::standard_eeg(50.0)
    };
    let report = pipeline::run(&mut session, &config).unwrap();

    assert_eq!(report.channels_processed, 5);
    assert_eq!(report.steps.len(), 4);
    assert!(session
        .recording()
        .channels
        .iter()
        .all(|c| c.data.iter().all(|x| x.is_finite())));
}
