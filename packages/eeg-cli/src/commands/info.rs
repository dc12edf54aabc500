use super::{open_session, Context};
use crate::cli::InfoArgs;
use crate::exit_codes;
use crate::output;
use eeg_rs::{ChannelStats, Format};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct InfoOutput {
    file: String,
    format: Option<Format>,
    patient_info: String,
    recording_info: String,
    start: Option<String>,
    channel_count: usize,
    duration_s: f64,
    max_sampling_rate: f64,
    channels: Vec<ChannelStats>,
}

pub fn execute(args: InfoArgs, ctx: &Context) -> i32 {
    let session = match open_session(&args.file, ctx) {
        Ok(session) => session,
        Err(code) => return code,
    };
    let recording = session.recording();

    let info = InfoOutput {
        file: args.file.clone(),
        format: Format::from_path(Path::new(&args.file)),
        patient_info: recording.patient_info.clone(),
        recording_info: recording.recording_info.clone(),
        start: recording
            .start
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        channel_count: recording.channel_count(),
        duration_s: recording.duration(),
        max_sampling_rate: recording.max_sampling_rate(),
        channels: session.channel_stats(),
    };

    if args.json {
        if !output::emit(&info, None, false) {
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        println!("File: {}", info.file);
        if !info.patient_info.is_empty() {
            println!("Patient: {}", info.patient_info);
        }
        if !info.recording_info.is_empty() {
            println!("Recording: {}", info.recording_info);
        }
        if let Some(ref start) = info.start {
            println!("Start: {}", start);
        }
        println!(
            "Channels: {}  Duration: {:.2} s  Max rate: {} Hz",
            info.channel_count, info.duration_s, info.max_sampling_rate
        );
        println!();
        println!(
            "{:<4} {:<20} {:>10} {:>10} {:>12} {:>12}",
            "#", "Label", "Samples", "Rate", "Mean", "Std"
        );
        for (i, ch) in info.channels.iter().enumerate() {
            println!(
                "{:<4} {:<20} {:>10} {:>10} {:>12.4} {:>12.4}",
                i, ch.label, ch.samples, ch.sampling_rate, ch.mean, ch.std_dev
            );
        }
    }

    exit_codes::SUCCESS
}
