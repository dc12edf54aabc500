use super::{fail, open_session, Context};
use crate::cli::SpectrumArgs;
use crate::exit_codes;
use crate::output;
use eeg_rs::TimeWindow;
use serde::Serialize;

#[derive(Serialize)]
struct SpectrumOutput {
    channel: usize,
    label: String,
    sampling_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    window: Option<TimeWindow>,
    frequencies: Vec<f64>,
    magnitudes: Vec<f64>,
}

pub fn execute(args: SpectrumArgs, ctx: &Context) -> i32 {
    let session = match open_session(&args.file, ctx) {
        Ok(session) => session,
        Err(code) => return code,
    };

    let window = args.start.map(|start| TimeWindow {
        start,
        duration: args
            .duration
            .unwrap_or_else(|| session.recording().duration() - start),
    });

    let magnitudes = match session.power_spectrum(args.channel, window) {
        Ok(m) => m,
        Err(e) => return fail(&e),
    };
    let frequencies = match session.spectrum_frequencies(args.channel, magnitudes.len()) {
        Ok(f) => f,
        Err(e) => return fail(&e),
    };
    let channel = match session.channel(args.channel) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let result = SpectrumOutput {
        channel: args.channel,
        label: channel.label.clone(),
        sampling_rate: channel.sampling_rate,
        window,
        frequencies,
        magnitudes,
    };

    if !output::emit(&result, args.output.as_deref(), args.compact) {
        return exit_codes::EXECUTION_ERROR;
    }
    exit_codes::SUCCESS
}
