use super::{fail, open_session, selected_channels, Context};
use crate::cli::BandpowerArgs;
use crate::exit_codes;
use crate::output;
use eeg_rs::BandPower;
use serde::Serialize;

#[derive(Serialize)]
struct ChannelBandPower {
    channel: usize,
    label: String,
    #[serde(flatten)]
    power: BandPower,
    dominant: &'static str,
}

pub fn execute(args: BandpowerArgs, ctx: &Context) -> i32 {
    let session = match open_session(&args.file, ctx) {
        Ok(session) => session,
        Err(code) => return code,
    };

    let mut results = Vec::new();
    for ch in selected_channels(&args.channels, &session) {
        let power = match session.band_power(ch) {
            Ok(p) => p,
            Err(e) => return fail(&e),
        };
        let label = match session.channel(ch) {
            Ok(c) => c.label.clone(),
            Err(e) => return fail(&e),
        };
        results.push(ChannelBandPower {
            channel: ch,
            label,
            power,
            dominant: power.dominant(),
        });
    }

    if args.json {
        if !output::emit(&results, None, false) {
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        println!(
            "{:<4} {:<20} {:>12} {:>12} {:>12} {:>12} {:>12}  Dominant",
            "#", "Label", "Delta", "Theta", "Alpha", "Beta", "Gamma"
        );
        for r in &results {
            println!(
                "{:<4} {:<20} {:>12.4e} {:>12.4e} {:>12.4e} {:>12.4e} {:>12.4e}  {}",
                r.channel,
                r.label,
                r.power.delta,
                r.power.theta,
                r.power.alpha,
                r.power.beta,
                r.power.gamma,
                r.dominant
            );
        }
    }

    exit_codes::SUCCESS
}
