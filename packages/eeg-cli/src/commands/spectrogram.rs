use super::{fail, open_session, Context};
use crate::cli::SpectrogramArgs;
use crate::exit_codes;
use crate::output;

pub fn execute(args: SpectrogramArgs, ctx: &Context) -> i32 {
    let session = match open_session(&args.file, ctx) {
        Ok(session) => session,
        Err(code) => return code,
    };

    let spectrogram = match session.spectrogram(args.channel, args.window, args.hop, &ctx.cancel) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    log::info!(
        "Spectrogram of channel {}: {} windows x {} bins",
        args.channel,
        spectrogram.num_windows(),
        spectrogram.num_bins()
    );

    if !output::emit(&spectrogram, args.output.as_deref(), args.compact) {
        return exit_codes::EXECUTION_ERROR;
    }
    exit_codes::SUCCESS
}
