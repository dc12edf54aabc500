use super::{fail, open_session, Context};
use crate::cli::ConvertArgs;
use crate::exit_codes;

pub fn execute(args: ConvertArgs, ctx: &Context) -> i32 {
    let session = match open_session(&args.input, ctx) {
        Ok(session) => session,
        Err(code) => return code,
    };

    if let Err(e) = session.save(&args.output) {
        return fail(&e);
    }

    println!(
        "Converted {} channels: {} -> {}",
        session.channel_count(),
        args.input,
        args.output
    );
    exit_codes::SUCCESS
}
