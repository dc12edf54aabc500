use super::{exit_code_for, Context};
use crate::cli::ValidateArgs;
use crate::exit_codes;
use crate::output;
use eeg_rs::{codec, Format};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ValidateOutput {
    file: String,
    exists: bool,
    format: Option<Format>,
    decodes: bool,
    channel_count: Option<usize>,
    size_bytes: Option<u64>,
    error: Option<String>,
}

pub fn execute(args: ValidateArgs, ctx: &Context) -> i32 {
    let path = Path::new(&args.file);
    let exists = path.is_file();
    let size_bytes = std::fs::metadata(path).ok().map(|m| m.len());

    let decoded = codec::decode_file(path, &ctx.config, &ctx.cancel);
    let (channel_count, error, code) = match &decoded {
        Ok(recording) => (Some(recording.channel_count()), None, exit_codes::SUCCESS),
        Err(e) => (None, Some(e.to_string()), exit_code_for(e)),
    };

    let result = ValidateOutput {
        file: args.file.clone(),
        exists,
        format: Format::from_path(path),
        decodes: decoded.is_ok(),
        channel_count,
        size_bytes,
        error: error.clone(),
    };

    if args.json {
        if !output::emit(&result, None, false) {
            return exit_codes::EXECUTION_ERROR;
        }
    } else if let Some(ref err) = error {
        eprintln!("Error: {}", err);
    } else {
        println!(
            "File '{}' is valid ({} channels, {} bytes)",
            args.file,
            channel_count.unwrap_or(0),
            size_bytes.unwrap_or(0)
        );
    }

    code
}
