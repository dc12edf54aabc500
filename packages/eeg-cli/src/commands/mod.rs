pub mod bandpower;
pub mod convert;
pub mod info;
pub mod process;
pub mod spectrogram;
pub mod spectrum;
pub mod validate;

use crate::cli::Command;
use crate::exit_codes;
use eeg_rs::{CancellationToken, EegError, EegSession, ProcessingConfig};

/// Settings shared by every command
pub struct Context {
    pub config: ProcessingConfig,
    pub cancel: CancellationToken,
}

pub fn dispatch(command: Command, ctx: &Context) -> i32 {
    match command {
        Command::Info(args) => info::execute(args, ctx),
        Command::Validate(args) => validate::execute(args, ctx),
        Command::Convert(args) => convert::execute(args, ctx),
        Command::Process(args) => process::execute(args, ctx),
        Command::Spectrum(args) => spectrum::execute(args, ctx),
        Command::Bandpower(args) => bandpower::execute(args, ctx),
        Command::Spectrogram(args) => spectrogram::execute(args, ctx),
    }
}

/// Exit code for a library error
pub fn exit_code_for(err: &EegError) -> i32 {
    match err {
        EegError::CancelledOperation => exit_codes::CANCELLED,
        EegError::FileNotFound(_)
        | EegError::TruncatedHeader(_)
        | EegError::TruncatedData(_)
        | EegError::InvalidSignalCount(_)
        | EegError::UnsupportedFormat(_)
        | EegError::InvalidChannelIndex { .. }
        | EegError::InvalidFilterParameters(_)
        | EegError::InvalidSpectrogramParameters(_)
        | EegError::InsufficientDataForSpectrogram { .. }
        | EegError::InvalidConfig(_) => exit_codes::INPUT_ERROR,
        EegError::CorruptedCalibration { .. }
        | EegError::EmptyRecording
        | EegError::IoError(_) => exit_codes::EXECUTION_ERROR,
    }
}

/// Print an error and return its exit code
pub fn fail(err: &EegError) -> i32 {
    eprintln!("Error: {}", err);
    exit_code_for(err)
}

pub fn open_session(file: &str, ctx: &Context) -> Result<EegSession, i32> {
    log::info!("Opening {}", file);
    EegSession::open(file, ctx.config.clone(), &ctx.cancel).map_err(|e| fail(&e))
}

/// Requested channel indices, or every channel when none were given
pub fn selected_channels(requested: &[usize], session: &EegSession) -> Vec<usize> {
    if requested.is_empty() {
        (0..session.channel_count()).collect()
    } else {
        requested.to_vec()
    }
}
