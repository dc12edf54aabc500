use clap::{Args, Parser, Subcommand};
use eeg_rs::MontageKind;

#[derive(Parser)]
#[command(
    name = "eegproc",
    version,
    about = "EEG recording conversion, filtering and spectral analysis",
    long_about = "Decode EEG recordings (EDF, CSV/TXT/DAT), apply filters and montages,\n\
                  and compute spectra. Processing limits come from --config, $EEG_CONFIG\n\
                  or the EEG_* environment variables."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON processing configuration file
    #[arg(long, env = "EEG_CONFIG", global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show recording metadata and per-channel statistics
    Info(InfoArgs),
    /// Check that a file exists and decodes
    Validate(ValidateArgs),
    /// Convert a recording between formats
    Convert(ConvertArgs),
    /// Apply filters and montages, then save
    Process(ProcessArgs),
    /// Magnitude spectrum of one channel
    Spectrum(SpectrumArgs),
    /// EEG band power per channel
    Bandpower(BandpowerArgs),
    /// Short-time spectrogram of one channel
    Spectrogram(SpectrogramArgs),
}

#[derive(Args)]
pub struct InfoArgs {
    /// Input recording
    #[arg(long)]
    pub file: String,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Input recording
    #[arg(long)]
    pub file: String,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Input recording
    #[arg(long)]
    pub input: String,

    /// Output path; the extension selects the format
    #[arg(long)]
    pub output: String,
}

#[derive(Args)]
pub struct ProcessArgs {
    /// Input recording
    #[arg(long)]
    pub file: String,

    /// Output path; the extension selects the format
    #[arg(short, long)]
    pub output: String,

    /// 0-based channel indices (default: all)
    #[arg(long, num_args = 1..)]
    pub channels: Vec<usize>,

    /// JSON pipeline description; flags below are applied on top of it
    #[arg(long)]
    pub pipeline: Option<String>,

    /// Subtract each channel's mean
    #[arg(long, default_value_t = false)]
    pub remove_dc: bool,

    /// Notch filter at the given frequency (Hz); bare flag uses the configured frequency
    #[arg(long)]
    pub notch: Option<Option<f64>>,

    /// Bandpass cutoffs as "low,high" in Hz
    #[arg(long, value_parser = parse_band)]
    pub bandpass: Option<(f64, f64)>,

    /// Multiply samples by this factor
    #[arg(long, allow_hyphen_values = true)]
    pub gain: Option<f64>,

    /// Add this value to samples
    #[arg(long, allow_hyphen_values = true)]
    pub offset: Option<f64>,

    /// Rescale each channel to [0, 1]
    #[arg(long, default_value_t = false)]
    pub normalize: bool,

    /// Montage applied after channel steps (average, bipolar, laplacian)
    #[arg(long)]
    pub montage: Option<MontageKind>,

    /// Print the processing report as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct SpectrumArgs {
    /// Input recording
    #[arg(long)]
    pub file: String,

    /// 0-based channel index
    #[arg(long, default_value_t = 0)]
    pub channel: usize,

    /// Window start in seconds
    #[arg(long)]
    pub start: Option<f64>,

    /// Window duration in seconds (requires --start)
    #[arg(long, requires = "start")]
    pub duration: Option<f64>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args)]
pub struct BandpowerArgs {
    /// Input recording
    #[arg(long)]
    pub file: String,

    /// 0-based channel indices (default: all)
    #[arg(long, num_args = 1..)]
    pub channels: Vec<usize>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct SpectrogramArgs {
    /// Input recording
    #[arg(long)]
    pub file: String,

    /// 0-based channel index
    #[arg(long, default_value_t = 0)]
    pub channel: usize,

    /// Window length in samples (default from configuration)
    #[arg(long)]
    pub window: Option<usize>,

    /// Hop in samples (default from configuration)
    #[arg(long)]
    pub hop: Option<usize>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

/// Parse a band string "low,high" into (low, high).
pub fn parse_band(s: &str) -> Result<(f64, f64), String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid band '{}': expected 'low,high' in Hz",
            s
        ));
    }
    let low = parts[0]
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("Invalid band '{}': '{}' is not a number", s, parts[0]))?;
    let high = parts[1]
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("Invalid band '{}': '{}' is not a number", s, parts[1]))?;
    Ok((low, high))
}
