pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod signal_processing;
pub mod types;

pub use codec::Format;
pub use config::ProcessingConfig;
pub use error::{EegError, Result};
pub use pipeline::{PipelineConfig, PipelineReport};
pub use session::{EegSession, SessionEvent};
pub use signal_processing::{BandPower, ChannelStats, MontageKind, MontageReport, Spectrogram};
pub use types::*;

pub use tokio_util::sync::CancellationToken;
