//! Mashup - build a single audio mashup from a performer's videos
//!
//! This library searches for and downloads a batch of videos, extracts their audio,
//! trims every track to a fixed length, concatenates the tracks into one file and
//! packages the result as a zip archive that can optionally be mailed to a recipient.

pub mod acquire;
pub mod cache;
pub mod cli;
pub mod config;
pub mod delivery;
pub mod form;
pub mod media;
pub mod output;
pub mod package;
pub mod pipeline;
pub mod utils;
pub mod validate;
pub mod workspace;

pub use acquire::{MediaSource, YtDlpSource};
pub use cli::{Cli, Commands, ReportFormat};
pub use config::Config;
pub use media::{FfmpegEngine, MediaEngine};
pub use pipeline::{MashupPipeline, PipelineReport, PipelineRequest};
pub use validate::{ValidatedRequest, ValidationError, ValidationPolicy};
pub use workspace::WorkArea;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Fatal error conditions that callers need to tell apart
#[derive(thiserror::Error, Debug)]
pub enum MashupError {
    #[error("Video download is disabled in this restricted environment. Please run the mashup locally for full functionality.")]
    RestrictedEnvironment,

    #[error("Email credentials not configured: {0} is not set")]
    MissingCredentials(&'static str),

    #[error("No trimmed audio files found in {0}")]
    NoTrimmedTracks(String),

    #[error("Acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
