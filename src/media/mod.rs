use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod ffmpeg;

pub use ffmpeg::FfmpegEngine;

use crate::Result;

/// Extension of the standard audio container every track is encoded to
pub const AUDIO_EXTENSION: &str = "mp3";

/// Decode, encode, cut and join audio
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Length of the audio stream in seconds
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Decode the audio stream of `source` and encode it into the standard container
    async fn extract_audio(&self, source: &Path, target: &Path) -> Result<()>;

    /// Keep the first `seconds` of `source`
    async fn trim(&self, source: &Path, target: &Path, seconds: u64) -> Result<()>;

    /// Append `inputs` one after another, in the given order, into one track
    async fn concat(&self, inputs: &[PathBuf], target: &Path) -> Result<()>;
}

/// Target path for the audio track derived from `source`: same base name, standard extension
pub fn audio_target(source: &Path, dir: &Path) -> Option<PathBuf> {
    let stem = source.file_stem()?;
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(AUDIO_EXTENSION);
    Some(dir.join(name))
}
