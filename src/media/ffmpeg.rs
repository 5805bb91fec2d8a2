use anyhow::Context;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

use super::MediaEngine;
use crate::config::ToolsConfig;
use crate::Result;

/// Media engine backed by the ffmpeg and ffprobe executables
pub struct FfmpegEngine {
    ffmpeg_path: String,
    ffprobe_path: String,
    bitrate: String,
    sample_rate: u32,
}

impl FfmpegEngine {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            ffmpeg_path: tools.ffmpeg.clone(),
            ffprobe_path: tools.ffprobe.clone(),
            bitrate: tools.audio_bitrate.clone(),
            sample_rate: tools.sample_rate,
        }
    }

    /// Encoder arguments shared by every produced track
    fn encode_args(&self) -> Vec<String> {
        vec![
            "-vn".to_string(),
            "-acodec".to_string(),
            "libmp3lame".to_string(),
            "-ab".to_string(),
            self.bitrate.clone(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
        ]
    }

    async fn run_ffmpeg(&self, args: Vec<String>, what: &str) -> Result<()> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .arg("-nostdin")
            .args(&args)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.ffmpeg_path))?;

        check_status(&output, what)
    }
}

fn check_status(output: &Output, what: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail: Vec<&str> = stderr.lines().rev().take(3).collect();
    let detail = tail.into_iter().rev().collect::<Vec<_>>().join(" | ");
    anyhow::bail!("{} failed: {}", what, detail)
}

/// Pull the duration out of ffprobe JSON, requiring an audio stream
fn parse_probe(json: &[u8], path: &Path) -> Result<f64> {
    let info: serde_json::Value = serde_json::from_slice(json).context("Failed to parse ffprobe output")?;

    let empty_vec = vec![];
    let streams = info["streams"].as_array().unwrap_or(&empty_vec);
    let audio = streams
        .iter()
        .find(|stream| stream["codec_type"].as_str() == Some("audio"))
        .ok_or_else(|| anyhow::anyhow!("File does not contain any audio streams: {}", path.display()))?;

    info["format"]["duration"]
        .as_str()
        .or_else(|| audio["duration"].as_str())
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| anyhow::anyhow!("Could not determine duration of {}", path.display()))
}

/// Contents of an ffmpeg concat-demuxer list, one `file '<path>'` line per input
pub fn concat_manifest(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| format!("file '{}'", p.to_string_lossy().replace('\'', r"'\''")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.ffprobe_path))?;

        check_status(&output, "ffprobe")?;
        parse_probe(&output.stdout, path)
    }

    async fn extract_audio(&self, source: &Path, target: &Path) -> Result<()> {
        tracing::debug!("Extracting audio {} -> {}", source.display(), target.display());

        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            source.to_string_lossy().into_owned(),
        ];
        args.extend(self.encode_args());
        args.push(target.to_string_lossy().into_owned());

        self.run_ffmpeg(args, "Audio extraction").await
    }

    async fn trim(&self, source: &Path, target: &Path, seconds: u64) -> Result<()> {
        tracing::debug!("Trimming {} to {}s", source.display(), seconds);

        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            source.to_string_lossy().into_owned(),
            "-t".to_string(),
            seconds.to_string(),
        ];
        args.extend(self.encode_args());
        args.push(target.to_string_lossy().into_owned());

        self.run_ffmpeg(args, "Trimming").await
    }

    async fn concat(&self, inputs: &[PathBuf], target: &Path) -> Result<()> {
        if inputs.is_empty() {
            anyhow::bail!("No tracks to concatenate");
        }

        // The demuxer resolves relative entries against the list file, so pin them down
        let absolute = inputs
            .iter()
            .map(|p| fs_err::canonicalize(p).map_err(anyhow::Error::from))
            .collect::<Result<Vec<_>>>()?;

        let list_dir = target.parent().unwrap_or_else(|| Path::new("."));
        let mut manifest = tempfile::Builder::new()
            .prefix(".concat_")
            .suffix(".txt")
            .tempfile_in(list_dir)
            .context("Failed to create concat list")?;
        manifest
            .write_all(concat_manifest(&absolute).as_bytes())
            .context("Failed to write concat list")?;
        manifest.flush()?;

        tracing::debug!("Concatenating {} tracks into {}", inputs.len(), target.display());

        let mut args = vec![
            "-y".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            manifest.path().to_string_lossy().into_owned(),
        ];
        args.extend(self.encode_args());
        args.push(target.to_string_lossy().into_owned());

        // The list file is removed when `manifest` drops, on both paths
        self.run_ffmpeg(args, "Concatenation").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_manifest_quotes_paths() {
        let manifest = concat_manifest(&[
            PathBuf::from("/work/trimmed/A Song.mp3"),
            PathBuf::from("/work/trimmed/Don't Stop.mp3"),
        ]);
        let lines: Vec<&str> = manifest.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "file '/work/trimmed/A Song.mp3'");
        assert_eq!(lines[1], r"file '/work/trimmed/Don'\''t Stop.mp3'");
    }

    #[test]
    fn test_parse_probe_reads_format_duration() {
        let json = br#"{"streams":[{"codec_type":"video"},{"codec_type":"audio"}],"format":{"duration":"21.003"}}"#;
        let duration = parse_probe(json, Path::new("a.mp3")).unwrap();
        assert!((duration - 21.003).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_requires_audio() {
        let json = br#"{"streams":[{"codec_type":"video"}],"format":{"duration":"10.0"}}"#;
        assert!(parse_probe(json, Path::new("silent.mp4")).is_err());
    }

    #[test]
    fn test_encode_args_use_configured_bitrate() {
        let engine = FfmpegEngine::new(&ToolsConfig::default());
        let args = engine.encode_args();
        assert!(args.windows(2).any(|w| w[0] == "-ab" && w[1] == "192k"));
        assert!(args.windows(2).any(|w| w[0] == "-ar" && w[1] == "44100"));
    }
}
