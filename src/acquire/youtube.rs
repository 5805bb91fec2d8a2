use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::MediaSource;
use crate::config::ToolsConfig;
use crate::{MashupError, Result};

/// YouTube search-and-download source using yt-dlp
pub struct YtDlpSource {
    yt_dlp_path: String,
    format: String,
}

impl YtDlpSource {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            yt_dlp_path: tools.yt_dlp.clone(),
            format: tools.download_format.clone(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Arguments for one search-and-download invocation
    fn download_args(&self, query: &str, count: u32, dest: &Path) -> Vec<String> {
        let template = dest.join("%(title)s.%(ext)s");
        vec![
            "--format".to_string(),
            self.format.clone(),
            "--output".to_string(),
            template.to_string_lossy().into_owned(),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            format!("ytsearch{}:{}", count, query),
        ]
    }
}

#[async_trait]
impl MediaSource for YtDlpSource {
    async fn fetch(&self, query: &str, count: u32, dest: &Path) -> Result<usize> {
        if !self.check_availability().await {
            return Err(MashupError::AcquisitionFailed(
                "yt-dlp is not available. Please install it: https://github.com/yt-dlp/yt-dlp".to_string(),
            )
            .into());
        }

        tracing::debug!("Searching yt-dlp for \"{}\" ({} results)", query, count);

        let output = Command::new(&self.yt_dlp_path)
            .args(self.download_args(query, count, dest))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| MashupError::AcquisitionFailed(format!("failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(MashupError::AcquisitionFailed(format!("yt-dlp failed: {}", error.trim())).into());
        }

        let fetched = crate::workspace::list_files(dest)?.len();
        tracing::debug!("yt-dlp left {} files in {}", fetched, dest.display());
        Ok(fetched)
    }

    fn platform_name(&self) -> &'static str {
        "YouTube"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_args_use_search_prefix() {
        let source = YtDlpSource::new(&ToolsConfig::default());
        let args = source.download_args("Test Singer songs", 11, Path::new("work/videos"));

        assert_eq!(args.last().unwrap(), "ytsearch11:Test Singer songs");
        assert!(args.windows(2).any(|w| w[0] == "--format" && w[1] == "best"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--output" && w[1].ends_with("%(title)s.%(ext)s")));
        assert!(args.contains(&"--no-playlist".to_string()));
    }
}
