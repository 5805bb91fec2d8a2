use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::validate::ValidationPolicy;

/// Environment variable marking a restricted hosting environment
pub const RESTRICTED_ENV: &str = "MASHUP_RESTRICTED";

/// Environment variable holding the sender mailbox
pub const SENDER_EMAIL_ENV: &str = "SENDER_EMAIL";

/// Environment variable holding the application password for the relay
pub const APP_PASSWORD_ENV: &str = "APP_PASSWORD";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Work area settings
    pub workspace: WorkspaceConfig,

    /// Input thresholds
    pub policy: ValidationPolicy,

    /// External tool settings
    pub tools: ToolsConfig,

    /// Names of the produced files
    pub output: OutputConfig,

    /// Outbound mail relay
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Root directory holding the stage subdirectories
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// yt-dlp executable
    pub yt_dlp: String,

    /// ffmpeg executable
    pub ffmpeg: String,

    /// ffprobe executable
    pub ffprobe: String,

    /// yt-dlp format selector for acquired items
    pub download_format: String,

    /// Appended to the subject to form the search query
    pub search_suffix: String,

    /// MP3 bitrate for every encoded track
    pub audio_bitrate: String,

    /// Sample rate for every encoded track
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Composed output name when the caller does not name it
    pub composed_name: String,

    /// Archive name when the caller does not name it
    pub archive_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// SMTP relay host
    pub smtp_host: String,

    /// SMTP relay port (implicit TLS)
    pub smtp_port: u16,

    /// Message subject line
    pub subject: String,

    /// Plain-text message body
    pub body: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("mashup-work"),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            download_format: "best".to_string(),
            search_suffix: "songs".to_string(),
            audio_bitrate: "192k".to_string(),
            sample_rate: 44100,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            composed_name: "final_mashup.mp3".to_string(),
            archive_name: "mashup_result.zip".to_string(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 465,
            subject: "Your Mashup File".to_string(),
            body: "Hello,\n\nYour mashup has been generated successfully.\n\
                   Please find the attached ZIP file.\n\nRegards"
                .to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, the default locations, or fall back to defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file does not exist: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::config_path().ok().filter(|path| path.exists()),
        };

        let config = match config_path {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                let content = fs_err::read_to_string(&path)
                    .context("Failed to read config file")?;
                serde_yaml::from_str(&content).context("Failed to parse config file")?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file, returning the path written
    pub fn save(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("mashup.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("mashup").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        let tools = [
            ("yt_dlp", &self.tools.yt_dlp),
            ("ffmpeg", &self.tools.ffmpeg),
            ("ffprobe", &self.tools.ffprobe),
        ];
        for (name, value) in tools {
            if value.trim().is_empty() {
                anyhow::bail!("tools.{} must not be empty", name);
            }
        }

        if !self.output.composed_name.to_lowercase().ends_with(".mp3") {
            anyhow::bail!("output.composed_name must end with .mp3");
        }

        if !self.output.archive_name.to_lowercase().ends_with(".zip") {
            anyhow::bail!("output.archive_name must end with .zip");
        }

        if self.mail.smtp_port == 0 {
            anyhow::bail!("mail.smtp_port must be non-zero");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Work Directory: {}", self.workspace.root.display());
        println!(
            "  Thresholds: count > {}, duration > {}s",
            self.policy.min_items_exclusive, self.policy.min_duration_exclusive
        );
        println!(
            "  Tools: {} / {} / {}",
            self.tools.yt_dlp, self.tools.ffmpeg, self.tools.ffprobe
        );
        println!("  Search Query: \"<subject> {}\"", self.tools.search_suffix);
        println!("  Composed Output: {}", self.output.composed_name);
        println!("  Archive: {}", self.output.archive_name);
        println!("  SMTP Relay: {}:{}", self.mail.smtp_host, self.mail.smtp_port);
    }
}

/// Whether the environment marks this host as unable to download media
pub fn restricted_from_env() -> bool {
    is_restricted(std::env::var(RESTRICTED_ENV).ok().as_deref())
}

fn is_restricted(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => false,
        Some(v) => !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.policy.min_items_exclusive, 10);
        assert_eq!(config.mail.smtp_port, 465);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml("policy:\n  min_items_exclusive: 3\n  min_duration_exclusive: 5\n").unwrap();
        assert_eq!(config.policy.min_items_exclusive, 3);
        assert_eq!(config.tools.yt_dlp, "yt-dlp");
        assert_eq!(config.output.archive_name, "mashup_result.zip");
    }

    #[test]
    fn test_rejects_bad_names() {
        assert!(Config::from_yaml("output:\n  archive_name: result.tar\n").is_err());
        assert!(Config::from_yaml("tools:\n  ffmpeg: ''\n").is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let mut config = Config::default();
        config.workspace.root = PathBuf::from("/srv/mashup");
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.workspace.root, PathBuf::from("/srv/mashup"));
    }

    #[test]
    fn test_missing_explicit_path_fails() {
        assert!(Config::load(Some(Path::new("/definitely/not/here.yaml"))).is_err());
    }

    #[test]
    fn test_restricted_flag_values() {
        assert!(!is_restricted(None));
        assert!(!is_restricted(Some("")));
        assert!(!is_restricted(Some("0")));
        assert!(!is_restricted(Some("false")));
        assert!(is_restricted(Some("1")));
        assert!(is_restricted(Some("true")));
    }
}
