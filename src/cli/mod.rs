use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Usage line printed alongside command-line validation errors
pub const USAGE: &str = "Usage: mashup build \"<SingerName>\" <NumberOfVideos> <AudioDuration> <OutputFileName>\n\
                         Example: mashup build \"Sharry Maan\" 20 21 output.mp3";

#[derive(Parser)]
#[command(
    name = "mashup",
    about = "Mashup - build one audio mashup from a performer's videos",
    version,
    long_about = "Downloads a batch of videos for a performer, extracts their audio, trims every track to a fixed length, joins the tracks into one file and packages it as a zip archive that can be mailed to a recipient."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Configuration file (defaults to ./mashup.yaml, then the user config directory)
    #[arg(short, long, global = true, value_name = "FILE", env = "MASHUP_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a mashup from the command line
    Build {
        /// Performer whose songs are searched for
        #[arg(value_name = "SINGER_NAME")]
        subject: String,

        /// Number of videos to download
        #[arg(value_name = "NUMBER_OF_VIDEOS", allow_hyphen_values = true)]
        item_count: String,

        /// Seconds kept from the start of every track
        #[arg(value_name = "AUDIO_DURATION", allow_hyphen_values = true)]
        duration: String,

        /// Output file name: .mp3 names the composed audio, .zip names the archive
        #[arg(value_name = "OUTPUT_FILE_NAME")]
        output: String,

        /// Work directory (overrides the configured one)
        #[arg(short, long, value_name = "DIR")]
        work_dir: Option<PathBuf>,

        /// Mail the archive to this address when done
        #[arg(short, long, value_name = "ADDRESS")]
        email: Option<String>,

        /// Write the run report to a file
        #[arg(short, long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// Run report format
        #[arg(short, long, value_enum, default_value = "text")]
        format: ReportFormat,
    },

    /// Collect the parameters interactively and mail the result
    Interactive {
        /// Work directory (overrides the configured one)
        #[arg(short, long, value_name = "DIR")]
        work_dir: Option<PathBuf>,
    },

    /// Show or initialise the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write a default configuration file
        #[arg(long)]
        init: bool,
    },

    /// Check that yt-dlp, ffmpeg and ffprobe are installed
    Check,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum ReportFormat {
    /// Human-readable summary
    Text,
    /// JSON report
    Json,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Text => write!(f, "text"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}
