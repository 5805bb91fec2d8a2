use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::media::{MediaEngine, AUDIO_EXTENSION};
use crate::workspace;
use crate::{MashupError, Result};

/// What the compose stage produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeReport {
    /// Track names in the order they were joined
    pub tracks: Vec<String>,

    /// Path of the composed output
    pub output: PathBuf,

    /// Length of the composed output, when it could be probed
    pub duration_secs: Option<f64>,
}

/// Join every trimmed track, in file-name order, into `target`.
///
/// Fails without touching `target` when there is nothing to join.
pub async fn compose(engine: &dyn MediaEngine, trimmed_dir: &Path, target: &Path) -> Result<ComposeReport> {
    let inputs = workspace::list_files_with_extension(trimmed_dir, AUDIO_EXTENSION)?;

    if inputs.is_empty() {
        return Err(MashupError::NoTrimmedTracks(trimmed_dir.display().to_string()).into());
    }

    let tracks: Vec<String> = inputs.iter().map(|p| super::display_name(p)).collect();
    for track in &tracks {
        tracing::info!("Added: {}", track);
    }

    if let Err(e) = engine.concat(&inputs, target).await {
        if target.exists() {
            let _ = fs_err::remove_file(target);
        }
        return Err(e.context(format!("Failed to compose {}", target.display())));
    }

    let duration_secs = match engine.probe_duration(target).await {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!("Could not probe composed output {}: {:#}", target.display(), e);
            None
        }
    };

    tracing::info!("Final merged file created: {}", target.display());

    Ok(ComposeReport {
        tracks,
        output: target.to_path_buf(),
        duration_secs,
    })
}
