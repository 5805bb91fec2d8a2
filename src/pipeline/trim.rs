use std::path::Path;

use super::{ItemOutcome, ItemReport, SkipReason};
use crate::media::MediaEngine;

/// Keep the first `seconds` of one audio track, dropping tracks that are shorter
pub async fn trim_item(engine: &dyn MediaEngine, source: &Path, dest_dir: &Path, seconds: u64) -> ItemReport {
    let name = super::display_name(source);

    let actual_secs = match engine.probe_duration(source).await {
        Ok(d) => d,
        Err(e) => {
            let reason = SkipReason::DecodeFailed(format!("{:#}", e));
            tracing::warn!("Error trimming {}: {}", name, reason);
            return ItemReport::skipped(name, reason);
        }
    };

    if actual_secs < seconds as f64 {
        let reason = SkipReason::TooShort {
            actual_secs,
            required_secs: seconds,
        };
        tracing::warn!("Skipping {}: {}", name, reason);
        return ItemReport::skipped(name, reason);
    }

    let Some(file_name) = source.file_name() else {
        return ItemReport::skipped(name, SkipReason::DecodeFailed("file has no name".to_string()));
    };
    let target = dest_dir.join(file_name);

    match engine.trim(source, &target, seconds).await {
        Ok(()) => {
            tracing::info!("Trimmed: {}", name);
            ItemReport {
                name,
                outcome: ItemOutcome::Produced(target),
            }
        }
        Err(e) => {
            if target.exists() {
                let _ = fs_err::remove_file(&target);
            }
            let reason = SkipReason::DecodeFailed(format!("{:#}", e));
            tracing::warn!("Error trimming {}: {}", name, reason);
            ItemReport::skipped(name, reason)
        }
    }
}
