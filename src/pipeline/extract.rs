use std::path::Path;

use super::{ItemOutcome, ItemReport, SkipReason};
use crate::media::{self, MediaEngine};

/// Convert one acquired item into an audio track in `dest_dir`
pub async fn extract_item(engine: &dyn MediaEngine, source: &Path, dest_dir: &Path) -> ItemReport {
    let name = super::display_name(source);

    let Some(target) = media::audio_target(source, dest_dir) else {
        return ItemReport::skipped(name, SkipReason::DecodeFailed("file has no base name".to_string()));
    };

    // The stage directory starts empty, so an existing target came from an earlier item
    if target.exists() {
        let reason = SkipReason::NameCollision {
            existing: super::display_name(&target),
        };
        tracing::warn!("Skipping {}: {}", name, reason);
        return ItemReport::skipped(name, reason);
    }

    match engine.extract_audio(source, &target).await {
        Ok(()) => {
            tracing::info!("Converted: {}", name);
            ItemReport {
                name,
                outcome: ItemOutcome::Produced(target),
            }
        }
        Err(e) => {
            // Do not leave a half-written track for the trim stage to pick up
            if target.exists() {
                let _ = fs_err::remove_file(&target);
            }
            let reason = SkipReason::DecodeFailed(format!("{:#}", e));
            tracing::warn!("Skipping {}: {}", name, reason);
            ItemReport::skipped(name, reason)
        }
    }
}
