//! Stage cache keyed on run parameters.
//!
//! A stage directory is only reused when it is populated and the ledger records that it
//! was produced for the same parameters. Rebuilding a stage invalidates every later stage.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::validate::ValidatedRequest;

pub const LEDGER_FILE: &str = "cache.json";

/// Cacheable pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Acquire,
    Extract,
    Trim,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Acquire, Stage::Extract, Stage::Trim];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Acquire => "acquire",
            Stage::Extract => "extract",
            Stage::Trim => "trim",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters a stage's output depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunKey {
    pub subject: String,
    pub item_count: u32,
    /// Only the trim stage depends on the duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
}

impl RunKey {
    pub fn for_stage(stage: Stage, request: &ValidatedRequest) -> Self {
        Self {
            subject: request.subject.trim().to_string(),
            item_count: request.item_count,
            duration_secs: match stage {
                Stage::Trim => Some(request.duration_secs),
                Stage::Acquire | Stage::Extract => None,
            },
        }
    }
}

/// Persistent record of which parameters produced each stage directory
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CacheLedger {
    #[serde(skip)]
    path: PathBuf,
    entries: BTreeMap<Stage, RunKey>,
}

impl CacheLedger {
    /// Load the ledger from the work root; a missing or unreadable ledger starts empty
    pub fn load(root: &Path) -> Self {
        let path = root.join(LEDGER_FILE);
        let entries = match fs_err::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<CacheLedger>(&content) {
                Ok(ledger) => ledger.entries,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt cache ledger {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize cache ledger")?;
        fs_err::write(&self.path, content).context("Failed to write cache ledger")?;
        Ok(())
    }

    pub fn entry(&self, stage: Stage) -> Option<&RunKey> {
        self.entries.get(&stage)
    }

    /// Whether the recorded key for `stage` matches `key`
    pub fn matches(&self, stage: Stage, key: &RunKey) -> bool {
        self.entries.get(&stage) == Some(key)
    }

    /// Record a rebuilt stage, dropping the entries of every later stage
    pub fn record(&mut self, stage: Stage, key: RunKey) {
        self.entries.retain(|s, _| *s < stage);
        self.entries.insert(stage, key);
    }

    /// Forget `stage` and every later stage
    pub fn invalidate_from(&mut self, stage: Stage) {
        self.entries.retain(|s, _| *s < stage);
    }
}
