use async_trait::async_trait;
use std::path::Path;

pub mod youtube;

pub use youtube::YtDlpSource;

use crate::Result;

/// Build the provider search query for a subject
pub fn search_query(subject: &str, suffix: &str) -> String {
    let subject = subject.trim();
    if suffix.trim().is_empty() {
        subject.to_string()
    } else {
        format!("{} {}", subject, suffix.trim())
    }
}

/// Trait for searching a provider and fetching the first results into a directory
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Search for `query` and store the first `count` results in `dest`, one file per
    /// result named after its title. Returns the number of files in `dest` afterwards.
    async fn fetch(&self, query: &str, count: u32, dest: &Path) -> Result<usize>;

    /// Get the name of this provider
    fn platform_name(&self) -> &'static str;
}
