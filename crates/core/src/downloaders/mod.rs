pub mod release;

use async_trait::async_trait;
use std::path::Path;

use crate::tasks::Progress;

/// Retrieves model weights into a target path.
///
/// Implementations skip the transfer when `dest` already exists and return
/// an error when retrieval fails.
#[async_trait]
pub trait WeightFetcher: Send + Sync {
    async fn fetch(&self, model: &str, dest: &Path, progress: &Progress) -> anyhow::Result<()>;
}

pub use release::ReleaseDownloader;
