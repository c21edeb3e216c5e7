use crate::downloaders::WeightFetcher;
use crate::store::WeightStore;

use super::{Progress, TaskOutcome};

/// Fetch the weights for `model` and report whether they ended up on disk.
///
/// The presence of the weights file after the fetcher returns is what
/// decides success; an error from the fetcher is always a failure.
pub async fn run(
    store: &WeightStore,
    fetcher: &dyn WeightFetcher,
    model: &str,
    progress: &Progress,
) -> TaskOutcome {
    match download(store, fetcher, model, progress).await {
        Ok(true) => TaskOutcome::Download {
            success: true,
            message: "Download successful.".to_string(),
        },
        Ok(false) => {
            progress.line("Download failed. Model file not found.");
            TaskOutcome::Download {
                success: false,
                message: "Download failed.".to_string(),
            }
        }
        Err(e) => {
            tracing::warn!("Download of {} failed: {:#}", model, e);
            progress.line(format!("An error occurred during download: {:#}", e));
            TaskOutcome::Download {
                success: false,
                message: format!("{:#}", e),
            }
        }
    }
}

async fn download(
    store: &WeightStore,
    fetcher: &dyn WeightFetcher,
    model: &str,
    progress: &Progress,
) -> anyhow::Result<bool> {
    store.ensure_dir()?;
    let weights = store.weights_path(model);

    if weights.is_file() {
        progress.line(format!("Model already present: {}", weights.display()));
        return Ok(true);
    }

    progress.line(format!("Starting to download model {}...", model));
    fetcher.fetch(model, &weights, progress).await?;

    let present = weights.is_file();
    if present {
        progress.line(format!(
            "Download of {} complete and stored at {}.",
            model,
            weights.display()
        ));
    }
    Ok(present)
}
