use anyhow::Result;
use enginekit_core::{Config, TaskRequest};

use super::follow::follow;
use super::{load_catalog, require_model, task_runner};

pub async fn execute(config: &Config, model: &str) -> Result<()> {
    let catalog = load_catalog(config)?;
    require_model(&catalog, model)?;
    let runner = task_runner(config)?;

    println!("Pulling model: {}", model);

    let handle = runner.spawn(TaskRequest::Download {
        model: model.to_string(),
    });
    let outcome = follow(handle).await?;
    if !outcome.success() {
        anyhow::bail!("Download of '{}' failed", model);
    }

    println!("  Path: {}", runner.store().weights_path(model).display());
    Ok(())
}
