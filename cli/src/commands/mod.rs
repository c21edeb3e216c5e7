pub mod build;
pub mod config;
pub mod gc;
pub mod info;
pub mod list;
pub mod path;
pub mod pull;
pub mod status;

mod follow;

use anyhow::{Context, Result};
use enginekit_core::downloaders::ReleaseDownloader;
use enginekit_core::{Catalog, Config, TaskRunner, WeightStore};
use std::sync::Arc;

pub fn load_catalog(config: &Config) -> Result<Catalog> {
    Catalog::load(&config.paths.catalog).with_context(|| {
        format!(
            "Please ensure '{}' exists or pass --catalog",
            config.paths.catalog.display()
        )
    })
}

pub fn task_runner(config: &Config) -> Result<TaskRunner> {
    let fetcher = ReleaseDownloader::new(&config.download)?;
    Ok(TaskRunner::new(
        WeightStore::new(config.weights_dir()),
        Arc::new(fetcher),
        config.compiler.clone(),
    ))
}

/// Fail unless `model` is in the catalog, suggesting close names.
pub fn require_model(catalog: &Catalog, model: &str) -> Result<()> {
    if catalog.version_of(model).is_some() {
        return Ok(());
    }

    let matches: Vec<&String> = catalog
        .versions()
        .flat_map(|v| catalog.models(v))
        .filter(|m| m.contains(model))
        .collect();

    if matches.is_empty() {
        anyhow::bail!(
            "Model '{}' is not in the catalog.\n\nRun `enginekit list` to see available models.",
            model
        );
    } else if matches.len() == 1 {
        anyhow::bail!("Model '{}' not found. Did you mean '{}'?", model, matches[0]);
    } else {
        let names: Vec<&str> = matches.iter().map(|m| m.as_str()).collect();
        anyhow::bail!(
            "Model '{}' not found. Similar models:\n  - {}",
            model,
            names.join("\n  - ")
        );
    }
}
