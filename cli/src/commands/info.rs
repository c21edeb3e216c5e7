//! Show model files

use anyhow::Result;
use chrono::{DateTime, Local};
use enginekit_core::downloaders::release::format_size;
use enginekit_core::{Config, Precision, TaskCategory, WeightStore};
use std::path::Path;

use super::{load_catalog, require_model};

pub fn execute(config: &Config, model: &str) -> Result<()> {
    let catalog = load_catalog(config)?;
    require_model(&catalog, model)?;
    let store = WeightStore::new(config.weights_dir());

    println!("Model: {}", model);
    if let Some(version) = catalog.version_of(model) {
        println!("Version: {}", version);
    }
    println!("Task: {}", TaskCategory::classify(model).as_str());
    println!();

    describe("Weights", &store.weights_path(model))?;
    for precision in Precision::ALL {
        describe(
            &format!("{} engine", precision.label()),
            &store.engine_path(model, precision),
        )?;
    }

    if !store.is_downloaded(model) {
        println!();
        println!("Run `enginekit pull {}` to download the weights.", model);
    }

    Ok(())
}

fn describe(label: &str, path: &Path) -> Result<()> {
    println!("{}: {}", label, path.display());
    if path.is_file() {
        let meta = path.metadata()?;
        let modified: DateTime<Local> = meta.modified()?.into();
        println!(
            "  {}, modified {}",
            format_size(meta.len()),
            modified.format("%Y-%m-%d %H:%M")
        );
    } else {
        println!("  (missing)");
    }
    Ok(())
}
