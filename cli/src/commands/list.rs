use anyhow::Result;
use enginekit_core::{Config, Precision, TaskCategory, WeightStore};

use super::load_catalog;

fn mark(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "-"
    }
}

pub fn execute(config: &Config, version: Option<&str>) -> Result<()> {
    let catalog = load_catalog(config)?;
    let store = WeightStore::new(config.weights_dir());

    if catalog.is_empty() {
        println!("The catalog at {} is empty.", config.paths.catalog.display());
        return Ok(());
    }

    let versions: Vec<&str> = match version {
        Some(v) => {
            if catalog.models(v).is_empty() {
                let known: Vec<&str> = catalog.versions().collect();
                anyhow::bail!(
                    "Unknown version '{}'. Available: {}",
                    v,
                    known.join(", ")
                );
            }
            vec![v]
        }
        None => catalog.versions().collect(),
    };

    for version in versions {
        println!("{}", version);
        println!(
            "  {:<24} {:<16} {:<11} {:<6} {:<6} {}",
            "MODEL",
            "TASK",
            "DOWNLOADED",
            Precision::Fp32.label(),
            Precision::Fp16.label(),
            Precision::Int8.label()
        );
        println!("  {}", "-".repeat(74));

        for model in catalog.models(version) {
            let status = store.snapshot(model);
            println!(
                "  {:<24} {:<16} {:<11} {:<6} {:<6} {}",
                model,
                TaskCategory::classify(model).as_str(),
                mark(status.downloaded),
                mark(status.fp32),
                mark(status.fp16),
                mark(status.int8)
            );
        }
        println!();
    }

    println!("Weights directory: {}", store.weights_dir().display());
    Ok(())
}
