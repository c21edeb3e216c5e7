use anyhow::Result;
use dialoguer::Confirm;
use enginekit_core::controller::build_enablement;
use enginekit_core::{Capabilities, Config, Enablement, Precision, TaskRequest};
use std::path::PathBuf;

use super::follow::follow;
use super::{load_catalog, require_model, task_runner};

pub async fn execute(
    config: &Config,
    model: &str,
    precision: Precision,
    calibration: Option<PathBuf>,
    yes: bool,
    force: bool,
) -> Result<()> {
    let catalog = load_catalog(config)?;
    require_model(&catalog, model)?;
    let runner = task_runner(config)?;
    let status = runner.store().snapshot(model);

    if force {
        tracing::warn!("Skipping GPU and TensorRT checks");
    } else {
        let caps = Capabilities::detect(&config.probe);
        if let Enablement::Disabled(reason) =
            build_enablement(&status, &caps, calibration.is_some(), precision)
        {
            anyhow::bail!("{}", reason.message());
        }
    }

    if calibration.is_some() && !precision.needs_calibration() {
        println!("Note: --calibration is only used for int8 builds; ignoring it.");
    }

    if status.is_built(precision) && !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "{} engine for {} already exists. Rebuild it?",
                precision.label(),
                model
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            return Ok(());
        }
    }

    println!(
        "Building {} engine for {} on {}",
        precision.label(),
        model,
        config.compiler.device
    );

    let handle = runner.spawn(TaskRequest::Build {
        model: model.to_string(),
        precision,
        calibration: calibration.filter(|_| precision.needs_calibration()),
    });
    let outcome = follow(handle).await?;
    if !outcome.success() {
        anyhow::bail!("Failed to build engine for {}", model);
    }

    println!(
        "  Engine: {}",
        runner.store().engine_path(model, precision).display()
    );
    Ok(())
}
