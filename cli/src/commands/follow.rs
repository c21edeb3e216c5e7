//! Render a running task on the terminal.

use anyhow::Result;
use enginekit_core::controller::FINISHED_MARKER;
use enginekit_core::{TaskEvent, TaskHandle, TaskOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub async fn follow(handle: TaskHandle) -> Result<TaskOutcome> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("working...");

    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
        .progress_chars("#>-");
    let mut sized = false;

    let outcome = handle
        .wait(|event| match event {
            TaskEvent::Output(line) => pb.println(line),
            TaskEvent::Transfer { downloaded, total } => {
                if let (Some(total), false) = (total, sized) {
                    pb.set_length(*total);
                    pb.set_style(bar_style.clone());
                    sized = true;
                }
                pb.set_position(*downloaded);
            }
            TaskEvent::Finished(_) => pb.finish_and_clear(),
        })
        .await;

    let Some(outcome) = outcome else {
        pb.finish_and_clear();
        anyhow::bail!("Task ended without reporting an outcome");
    };

    println!("\n{}", FINISHED_MARKER);
    if outcome.success() {
        println!("✅ {}", outcome.message());
    } else {
        println!("❌ {}", outcome.message());
    }
    Ok(outcome)
}
