//! Hammer and empty commands.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use journal_core::{Config, Hammer, HammerReport, HammerRun};
use std::time::Duration;

/// Run the concurrent mutator against the storage directory and wait for it.
pub fn hammer(config: &Config, tasks: Option<usize>, files: Option<usize>) -> Result<()> {
    let mut hammer_config = config.hammer.clone();
    if let Some(tasks) = tasks {
        hammer_config.tasks = tasks;
    }
    if let Some(files) = files {
        hammer_config.files_per_task = files;
    }

    let dir = config.storage.resolve_data_dir()?;
    println!(
        "{} Hammering {} with {} tasks x {} files...",
        style("→").cyan(),
        dir.display(),
        hammer_config.tasks,
        hammer_config.files_per_task
    );

    let run = Hammer::new(dir, hammer_config)
        .hammer()
        .context("Failed to start hammer")?;
    let report = wait(run, "Hammering")?;

    println!(
        "{} Created {} files, deleted {}",
        style("✓").green(),
        style(report.created).cyan(),
        style(report.deleted).cyan()
    );
    Ok(())
}

/// Delete every entry file in the storage directory after the configured delay.
pub fn empty(config: &Config) -> Result<()> {
    let dir = config.storage.resolve_data_dir()?;
    let run = Hammer::new(&dir, config.hammer.clone())
        .empty()
        .context("Failed to start empty")?;
    let report = wait(run, "Emptying")?;

    println!(
        "{} Deleted {} files from {}",
        style("✓").green(),
        style(report.deleted).cyan(),
        dir.display()
    );
    Ok(())
}

fn wait(run: HammerRun, label: &str) -> Result<HammerReport> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("Invalid progress template")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    while !run.is_finished() {
        let progress = run.progress();
        pb.set_message(format!(
            "{}... {} created, {} deleted",
            label, progress.created, progress.deleted
        ));
        std::thread::sleep(Duration::from_millis(100));
    }

    pb.finish_and_clear();
    Ok(run.join())
}
