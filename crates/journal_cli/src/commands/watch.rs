//! Watch command - print change notifications as they happen.

use super::{open_session, with_hint};
use anyhow::Result;
use console::style;
use journal_core::{ChangeEvent, ChangeLog, Config, RowChange, SectionChange};
use std::time::Duration;

/// Reconcile every `interval_ms` and print what changed.
pub fn run(config: &Config, interval_ms: u64, passes: Option<u64>) -> Result<()> {
    let session = open_session(config)?;
    let log = ChangeLog::new();
    session.add_observer(log.clone()).map_err(with_hint)?;

    println!(
        "{} Watching {} entries (Ctrl-C to stop)",
        style("→").cyan(),
        session.len().map_err(with_hint)?
    );

    let interval = Duration::from_millis(interval_ms);
    let mut pass = 0u64;
    while passes.map_or(true, |limit| pass < limit) {
        std::thread::sleep(interval);
        session.refresh().map_err(with_hint)?;
        for event in log.take() {
            print_event(&event);
        }
        pass += 1;
    }

    Ok(())
}

fn print_event(event: &ChangeEvent) {
    match event {
        ChangeEvent::BeginBatch | ChangeEvent::EndBatch => {}
        ChangeEvent::Section(SectionChange::Inserted, _) => {
            println!("{}", style("journal is no longer empty").dim())
        }
        ChangeEvent::Section(SectionChange::Deleted, _) => {
            println!("{}", style("journal is now empty").dim())
        }
        ChangeEvent::Row(change, record) => {
            let label = match change {
                RowChange::Inserted { at } => format!("{} row {}", style("+").green(), at.row),
                RowChange::Deleted { at } => format!("{} row {}", style("-").red(), at.row),
                RowChange::Updated { at } => format!("{} row {}", style("~").yellow(), at.row),
                RowChange::Moved { from, to } => {
                    format!("{} row {} -> {}", style("↕").yellow(), from.row, to.row)
                }
            };
            println!("{}  {}  {}", label, style(record.id()).cyan(), record.content());
        }
    }
}
