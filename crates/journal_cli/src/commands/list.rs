//! List command.

use super::{open_session, with_hint};
use anyhow::{Context, Result};
use console::style;
use journal_core::{codec, Config};

/// Print every entry in sort order.
pub fn run(config: &Config, format: &str) -> Result<()> {
    let session = open_session(config)?;
    let records = session.records().map_err(with_hint)?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&records).context("Failed to serialize to JSON")?;
            println!("{}", json);
        }
        "text" => {
            if records.is_empty() {
                println!("{}", style("No entries.").dim());
            }
            for record in &records {
                println!(
                    "{}  {}  {}",
                    style(codec::format_timestamp(record.timestamp())).dim(),
                    style(record.id()).cyan(),
                    record.content()
                );
            }
        }
        _ => {
            anyhow::bail!("Unsupported format: {}. Use 'json' or 'text'.", format);
        }
    }

    Ok(())
}
