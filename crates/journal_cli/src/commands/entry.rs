//! Entry commands: add, delete, edit.

use super::{open_session, parse_id, with_hint};
use anyhow::Result;
use chrono::Utc;
use console::style;
use journal_core::Config;

/// Add an entry timestamped now.
pub fn add(config: &Config, content: &str) -> Result<()> {
    let session = open_session(config)?;
    let record = session.insert_new(content, Utc::now()).map_err(with_hint)?;

    println!("{} Added entry {}", style("✓").green(), style(record.id()).cyan());
    Ok(())
}

/// Delete an entry. Deleting an entry that is already gone is not an error.
pub fn delete(config: &Config, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let session = open_session(config)?;

    match session.get(&id).map_err(with_hint)? {
        Some(record) => {
            session.delete(&record).map_err(with_hint)?;
            println!("{} Deleted entry {}", style("✓").green(), style(&id).cyan());
        }
        None => {
            println!("{} No entry {} (already deleted)", style("→").yellow(), style(&id).cyan());
        }
    }
    Ok(())
}

/// Replace the text of an entry.
pub fn edit(config: &Config, id: &str, content: &str) -> Result<()> {
    let id = parse_id(id)?;
    let session = open_session(config)?;

    session.stage_content(&id, content).map_err(with_hint)?;
    session.save().map_err(with_hint)?;

    println!("{} Updated entry {}", style("✓").green(), style(&id).cyan());
    Ok(())
}
