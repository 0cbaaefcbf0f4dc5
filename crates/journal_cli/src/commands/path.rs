//! Path command.

use anyhow::Result;
use journal_core::Config;

/// Print the storage directory the other commands use.
pub fn run(config: &Config) -> Result<()> {
    let dir = config.storage.resolve_data_dir()?;
    println!("{}", dir.display());
    Ok(())
}
