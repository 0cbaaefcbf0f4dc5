//! CLI commands.

pub mod entry;
pub mod hammer;
pub mod list;
pub mod path;
pub mod watch;

use anyhow::{Context, Result};
use journal_core::{Config, RecordId, SessionContext, SessionError, StoreRegistry};
use std::path::Path;

/// Loads the config file and applies command-line overrides.
pub fn load_config(config_path: Option<&Path>, data_dir: Option<&Path>) -> Result<Config> {
    let mut config = match config_path.map(Path::to_path_buf).or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(dir) = data_dir {
        config.storage.data_dir = Some(dir.display().to_string());
    }
    Ok(config)
}

/// Opens a session over the configured backend.
pub fn open_session(config: &Config) -> Result<SessionContext> {
    SessionContext::from_config(config, &StoreRegistry::with_defaults()).map_err(with_hint)
}

/// Parses an entry id given on the command line.
pub fn parse_id(raw: &str) -> Result<RecordId> {
    RecordId::parse(raw).with_context(|| format!("Invalid entry ID: {:?}", raw))
}

/// Converts a session error into one carrying its recovery suggestion.
pub fn with_hint(err: SessionError) -> anyhow::Error {
    match err.recovery_suggestion() {
        Some(hint) => anyhow::anyhow!("{}\n  hint: {}", err, hint),
        None => anyhow::Error::new(err),
    }
}
