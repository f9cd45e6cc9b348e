//! CLI command implementations
//!
//! Each command loads the config, applies its log level, opens the file
//! store and returns the JSON payload of its response. `run_command`
//! writes the payload, or the error, as one line on stdout.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::RepositoryConfig;
use crate::error::VdmError;
use crate::observability::{Event, Logger};
use crate::repository::Repository;
use crate::revision::Revision;
use crate::store::{FileStore, ObjectStore};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run a command and write its response
pub fn run_command(cmd: Command) -> CliResult<()> {
    let result = match cmd {
        Command::Init { config } => init(&config),
        Command::History { config } => history(&config),
        Command::Show { number, config } => show(&config, number),
        Command::Youngest { config } => youngest(&config),
    };

    match result {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Bootstrap a new repository in the configured store
pub fn init(config_path: &Path) -> CliResult<Value> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    let repo = Repository::<()>::init(store).map_err(|e| match e {
        VdmError::InvalidState(_) => CliError::already_initialized(),
        other => CliError::from(other),
    })?;
    let youngest = repo.youngest_revision()?;

    Ok(json!({
        "initialized": true,
        "youngest": revision_json(youngest.as_ref())?,
    }))
}

/// List committed revisions, youngest first
pub fn history(config_path: &Path) -> CliResult<Value> {
    let repo = open_repository(config_path)?;
    let revisions = repo
        .history()?
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(revisions))
}

/// Show the committed revision numbered `number`
pub fn show(config_path: &Path, number: u64) -> CliResult<Value> {
    let repo = open_repository(config_path)?;
    let revision = repo.get_revision(number)?;
    Ok(serde_json::to_value(&revision)?)
}

/// Show the youngest committed revision
pub fn youngest(config_path: &Path) -> CliResult<Value> {
    let repo = open_repository(config_path)?;
    let youngest = repo.youngest_revision()?;
    revision_json(youngest.as_ref())
}

/// Loads the config and applies its log level before anything is logged.
fn load_config(config_path: &Path) -> CliResult<RepositoryConfig> {
    let config = RepositoryConfig::load(config_path)?;
    Logger::set_min_severity(config.severity()?);

    let shown = config_path.display().to_string();
    Logger::event(Event::ConfigLoaded, &[("path", shown.as_str())]);
    Ok(config)
}

fn open_store(config: &RepositoryConfig) -> CliResult<Arc<dyn ObjectStore>> {
    let store = FileStore::open(&config.store_path).map_err(VdmError::from)?;
    Ok(Arc::new(store))
}

fn open_repository(config_path: &Path) -> CliResult<Repository<()>> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    Ok(Repository::<()>::open(store)?)
}

fn revision_json(revision: Option<&Revision>) -> CliResult<Value> {
    Ok(match revision {
        Some(revision) => serde_json::to_value(revision)?,
        None => Value::Null,
    })
}
