//! Command-line interface for importing geometry databases into a
//! proximity graph and querying it with sketches.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod error;
mod import;
mod paths;
mod sketch;

pub use error::CliError;

use import::{ImportArgs, run_import};
use sketch::{MatchArgs, run_match};

pub(crate) const ARG_GEOMETRY_DB: &str = "geometry-db";
pub(crate) const ARG_GRAPH_DB: &str = "graph-db";
pub(crate) const ARG_RADIUS: &str = "radius";
pub(crate) const ARG_SKETCH: &str = "sketch";
pub(crate) const ARG_LIMIT: &str = "limit";
pub(crate) const ENV_IMPORT_GEOMETRY_DB: &str = "MAPGRAPH_CMDS_IMPORT_GEOMETRY_DB";
pub(crate) const ENV_IMPORT_GRAPH_DB: &str = "MAPGRAPH_CMDS_IMPORT_GRAPH_DB";
pub(crate) const ENV_MATCH_SKETCH: &str = "MAPGRAPH_CMDS_MATCH_SKETCH_PATH";
pub(crate) const ENV_MATCH_GRAPH_DB: &str = "MAPGRAPH_CMDS_MATCH_GRAPH_DB";

/// Run the CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Import(args) => run_import(args),
        Command::Match(args) => run_match(args),
    }
}

/// Send `log` records to stderr, filtered by `RUST_LOG` (default `info`).
///
/// Installing twice is harmless; the second attempt is ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    if installed.is_err() {
        log::debug!("logging already initialised");
    }
}

/// Pretty-print `value` as JSON followed by a newline.
pub(crate) fn write_json<T: Serialize + ?Sized>(
    writer: &mut dyn Write,
    value: &T,
) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "mapgraph",
    about = "Build and query a proximity graph of map features",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import a geometry database into a graph database.
    Import(ImportArgs),
    /// Rank points of interest against a sketch.
    Match(MatchArgs),
}

#[cfg(test)]
mod tests;
