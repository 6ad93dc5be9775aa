//! Match command implementation.

use std::io::{BufReader, Write};

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use mapgraph_core::SqliteGraphStore;
use mapgraph_core::sketch::{DEFAULT_MATCH_LIMIT, Sketch, SketchMatch, match_sketch};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::paths::{open_utf8_file, require_existing};
use crate::{
    ARG_GRAPH_DB, ARG_LIMIT, ARG_SKETCH, CliError, ENV_MATCH_GRAPH_DB, ENV_MATCH_SKETCH, write_json,
};

/// CLI arguments for the `match` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "match",
    long_about = "Score every point of interest in a graph database by how \
                 closely its neighbouring features resemble a sketch. The \
                 sketch is a JSON array of building, street and vegetation \
                 shapes; the best matches are printed as JSON.",
    about = "Rank points of interest against a sketch"
)]
#[ortho_config(prefix = "MAPGRAPH")]
pub(crate) struct MatchArgs {
    /// Path to a JSON file containing the sketch.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) sketch_path: Option<Utf8PathBuf>,
    /// Path to the SQLite graph database produced by `import`.
    #[arg(long = ARG_GRAPH_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) graph_db: Option<Utf8PathBuf>,
    /// Maximum number of matches to print (default 10).
    #[arg(long = ARG_LIMIT, value_name = "n")]
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

impl MatchArgs {
    pub(crate) fn into_config(self) -> Result<MatchConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        MatchConfig::try_from(merged)
    }
}

/// Resolved `match` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MatchConfig {
    pub(crate) sketch_path: Utf8PathBuf,
    pub(crate) graph_db: Utf8PathBuf,
    pub(crate) limit: usize,
}

impl MatchConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.sketch_path, ARG_SKETCH)?;
        require_existing(&self.graph_db, ARG_GRAPH_DB)
    }
}

impl TryFrom<MatchArgs> for MatchConfig {
    type Error = CliError;

    fn try_from(args: MatchArgs) -> Result<Self, Self::Error> {
        let sketch_path = args.sketch_path.ok_or(CliError::MissingArgument {
            field: ARG_SKETCH,
            env: ENV_MATCH_SKETCH,
        })?;
        let graph_db = args.graph_db.ok_or(CliError::MissingArgument {
            field: ARG_GRAPH_DB,
            env: ENV_MATCH_GRAPH_DB,
        })?;
        let limit = match args.limit {
            Some(0) => return Err(CliError::ZeroLimit),
            Some(limit) => limit,
            None => DEFAULT_MATCH_LIMIT,
        };
        Ok(Self {
            sketch_path,
            graph_db,
            limit,
        })
    }
}

/// One ranked point as printed by the command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct MatchOutput {
    pub(crate) idx: u64,
    pub(crate) coords: [f64; 2],
    pub(crate) score: f64,
}

impl From<&SketchMatch> for MatchOutput {
    fn from(found: &SketchMatch) -> Self {
        Self {
            idx: found.idx,
            coords: [found.centroid.x, found.centroid.y],
            score: found.score,
        }
    }
}

pub(crate) fn run_match(args: MatchArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_match_with(args, &mut stdout)
}

pub(crate) fn run_match_with(args: MatchArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let sketch = load_sketch(&config.sketch_path)?;
    let store = SqliteGraphStore::open(&config.graph_db).map_err(CliError::OpenGraphStore)?;
    let matches = match_sketch(&store, &sketch, config.limit)?;
    log::info!("{} point(s) matched the sketch", matches.len());
    let output: Vec<MatchOutput> = matches.iter().map(MatchOutput::from).collect();
    write_json(writer, &output)
}

/// Loads a JSON-encoded [`Sketch`] from disk.
pub(crate) fn load_sketch(path: &Utf8Path) -> Result<Sketch, CliError> {
    let file = open_utf8_file(path).map_err(|source| CliError::OpenSketch {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|source| CliError::ParseSketch {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<MatchConfig, CliError> {
    let merged = MatchArgs::merge_from_layers(layers).map_err(CliError::from)?;
    MatchConfig::try_from(merged)
}
