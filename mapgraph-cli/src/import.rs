//! Import command implementation.

use std::collections::BTreeMap;
use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use mapgraph_core::SearchRadius;
use mapgraph_core::SqliteGraphStore;
use mapgraph_core::pipeline::{ImportReport, Pipeline, PipelineConfig};
use mapgraph_data::SqliteGeometrySource;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::paths::{require_existing, require_writable_target};
use crate::{
    ARG_GEOMETRY_DB, ARG_GRAPH_DB, ARG_RADIUS, CliError, ENV_IMPORT_GEOMETRY_DB,
    ENV_IMPORT_GRAPH_DB, write_json,
};

/// CLI arguments for the `import` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "import",
    long_about = "Load every building, street and vegetation feature of a \
                 geometry database into a graph database, then link each \
                 point of interest to the features within the search radius.",
    about = "Import a geometry database into a graph database"
)]
#[ortho_config(prefix = "MAPGRAPH")]
pub(crate) struct ImportArgs {
    /// Path to the SQLite geometry database.
    #[arg(long = ARG_GEOMETRY_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) geometry_db: Option<Utf8PathBuf>,
    /// Path to the SQLite graph database; created when missing.
    #[arg(long = ARG_GRAPH_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) graph_db: Option<Utf8PathBuf>,
    /// Maximum point/feature distance in metres (default 50).
    #[arg(long = ARG_RADIUS, value_name = "metres")]
    #[serde(default)]
    pub(crate) radius: Option<f64>,
}

impl ImportArgs {
    pub(crate) fn into_config(self) -> Result<ImportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ImportConfig::try_from(merged)
    }
}

/// Resolved `import` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ImportConfig {
    pub(crate) geometry_db: Utf8PathBuf,
    pub(crate) graph_db: Utf8PathBuf,
    pub(crate) radius: SearchRadius,
}

impl ImportConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.geometry_db, ARG_GEOMETRY_DB)?;
        require_writable_target(&self.graph_db, ARG_GRAPH_DB)
    }
}

impl TryFrom<ImportArgs> for ImportConfig {
    type Error = CliError;

    fn try_from(args: ImportArgs) -> Result<Self, Self::Error> {
        let geometry_db = args.geometry_db.ok_or(CliError::MissingArgument {
            field: ARG_GEOMETRY_DB,
            env: ENV_IMPORT_GEOMETRY_DB,
        })?;
        let graph_db = args.graph_db.ok_or(CliError::MissingArgument {
            field: ARG_GRAPH_DB,
            env: ENV_IMPORT_GRAPH_DB,
        })?;
        let radius = args
            .radius
            .map(SearchRadius::new)
            .transpose()?
            .unwrap_or_default();
        Ok(Self {
            geometry_db,
            graph_db,
            radius,
        })
    }
}

/// Counts printed after a successful import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ImportSummary {
    pub(crate) features: BTreeMap<String, usize>,
    pub(crate) points_created: usize,
    pub(crate) points_matched: usize,
    pub(crate) edges: usize,
}

impl From<&ImportReport> for ImportSummary {
    fn from(report: &ImportReport) -> Self {
        Self {
            features: report
                .features
                .iter()
                .map(|(category, count)| (category.as_str().to_owned(), *count))
                .collect(),
            points_created: report.points_created,
            points_matched: report.points_matched,
            edges: report.edges,
        }
    }
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_import_with(args, &mut stdout)
}

pub(crate) fn run_import_with(args: ImportArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let report = execute_import(&config)?;
    write_json(writer, &ImportSummary::from(&report))
}

fn execute_import(config: &ImportConfig) -> Result<ImportReport, CliError> {
    let source =
        SqliteGeometrySource::open(&config.geometry_db).map_err(CliError::OpenGeometrySource)?;
    let store = SqliteGraphStore::open(&config.graph_db).map_err(CliError::OpenGraphStore)?;
    log::info!(
        "importing {} into {} (radius {} m)",
        config.geometry_db,
        config.graph_db,
        config.radius.metres()
    );
    let pipeline_config = PipelineConfig {
        radius: config.radius,
    };
    Ok(Pipeline::new(source, store, pipeline_config).run()?)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ImportConfig, CliError> {
    let merged = ImportArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ImportConfig::try_from(merged)
}
