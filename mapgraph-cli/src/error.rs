//! Error types emitted by the CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use mapgraph_core::graph::GraphStoreError;
use mapgraph_core::pipeline::ImportError;
use mapgraph_core::sketch::SketchError;
use mapgraph_core::{GeometrySourceError, InvalidRadiusError};
use thiserror::Error;

/// Errors emitted by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name.
        field: &'static str,
        /// Environment variable that can supply the value.
        env: &'static str,
    },
    /// The search radius is not a positive finite number.
    #[error(transparent)]
    InvalidRadius(#[from] InvalidRadiusError),
    /// The match limit is zero.
    #[error("--limit must be at least 1")]
    ZeroLimit,
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// IO failure.
        #[source]
        source: std::io::Error,
    },
    /// Opening the geometry database failed.
    #[error("failed to open geometry database: {0}")]
    OpenGeometrySource(#[source] GeometrySourceError),
    /// Opening the graph database failed.
    #[error("failed to open graph database: {0}")]
    OpenGraphStore(#[source] GraphStoreError),
    /// The import pipeline stopped at a stage.
    #[error("{0}: {}", .0.source)]
    Import(#[from] ImportError),
    /// Opening the sketch file failed.
    #[error("failed to open sketch at {path:?}: {source}")]
    OpenSketch {
        /// Sketch path.
        path: Utf8PathBuf,
        /// IO failure.
        #[source]
        source: std::io::Error,
    },
    /// Sketch JSON could not be decoded.
    #[error("failed to parse sketch JSON at {path:?}: {source}")]
    ParseSketch {
        /// Sketch path.
        path: Utf8PathBuf,
        /// JSON failure.
        #[source]
        source: serde_json::Error,
    },
    /// Matching the sketch against the graph failed.
    #[error("sketch matching failed: {0}")]
    Match(#[from] SketchError),
    /// Serialising command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
