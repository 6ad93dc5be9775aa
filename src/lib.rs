//! Facade crate for the map feature graph import.
//!
//! This crate re-exports the core domain types and the import pipeline, and
//! exposes the SQLite-backed geometry source and graph store behind feature
//! flags.

#![forbid(unsafe_code)]

pub use mapgraph_core::graph::{GraphStore, GraphStoreError, GraphTransaction, NodeKey, NodeKind};
pub use mapgraph_core::loader::{GraphLoadError, GraphLoader, LoadSummary};
pub use mapgraph_core::pipeline::{
    ImportError, ImportReport, Pipeline, PipelineConfig, PipelineStage,
};
pub use mapgraph_core::sketch::{Sketch, SketchError, SketchMatch, SketchShape, match_sketch};
pub use mapgraph_core::{
    FeatureBatch, FeatureCategory, FeatureDescriptors, FeatureNodeRecord, GeometrySource,
    GeometrySourceError, PointNodeRecord, ProximityEdgeRecord, SearchRadius,
};

#[cfg(feature = "store-sqlite")]
pub use mapgraph_core::SqliteGraphStore;

#[cfg(feature = "source-sqlite")]
pub use mapgraph_data::SqliteGeometrySource;
