//! Sequential import of a geometry source into a graph store.
//!
//! The pipeline walks [`PipelineStage`]s in order. A failing stage aborts the
//! run; stages already committed stay committed and nothing is retried.

use std::collections::BTreeMap;
use std::fmt;

use log::info;
use thiserror::Error;

use crate::graph::{GraphStore, GraphStoreError};
use crate::loader::{GraphLoadError, GraphLoader};
use crate::{
    FeatureCategory, GeometrySource, GeometrySourceError, MalformedFeatureError, ResolveError,
    ResolvedProximity, SearchRadius, project_batch, resolve,
};

/// Stages of an import run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Buildings, then vegetation.
    LoadAreaFeatures,
    /// Streets.
    LoadLineFeatures,
    /// Proximity query, resolution and point nodes.
    LoadPointFeatures,
    /// Proximity relationships.
    LoadProximity,
    /// Nothing left to do.
    Done,
}

impl PipelineStage {
    /// Stage following this one; `Done` is terminal.
    pub const fn next(self) -> Self {
        match self {
            Self::LoadAreaFeatures => Self::LoadLineFeatures,
            Self::LoadLineFeatures => Self::LoadPointFeatures,
            Self::LoadPointFeatures => Self::LoadProximity,
            Self::LoadProximity | Self::Done => Self::Done,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::LoadAreaFeatures => "load area features",
            Self::LoadLineFeatures => "load line features",
            Self::LoadPointFeatures => "load point features",
            Self::LoadProximity => "load proximity",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineConfig {
    /// Maximum point/feature distance for a proximity edge.
    pub radius: SearchRadius,
}

/// Failure of a single stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// The geometry source failed.
    #[error(transparent)]
    Source(#[from] GeometrySourceError),
    /// A feature row could not be projected.
    #[error(transparent)]
    Malformed(#[from] MalformedFeatureError),
    /// The proximity rows were inconsistent.
    #[error(transparent)]
    Invariant(#[from] ResolveError),
    /// The graph store rejected a batch.
    #[error(transparent)]
    Load(#[from] GraphLoadError),
}

/// Error returned by [`Pipeline::run`], naming the stage that failed.
#[derive(Debug, Error)]
#[error("import failed during stage '{stage}'")]
pub struct ImportError {
    /// Stage that was running.
    pub stage: PipelineStage,
    /// What went wrong.
    #[source]
    pub source: StageError,
}

impl ImportError {
    /// Whether the failure was a store that could not be reached.
    pub const fn is_connectivity(&self) -> bool {
        matches!(
            self.source,
            StageError::Source(GeometrySourceError::Connectivity { .. })
                | StageError::Load(GraphLoadError::Store(GraphStoreError::Connectivity { .. }))
        )
    }
}

/// Counts of everything a successful run wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Feature nodes created per category.
    pub features: BTreeMap<FeatureCategory, usize>,
    /// Point nodes created.
    pub points_created: usize,
    /// Point nodes that already existed.
    pub points_matched: usize,
    /// Proximity relationships created.
    pub edges: usize,
}

impl ImportReport {
    /// Feature nodes created for `category`.
    pub fn features_of(&self, category: FeatureCategory) -> usize {
        self.features.get(&category).copied().unwrap_or_default()
    }
}

/// One import run over an injected source and store.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use mapgraph_core::pipeline::{Pipeline, PipelineConfig};
/// use mapgraph_core::test_support::{MemoryGeometrySource, MemoryGraphStore, feature_row};
/// use mapgraph_core::FeatureCategory;
///
/// let at = Coord { x: 10.0, y: 20.0 };
/// let source = MemoryGeometrySource::new()
///     .with_feature(FeatureCategory::Building, feature_row("A1", at))
///     .with_neighbour(7, at, FeatureCategory::Building, "A1", 0.5, 90.0);
/// let report = Pipeline::new(source, MemoryGraphStore::new(), PipelineConfig::default()).run()?;
/// assert_eq!(report.edges, 1);
/// # Ok::<(), mapgraph_core::pipeline::ImportError>(())
/// ```
#[derive(Debug)]
pub struct Pipeline<G, S> {
    source: G,
    loader: GraphLoader<S>,
    config: PipelineConfig,
}

impl<G: GeometrySource, S: GraphStore> Pipeline<G, S> {
    /// Prepare a run.
    pub const fn new(source: G, store: S, config: PipelineConfig) -> Self {
        Self {
            source,
            loader: GraphLoader::new(store),
            config,
        }
    }

    /// Execute every stage in order.
    ///
    /// The source and store are released when this returns, whether the run
    /// succeeded or not.
    pub fn run(mut self) -> Result<ImportReport, ImportError> {
        let mut report = ImportReport::default();
        let mut resolved = ResolvedProximity::default();
        let mut stage = PipelineStage::LoadAreaFeatures;

        while stage != PipelineStage::Done {
            self.run_stage(stage, &mut report, &mut resolved)
                .map_err(|source| ImportError { stage, source })?;
            stage = stage.next();
        }
        Ok(report)
    }

    fn run_stage(
        &mut self,
        stage: PipelineStage,
        report: &mut ImportReport,
        resolved: &mut ResolvedProximity,
    ) -> Result<(), StageError> {
        match stage {
            PipelineStage::LoadAreaFeatures => {
                for category in [FeatureCategory::Building, FeatureCategory::Vegetation] {
                    self.load_category(category, report)?;
                }
            }
            PipelineStage::LoadLineFeatures => {
                self.load_category(FeatureCategory::Street, report)?;
            }
            PipelineStage::LoadPointFeatures => {
                let rows = self
                    .source
                    .query_proximity(&FeatureCategory::ALL, self.config.radius)?;
                *resolved = resolve(&rows, self.config.radius)?;
                let summary = self.loader.load_point_nodes(&resolved.points)?;
                report.points_created = summary.nodes_created;
                report.points_matched = summary.nodes_matched;
                info!(
                    "{stage}: {} points ({} new) from {} proximity rows",
                    resolved.points.len(),
                    summary.nodes_created,
                    rows.len()
                );
            }
            PipelineStage::LoadProximity => {
                let summary = self.loader.load_proximity_edges(&resolved.edges)?;
                report.edges = summary.relationships_created;
                info!("{stage}: {} edges", summary.relationships_created);
            }
            PipelineStage::Done => {}
        }
        Ok(())
    }

    fn load_category(
        &mut self,
        category: FeatureCategory,
        report: &mut ImportReport,
    ) -> Result<(), StageError> {
        let rows = self.source.query_features(category)?;
        let batch = project_batch(category, &rows)?;
        let summary = self.loader.load_feature_nodes(&batch)?;
        report.features.insert(category, summary.nodes_created);
        info!("loaded {} {category} nodes", summary.nodes_created);
        Ok(())
    }
}
