//! Core of the mapgraph import: turning map features and points of interest
//! into a property graph.
//!
//! Rows from a [`GeometrySource`] are projected into typed node records,
//! proximity rows are resolved into point nodes and `IS_NEIGHBOR_OF` edges,
//! and a [`loader::GraphLoader`] writes everything to a [`graph::GraphStore`].
//! The [`pipeline::Pipeline`] drives those steps in a fixed order.
//!
//! Coordinates use WGS84 throughout, with `x = longitude` and
//! `y = latitude`.

mod feature;
mod projector;
mod proximity;
mod resolver;
mod source;

pub mod graph;
pub mod loader;
pub mod pipeline;
pub mod sketch;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use feature::{
    AreaDescriptors, FeatureBatch, FeatureCategory, FeatureDescriptors, FeatureNodeRecord,
    FeatureShape, LineDescriptors, UnknownCategoryError,
};
pub use projector::{MalformedFeatureError, project, project_batch};
pub use proximity::{
    FeatureRef, InvalidRadiusError, NEIGHBOUR_RELATIONSHIP, PointNodeRecord, ProximityEdgeRecord,
    SearchRadius,
};
pub use resolver::{ResolveError, ResolvedProximity, resolve};
pub use source::{
    GeometrySource, GeometrySourceError, RawCandidate, RawFeatureRow, RawProximityRow,
};

#[cfg(feature = "store-sqlite")]
pub use graph::SqliteGraphStore;
