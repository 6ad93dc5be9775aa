//! Read-only access to the store of feature geometries.
//!
//! The [`GeometrySource`] trait is the boundary between the import core and
//! whatever evaluates spatial measures (areas, centroids, surface distances
//! and bearings). Rows come back untrusted: every field is optional and the
//! projector and resolver validate them before anything reaches the graph.

use geo::Coord;
use thiserror::Error;

use crate::{FeatureCategory, SearchRadius};

/// One feature row as reported by the geometry source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeatureRow {
    /// External feature id.
    pub source_id: Option<String>,
    /// Floor count; meaningful for buildings only.
    pub floors: Option<i64>,
    /// Shape class label.
    pub shape: Option<String>,
    /// Compactness ratio.
    pub compactness: Option<f64>,
    /// Corner count.
    pub corners: Option<i64>,
    /// Geodesic area in square metres.
    pub area: Option<f64>,
    /// Length in metres.
    pub length: Option<f64>,
    /// Curvature measure.
    pub curvature: Option<f64>,
    /// Vertex count.
    pub nodes: Option<i64>,
    /// Planar centroid in WGS84; `None` when the geometry could not be resolved.
    pub centroid: Option<Coord<f64>>,
}

/// A feature found within the search radius of a point.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    /// Category of the table the feature came from, if known.
    pub category: Option<FeatureCategory>,
    /// External feature id.
    pub source_id: String,
    /// Surface distance in metres from the point to the feature.
    pub distance: f64,
    /// Bearing in degrees from the point to the feature centroid.
    pub bearing: f64,
}

/// One row of the point/feature proximity join.
///
/// Points without any feature in range still produce a row, with
/// `candidate` set to `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProximityRow {
    /// Index of the point of interest.
    pub point_idx: u64,
    /// Location of the point.
    pub point_centroid: Coord<f64>,
    /// Feature within range, if any.
    pub candidate: Option<RawCandidate>,
}

/// Errors raised by a [`GeometrySource`]. All of them abort the import.
#[derive(Debug, Error)]
pub enum GeometrySourceError {
    /// The store could not be reached or opened.
    #[error("failed to connect to geometry source {target}")]
    Connectivity {
        /// Description of the store that was unreachable.
        target: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A query failed while executing.
    #[error("geometry query '{operation}' failed")]
    Query {
        /// Query that failed.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A stored value could not be decoded.
    #[error("failed to decode {column} in {table}: {message}")]
    Decode {
        /// Table holding the value.
        table: &'static str,
        /// Column holding the value.
        column: &'static str,
        /// Description of the problem.
        message: String,
    },
}

/// Declarative spatial queries over the feature geometries.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use mapgraph_core::{
///     FeatureCategory, GeometrySource, GeometrySourceError, RawFeatureRow, RawProximityRow,
///     SearchRadius,
/// };
///
/// struct EmptySource;
///
/// impl GeometrySource for EmptySource {
///     fn query_features(
///         &self,
///         _category: FeatureCategory,
///     ) -> Result<Vec<RawFeatureRow>, GeometrySourceError> {
///         Ok(Vec::new())
///     }
///
///     fn query_proximity(
///         &self,
///         _categories: &[FeatureCategory],
///         _radius: SearchRadius,
///     ) -> Result<Vec<RawProximityRow>, GeometrySourceError> {
///         Ok(vec![RawProximityRow {
///             point_idx: 1,
///             point_centroid: Coord { x: 0.0, y: 0.0 },
///             candidate: None,
///         }])
///     }
/// }
///
/// let rows = EmptySource.query_proximity(&FeatureCategory::ALL, SearchRadius::DEFAULT)?;
/// assert!(rows[0].candidate.is_none());
/// # Ok::<(), GeometrySourceError>(())
/// ```
pub trait GeometrySource {
    /// Return every feature row of `category`.
    fn query_features(
        &self,
        category: FeatureCategory,
    ) -> Result<Vec<RawFeatureRow>, GeometrySourceError>;

    /// Join every point against the features of `categories` within `radius`.
    ///
    /// Implementations emit one row per qualifying (point, feature) pair and
    /// one candidate-less row for each (point, category) pair with no match.
    fn query_proximity(
        &self,
        categories: &[FeatureCategory],
        radius: SearchRadius,
    ) -> Result<Vec<RawProximityRow>, GeometrySourceError>;
}

impl<T: GeometrySource + ?Sized> GeometrySource for &T {
    fn query_features(
        &self,
        category: FeatureCategory,
    ) -> Result<Vec<RawFeatureRow>, GeometrySourceError> {
        (**self).query_features(category)
    }

    fn query_proximity(
        &self,
        categories: &[FeatureCategory],
        radius: SearchRadius,
    ) -> Result<Vec<RawProximityRow>, GeometrySourceError> {
        (**self).query_proximity(categories, radius)
    }
}
