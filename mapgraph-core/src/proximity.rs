//! Points of interest and the proximity relationships linking them to features.

use std::fmt;

use geo::Coord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::FeatureCategory;

/// Relationship type written for every proximity edge.
pub const NEIGHBOUR_RELATIONSHIP: &str = "IS_NEIGHBOR_OF";

/// Maximum distance, in metres, for a point and feature to count as near.
///
/// # Examples
///
/// ```
/// use mapgraph_core::SearchRadius;
///
/// let radius = SearchRadius::new(25.0).expect("positive radius");
/// assert!(radius.contains(25.0));
/// assert!(!radius.contains(25.5));
/// assert!(SearchRadius::new(0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SearchRadius(f64);

/// Error returned when a search radius is zero, negative or not finite.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("search radius must be a finite positive number of metres, got {0}")]
pub struct InvalidRadiusError(pub f64);

impl SearchRadius {
    /// The 50 metre tolerance used by the bulk import.
    pub const DEFAULT: Self = Self(50.0);

    /// Validate and wrap a radius in metres.
    pub fn new(metres: f64) -> Result<Self, InvalidRadiusError> {
        if metres.is_finite() && metres > 0.0 {
            Ok(Self(metres))
        } else {
            Err(InvalidRadiusError(metres))
        }
    }

    /// Radius in metres.
    pub const fn metres(self) -> f64 {
        self.0
    }

    /// Whether `distance` lies within the radius, boundary included.
    pub fn contains(self, distance: f64) -> bool {
        distance >= 0.0 && distance <= self.0
    }
}

impl Default for SearchRadius {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f64> for SearchRadius {
    type Error = InvalidRadiusError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SearchRadius> for f64 {
    fn from(value: SearchRadius) -> Self {
        value.0
    }
}

impl fmt::Display for SearchRadius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} m", self.0)
    }
}

/// Node record for one point of interest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointNodeRecord {
    /// Index unique across the whole import.
    pub idx: u64,
    /// Point location in WGS84.
    pub centroid: Coord<f64>,
}

/// Reference from an edge to the feature node it targets.
///
/// When `category` is `None` the loader searches every known category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureRef {
    /// Stable external id of the feature.
    pub source_id: String,
    /// Category of the feature, when the source reported it.
    pub category: Option<FeatureCategory>,
}

impl FeatureRef {
    /// Reference a feature of a known category.
    pub fn new(category: FeatureCategory, source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            category: Some(category),
        }
    }

    /// Reference a feature whose category must be discovered.
    pub fn any(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            category: None,
        }
    }
}

impl fmt::Display for FeatureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category {
            Some(category) => write!(f, "{category} {}", self.source_id),
            None => write!(f, "feature {}", self.source_id),
        }
    }
}

/// Directed "is near" relationship from a feature to a point.
///
/// `distance` is in metres from the point to the closest part of the feature,
/// measured on the sphere. `bearing` is in degrees clockwise from north,
/// `[0, 360)`, from the point towards the feature centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityEdgeRecord {
    /// Index of the point the edge ends at.
    pub point_idx: u64,
    /// Feature the edge starts from.
    pub feature: FeatureRef,
    /// Surface distance in metres.
    pub distance: f64,
    /// Bearing in degrees.
    pub bearing: f64,
}
