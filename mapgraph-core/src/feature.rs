//! Map feature categories and the node records projected from them.
//!
//! Features are persistent geographic objects with a stable external id.
//! Building and vegetation footprints are area-like; streets are line-like.
//! Coordinates use WGS84 with `x = longitude`, `y = latitude`.

use std::{fmt, str::FromStr};

use geo::Coord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Geometric class of a feature category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureShape {
    /// Polygonal footprint described by area and compactness.
    Area,
    /// Linear geometry described by length and curvature.
    Line,
}

/// Category of a map feature.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use mapgraph_core::{FeatureCategory, FeatureShape};
///
/// let category = FeatureCategory::from_str("street").expect("known category");
/// assert_eq!(category, FeatureCategory::Street);
/// assert_eq!(category.shape(), FeatureShape::Line);
/// assert_eq!(category.label(), "Street");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureCategory {
    /// Building footprints.
    Building,
    /// Street centre lines.
    Street,
    /// Vegetated areas such as parks and woodland.
    Vegetation,
}

impl FeatureCategory {
    /// Every category, in import order.
    pub const ALL: [Self; 3] = [Self::Building, Self::Street, Self::Vegetation];

    /// Geometric class of the category.
    pub const fn shape(self) -> FeatureShape {
        match self {
            Self::Building | Self::Vegetation => FeatureShape::Area,
            Self::Street => FeatureShape::Line,
        }
    }

    /// Node label used in the graph store.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Building => "Building",
            Self::Street => "Street",
            Self::Vegetation => "Vegetation",
        }
    }

    /// Lowercase identifier used in configuration and sketches.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Building => "building",
            Self::Street => "street",
            Self::Vegetation => "vegetation",
        }
    }

    /// Whether features of this category carry a floor count.
    pub const fn has_floors(self) -> bool {
        matches!(self, Self::Building)
    }
}

impl fmt::Display for FeatureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown category name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown feature category: {0}")]
pub struct UnknownCategoryError(pub String);

impl FromStr for FeatureCategory {
    type Err = UnknownCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| {
                category.as_str().eq_ignore_ascii_case(s) || category.label().eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| UnknownCategoryError(s.to_owned()))
    }
}

/// Shape descriptors of an area-like feature.
///
/// Optional descriptors stay `None` when the source has no value; they are
/// never defaulted to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaDescriptors {
    /// Geodesic area in square metres.
    pub area: f64,
    /// Compactness ratio of the footprint.
    pub compactness: Option<f64>,
    /// Number of footprint corners.
    pub corners: Option<u32>,
    /// Shape class assigned upstream.
    pub shape: Option<String>,
    /// Number of floors; only ever present for buildings.
    pub floors: Option<u32>,
}

/// Shape descriptors of a line-like feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDescriptors {
    /// Length in metres.
    pub length: Option<f64>,
    /// Curvature measure assigned upstream.
    pub curvature: Option<f64>,
    /// Number of vertices in the line.
    pub nodes: Option<u32>,
}

/// Category-specific descriptors carried by a feature node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureDescriptors {
    /// Descriptors of buildings and vegetation.
    Area(AreaDescriptors),
    /// Descriptors of streets.
    Line(LineDescriptors),
}

impl FeatureDescriptors {
    /// Geometric class the descriptors belong to.
    pub const fn shape(&self) -> FeatureShape {
        match self {
            Self::Area(_) => FeatureShape::Area,
            Self::Line(_) => FeatureShape::Line,
        }
    }
}

/// Canonical node record for one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureNodeRecord {
    /// Category the feature belongs to.
    pub category: FeatureCategory,
    /// Stable external identifier, unique within the category.
    pub source_id: String,
    /// Normalised shape descriptors.
    pub descriptors: FeatureDescriptors,
    /// Planar centroid in WGS84.
    pub centroid: Coord<f64>,
}

/// Ordered records of a single category with unique source ids.
///
/// Batches are built by [`crate::project_batch`], which enforces
/// both invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBatch {
    category: FeatureCategory,
    records: Vec<FeatureNodeRecord>,
}

impl FeatureBatch {
    pub(crate) const fn new(category: FeatureCategory, records: Vec<FeatureNodeRecord>) -> Self {
        Self { category, records }
    }

    /// Category shared by every record.
    pub const fn category(&self) -> FeatureCategory {
        self.category
    }

    /// Records in source order.
    pub fn records(&self) -> &[FeatureNodeRecord] {
        &self.records
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
