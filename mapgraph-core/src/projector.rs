//! Projection of raw feature rows into canonical node records.
//!
//! Projection is pure. A batch is all-or-nothing: the first malformed row
//! rejects the whole category so no partial set reaches the graph store.

use std::collections::HashSet;

use geo::Coord;
use thiserror::Error;

use crate::{
    AreaDescriptors, FeatureBatch, FeatureCategory, FeatureDescriptors, FeatureNodeRecord,
    FeatureShape, LineDescriptors, RawFeatureRow,
};

/// Errors raised when a row cannot become a feature node.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedFeatureError {
    /// The row had no usable external id.
    #[error("{category} row {row} has no source id")]
    MissingSourceId {
        /// Category being projected.
        category: FeatureCategory,
        /// Position of the row in the batch.
        row: usize,
    },
    /// The row had no resolvable centroid.
    #[error("{category} {source_id} has no centroid")]
    MissingCentroid {
        /// Category being projected.
        category: FeatureCategory,
        /// External id of the feature.
        source_id: String,
    },
    /// The centroid contained a non-finite coordinate.
    #[error("{category} {source_id} has a non-finite centroid ({x}, {y})")]
    InvalidCentroid {
        /// Category being projected.
        category: FeatureCategory,
        /// External id of the feature.
        source_id: String,
        /// Longitude.
        x: f64,
        /// Latitude.
        y: f64,
    },
    /// A descriptor required by the category was absent.
    #[error("{category} {source_id} is missing required {field}")]
    MissingDescriptor {
        /// Category being projected.
        category: FeatureCategory,
        /// External id of the feature.
        source_id: String,
        /// Name of the missing descriptor.
        field: &'static str,
    },
    /// A descriptor held a value outside its domain.
    #[error("{category} {source_id} has invalid {field}: {value}")]
    InvalidDescriptor {
        /// Category being projected.
        category: FeatureCategory,
        /// External id of the feature.
        source_id: String,
        /// Name of the descriptor.
        field: &'static str,
        /// Offending value, rendered for diagnostics.
        value: String,
    },
    /// Two rows of the same batch shared an external id.
    #[error("{category} {source_id} appears more than once in the batch")]
    DuplicateSourceId {
        /// Category being projected.
        category: FeatureCategory,
        /// Repeated external id.
        source_id: String,
    },
}

/// Project one raw row into a feature node record.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use mapgraph_core::{FeatureCategory, FeatureDescriptors, RawFeatureRow, project};
///
/// let row = RawFeatureRow {
///     source_id: Some("A1".into()),
///     area: Some(120.0),
///     floors: Some(3),
///     centroid: Some(Coord { x: 10.0, y: 20.0 }),
///     ..RawFeatureRow::default()
/// };
/// let record = project(&row, FeatureCategory::Vegetation)?;
/// match record.descriptors {
///     FeatureDescriptors::Area(area) => assert_eq!(area.floors, None),
///     FeatureDescriptors::Line(_) => unreachable!("vegetation is area-like"),
/// }
/// # Ok::<(), mapgraph_core::MalformedFeatureError>(())
/// ```
pub fn project(
    row: &RawFeatureRow,
    category: FeatureCategory,
) -> Result<FeatureNodeRecord, MalformedFeatureError> {
    project_row(row, category, 0)
}

/// Project every row of one category into a batch.
///
/// Fails on the first malformed row and when two rows share a source id.
pub fn project_batch(
    category: FeatureCategory,
    rows: &[RawFeatureRow],
) -> Result<FeatureBatch, MalformedFeatureError> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut records = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let record = project_row(row, category, index)?;
        if !seen.insert(record.source_id.clone()) {
            return Err(MalformedFeatureError::DuplicateSourceId {
                category,
                source_id: record.source_id,
            });
        }
        records.push(record);
    }
    Ok(FeatureBatch::new(category, records))
}

fn project_row(
    row: &RawFeatureRow,
    category: FeatureCategory,
    index: usize,
) -> Result<FeatureNodeRecord, MalformedFeatureError> {
    let source_id = row
        .source_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(MalformedFeatureError::MissingSourceId {
            category,
            row: index,
        })?
        .to_owned();
    let fields = RowFields {
        category,
        source_id: &source_id,
    };
    let centroid = fields.centroid(row.centroid)?;
    let descriptors = match category.shape() {
        FeatureShape::Area => FeatureDescriptors::Area(fields.area_descriptors(row)?),
        FeatureShape::Line => FeatureDescriptors::Line(fields.line_descriptors(row)?),
    };

    Ok(FeatureNodeRecord {
        category,
        source_id,
        descriptors,
        centroid,
    })
}

/// Validation context for the row being projected.
struct RowFields<'a> {
    category: FeatureCategory,
    source_id: &'a str,
}

impl RowFields<'_> {
    fn centroid(&self, centroid: Option<Coord<f64>>) -> Result<Coord<f64>, MalformedFeatureError> {
        let centroid = centroid.ok_or_else(|| MalformedFeatureError::MissingCentroid {
            category: self.category,
            source_id: self.source_id.to_owned(),
        })?;
        if centroid.x.is_finite() && centroid.y.is_finite() {
            Ok(centroid)
        } else {
            Err(MalformedFeatureError::InvalidCentroid {
                category: self.category,
                source_id: self.source_id.to_owned(),
                x: centroid.x,
                y: centroid.y,
            })
        }
    }

    fn area_descriptors(&self, row: &RawFeatureRow) -> Result<AreaDescriptors, MalformedFeatureError> {
        let area = self
            .measure("area", row.area)?
            .ok_or_else(|| MalformedFeatureError::MissingDescriptor {
                category: self.category,
                source_id: self.source_id.to_owned(),
                field: "area",
            })?;
        // Floor counts only describe buildings; anything else reports absence.
        let floors = if self.category.has_floors() {
            self.count("floors", row.floors)?
        } else {
            None
        };
        Ok(AreaDescriptors {
            area,
            compactness: self.measure("compactness", row.compactness)?,
            corners: self.count("corners", row.corners)?,
            shape: row.shape.clone(),
            floors,
        })
    }

    fn line_descriptors(&self, row: &RawFeatureRow) -> Result<LineDescriptors, MalformedFeatureError> {
        Ok(LineDescriptors {
            length: self.measure("length", row.length)?,
            curvature: self.measure("curvature", row.curvature)?,
            nodes: self.count("nodes", row.nodes)?,
        })
    }

    fn measure(
        &self,
        field: &'static str,
        value: Option<f64>,
    ) -> Result<Option<f64>, MalformedFeatureError> {
        match value {
            Some(number) if !number.is_finite() => Err(self.invalid(field, number.to_string())),
            other => Ok(other),
        }
    }

    fn count(
        &self,
        field: &'static str,
        value: Option<i64>,
    ) -> Result<Option<u32>, MalformedFeatureError> {
        value
            .map(|raw| u32::try_from(raw).map_err(|_| self.invalid(field, raw.to_string())))
            .transpose()
    }

    fn invalid(&self, field: &'static str, value: String) -> MalformedFeatureError {
        MalformedFeatureError::InvalidDescriptor {
            category: self.category,
            source_id: self.source_id.to_owned(),
            field,
            value,
        }
    }
}
