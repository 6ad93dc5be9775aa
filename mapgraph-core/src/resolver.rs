//! Resolution of proximity rows into point nodes and proximity edges.
//!
//! Every qualifying (point, feature) pair becomes its own edge; there is no
//! nearest-only pruning and the radius is the only filter. Distances and
//! bearings are passed through from the source after validation.

use std::collections::{HashMap, hash_map::Entry};

use geo::Coord;
use thiserror::Error;

use crate::{FeatureRef, PointNodeRecord, ProximityEdgeRecord, RawProximityRow, SearchRadius};

/// Point nodes and edges derived from one proximity query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedProximity {
    /// One record per distinct point index, in first-seen order.
    pub points: Vec<PointNodeRecord>,
    /// One record per row carrying a candidate feature.
    pub edges: Vec<ProximityEdgeRecord>,
}

/// Upstream data inconsistencies detected while resolving proximity rows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// Two rows for the same point reported different locations.
    #[error("point {idx} reported at ({first_x}, {first_y}) and ({other_x}, {other_y})")]
    CentroidMismatch {
        /// Index of the point.
        idx: u64,
        /// Longitude of the first occurrence.
        first_x: f64,
        /// Latitude of the first occurrence.
        first_y: f64,
        /// Longitude of the conflicting occurrence.
        other_x: f64,
        /// Latitude of the conflicting occurrence.
        other_y: f64,
    },
    /// A point location contained a non-finite coordinate.
    #[error("point {idx} has a non-finite location")]
    InvalidCentroid {
        /// Index of the point.
        idx: u64,
    },
    /// A candidate distance was negative, not a number or beyond the radius.
    #[error("distance {distance} from point {idx} to {feature} is outside the search radius {radius}")]
    DistanceOutOfRange {
        /// Index of the point.
        idx: u64,
        /// Candidate feature.
        feature: FeatureRef,
        /// Reported distance in metres.
        distance: f64,
        /// Configured radius.
        radius: SearchRadius,
    },
    /// A candidate bearing was not a finite number.
    #[error("bearing {bearing} from point {idx} to {feature} is not finite")]
    InvalidBearing {
        /// Index of the point.
        idx: u64,
        /// Candidate feature.
        feature: FeatureRef,
        /// Reported bearing.
        bearing: f64,
    },
}

/// Turn proximity rows into point records and edge records.
///
/// The radius is checked again here so that no edge beyond the tolerance can
/// be produced, even when the source filtered incorrectly.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use mapgraph_core::{FeatureCategory, RawCandidate, RawProximityRow, SearchRadius, resolve};
///
/// let at = Coord { x: 13.4, y: 52.5 };
/// let rows = vec![
///     RawProximityRow {
///         point_idx: 7,
///         point_centroid: at,
///         candidate: Some(RawCandidate {
///             category: Some(FeatureCategory::Building),
///             source_id: "A1".into(),
///             distance: 0.5,
///             bearing: 90.0,
///         }),
///     },
///     RawProximityRow { point_idx: 7, point_centroid: at, candidate: None },
/// ];
/// let resolved = resolve(&rows, SearchRadius::DEFAULT)?;
/// assert_eq!(resolved.points.len(), 1);
/// assert_eq!(resolved.edges.len(), 1);
/// # Ok::<(), mapgraph_core::ResolveError>(())
/// ```
pub fn resolve(
    rows: &[RawProximityRow],
    radius: SearchRadius,
) -> Result<ResolvedProximity, ResolveError> {
    let mut seen: HashMap<u64, Coord<f64>> = HashMap::new();
    let mut resolved = ResolvedProximity::default();

    for row in rows {
        register_point(&mut seen, &mut resolved.points, row)?;
        let Some(candidate) = &row.candidate else {
            continue;
        };
        let feature = FeatureRef {
            source_id: candidate.source_id.clone(),
            category: candidate.category,
        };
        if !radius.contains(candidate.distance) {
            return Err(ResolveError::DistanceOutOfRange {
                idx: row.point_idx,
                feature,
                distance: candidate.distance,
                radius,
            });
        }
        if !candidate.bearing.is_finite() {
            return Err(ResolveError::InvalidBearing {
                idx: row.point_idx,
                feature,
                bearing: candidate.bearing,
            });
        }
        resolved.edges.push(ProximityEdgeRecord {
            point_idx: row.point_idx,
            feature,
            distance: candidate.distance,
            bearing: candidate.bearing,
        });
    }

    Ok(resolved)
}

fn register_point(
    seen: &mut HashMap<u64, Coord<f64>>,
    points: &mut Vec<PointNodeRecord>,
    row: &RawProximityRow,
) -> Result<(), ResolveError> {
    let centroid = row.point_centroid;
    if !(centroid.x.is_finite() && centroid.y.is_finite()) {
        return Err(ResolveError::InvalidCentroid { idx: row.point_idx });
    }
    match seen.entry(row.point_idx) {
        Entry::Occupied(first) if *first.get() != centroid => {
            let first = *first.get();
            Err(ResolveError::CentroidMismatch {
                idx: row.point_idx,
                first_x: first.x,
                first_y: first.y,
                other_x: centroid.x,
                other_y: centroid.y,
            })
        }
        Entry::Occupied(_) => Ok(()),
        Entry::Vacant(slot) => {
            slot.insert(centroid);
            points.push(PointNodeRecord {
                idx: row.point_idx,
                centroid,
            });
            Ok(())
        }
    }
}
