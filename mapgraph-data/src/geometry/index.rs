//! R\*-tree prefilter over feature bounding boxes.

use geo::{Coord, Rect};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};

/// Approximate metres per degree of latitude.
const METRES_PER_DEGREE: f64 = 110_000.0;

/// Below this cosine of latitude the search spans every longitude.
const MIN_COS_LATITUDE: f64 = 0.01;

const MIN_LONGITUDE: f64 = -180.0;
const MAX_LONGITUDE: f64 = 180.0;
const FULL_TURN: f64 = 360.0;

type Entry = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Spatial index answering "which features might lie within r metres".
///
/// Results are candidates only; callers confirm them with an exact
/// distance.
pub(crate) struct FeatureIndex {
    tree: RTree<Entry>,
}

impl FeatureIndex {
    /// Index `(position, bounds)` pairs.
    pub(crate) fn new(bounds: impl IntoIterator<Item = (usize, Rect<f64>)>) -> Self {
        let entries = bounds
            .into_iter()
            .map(|(position, rect)| {
                GeomWithData::new(
                    Rectangle::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                    position,
                )
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Positions of features whose bounds come within `radius_m` of `at`,
    /// in ascending order.
    ///
    /// Envelopes crossing the antimeridian are split in two.
    pub(crate) fn candidates(&self, at: Coord<f64>, radius_m: f64) -> Vec<usize> {
        let lat_delta = radius_m / METRES_PER_DEGREE;
        let (south, north) = (at.y - lat_delta, at.y + lat_delta);
        let mut positions: Vec<usize> = longitude_spans(at, lat_delta)
            .into_iter()
            .flat_map(|(west, east)| {
                let envelope = AABB::from_corners([west, south], [east, north]);
                self.tree
                    .locate_in_envelope_intersecting(&envelope)
                    .map(|entry| entry.data)
                    .collect::<Vec<_>>()
            })
            .collect();
        positions.sort_unstable();
        positions.dedup();
        positions
    }
}

/// Longitude ranges covered by a search of `lat_delta` degrees around `at`.
fn longitude_spans(at: Coord<f64>, lat_delta: f64) -> Vec<(f64, f64)> {
    let cos_latitude = at.y.to_radians().cos();
    if cos_latitude < MIN_COS_LATITUDE {
        return vec![(MIN_LONGITUDE, MAX_LONGITUDE)];
    }
    let lon_delta = lat_delta / cos_latitude;
    if lon_delta >= MAX_LONGITUDE {
        return vec![(MIN_LONGITUDE, MAX_LONGITUDE)];
    }
    let (west, east) = (at.x - lon_delta, at.x + lon_delta);
    let mut spans = vec![(west, east)];
    if west < MIN_LONGITUDE {
        spans.push((west + FULL_TURN, MAX_LONGITUDE));
    }
    if east > MAX_LONGITUDE {
        spans.push((MIN_LONGITUDE, east - FULL_TURN));
    }
    spans
}
