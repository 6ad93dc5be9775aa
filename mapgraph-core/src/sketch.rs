//! Matching a hand-drawn sketch map against the imported graph.
//!
//! A sketch describes features around an unknown location: their size,
//! shape, distance and direction. Every point in the graph is scored by how
//! closely its neighbourhood resembles the sketch; lower scores match better.

use std::collections::HashMap;

use geo::Coord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{GraphNode, GraphStore, GraphStoreError, NodeId, NodeKind, Properties};
use crate::{FeatureCategory, NEIGHBOUR_RELATIONSHIP};

/// Number of matches returned when no limit is configured.
pub const DEFAULT_MATCH_LIMIT: usize = 10;

/// One feature drawn on a sketch.
///
/// Distances are metres from the sketched location; azimuths are degrees
/// clockwise from north.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SketchShape {
    /// A building footprint.
    Building {
        /// Footprint area in square metres.
        area: f64,
        /// Compactness ratio.
        compactness: f64,
        /// Distance to the sketched location.
        distance: f64,
        /// Direction from the sketched location.
        azimuth: f64,
    },
    /// A street segment.
    Street {
        /// Length in metres.
        length: f64,
        /// Distance to the sketched location.
        distance: f64,
        /// Direction from the sketched location.
        azimuth: f64,
    },
    /// A vegetated area.
    Vegetation {
        /// Area in square metres.
        area: f64,
        /// Compactness ratio.
        compactness: f64,
        /// Distance to the sketched location.
        distance: f64,
        /// Direction from the sketched location.
        azimuth: f64,
    },
}

/// Where a compared value is read from in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Measure {
    Feature(&'static str),
    Relationship(&'static str),
}

const AREA_MEASURES: [Measure; 4] = [
    Measure::Feature("area"),
    Measure::Feature("compactness"),
    Measure::Relationship("distance"),
    Measure::Relationship("bearing"),
];

const LINE_MEASURES: [Measure; 3] = [
    Measure::Feature("length"),
    Measure::Relationship("distance"),
    Measure::Relationship("bearing"),
];

impl SketchShape {
    /// Category of the sketched feature.
    pub const fn category(&self) -> FeatureCategory {
        match self {
            Self::Building { .. } => FeatureCategory::Building,
            Self::Street { .. } => FeatureCategory::Street,
            Self::Vegetation { .. } => FeatureCategory::Vegetation,
        }
    }

    fn measures(&self) -> &'static [Measure] {
        match self {
            Self::Building { .. } | Self::Vegetation { .. } => &AREA_MEASURES,
            Self::Street { .. } => &LINE_MEASURES,
        }
    }

    fn value(&self, measure: Measure) -> Option<f64> {
        match (self, measure) {
            (
                Self::Building { area, .. } | Self::Vegetation { area, .. },
                Measure::Feature("area"),
            ) => Some(*area),
            (
                Self::Building { compactness, .. } | Self::Vegetation { compactness, .. },
                Measure::Feature("compactness"),
            ) => Some(*compactness),
            (Self::Street { length, .. }, Measure::Feature("length")) => Some(*length),
            (
                Self::Building { distance, .. }
                | Self::Street { distance, .. }
                | Self::Vegetation { distance, .. },
                Measure::Relationship("distance"),
            ) => Some(*distance),
            (
                Self::Building { azimuth, .. }
                | Self::Street { azimuth, .. }
                | Self::Vegetation { azimuth, .. },
                Measure::Relationship("bearing"),
            ) => Some(*azimuth),
            _ => None,
        }
    }
}

/// A sketch: the shapes drawn around one location.
///
/// Serialised as a bare JSON array of shapes.
///
/// # Examples
///
/// ```
/// use mapgraph_core::sketch::{Sketch, SketchShape};
///
/// let sketch: Sketch = serde_json::from_str(
///     r#"[{"type": "street", "length": 120.0, "distance": 5.0, "azimuth": 90.0}]"#,
/// )?;
/// assert!(matches!(sketch.shapes[0], SketchShape::Street { .. }));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sketch {
    /// Shapes in drawing order.
    pub shapes: Vec<SketchShape>,
}

/// A point whose neighbourhood resembles the sketch.
#[derive(Debug, Clone, PartialEq)]
pub struct SketchMatch {
    /// Index of the point.
    pub idx: u64,
    /// Location of the point.
    pub centroid: Coord<f64>,
    /// Accumulated relative difference; lower is better.
    pub score: f64,
}

/// Errors raised by [`match_sketch`].
#[derive(Debug, Error)]
pub enum SketchError {
    /// The sketch had no shapes.
    #[error("sketch contains no shapes")]
    EmptySketch,
    /// A sketch value was not a finite number.
    #[error("shape {index} has a non-finite value")]
    InvalidValue {
        /// Position of the shape in the sketch.
        index: usize,
    },
    /// The graph could not be read.
    #[error(transparent)]
    Store(#[from] GraphStoreError),
}

/// Relative difference of `actual` from `expected`; absolute when `expected`
/// is zero.
fn relative_difference(actual: f64, expected: f64) -> f64 {
    let delta = (actual - expected).abs();
    if expected == 0.0 {
        delta
    } else {
        delta / expected.abs()
    }
}

fn read_measure(
    measure: Measure,
    feature: &Properties,
    relationship: &Properties,
) -> Option<f64> {
    match measure {
        Measure::Feature(name) => feature.get(name),
        Measure::Relationship(name) => relationship.get(name),
    }
    .and_then(serde_json::Value::as_f64)
}

/// Difference of one neighbour from the sketched shapes of its category.
///
/// Each measure contributes its smallest difference across the shapes; the
/// neighbour's difference is the mean of those terms. A neighbour missing
/// any measure in the graph yields `None` and is left out of the score.
fn neighbour_difference(
    shapes: &[&SketchShape],
    feature: &Properties,
    relationship: &Properties,
) -> Option<f64> {
    let measures = shapes.first()?.measures();
    let terms = measures
        .iter()
        .map(|&measure| {
            let actual = read_measure(measure, feature, relationship)?;
            shapes
                .iter()
                .filter_map(|shape| shape.value(measure))
                .map(|expected| relative_difference(actual, expected))
                .min_by(f64::total_cmp)
        })
        .collect::<Option<Vec<f64>>>()?;
    if terms.is_empty() {
        return None;
    }
    Some(terms.iter().sum::<f64>() / terms.len() as f64)
}

fn validate(sketch: &Sketch) -> Result<HashMap<FeatureCategory, Vec<&SketchShape>>, SketchError> {
    if sketch.shapes.is_empty() {
        return Err(SketchError::EmptySketch);
    }
    let mut by_category: HashMap<FeatureCategory, Vec<&SketchShape>> = HashMap::new();
    for (index, shape) in sketch.shapes.iter().enumerate() {
        let finite = shape
            .measures()
            .iter()
            .filter_map(|&measure| shape.value(measure))
            .all(f64::is_finite);
        if !finite {
            return Err(SketchError::InvalidValue { index });
        }
        by_category.entry(shape.category()).or_default().push(shape);
    }
    Ok(by_category)
}

/// Rank the points of `store` by resemblance to `sketch`.
///
/// A point is only considered when it has at least one neighbour of every
/// sketched category. Its score is the sum, over sketched categories, of
/// the mean difference of its neighbours of that category. Results are
/// ordered by ascending score, ties by point index, and cut to `limit`.
///
/// # Examples
///
/// ```
/// use mapgraph_core::sketch::{Sketch, SketchError, match_sketch};
/// use mapgraph_core::SqliteGraphStore;
///
/// let store = SqliteGraphStore::open_in_memory()?;
/// let err = match_sketch(&store, &Sketch::default(), 10).expect_err("empty sketch");
/// assert!(matches!(err, SketchError::EmptySketch));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn match_sketch<S: GraphStore>(
    store: &S,
    sketch: &Sketch,
    limit: usize,
) -> Result<Vec<SketchMatch>, SketchError> {
    let wanted = validate(sketch)?;
    let nodes = store.nodes(None)?;
    let by_id: HashMap<NodeId, &GraphNode> = nodes.iter().map(|node| (node.id, node)).collect();

    let mut neighbourhoods: HashMap<NodeId, HashMap<FeatureCategory, Vec<f64>>> = HashMap::new();
    for relationship in store.relationships()? {
        if relationship.rel_type != NEIGHBOUR_RELATIONSHIP {
            continue;
        }
        let (Some(feature), Some(point)) =
            (by_id.get(&relationship.source), by_id.get(&relationship.target))
        else {
            continue;
        };
        let (NodeKind::Feature(category), NodeKind::Point) = (feature.key.kind, point.key.kind)
        else {
            continue;
        };
        let Some(shapes) = wanted.get(&category) else {
            continue;
        };
        if let Some(diff) =
            neighbour_difference(shapes, &feature.properties, &relationship.properties)
        {
            neighbourhoods
                .entry(point.id)
                .or_default()
                .entry(category)
                .or_default()
                .push(diff);
        }
    }

    let mut matches = Vec::new();
    for (point_id, neighbourhood) in neighbourhoods {
        let Some(score) = wanted
            .keys()
            .map(|category| {
                neighbourhood
                    .get(category)
                    .filter(|diffs| !diffs.is_empty())
                    .map(|diffs| diffs.iter().sum::<f64>() / diffs.len() as f64)
            })
            .sum::<Option<f64>>()
        else {
            continue;
        };
        let Some(point) = by_id.get(&point_id) else {
            continue;
        };
        let idx = point.key.key.parse::<u64>().map_err(|_| GraphStoreError::Corrupt {
            message: format!("point node {} has key '{}'", point.id.0, point.key.key),
        })?;
        matches.push(SketchMatch {
            idx,
            centroid: point.centroid,
            score,
        });
    }

    matches.sort_by(|a, b| a.score.total_cmp(&b.score).then(a.idx.cmp(&b.idx)));
    matches.truncate(limit);
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphTransaction, NewNode, NewRelationship, NodeKey};
    use crate::test_support::MemoryGraphStore;
    use rstest::{fixture, rstest};
    use serde_json::json;

    fn properties(value: serde_json::Value) -> Properties {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Properties::new(),
        }
    }

    #[derive(Clone)]
    struct Neighbour {
        category: FeatureCategory,
        id: &'static str,
        feature: serde_json::Value,
        distance: f64,
        bearing: f64,
    }

    fn graph(points: &[(u64, Vec<Neighbour>)]) -> MemoryGraphStore {
        let mut store = MemoryGraphStore::new();
        let mut tx = store.begin().expect("begin");
        for (idx, neighbours) in points {
            let point = tx
                .create_node(&NewNode {
                    key: NodeKey::point(*idx),
                    centroid: Coord { x: *idx as f64, y: 0.0 },
                    properties: Properties::new(),
                })
                .expect("point");
            for neighbour in neighbours {
                let feature = tx
                    .create_node(&NewNode {
                        key: NodeKey::feature(neighbour.category, neighbour.id),
                        centroid: Coord { x: 0.0, y: 0.0 },
                        properties: properties(neighbour.feature.clone()),
                    })
                    .expect("feature");
                tx.create_relationship(&NewRelationship {
                    rel_type: NEIGHBOUR_RELATIONSHIP.into(),
                    source: feature,
                    target: point,
                    properties: properties(
                        json!({"distance": neighbour.distance, "bearing": neighbour.bearing}),
                    ),
                })
                .expect("relationship");
            }
        }
        tx.commit().expect("commit");
        store
    }

    fn building(id: &'static str, area: f64, distance: f64) -> Neighbour {
        Neighbour {
            category: FeatureCategory::Building,
            id,
            feature: json!({"area": area, "compactness": 0.5}),
            distance,
            bearing: 90.0,
        }
    }

    fn street(id: &'static str, length: f64) -> Neighbour {
        Neighbour {
            category: FeatureCategory::Street,
            id,
            feature: json!({"length": length, "curvature": null}),
            distance: 10.0,
            bearing: 180.0,
        }
    }

    #[fixture]
    fn building_sketch() -> Sketch {
        Sketch {
            shapes: vec![SketchShape::Building {
                area: 100.0,
                compactness: 0.5,
                distance: 10.0,
                azimuth: 90.0,
            }],
        }
    }

    #[rstest]
    #[case(110.0, 100.0, 0.1)]
    #[case(3.0, 0.0, 3.0)]
    #[case(-5.0, -10.0, 0.5)]
    fn relative_difference_handles_zero(
        #[case] actual: f64,
        #[case] expected: f64,
        #[case] want: f64,
    ) {
        assert!((relative_difference(actual, expected) - want).abs() < 1e-9);
    }

    #[rstest]
    fn exact_neighbourhood_scores_zero(building_sketch: Sketch) {
        let store = graph(&[(1, vec![building("A1", 100.0, 10.0)])]);
        let matches = match_sketch(&store, &building_sketch, DEFAULT_MATCH_LIMIT).expect("match");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].idx, 1);
        assert!(matches[0].score.abs() < 1e-12);
    }

    #[rstest]
    fn closer_neighbourhoods_rank_first(building_sketch: Sketch) {
        let store = graph(&[
            (1, vec![building("A1", 200.0, 10.0)]),
            (2, vec![building("A2", 110.0, 10.0)]),
        ]);
        let matches = match_sketch(&store, &building_sketch, DEFAULT_MATCH_LIMIT).expect("match");
        let order: Vec<_> = matches.iter().map(|m| m.idx).collect();
        assert_eq!(order, vec![2, 1]);
        // area term 0.1, others 0: mean over four terms
        assert!((matches[0].score - 0.025).abs() < 1e-9);
    }

    #[rstest]
    fn points_lacking_a_sketched_category_are_excluded() {
        let sketch = Sketch {
            shapes: vec![
                SketchShape::Street {
                    length: 50.0,
                    distance: 10.0,
                    azimuth: 180.0,
                },
                SketchShape::Building {
                    area: 100.0,
                    compactness: 0.5,
                    distance: 10.0,
                    azimuth: 90.0,
                },
            ],
        };
        let store = graph(&[
            (1, vec![building("A1", 100.0, 10.0)]),
            (2, vec![building("A2", 100.0, 10.0), street("S2", 50.0)]),
        ]);
        let matches = match_sketch(&store, &sketch, DEFAULT_MATCH_LIMIT).expect("match");
        assert_eq!(matches.iter().map(|m| m.idx).collect::<Vec<_>>(), vec![2]);
    }

    #[rstest]
    fn neighbours_with_null_attributes_are_left_out(building_sketch: Sketch) {
        let incomplete = Neighbour {
            category: FeatureCategory::Building,
            id: "A4",
            feature: json!({"area": 100.0, "compactness": null}),
            distance: 10.0,
            bearing: 90.0,
        };
        let store = graph(&[
            (4, vec![incomplete.clone()]),
            (5, vec![Neighbour { id: "A5", ..incomplete }, building("B5", 200.0, 10.0)]),
        ]);
        let matches = match_sketch(&store, &building_sketch, DEFAULT_MATCH_LIMIT).expect("match");
        // point 4 has no usable building; point 5 is scored on B5 alone
        assert_eq!(matches.iter().map(|m| m.idx).collect::<Vec<_>>(), vec![5]);
        assert!((matches[0].score - 0.25).abs() < 1e-9);
    }

    #[rstest]
    fn each_term_takes_the_closest_shape() {
        let sketch = Sketch {
            shapes: vec![
                SketchShape::Street {
                    length: 10.0,
                    distance: 10.0,
                    azimuth: 180.0,
                },
                SketchShape::Street {
                    length: 50.0,
                    distance: 10.0,
                    azimuth: 180.0,
                },
            ],
        };
        let store = graph(&[(1, vec![street("S1", 50.0)])]);
        let matches = match_sketch(&store, &sketch, DEFAULT_MATCH_LIMIT).expect("match");
        assert!(matches[0].score.abs() < 1e-12);
    }

    #[rstest]
    fn limit_truncates_results(building_sketch: Sketch) {
        let points: Vec<_> = (1..=4)
            .map(|idx| (idx, vec![building("A", 100.0 + idx as f64, 10.0)]))
            .collect();
        let store = graph(&points);
        let matches = match_sketch(&store, &building_sketch, 2).expect("match");
        assert_eq!(matches.iter().map(|m| m.idx).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[rstest]
    fn rejects_empty_and_non_finite_sketches() {
        let store = MemoryGraphStore::new();
        assert!(matches!(
            match_sketch(&store, &Sketch::default(), 10),
            Err(SketchError::EmptySketch)
        ));
        let sketch = Sketch {
            shapes: vec![SketchShape::Street {
                length: f64::NAN,
                distance: 1.0,
                azimuth: 0.0,
            }],
        };
        assert!(matches!(
            match_sketch(&store, &sketch, 10),
            Err(SketchError::InvalidValue { index: 0 })
        ));
    }

    #[rstest]
    fn parses_tagged_shapes() {
        let sketch: Sketch = serde_json::from_str(
            r#"[
                {"type": "building", "area": 80, "compactness": 0.7, "distance": 12, "azimuth": 45},
                {"type": "vegetation", "area": 900, "compactness": 0.3, "distance": 30, "azimuth": 270}
            ]"#,
        )
        .expect("valid sketch");
        let categories: Vec<_> = sketch.shapes.iter().map(SketchShape::category).collect();
        assert_eq!(
            categories,
            vec![FeatureCategory::Building, FeatureCategory::Vegetation]
        );
    }
}
