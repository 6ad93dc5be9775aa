//! SQLite geometry source.
//!
//! Feature descriptors are read as stored; areas, centroids, distances and
//! bearings are computed here from the stored geometries.

mod index;
mod measure;
mod schema;

use std::fmt;

use camino::Utf8Path;
use geo::{Coord, Geometry};
use log::debug;
use mapgraph_core::{
    FeatureCategory, FeatureShape, GeometrySource, GeometrySourceError, RawCandidate,
    RawFeatureRow, RawProximityRow, SearchRadius,
};
use rusqlite::{Connection, OpenFlags, Row, types::Value};

use index::FeatureIndex;

pub use schema::{
    SeedError, SourceFeature, initialise_schema, insert_feature, insert_point, table_name,
};

/// Read-only [`GeometrySource`] over a SQLite geometry database.
///
/// # Examples
///
/// ```
/// use geo::{Coord, Point};
/// use mapgraph_core::{FeatureCategory, GeometrySource, SearchRadius};
/// use mapgraph_data::{SourceFeature, SqliteGeometrySource, initialise_schema, insert_feature, insert_point};
/// use rusqlite::Connection;
///
/// let mut connection = Connection::open_in_memory()?;
/// initialise_schema(&connection)?;
/// let tx = connection.transaction()?;
/// insert_feature(&tx, FeatureCategory::Building, &SourceFeature::new("A1", Point::new(13.4, 52.5)))?;
/// insert_point(&tx, 7, Coord { x: 13.4, y: 52.5 })?;
/// tx.commit()?;
///
/// let source = SqliteGeometrySource::from_connection(connection);
/// let rows = source.query_proximity(&[FeatureCategory::Building], SearchRadius::DEFAULT)?;
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].candidate.as_ref().map(|c| c.distance), Some(0.0));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SqliteGeometrySource {
    connection: Connection,
    location: String,
}

impl fmt::Debug for SqliteGeometrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteGeometrySource")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// A stored feature with its parsed geometry.
struct StoredFeature {
    row: RawFeatureRow,
    geometry: Option<Geometry<f64>>,
}

/// A feature that can take part in the proximity join.
struct Neighbour {
    source_id: String,
    geometry: Geometry<f64>,
    centroid: Coord<f64>,
}

impl SqliteGeometrySource {
    /// Open the geometry database at `path` read-only.
    pub fn open(path: &Utf8Path) -> Result<Self, GeometrySourceError> {
        let connection = Connection::open_with_flags(
            path.as_std_path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| GeometrySourceError::Connectivity {
            target: path.to_string(),
            source: source.into(),
        })?;
        Ok(Self {
            connection,
            location: path.to_string(),
        })
    }

    /// Wrap an already open connection, such as an in-memory database.
    pub fn from_connection(connection: Connection) -> Self {
        Self {
            connection,
            location: String::from("<connection>"),
        }
    }

    fn stored_features(
        &self,
        category: FeatureCategory,
    ) -> Result<Vec<StoredFeature>, GeometrySourceError> {
        let table = table_name(category);
        let columns = match category {
            FeatureCategory::Building => {
                "osm_id, floors, shape, compactness, corners, NULL, NULL, NULL, geometry"
            }
            FeatureCategory::Street => {
                "osm_id, NULL, NULL, NULL, NULL, curvature, length, nodes, geometry"
            }
            FeatureCategory::Vegetation => {
                "osm_id, NULL, shape, compactness, corners, NULL, NULL, NULL, geometry"
            }
        };
        let sql = format!("SELECT {columns} FROM {table} ORDER BY rowid");
        let mut statement = self
            .connection
            .prepare(&sql)
            .map_err(|source| query_error("prepare feature scan", source))?;
        let rows = statement
            .query_map([], StoredColumns::read)
            .map_err(|source| query_error("scan features", source))?;

        let mut features = Vec::new();
        for row in rows {
            let columns = row.map_err(|source| query_error("read feature", source))?;
            features.push(columns.decode(category)?);
        }
        Ok(features)
    }

    fn points(&self) -> Result<Vec<(u64, Coord<f64>)>, GeometrySourceError> {
        let mut statement = self
            .connection
            .prepare("SELECT idx, lon, lat FROM points ORDER BY idx")
            .map_err(|source| query_error("prepare point scan", source))?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })
            .map_err(|source| query_error("scan points", source))?;

        let mut points = Vec::new();
        for row in rows {
            let (idx, lon, lat) = row.map_err(|source| query_error("read point", source))?;
            let idx = u64::try_from(idx).map_err(|_| GeometrySourceError::Decode {
                table: "points",
                column: "idx",
                message: format!("negative point index {idx}"),
            })?;
            points.push((idx, Coord { x: lon, y: lat }));
        }
        Ok(points)
    }

    fn neighbours(&self, category: FeatureCategory) -> Result<Vec<Neighbour>, GeometrySourceError> {
        Ok(self
            .stored_features(category)?
            .into_iter()
            .filter_map(|feature| {
                let source_id = feature.row.source_id?;
                let geometry = feature.geometry?;
                let centroid = feature.row.centroid?;
                Some(Neighbour {
                    source_id,
                    geometry,
                    centroid,
                })
            })
            .collect())
    }
}

impl GeometrySource for SqliteGeometrySource {
    fn query_features(
        &self,
        category: FeatureCategory,
    ) -> Result<Vec<RawFeatureRow>, GeometrySourceError> {
        let rows: Vec<RawFeatureRow> = self
            .stored_features(category)?
            .into_iter()
            .map(|feature| feature.row)
            .collect();
        debug!("read {} {category} rows from {}", rows.len(), self.location);
        Ok(rows)
    }

    fn query_proximity(
        &self,
        categories: &[FeatureCategory],
        radius: SearchRadius,
    ) -> Result<Vec<RawProximityRow>, GeometrySourceError> {
        let points = self.points()?;
        let mut layers = Vec::with_capacity(categories.len());
        for &category in categories {
            let neighbours = self.neighbours(category)?;
            let index = FeatureIndex::new(neighbours.iter().enumerate().filter_map(
                |(position, neighbour)| {
                    measure::bounds(&neighbour.geometry).map(|rect| (position, rect))
                },
            ));
            layers.push((category, neighbours, index));
        }

        let mut rows = Vec::new();
        for &(idx, at) in &points {
            for (category, neighbours, index) in &layers {
                let before = rows.len();
                for position in index.candidates(at, radius.metres()) {
                    let Some(neighbour) = neighbours.get(position) else {
                        continue;
                    };
                    let Some(distance) = measure::distance_to(at, &neighbour.geometry) else {
                        continue;
                    };
                    if !radius.contains(distance) {
                        continue;
                    }
                    rows.push(RawProximityRow {
                        point_idx: idx,
                        point_centroid: at,
                        candidate: Some(RawCandidate {
                            category: Some(*category),
                            source_id: neighbour.source_id.clone(),
                            distance,
                            bearing: measure::bearing(at, neighbour.centroid),
                        }),
                    });
                }
                if rows.len() == before {
                    rows.push(RawProximityRow {
                        point_idx: idx,
                        point_centroid: at,
                        candidate: None,
                    });
                }
            }
        }
        debug!(
            "proximity join over {} points produced {} rows within {radius}",
            points.len(),
            rows.len()
        );
        Ok(rows)
    }
}

/// Columns of a feature row before decoding.
struct StoredColumns {
    osm_id: Value,
    floors: Option<i64>,
    shape: Option<String>,
    compactness: Option<f64>,
    corners: Option<i64>,
    curvature: Option<f64>,
    length: Option<f64>,
    nodes: Option<i64>,
    geometry: Option<String>,
}

impl StoredColumns {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            osm_id: row.get(0)?,
            floors: row.get(1)?,
            shape: row.get(2)?,
            compactness: row.get(3)?,
            corners: row.get(4)?,
            curvature: row.get(5)?,
            length: row.get(6)?,
            nodes: row.get(7)?,
            geometry: row.get(8)?,
        })
    }

    fn decode(self, category: FeatureCategory) -> Result<StoredFeature, GeometrySourceError> {
        let table = table_name(category);
        let source_id = match self.osm_id {
            Value::Null => None,
            Value::Integer(id) => Some(id.to_string()),
            Value::Text(id) => Some(id),
            Value::Real(_) | Value::Blob(_) => {
                return Err(GeometrySourceError::Decode {
                    table,
                    column: "osm_id",
                    message: String::from("expected an integer or text id"),
                });
            }
        };
        let geometry = self
            .geometry
            .as_deref()
            .map(serde_json::from_str::<Geometry<f64>>)
            .transpose()
            .map_err(|err| GeometrySourceError::Decode {
                table,
                column: "geometry",
                message: err.to_string(),
            })?;
        let area = match category.shape() {
            FeatureShape::Area => geometry.as_ref().map(measure::area),
            FeatureShape::Line => None,
        };
        let row = RawFeatureRow {
            source_id,
            floors: self.floors,
            shape: self.shape,
            compactness: self.compactness,
            corners: self.corners,
            area,
            length: self.length,
            curvature: self.curvature,
            nodes: self.nodes,
            centroid: geometry.as_ref().and_then(measure::centroid),
        };
        Ok(StoredFeature { row, geometry })
    }
}

fn query_error(operation: &'static str, source: rusqlite::Error) -> GeometrySourceError {
    GeometrySourceError::Query {
        operation,
        source: source.into(),
    }
}
