//! Layout of the geometry database and helpers to populate it.
//!
//! Each feature table keeps the OSM id, the descriptors computed upstream and
//! the feature geometry as GeoJSON-like text (a serialised
//! `geo::Geometry<f64>`). Points of interest are stored as plain
//! longitude/latitude pairs.

use geo::{Coord, Geometry};
use mapgraph_core::FeatureCategory;
use rusqlite::{Connection, Error as SqliteError, Transaction, params};
use thiserror::Error;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS buildings (
        osm_id NOT NULL,
        floors INTEGER,
        shape TEXT,
        compactness REAL,
        corners INTEGER,
        geometry TEXT
    );
    CREATE TABLE IF NOT EXISTS streets (
        osm_id NOT NULL,
        curvature REAL,
        length REAL,
        nodes INTEGER,
        geometry TEXT
    );
    CREATE TABLE IF NOT EXISTS vegetation (
        osm_id NOT NULL,
        shape TEXT,
        compactness REAL,
        corners INTEGER,
        geometry TEXT
    );
    CREATE TABLE IF NOT EXISTS points (
        idx INTEGER PRIMARY KEY,
        lon REAL NOT NULL,
        lat REAL NOT NULL
    );
";

/// Name of the table holding features of `category`.
pub const fn table_name(category: FeatureCategory) -> &'static str {
    match category {
        FeatureCategory::Building => "buildings",
        FeatureCategory::Street => "streets",
        FeatureCategory::Vegetation => "vegetation",
    }
}

/// A feature as written to the geometry database.
///
/// Descriptors that do not belong to the target table are ignored on
/// insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceFeature {
    /// OSM id of the feature.
    pub osm_id: String,
    /// Floor count (buildings).
    pub floors: Option<i64>,
    /// Shape class label (buildings and vegetation).
    pub shape: Option<String>,
    /// Compactness ratio (buildings and vegetation).
    pub compactness: Option<f64>,
    /// Corner count (buildings and vegetation).
    pub corners: Option<i64>,
    /// Curvature (streets).
    pub curvature: Option<f64>,
    /// Length in metres (streets).
    pub length: Option<f64>,
    /// Vertex count (streets).
    pub nodes: Option<i64>,
    /// Geometry in WGS84.
    pub geometry: Option<Geometry<f64>>,
}

impl SourceFeature {
    /// Feature with only an id and a geometry.
    pub fn new(osm_id: impl Into<String>, geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            osm_id: osm_id.into(),
            geometry: Some(geometry.into()),
            ..Self::default()
        }
    }
}

/// Errors raised while creating or populating a geometry database.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Creating the tables failed.
    #[error("failed to create geometry schema")]
    CreateSchema {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A geometry could not be serialised.
    #[error("failed to encode geometry of {osm_id}")]
    EncodeGeometry {
        /// Feature whose geometry failed.
        osm_id: String,
        /// JSON failure.
        #[source]
        source: serde_json::Error,
    },
    /// Writing a feature row failed.
    #[error("failed to insert {osm_id} into {table}")]
    InsertFeature {
        /// Target table.
        table: &'static str,
        /// Feature being written.
        osm_id: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A point index does not fit an SQLite integer.
    #[error("point index {idx} exceeds SQLite i64 range")]
    IndexOutOfRange {
        /// Offending index.
        idx: u64,
    },
    /// Writing a point row failed.
    #[error("failed to insert point {idx}")]
    InsertPoint {
        /// Index of the point.
        idx: u64,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// Create the geometry tables when missing.
pub fn initialise_schema(connection: &Connection) -> Result<(), SeedError> {
    connection
        .execute_batch(SCHEMA)
        .map_err(|source| SeedError::CreateSchema { source })
}

/// Insert one feature into the table of `category`.
pub fn insert_feature(
    transaction: &Transaction<'_>,
    category: FeatureCategory,
    feature: &SourceFeature,
) -> Result<(), SeedError> {
    let geometry = feature
        .geometry
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|source| SeedError::EncodeGeometry {
            osm_id: feature.osm_id.clone(),
            source,
        })?;
    let table = table_name(category);
    let result = match category {
        FeatureCategory::Building => transaction.execute(
            "INSERT INTO buildings (osm_id, floors, shape, compactness, corners, geometry)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                feature.osm_id,
                feature.floors,
                feature.shape,
                feature.compactness,
                feature.corners,
                geometry
            ],
        ),
        FeatureCategory::Street => transaction.execute(
            "INSERT INTO streets (osm_id, curvature, length, nodes, geometry)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                feature.osm_id,
                feature.curvature,
                feature.length,
                feature.nodes,
                geometry
            ],
        ),
        FeatureCategory::Vegetation => transaction.execute(
            "INSERT INTO vegetation (osm_id, shape, compactness, corners, geometry)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                feature.osm_id,
                feature.shape,
                feature.compactness,
                feature.corners,
                geometry
            ],
        ),
    };
    result
        .map(|_| ())
        .map_err(|source| SeedError::InsertFeature {
            table,
            osm_id: feature.osm_id.clone(),
            source,
        })
}

/// Insert or replace a point of interest.
pub fn insert_point(
    transaction: &Transaction<'_>,
    idx: u64,
    location: Coord<f64>,
) -> Result<(), SeedError> {
    let key = i64::try_from(idx).map_err(|_| SeedError::IndexOutOfRange { idx })?;
    transaction
        .execute(
            "INSERT OR REPLACE INTO points (idx, lon, lat) VALUES (?1, ?2, ?3)",
            params![key, location.x, location.y],
        )
        .map(|_| ())
        .map_err(|source| SeedError::InsertPoint { idx, source })
}
