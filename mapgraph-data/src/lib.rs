//! Geometry source adapter for the mapgraph import.
//!
//! Responsibilities:
//! - Read feature descriptors and geometries from a SQLite geometry database.
//! - Compute areas, centroids, surface distances and bearings with `geo`.
//! - Seed geometry databases for fixtures and tooling.
//!
//! Boundaries:
//! - Do not encode projection or loading rules (they live in `mapgraph-core`).
//! - Never write to the database behind a [`SqliteGeometrySource`].

mod geometry;

pub use geometry::{
    SeedError, SourceFeature, SqliteGeometrySource, initialise_schema, insert_feature,
    insert_point, table_name,
};
