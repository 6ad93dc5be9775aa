//! Behavioural tests for `SqliteGeometrySource`.

use std::{cell::RefCell, fs, path::PathBuf};

use camino::Utf8PathBuf;
use mapgraph_core::graph::{GraphStore, NodeKey};
use mapgraph_core::pipeline::{Pipeline, PipelineConfig};
use mapgraph_core::{
    FeatureCategory, GeometrySource, GeometrySourceError, RawProximityRow, SearchRadius,
    SqliteGraphStore,
};
use mapgraph_data::SqliteGeometrySource;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

mod support;

use support::{POINT_7, path_in, seed_database};

#[fixture]
fn workspace() -> TempDir {
    TempDir::new().expect("create temp dir")
}

#[fixture]
fn database() -> RefCell<Option<Utf8PathBuf>> {
    RefCell::new(None)
}

#[fixture]
fn proximity() -> RefCell<Vec<RawProximityRow>> {
    RefCell::new(Vec::new())
}

#[fixture]
fn open_error() -> RefCell<Option<GeometrySourceError>> {
    RefCell::new(None)
}

fn expect_database(database: &RefCell<Option<Utf8PathBuf>>) -> Utf8PathBuf {
    database
        .borrow()
        .clone()
        .expect("database path prepared")
}

#[given("a geometry database with building A1 and street S1 beside point 7")]
fn seeded(
    #[from(workspace)] dir: &TempDir,
    #[from(database)] database: &RefCell<Option<Utf8PathBuf>>,
) {
    let path = path_in(dir, "geometry.db");
    seed_database(&path);
    database.replace(Some(path));
}

#[given("a path to a missing geometry database")]
fn missing(
    #[from(workspace)] dir: &TempDir,
    #[from(database)] database: &RefCell<Option<Utf8PathBuf>>,
) {
    database.replace(Some(path_in(dir, "absent/geometry.db")));
}

#[when("I query proximity within 50 metres")]
fn query(
    #[from(database)] database: &RefCell<Option<Utf8PathBuf>>,
    #[from(proximity)] rows: &RefCell<Vec<RawProximityRow>>,
) {
    let source = SqliteGeometrySource::open(&expect_database(database)).expect("open source");
    let result = source
        .query_proximity(&FeatureCategory::ALL, SearchRadius::DEFAULT)
        .expect("proximity query");
    rows.replace(result);
}

#[when("I open the geometry source")]
fn open(
    #[from(database)] database: &RefCell<Option<Utf8PathBuf>>,
    #[from(open_error)] error: &RefCell<Option<GeometrySourceError>>,
) {
    let outcome = SqliteGeometrySource::open(&expect_database(database));
    error.replace(outcome.err());
}

#[when("I import the database into a fresh graph")]
fn import(
    #[from(workspace)] dir: &TempDir,
    #[from(database)] database: &RefCell<Option<Utf8PathBuf>>,
) {
    let source = SqliteGeometrySource::open(&expect_database(database)).expect("open source");
    let store = SqliteGraphStore::open(&path_in(dir, "graph.db")).expect("open graph");
    let report = Pipeline::new(source, store, PipelineConfig::default())
        .run()
        .expect("import succeeds");
    assert_eq!(report.points_created, 1);
}

#[then("point 7 has candidates A1 and S1")]
fn candidates(#[from(proximity)] rows: &RefCell<Vec<RawProximityRow>>) {
    let rows = rows.borrow();
    let found: Vec<_> = rows
        .iter()
        .filter(|row| row.point_idx == 7)
        .filter_map(|row| row.candidate.as_ref())
        .map(|candidate| (candidate.category, candidate.source_id.as_str()))
        .collect();
    assert_eq!(
        found,
        vec![
            (Some(FeatureCategory::Building), "A1"),
            (Some(FeatureCategory::Street), "S1"),
        ]
    );
    assert!(rows.iter().all(|row| row.point_centroid == POINT_7));
}

#[then("point 7 has a candidate-less row for vegetation")]
fn empty_row(#[from(proximity)] rows: &RefCell<Vec<RawProximityRow>>) {
    let rows = rows.borrow();
    assert_eq!(rows.len(), 3, "two matches plus one empty category");
    assert!(rows.last().is_some_and(|row| row.candidate.is_none()));
}

#[then("a connectivity error is returned")]
fn connectivity(#[from(open_error)] error: &RefCell<Option<GeometrySourceError>>) {
    let error = error.borrow();
    assert!(matches!(
        error.as_ref(),
        Some(GeometrySourceError::Connectivity { .. })
    ));
}

#[then("the graph links building A1 and street S1 to point 7")]
fn linked(#[from(workspace)] dir: &TempDir) {
    let store = SqliteGraphStore::open(&path_in(dir, "graph.db")).expect("reopen graph");
    let nodes = store.nodes(None).expect("scan nodes");
    let key_of = |id| {
        nodes
            .iter()
            .find(|node| node.id == id)
            .map(|node| node.key.clone())
            .expect("endpoint exists")
    };
    let mut edges: Vec<_> = store
        .relationships()
        .expect("scan relationships")
        .into_iter()
        .map(|edge| (key_of(edge.source), key_of(edge.target)))
        .collect();
    edges.sort();
    assert_eq!(
        edges,
        vec![
            (
                NodeKey::feature(FeatureCategory::Building, "A1"),
                NodeKey::point(7)
            ),
            (
                NodeKey::feature(FeatureCategory::Street, "S1"),
                NodeKey::point(7)
            ),
        ]
    );
}

#[test]
fn scenario_indices_follow_feature_order() {
    let feature =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/features/geometry_source.feature");
    let contents = fs::read_to_string(&feature)
        .unwrap_or_else(|err| panic!("failed to read {}: {err}", feature.display()));
    let titles: Vec<&str> = contents
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Scenario: "))
        .collect();
    assert_eq!(
        titles,
        vec![
            "A point near two features yields one row per feature",
            "A missing geometry database is a connectivity failure",
            "Importing the database links the building to the point",
        ]
    );
}

#[scenario(path = "tests/features/geometry_source.feature", index = 0)]
fn proximity_rows(
    workspace: TempDir,
    database: RefCell<Option<Utf8PathBuf>>,
    proximity: RefCell<Vec<RawProximityRow>>,
) {
    let _ = (workspace, database, proximity);
}

#[scenario(path = "tests/features/geometry_source.feature", index = 1)]
fn missing_database(
    workspace: TempDir,
    database: RefCell<Option<Utf8PathBuf>>,
    open_error: RefCell<Option<GeometrySourceError>>,
) {
    let _ = (workspace, database, open_error);
}

#[scenario(path = "tests/features/geometry_source.feature", index = 2)]
fn import_links(workspace: TempDir, database: RefCell<Option<Utf8PathBuf>>) {
    let _ = (workspace, database);
}
