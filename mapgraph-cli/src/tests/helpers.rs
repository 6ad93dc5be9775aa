//! Test helpers for building on-disk geometry and graph databases.

use camino::{Utf8Path, Utf8PathBuf};
use geo::{Coord, LineString, polygon};
use mapgraph_core::FeatureCategory;
use mapgraph_data::{SourceFeature, initialise_schema, insert_feature, insert_point};
use rusqlite::Connection;
use std::fs;
use tempfile::TempDir;

use crate::import::{ImportArgs, run_import_with};

/// Location of the only point of interest in the seeded database.
pub(super) const POINT_7: Coord<f64> = Coord { x: 13.4005, y: 52.5 };

/// Temporary directory and its UTF-8 path.
pub(super) fn workspace() -> (TempDir, Utf8PathBuf) {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
    (tmp, root)
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    fs::write(path.as_std_path(), contents).expect("write file");
}

/// Write a geometry database holding building A1 and street S1, both within
/// 50 m of point 7.
pub(super) fn seed_geometry_db(path: &Utf8Path) {
    let mut connection = Connection::open(path.as_std_path()).expect("create geometry db");
    initialise_schema(&connection).expect("geometry schema");
    let tx = connection.transaction().expect("begin");
    let building = SourceFeature {
        floors: Some(3),
        shape: Some(String::from("rectangle")),
        compactness: Some(0.78),
        corners: Some(4),
        ..SourceFeature::new(
            "A1",
            polygon![
                (x: 13.4, y: 52.4999),
                (x: 13.4004, y: 52.4999),
                (x: 13.4004, y: 52.5001),
                (x: 13.4, y: 52.5001),
            ],
        )
    };
    let street = SourceFeature {
        length: Some(135.5),
        curvature: Some(1.0),
        nodes: Some(2),
        ..SourceFeature::new(
            "S1",
            LineString::from(vec![(13.3995, 52.4998), (13.4015, 52.4998)]),
        )
    };
    insert_feature(&tx, FeatureCategory::Building, &building).expect("insert building");
    insert_feature(&tx, FeatureCategory::Street, &street).expect("insert street");
    insert_point(&tx, 7, POINT_7).expect("insert point");
    tx.commit().expect("commit");
}

/// Seed a geometry database under `root` and import it into `graph.db`.
pub(super) fn seed_graph_db(root: &Utf8Path) -> Utf8PathBuf {
    let geometry_db = root.join("geometry.db");
    let graph_db = root.join("graph.db");
    seed_geometry_db(&geometry_db);
    let args = ImportArgs {
        geometry_db: Some(geometry_db),
        graph_db: Some(graph_db.clone()),
        radius: None,
    };
    let mut sink = Vec::new();
    run_import_with(args, &mut sink).expect("import succeeds");
    graph_db
}
