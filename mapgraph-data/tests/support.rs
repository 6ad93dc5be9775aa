use camino::{Utf8Path, Utf8PathBuf};
use geo::{Coord, LineString, polygon};
use mapgraph_core::FeatureCategory;
use mapgraph_data::{SourceFeature, initialise_schema, insert_feature, insert_point};
use rusqlite::Connection;
use tempfile::TempDir;

/// Location of point 7 in the seeded database.
pub const POINT_7: Coord<f64> = Coord { x: 13.4005, y: 52.5 };

/// UTF-8 path of `name` inside `dir`.
pub fn path_in(dir: &TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().join(name))
        .unwrap_or_else(|path| panic!("temporary path {path:?} is not UTF-8"))
}

/// Write a geometry database holding building A1, street S1 and point 7.
pub fn seed_database(path: &Utf8Path) {
    let mut connection = Connection::open(path.as_std_path())
        .unwrap_or_else(|err| panic!("failed to create {path}: {err}"));
    initialise_schema(&connection).unwrap_or_else(|err| panic!("schema: {err}"));
    let tx = connection
        .transaction()
        .unwrap_or_else(|err| panic!("begin: {err}"));
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
    insert_feature(&tx, FeatureCategory::Building, &building)
        .unwrap_or_else(|err| panic!("building: {err}"));
    insert_feature(&tx, FeatureCategory::Street, &street)
        .unwrap_or_else(|err| panic!("street: {err}"));
    insert_point(&tx, 7, POINT_7).unwrap_or_else(|err| panic!("point: {err}"));
    tx.commit().unwrap_or_else(|err| panic!("commit: {err}"));
}
