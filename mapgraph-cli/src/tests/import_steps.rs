//! Behaviour-driven step definitions driving the import CLI scenarios.

use super::helpers::{seed_geometry_db, workspace};
use super::*;
use crate::import::{ImportSummary, run_import_with};
use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use tempfile::TempDir;

#[derive(Debug)]
struct ImportWorld {
    _tmp: TempDir,
    geometry_db: Utf8PathBuf,
    graph_db: Utf8PathBuf,
    cli_args: RefCell<Vec<String>>,
    stdout: RefCell<Vec<u8>>,
    result: RefCell<Option<Result<(), CliError>>>,
}

impl ImportWorld {
    fn new() -> Self {
        let (tmp, root) = workspace();
        Self {
            _tmp: tmp,
            geometry_db: root.join("geometry.db"),
            graph_db: root.join("graph.db"),
            cli_args: RefCell::new(Vec::new()),
            stdout: RefCell::new(Vec::new()),
            result: RefCell::new(None),
        }
    }

    fn build_command_line(&self) -> Vec<String> {
        let mut argv = vec![
            "mapgraph".to_owned(),
            "import".to_owned(),
            format!("--{ARG_GEOMETRY_DB}"),
            self.geometry_db.as_str().to_owned(),
            format!("--{ARG_GRAPH_DB}"),
            self.graph_db.as_str().to_owned(),
        ];
        argv.extend(self.cli_args.borrow().iter().cloned());
        argv
    }

    fn expect_error(&self) -> std::cell::Ref<'_, CliError> {
        std::cell::Ref::map(self.result.borrow(), |result| {
            result
                .as_ref()
                .expect("result recorded")
                .as_ref()
                .expect_err("expected error")
        })
    }
}

#[fixture]
fn world() -> ImportWorld {
    ImportWorld::new()
}

#[given("a geometry database with building A1 and street S1 near point 7")]
fn geometry_database_exists(#[from(world)] world: &ImportWorld) {
    seed_geometry_db(&world.geometry_db);
}

#[given("the geometry database does not exist")]
fn geometry_database_missing(#[from(world)] world: &ImportWorld) {
    assert!(!world.geometry_db.exists());
}

#[given("I pass a zero search radius")]
fn zero_radius(#[from(world)] world: &ImportWorld) {
    world
        .cli_args
        .borrow_mut()
        .extend([format!("--{ARG_RADIUS}"), "0".to_owned()]);
}

#[when("I run the import command")]
fn run_import_command(#[from(world)] world: &ImportWorld) {
    let invocation = world.build_command_line();
    let parsed = Cli::try_parse_from(invocation).map_err(CliError::from);
    let outcome = parsed.and_then(|cli| match cli.command {
        Command::Import(args) => {
            let mut buffer = world.stdout.borrow_mut();
            run_import_with(args, &mut *buffer)
        }
        Command::Match(_) => panic!("expected import command"),
    });
    world.result.replace(Some(outcome));
}

#[then("the command succeeds and reports two proximity edges")]
fn command_reports_edges(#[from(world)] world: &ImportWorld) {
    let borrowed = world.result.borrow();
    let result = borrowed.as_ref().expect("result recorded");
    result.as_ref().expect("expected success");

    let summary: ImportSummary =
        serde_json::from_slice(&world.stdout.borrow()).expect("output should be JSON summary");
    assert_eq!(summary.edges, 2);
    assert_eq!(summary.points_created, 1);
    assert!(world.graph_db.exists(), "graph database written");
}

#[then("the command fails because the geometry database is missing")]
fn command_fails_missing_geometry(#[from(world)] world: &ImportWorld) {
    match &*world.expect_error() {
        CliError::MissingSourceFile { field, path } => {
            assert_eq!(*field, ARG_GEOMETRY_DB);
            assert_eq!(*path, world.geometry_db);
        }
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }
    assert!(!world.graph_db.exists(), "nothing written");
}

#[then("the command fails because the radius is invalid")]
fn command_fails_invalid_radius(#[from(world)] world: &ImportWorld) {
    match &*world.expect_error() {
        CliError::InvalidRadius(source) => assert_eq!(source.0, 0.0),
        other => panic!("expected InvalidRadius, found {other:?}"),
    }
}

macro_rules! register_import_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/import_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: ImportWorld) {
            let _ = world;
        }
    };
}

register_import_scenario!(import_happy_path, "importing a geometry database");
register_import_scenario!(import_missing_geometry, "rejecting a missing geometry database");
register_import_scenario!(import_zero_radius, "rejecting a zero radius");
