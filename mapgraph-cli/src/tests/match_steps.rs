//! Behaviour-driven step definitions driving the match CLI scenarios.

use super::helpers::{seed_graph_db, workspace, write_utf8};
use super::*;
use crate::sketch::{MatchOutput, run_match_with};
use camino::Utf8PathBuf;
use mapgraph_core::sketch::SketchError;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use tempfile::TempDir;

#[derive(Debug)]
struct MatchWorld {
    _tmp: TempDir,
    root: Utf8PathBuf,
    sketch_path: Utf8PathBuf,
    graph_db: RefCell<Option<Utf8PathBuf>>,
    stdout: RefCell<Vec<u8>>,
    result: RefCell<Option<Result<(), CliError>>>,
}

impl MatchWorld {
    fn new() -> Self {
        let (tmp, root) = workspace();
        let sketch_path = root.join("sketch.json");
        Self {
            _tmp: tmp,
            root,
            sketch_path,
            graph_db: RefCell::new(None),
            stdout: RefCell::new(Vec::new()),
            result: RefCell::new(None),
        }
    }

    fn build_command_line(&self) -> Vec<String> {
        let graph_db = self
            .graph_db
            .borrow()
            .clone()
            .unwrap_or_else(|| self.root.join("graph.db"));
        vec![
            "mapgraph".to_owned(),
            "match".to_owned(),
            self.sketch_path.as_str().to_owned(),
            format!("--{ARG_GRAPH_DB}"),
            graph_db.as_str().to_owned(),
        ]
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
fn world() -> MatchWorld {
    MatchWorld::new()
}

#[given("an imported graph with building A1 beside point 7")]
fn imported_graph(#[from(world)] world: &MatchWorld) {
    let graph_db = seed_graph_db(&world.root);
    world.graph_db.replace(Some(graph_db));
}

#[given("a sketch of a building just west of the location")]
fn building_sketch(#[from(world)] world: &MatchWorld) {
    write_utf8(
        &world.sketch_path,
        br#"[{"type": "building", "area": 600, "compactness": 0.8, "distance": 7, "azimuth": 270}]"#,
    );
}

#[given("the sketch contains invalid JSON")]
fn invalid_sketch(#[from(world)] world: &MatchWorld) {
    write_utf8(&world.sketch_path, b"[ not valid json");
}

#[given("the sketch is empty")]
fn empty_sketch(#[from(world)] world: &MatchWorld) {
    write_utf8(&world.sketch_path, b"[]");
}

#[when("I run the match command")]
fn run_match_command(#[from(world)] world: &MatchWorld) {
    let invocation = world.build_command_line();
    let parsed = Cli::try_parse_from(invocation).map_err(CliError::from);
    let outcome = parsed.and_then(|cli| match cli.command {
        Command::Match(args) => {
            let mut buffer = world.stdout.borrow_mut();
            run_match_with(args, &mut *buffer)
        }
        Command::Import(_) => panic!("expected match command"),
    });
    world.result.replace(Some(outcome));
}

#[then("the command succeeds and ranks point 7 first")]
fn command_ranks_point(#[from(world)] world: &MatchWorld) {
    let borrowed = world.result.borrow();
    let result = borrowed.as_ref().expect("result recorded");
    result.as_ref().expect("expected success");

    let output: Vec<MatchOutput> =
        serde_json::from_slice(&world.stdout.borrow()).expect("output should be JSON matches");
    let best = output.first().expect("at least one match");
    assert_eq!(best.idx, 7);
}

#[then("the command fails because the sketch JSON is invalid")]
fn command_fails_invalid_json(#[from(world)] world: &MatchWorld) {
    match &*world.expect_error() {
        CliError::ParseSketch { path, .. } => assert_eq!(*path, world.sketch_path),
        other => panic!("expected ParseSketch, found {other:?}"),
    }
}

#[then("the command fails because the sketch is empty")]
fn command_fails_empty_sketch(#[from(world)] world: &MatchWorld) {
    match &*world.expect_error() {
        CliError::Match(SketchError::EmptySketch) => {}
        other => panic!("expected EmptySketch, found {other:?}"),
    }
}

macro_rules! register_match_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/match_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: MatchWorld) {
            let _ = world;
        }
    };
}

register_match_scenario!(match_happy_path, "matching a sketch against an imported graph");
register_match_scenario!(match_invalid_json, "rejecting invalid sketch JSON");
register_match_scenario!(match_empty_sketch, "rejecting an empty sketch");
