//! Behavioural tests for Esri JSON to WKT conversion.

use mapharvest_core::geometry::{self, GeometryError, GeometryType, PolylineMode};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};
use std::cell::RefCell;

type Outcome = RefCell<Option<Result<String, GeometryError>>>;

#[fixture]
fn input() -> RefCell<Option<(GeometryType, Value)>> {
    RefCell::new(None)
}

#[fixture]
fn outcome() -> Outcome {
    RefCell::new(None)
}

fn convert_input(
    input: &RefCell<Option<(GeometryType, Value)>>,
    outcome: &Outcome,
    mode: PolylineMode,
) {
    let borrowed = input.borrow();
    let (geometry_type, encoded) = borrowed.as_ref().expect("geometry given");
    outcome.replace(Some(geometry::to_wkt(*geometry_type, encoded, mode)));
}

#[given("a polyline with paths from 0 0 to 1 1 and from 5 5 to 6 6")]
fn two_path_polyline(#[from(input)] input: &RefCell<Option<(GeometryType, Value)>>) {
    input.replace(Some((
        GeometryType::Polyline,
        json!({ "paths": [[[0.0, 0.0], [1.0, 1.0]], [[5.0, 5.0], [6.0, 6.0]]] }),
    )));
}

#[given("a point geometry without a y coordinate")]
fn point_without_y(#[from(input)] input: &RefCell<Option<(GeometryType, Value)>>) {
    input.replace(Some((GeometryType::Point, json!({ "x": 1.0 }))));
}

#[when("I convert it with the default polyline mode")]
fn convert_default(
    #[from(input)] input: &RefCell<Option<(GeometryType, Value)>>,
    #[from(outcome)] outcome: &Outcome,
) {
    convert_input(input, outcome, PolylineMode::default());
}

#[when("I convert it keeping paths apart")]
fn convert_multi(
    #[from(input)] input: &RefCell<Option<(GeometryType, Value)>>,
    #[from(outcome)] outcome: &Outcome,
) {
    convert_input(input, outcome, PolylineMode::MultiLineString);
}

#[then("the WKT is {wkt}")]
fn wkt_is(wkt: String, #[from(outcome)] outcome: &Outcome) {
    let borrowed = outcome.borrow();
    let result = borrowed.as_ref().expect("conversion attempted");
    let expected = wkt.trim_matches('"');
    assert_eq!(result.as_deref().ok(), Some(expected));
}

#[then("the conversion fails as malformed")]
fn fails_malformed(#[from(outcome)] outcome: &Outcome) {
    let borrowed = outcome.borrow();
    let result = borrowed.as_ref().expect("conversion attempted");
    assert!(matches!(result, Err(GeometryError::Malformed { .. })));
}

#[scenario(path = "tests/features/geometry_conversion.feature", index = 0)]
fn flattening_polyline(input: RefCell<Option<(GeometryType, Value)>>, outcome: Outcome) {
    let _ = (input, outcome);
}

#[scenario(path = "tests/features/geometry_conversion.feature", index = 1)]
fn keeping_paths_apart(input: RefCell<Option<(GeometryType, Value)>>, outcome: Outcome) {
    let _ = (input, outcome);
}

#[scenario(path = "tests/features/geometry_conversion.feature", index = 2)]
fn rejecting_point_without_y(input: RefCell<Option<(GeometryType, Value)>>, outcome: Outcome) {
    let _ = (input, outcome);
}
