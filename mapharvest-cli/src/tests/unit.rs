//! Focused unit tests covering command configuration and output.

use super::helpers::{ROOT, always, catalog, layer_url, point_page};
use super::*;
use crate::discover::{DiscoverConfig, run_discover_with, source_config};
use crate::harvest::{
    FetchArgs, FetchConfig, HarvestArgs, HarvestConfig, run_fetch_with, run_harvest_with,
};
use camino::Utf8PathBuf;
use clap::Parser;
use mapharvest_core::PolylineMode;
use mapharvest_data::ObjectIdWindow;
use mapharvest_data::test_support::{RecordingDatabase, StubCatalogSource};
use rstest::rstest;
use serde_json::json;
use std::time::Duration;
use tracing::Level;

fn fetch_args() -> FetchArgs {
    FetchArgs {
        layer_url: Some(layer_url(0)),
        name: Some("sorgenti".to_owned()),
        database: Some(Utf8PathBuf::from("out/idro.sqlite")),
        ..FetchArgs::default()
    }
}

#[rstest]
#[case(None, Some(Utf8PathBuf::from("a.sqlite")), ARG_URL, ENV_HARVEST_URL)]
#[case(Some(ROOT.to_owned()), None, ARG_DATABASE, ENV_HARVEST_DATABASE)]
fn harvest_requires_url_and_database(
    #[case] url: Option<String>,
    #[case] database: Option<Utf8PathBuf>,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let args = HarvestArgs {
        url,
        database,
        ..HarvestArgs::default()
    };
    let err = HarvestConfig::try_from(args).expect_err("missing field should error");
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn harvest_defaults_flatten_polylines_and_load_mod_spatialite() {
    let args = HarvestArgs {
        url: Some(ROOT.to_owned()),
        database: Some(Utf8PathBuf::from("a.sqlite")),
        ..HarvestArgs::default()
    };
    let config = HarvestConfig::try_from(args).expect("complete arguments");
    assert_eq!(config.output.options.polyline_mode, PolylineMode::Flatten);
    assert_eq!(config.output.spatialite.extension, "mod_spatialite");
    assert_eq!(config.source.timeout, None);
}

#[rstest]
fn harvest_overrides_apply() {
    let args = HarvestArgs {
        url: Some(ROOT.to_owned()),
        database: Some(Utf8PathBuf::from("a.sqlite")),
        spatialite_extension: Some("/usr/lib/mod_spatialite.so".to_owned()),
        multi_linestring: true,
        ..HarvestArgs::default()
    };
    let config = HarvestConfig::try_from(args).expect("complete arguments");
    assert_eq!(
        config.output.options.polyline_mode,
        PolylineMode::MultiLineString
    );
    assert_eq!(config.output.spatialite.extension, "/usr/lib/mod_spatialite.so");
}

#[rstest]
fn discover_requires_url() {
    let err = DiscoverConfig::try_from(discover::DiscoverArgs::default())
        .expect_err("url is required");
    assert!(matches!(
        err,
        CliError::MissingArgument {
            field: ARG_URL,
            env: ENV_DISCOVER_URL
        }
    ));
}

#[rstest]
#[case(Some(1), Some(1000), Some(ObjectIdWindow::new(1, 1000)))]
#[case(Some(7), Some(7), Some(ObjectIdWindow::new(7, 7)))]
#[case(None, None, None)]
fn fetch_accepts_complete_windows(
    #[case] left: Option<u64>,
    #[case] right: Option<u64>,
    #[case] expected: Option<ObjectIdWindow>,
) {
    let args = FetchArgs {
        left,
        right,
        ..fetch_args()
    };
    let config = FetchConfig::try_from(args).expect("window is valid");
    assert_eq!(config.window, expected);
}

#[rstest]
#[case(Some(1), None)]
#[case(None, Some(1000))]
fn fetch_rejects_half_windows(#[case] left: Option<u64>, #[case] right: Option<u64>) {
    let args = FetchArgs {
        left,
        right,
        ..fetch_args()
    };
    let err = FetchConfig::try_from(args).expect_err("one bound only");
    assert!(matches!(err, CliError::IncompleteWindow));
}

#[rstest]
fn fetch_rejects_inverted_windows() {
    let args = FetchArgs {
        left: Some(2000),
        right: Some(1001),
        ..fetch_args()
    };
    let err = FetchConfig::try_from(args).expect_err("left exceeds right");
    assert!(matches!(
        err,
        CliError::InvalidWindow {
            left: 2000,
            right: 1001
        }
    ));
}

#[rstest]
fn fetch_name_is_optional() {
    let args = FetchArgs {
        name: None,
        ..fetch_args()
    };
    let config = FetchConfig::try_from(args).expect("name comes from the layer");
    assert_eq!(config.name, None);
}

#[rstest]
fn source_config_applies_overrides() {
    let config = source_config(Some("crawler/3".to_owned()), Some(45));
    assert_eq!(config.user_agent, "crawler/3");
    assert_eq!(config.timeout, Some(Duration::from_secs(45)));
}

#[rstest]
#[case(false, false, Level::WARN)]
#[case(true, false, Level::INFO)]
#[case(false, true, Level::DEBUG)]
#[case(true, true, Level::DEBUG)]
fn logging_flags_select_levels(#[case] verbose: bool, #[case] debug: bool, #[case] expected: Level) {
    assert_eq!(logging::level(verbose, debug), expected);
}

#[rstest]
fn parses_fetch_invocation() {
    let cli = Cli::try_parse_from([
        "mapharvest",
        "--verbose",
        "fetch",
        "http://h/MapServer/2",
        "--name",
        "strade",
        "--database",
        "out.sqlite",
        "--left",
        "1001",
        "--right",
        "2000",
        "--multi-linestring",
    ])
    .expect("arguments parse");
    assert!(cli.verbose);
    match cli.command {
        Command::Fetch(args) => {
            assert_eq!(args.layer_url.as_deref(), Some("http://h/MapServer/2"));
            assert_eq!(args.left, Some(1001));
            assert_eq!(args.right, Some(2000));
            assert!(args.multi_linestring);
        }
        other => panic!("expected fetch, found {other:?}"),
    }
}

#[rstest]
fn discover_writes_one_json_line_per_layer() {
    let source = catalog();
    let config = DiscoverConfig {
        url: ROOT.to_owned(),
        source: source_config(None, None),
    };
    let mut output = Vec::new();
    run_discover_with(&config, &source, &always, &mut output).expect("discovery succeeds");

    let text = String::from_utf8(output).expect("utf8 output");
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is JSON"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["name"], "sorgenti");
    assert_eq!(lines[0]["url"], layer_url(0));
    assert_eq!(lines[1]["name"], "fiumi");
}

#[rstest]
fn harvest_with_failures_is_incomplete() {
    let source = catalog();
    let config = HarvestConfig::try_from(HarvestArgs {
        url: Some(ROOT.to_owned()),
        database: Some(Utf8PathBuf::from("unused.sqlite")),
        ..HarvestArgs::default()
    })
    .expect("complete arguments");
    let mut database = RecordingDatabase::new();
    let mut output = Vec::new();
    let err = run_harvest_with(&config, &source, &always, &mut database, &mut output)
        .expect_err("one layer fails");
    assert!(matches!(
        err,
        CliError::HarvestIncomplete {
            failed: 1,
            total: 2
        }
    ));
    let text = String::from_utf8(output).expect("utf8 output");
    assert!(text.contains("ingested sorgenti: 1 rows (Point, SRID 3004)"));
    assert!(text.contains("failed fiumi"));
}

#[rstest]
fn harvest_of_missing_catalog_fails_discovery() {
    let source = StubCatalogSource::new().respond(ROOT, point_page(1));
    let config = HarvestConfig::try_from(HarvestArgs {
        url: Some(ROOT.to_owned()),
        database: Some(Utf8PathBuf::from("unused.sqlite")),
        ..HarvestArgs::default()
    })
    .expect("complete arguments");
    let mut database = RecordingDatabase::new();
    let err = run_harvest_with(&config, &source, &always, &mut database, &mut Vec::new())
        .expect_err("root is a query page, not a catalog");
    assert!(matches!(err, CliError::Discovery(_)));
}

fn unnamed_fetch_config() -> FetchConfig {
    FetchConfig::try_from(FetchArgs {
        name: None,
        ..fetch_args()
    })
    .expect("complete arguments")
}

#[rstest]
fn fetch_names_the_table_after_the_layer() {
    let source = catalog().respond(
        &layer_url(0),
        json!({ "id": 0, "name": "Sorgenti Termali", "type": "Feature Layer" }),
    );
    let mut database = RecordingDatabase::new();
    let mut output = Vec::new();
    run_fetch_with(&unnamed_fetch_config(), &source, &mut database, &mut output)
        .expect("fetch succeeds");

    let text = String::from_utf8(output).expect("utf8 output");
    assert_eq!(text, "ingested sorgenti_termali: 1 rows (Point, SRID 3004)\n");
    assert_eq!(source.requested_urls().first(), Some(&layer_url(0)));
}

#[rstest]
fn explicit_fetch_name_skips_the_layer_document() {
    let source = catalog();
    let mut database = RecordingDatabase::new();
    let mut output = Vec::new();
    run_fetch_with(
        &FetchConfig::try_from(fetch_args()).expect("complete arguments"),
        &source,
        &mut database,
        &mut output,
    )
    .expect("fetch succeeds");
    assert!(!source.requested_urls().contains(&layer_url(0)));
}

#[rstest]
fn fetch_of_an_unnamed_layer_fails() {
    let source = catalog().respond(&layer_url(0), json!({ "id": 0 }));
    let mut database = RecordingDatabase::new();
    let err = run_fetch_with(
        &unnamed_fetch_config(),
        &source,
        &mut database,
        &mut Vec::new(),
    )
    .expect_err("no name to derive a table from");
    assert!(matches!(err, CliError::UnnamedLayer { url } if url == layer_url(0)));
    assert!(database.events().is_empty());
}
