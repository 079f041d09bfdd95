//! End-to-end deck runs over synthetic data

use approx::assert_relative_eq;
use geodeck_cli::deck::{Deck, DeckError, Runner, ValueKind};
use geodeck_core::io::write_raster;
use geodeck_core::raster::{Extent, GeoTransform, Raster};
use geodeck_core::vector::AttributeValue;
use geodeck_core::CRS;
use std::fs;
use std::path::{Path, PathBuf};

fn decks_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("decks")
}

#[test]
fn europe_deck_filters_and_averages_population() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();
    fs::copy(
        decks_dir().join("data/europe.geojson"),
        dir.path().join("data/europe.geojson"),
    )
    .unwrap();

    let deck = Deck::load(decks_dir().join("europe.json")).unwrap();
    let mut runner = Runner::new(dir.path());
    let mut shown = Vec::new();
    let slides = runner.run(&deck, |s| shown.push(s.index)).unwrap();
    assert_eq!(slides.len(), deck.steps.len());
    assert_eq!(shown, (1..=deck.steps.len()).collect::<Vec<_>>());

    let session = runner.session();
    let west = session.vector("west").unwrap();
    let mut names: Vec<String> = west
        .iter()
        .map(|f| f.value("name").to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        ["Austria", "Belgium", "France", "Germany", "Luxembourg", "Netherlands", "Switzerland"]
    );
    assert!(west.has_column("area"));

    let summary = session.vector("west_pop").unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary.columns(), ["subregion", "pop_mean", "countries"]);
    let row = &summary.features()[0];
    assert_eq!(row.value("subregion"), AttributeValue::String("Western Europe".into()));
    assert_eq!(row.value("countries"), AttributeValue::Int(7));
    let mean = row.value("pop_mean").as_f64().unwrap();
    assert_relative_eq!(mean, 197_081_386.0 / 7.0, max_relative = 1e-12);

    assert_eq!(session.vector("west_merc").unwrap().crs().and_then(|c| c.epsg()), Some(3857));
    assert_eq!(session.vector("west_again").unwrap().len(), 7);

    for file in ["west.geojson", "west.legacy.json", "europe.png", "west.html"] {
        assert!(dir.path().join(file).exists(), "{} was not written", file);
    }
    assert!(slides.last().unwrap().body.contains("Western Europe"));
}

/// Three 6 x 6 layers over lon 0..6, lat 0..6; cell (r, c) of layer k holds 100k + 6r + c
fn write_layers(dir: &Path) {
    let extent = Extent::new(0.0, 6.0, 0.0, 6.0);
    for k in 1..=3 {
        let data: Vec<f64> = (0..36).map(|i| (100 * k + i) as f64).collect();
        let mut layer = Raster::from_vec(data, 6, 6).unwrap().with_name(format!("tmin{}", k));
        layer.set_transform(GeoTransform::from_extent(&extent, 6, 6));
        layer.set_crs(Some(CRS::wgs84()));
        write_raster(&layer, dir.join(format!("tmin{}.grd", k))).unwrap();
    }
    fs::write(dir.join("sites.csv"), "site,lon,lat\nA,0.5,5.5\nB,4.5,1.5\nC,9.0,9.0\n").unwrap();
}

#[test]
fn raster_deck_stacks_aggregates_and_extracts() {
    let dir = tempfile::tempdir().unwrap();
    write_layers(dir.path());

    let deck = Deck::from_json(
        r#"{
            "title": "Rasters",
            "steps": [
                {"op": "read_stack", "dir": ".", "pattern": "^tmin\\d\\.grd$", "into": "tmin"},
                {"op": "read_points", "path": "sites.csv", "into": "sites"},
                {"op": "aggregate", "input": "tmin", "params": {"factor_x": 2, "factor_y": 2, "reducer": "mean"}, "into": "coarse"},
                {"op": "extract", "input": "coarse", "points": "sites", "into": "values"},
                {"op": "write", "input": "values", "path": "values.csv"},
                {"op": "crop", "input": "tmin", "extent": {"xmin": 0.0, "xmax": 3.0, "ymin": 3.0, "ymax": 6.0}, "into": "corner"},
                {"op": "read_raster", "path": "tmin1.grd", "into": "t1"},
                {"op": "crop", "input": "t1", "like": "corner", "into": "t1_corner"},
                {"op": "plot", "input": "tmin", "path": "tmin.png", "overlay": "sites", "style": {"scheme": "temperature"}},
                {"op": "web_map", "path": "t1.html", "raster": "t1", "style": {"scheme": "temperature"}},
                {"op": "write", "input": "t1", "path": "t1.kmz"}
            ]
        }"#,
    )
    .unwrap();

    let mut runner = Runner::new(dir.path());
    runner.run(&deck, |_| {}).unwrap();
    let session = runner.session();

    let tmin = session.stack("tmin").unwrap();
    assert_eq!(tmin.names(), vec!["tmin1", "tmin2", "tmin3"]);

    let coarse = session.stack("coarse").unwrap();
    assert_eq!(coarse.shape(), Some((3, 3)));

    let table = session.table("values").unwrap();
    assert_eq!(table.len(), 3);
    // site A sits in the top-left 2 x 2 block: cells 0, 1, 6, 7
    assert_eq!(table.rows[0][0], Some(103.5));
    assert_eq!(table.rows[0][2], Some(303.5));
    // site B: rows 4-5, cols 4-5 -> cells 28, 29, 34, 35
    assert_eq!(table.rows[1][1], Some(231.5));
    // site C is off the grid
    assert_eq!(table.rows[2], vec![None, None, None]);

    let csv = fs::read_to_string(dir.path().join("values.csv")).unwrap();
    assert_eq!(csv.lines().next(), Some("x,y,tmin1,tmin2,tmin3"));
    assert!(csv.lines().nth(3).unwrap().ends_with("NA,NA,NA"));

    let corner = session.stack("corner").unwrap();
    assert_eq!(corner.shape(), Some((3, 3)));
    assert_eq!(session.raster("t1_corner").unwrap().extent(), corner.extent().unwrap());

    for file in ["tmin.png", "t1.html", "t1.kmz"] {
        assert!(dir.path().join(file).exists(), "{} was not written", file);
    }
}

#[test]
fn unbound_name_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let deck = Deck::from_json(
        r#"{
            "title": "Broken",
            "steps": [
                {"op": "filter", "input": "world", "column": "subregion", "equals": "Western Europe", "into": "west"},
                {"op": "write", "input": "west", "path": "west.geojson"}
            ]
        }"#,
    )
    .unwrap();

    let mut runner = Runner::new(dir.path());
    let err = runner.run(&deck, |_| {}).unwrap_err();
    match err {
        DeckError::Step { index, op, source } => {
            assert_eq!((index, op), (1, "filter"));
            assert!(matches!(*source, DeckError::UnboundName(ref n) if n == "world"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!dir.path().join("west.geojson").exists());
    assert!(runner.session().is_empty());
}

#[test]
fn wrong_kind_names_both_kinds() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();
    fs::copy(
        decks_dir().join("data/europe.geojson"),
        dir.path().join("data/europe.geojson"),
    )
    .unwrap();
    let deck = Deck::from_json(
        r#"{
            "title": "Mixed up",
            "steps": [
                {"op": "read_vector", "path": "data/europe.geojson", "into": "world"},
                {"op": "aggregate", "input": "world", "params": {"factor_x": 2, "factor_y": 2}, "into": "coarse"}
            ]
        }"#,
    )
    .unwrap();

    let mut runner = Runner::new(dir.path());
    let err = runner.run(&deck, |_| {}).unwrap_err();
    let DeckError::Step { index, source, .. } = err else {
        panic!("expected a step error");
    };
    assert_eq!(index, 2);
    assert!(matches!(
        *source,
        DeckError::WrongKind { found: ValueKind::Vector, .. }
    ));
    assert!(runner.session().contains("world"));
    assert!(!runner.session().contains("coarse"));
}
