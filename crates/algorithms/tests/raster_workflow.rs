//! Raster workflow tests on a synthetic monthly temperature stack over Peru:
//! export, re-import, crop, aggregate, extract and reproject.

use approx::assert_relative_eq;
use geodeck_algorithms::raster::{
    aggregate, aggregate_stack, crop, crop_stack, extract_stack, project_raster, AggregateParams,
    ProjectParams, Reducer, Remainder,
};
use geodeck_core::io::{read_raster, read_raster_stack, read_stack, write_raster, write_stack};
use geodeck_core::{Extent, GeoTransform, Raster, RasterStack, CRS};

/// 60 x 48 cells of 10 arc-minutes over (-82, -74, -18, -8)
fn month(m: usize) -> Raster<f64> {
    let (rows, cols) = (60, 48);
    let data: Vec<f64> = (0..rows * cols)
        .map(|i| {
            let (row, col) = (i / cols, i % cols);
            10.0 + m as f64 + row as f64 * 0.1 - col as f64 * 0.05
        })
        .collect();
    let mut r = Raster::from_vec(data, rows, cols).unwrap().with_name(format!("tmin{}", m));
    r.set_transform(GeoTransform::from_extent(&Extent::new(-82.0, -74.0, -18.0, -8.0), rows, cols));
    r.set_crs(Some(CRS::wgs84()));
    r.set_nodata(Some(f64::NAN));
    r
}

// ---------------------------------------------------------------------------
// Export / import
// ---------------------------------------------------------------------------

/// Cells a 32-bit float cannot hold, plus one no-data cell
fn precise(name: &str) -> Raster<f64> {
    let mut r = month(1).with_name(name);
    r.set(0, 0, 0.1).unwrap();
    r.set(17, 33, 12.345678901).unwrap();
    r.set(30, 5, 1e-7).unwrap();
    r.set(40, 40, f64::NAN).unwrap();
    r
}

fn assert_same_cells(a: &Raster<f64>, b: &Raster<f64>, what: &str) {
    assert_eq!(a.shape(), b.shape(), "{}", what);
    let (rows, cols) = a.shape();
    for row in 0..rows {
        for col in 0..cols {
            assert_eq!(a.value_f64(row, col), b.value_f64(row, col), "{} at ({}, {})", what, row, col);
        }
    }
}

#[test]
fn export_import_preserves_values_extent_and_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let source = precise("tmin1");
    for ext in ["tif", "grd", "bil"] {
        let path = dir.path().join(format!("tmin1.{}", ext));
        write_raster(&source, &path).unwrap();
        let back: Raster<f64> = read_raster(&path).unwrap();

        assert_same_cells(&source, &back, ext);
        assert_eq!(back.get(17, 33).unwrap(), 12.345678901, "{}", ext);
        assert_eq!(back.value_f64(40, 40), None, "{}", ext);
        assert_relative_eq!(back.resolution().0, source.resolution().0, epsilon = 1e-12);
        assert_relative_eq!(back.resolution().1, source.resolution().1, epsilon = 1e-12);
        assert_relative_eq!(back.extent().xmin, source.extent().xmin, epsilon = 1e-12);
        assert_relative_eq!(back.extent().ymax, source.extent().ymax, epsilon = 1e-12);
    }
}

#[test]
fn stack_export_import_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let stack = RasterStack::from_layers(vec![precise("tmin1"), month(2)]).unwrap();
    let path = dir.path().join("tmin.grd");
    write_stack(&stack, &path).unwrap();

    let back = read_raster_stack(&path).unwrap();
    assert_eq!(back.names(), stack.names());
    for (a, b) in stack.iter().zip(back.iter()) {
        assert_same_cells(a, b, a.name().unwrap_or("layer"));
    }
    let (a, b) = (stack.extent().unwrap(), back.extent().unwrap());
    assert_relative_eq!(a.xmin, b.xmin, epsilon = 1e-12);
    assert_relative_eq!(a.ymax, b.ymax, epsilon = 1e-12);
}

// ---------------------------------------------------------------------------
// Stack from directory, crop, aggregate, extract
// ---------------------------------------------------------------------------

#[test]
fn stack_crop_aggregate_extract() {
    let dir = tempfile::tempdir().unwrap();
    for m in [1, 2, 10, 11] {
        write_raster(&month(m), dir.path().join(format!("tmin{}.grd", m))).unwrap();
    }
    let stack = read_stack(dir.path(), r"^tmin\d+\.grd$").unwrap();
    assert_eq!(stack.names(), vec!["tmin1", "tmin2", "tmin10", "tmin11"]);

    let lima = Extent::new(-78.0, -76.0, -13.0, -11.0);
    let cropped = crop_stack(&stack, &lima).unwrap();
    assert_eq!(cropped.shape(), Some((12, 12)));
    assert!(stack.extent().unwrap().contains(&cropped.extent().unwrap()));

    let coarse = aggregate_stack(&cropped, &AggregateParams::new(4, Reducer::Mean)).unwrap();
    assert_eq!(coarse.shape(), Some((3, 3)));
    assert_relative_eq!(
        coarse.layer_at(0).unwrap().resolution().0,
        4.0 * cropped.layer_at(0).unwrap().resolution().0,
        epsilon = 1e-12
    );

    let table = extract_stack(&coarse, &[(-77.03, -12.05), (-70.0, -12.0)]);
    assert_eq!(table.len(), 2);
    assert!(table.rows[0].iter().all(Option::is_some));
    assert!(table.rows[1].iter().all(Option::is_none));
    // months differ by a constant offset
    let row = &table.rows[0];
    assert_relative_eq!(row[1].unwrap() - row[0].unwrap(), 1.0, epsilon = 1e-4);
    assert_relative_eq!(row[3].unwrap() - row[2].unwrap(), 1.0, epsilon = 1e-4);
}

#[test]
fn remainder_policies() {
    let r = month(3);
    // 60 x 48 cells: 7 divides neither
    let strict = aggregate(&r, &AggregateParams::new(7, Reducer::Mean));
    assert!(strict.is_err());

    let expand = aggregate(&r, &AggregateParams::new(7, Reducer::Mean).remainder(Remainder::Expand)).unwrap();
    assert_eq!(expand.shape(), (9, 7));
    let truncate =
        aggregate(&r, &AggregateParams::new(7, Reducer::Mean).remainder(Remainder::Truncate)).unwrap();
    assert_eq!(truncate.shape(), (8, 6));
    assert!(expand.extent().contains(&r.extent()));
    assert!(r.extent().contains(&truncate.extent()));
}

#[test]
fn crop_then_project_round_trip() {
    let r = crop(&month(6), &Extent::new(-80.0, -76.0, -16.0, -10.0)).unwrap();
    let utm = project_raster(&r, &CRS::utm(18, false), &ProjectParams::default()).unwrap();
    assert_eq!(utm.crs().and_then(|c| c.epsg()), Some(32718));
    let back = project_raster(&utm, &CRS::wgs84(), &ProjectParams::default()).unwrap();
    // the envelope of an envelope only grows, and not by much
    let e = back.extent();
    assert!(e.buffered(1e-6).contains(&r.extent()), "{}", e);
    assert!(r.extent().buffered(0.3).contains(&e), "{}", e);

    // value near the middle survives the round trip
    let (x, y) = (-78.0, -13.0);
    let a = r.cell_at(x, y).and_then(|(row, col)| r.value_f64(row, col)).unwrap();
    let b = back.cell_at(x, y).and_then(|(row, col)| back.value_f64(row, col)).unwrap();
    assert_relative_eq!(a, b, epsilon = 0.2);
}

#[test]
fn stack_rejects_misaligned_layer() {
    let mut shifted = month(2);
    shifted.set_transform(GeoTransform::new(-81.0, -8.0, 1.0 / 6.0, -1.0 / 6.0));
    let err = RasterStack::from_layers(vec![month(1), shifted]).unwrap_err();
    assert!(matches!(err, geodeck_core::Error::TransformMismatch(_, _)));
}
