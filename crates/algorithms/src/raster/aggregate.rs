//! Coarsen or refine raster resolution by an integer factor

use geodeck_core::raster::{Raster, RasterElement};
use geodeck_core::{Algorithm, Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Function combining the cells of one block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    #[default]
    Mean,
    Sum,
    Min,
    Max,
    Median,
    /// Most frequent value; ties go to the smallest
    Modal,
}

impl Reducer {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mean" | "avg" => Some(Reducer::Mean),
            "sum" => Some(Reducer::Sum),
            "min" => Some(Reducer::Min),
            "max" => Some(Reducer::Max),
            "median" => Some(Reducer::Median),
            "modal" | "mode" => Some(Reducer::Modal),
            _ => None,
        }
    }

    /// Reduce a non-empty set of values
    fn apply(&self, values: &mut [f64]) -> f64 {
        match self {
            Reducer::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Reducer::Sum => values.iter().sum(),
            Reducer::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reducer::Median => {
                values.sort_by(f64::total_cmp);
                let n = values.len();
                if n % 2 == 1 {
                    values[n / 2]
                } else {
                    (values[n / 2 - 1] + values[n / 2]) / 2.0
                }
            }
            Reducer::Modal => {
                values.sort_by(f64::total_cmp);
                let mut best = values[0];
                let mut best_run = 0;
                let mut i = 0;
                while i < values.len() {
                    let mut j = i;
                    while j < values.len() && values[j] == values[i] {
                        j += 1;
                    }
                    if j - i > best_run {
                        best_run = j - i;
                        best = values[i];
                    }
                    i = j;
                }
                best
            }
        }
    }
}

/// What to do with rows/columns left over when the factor does not divide the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Remainder {
    /// Refuse with [`Error::IndivisibleFactor`]
    #[default]
    Strict,
    /// Keep partial blocks; the extent grows to a multiple of the factor
    Expand,
    /// Drop partial blocks; the extent shrinks
    Truncate,
}

/// Parameters for [`aggregate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateParams {
    /// Cells per output cell along x
    pub factor_x: usize,
    /// Cells per output cell along y
    pub factor_y: usize,
    pub reducer: Reducer,
    pub remainder: Remainder,
    /// Ignore no-data cells inside a block; when false any no-data cell
    /// makes the whole block no-data
    pub na_rm: bool,
}

impl Default for AggregateParams {
    fn default() -> Self {
        Self {
            factor_x: 2,
            factor_y: 2,
            reducer: Reducer::Mean,
            remainder: Remainder::Strict,
            na_rm: true,
        }
    }
}

impl AggregateParams {
    /// Same factor along both axes
    pub fn new(factor: usize, reducer: Reducer) -> Self {
        Self {
            factor_x: factor,
            factor_y: factor,
            reducer,
            ..Default::default()
        }
    }

    pub fn remainder(mut self, remainder: Remainder) -> Self {
        self.remainder = remainder;
        self
    }
}

/// Aggregate algorithm
#[derive(Debug, Clone, Default)]
pub struct Aggregate;

impl Algorithm for Aggregate {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = AggregateParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Aggregate"
    }

    fn description(&self) -> &'static str {
        "Coarsen resolution by combining blocks of cells with a reducer"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        aggregate(&input, &params)
    }
}

fn check_factor(name: &'static str, factor: usize) -> Result<()> {
    if factor == 0 {
        return Err(Error::InvalidParameter {
            name,
            value: factor.to_string(),
            reason: "factor must be at least 1".into(),
        });
    }
    Ok(())
}

fn output_len(cells: usize, factor: usize, remainder: Remainder, axis: &'static str) -> Result<usize> {
    let whole = cells / factor;
    if cells % factor == 0 {
        return Ok(whole);
    }
    match remainder {
        Remainder::Strict => Err(Error::IndivisibleFactor { factor, cells, axis }),
        Remainder::Expand => Ok(whole + 1),
        Remainder::Truncate => Ok(whole),
    }
}

/// Coarsen `raster` by combining `factor_y` x `factor_x` blocks of cells.
///
/// The output resolution is the factor times the source resolution and the
/// origin is unchanged. No-data cells are skipped when `na_rm` is set; a block
/// with no valid cell becomes no-data (NaN).
pub fn aggregate<T: RasterElement>(raster: &Raster<T>, params: &AggregateParams) -> Result<Raster<f64>> {
    check_factor("factor_x", params.factor_x)?;
    check_factor("factor_y", params.factor_y)?;

    let (rows, cols) = raster.shape();
    let out_rows = output_len(rows, params.factor_y, params.remainder, "rows")?;
    let out_cols = output_len(cols, params.factor_x, params.remainder, "columns")?;
    if out_rows == 0 || out_cols == 0 {
        return Err(Error::InvalidParameter {
            name: "factor",
            value: format!("{}x{}", params.factor_x, params.factor_y),
            reason: format!("larger than the {} x {} grid", rows, cols),
        });
    }

    let (fx, fy) = (params.factor_x, params.factor_y);
    let mut data = Array2::from_elem((out_rows, out_cols), f64::NAN);
    let mut block = Vec::with_capacity(fx * fy);

    for orow in 0..out_rows {
        for ocol in 0..out_cols {
            block.clear();
            let mut missing = false;
            for row in orow * fy..(orow + 1) * fy {
                for col in ocol * fx..(ocol + 1) * fx {
                    if row >= rows || col >= cols {
                        // outside the grid when expanding
                        missing = true;
                        continue;
                    }
                    match raster.value_f64(row, col) {
                        Some(v) => block.push(v),
                        None => missing = true,
                    }
                }
            }
            if block.is_empty() || (missing && !params.na_rm) {
                continue;
            }
            data[(orow, ocol)] = params.reducer.apply(&mut block);
        }
    }

    let transform = raster.transform().scaled(fx as f64, fy as f64);
    let mut out = raster.derive(data, transform);
    out.set_nodata(Some(f64::NAN));

    debug!(
        "aggregate {:?} by {}x{} ({:?}): {} x {} -> {} x {}",
        raster.name(),
        fx,
        fy,
        params.reducer,
        rows,
        cols,
        out_rows,
        out_cols
    );
    Ok(out)
}

/// Parameters for [`disaggregate`]
#[derive(Debug, Clone)]
pub struct DisaggregateParams {
    pub factor: usize,
}

impl Default for DisaggregateParams {
    fn default() -> Self {
        Self { factor: 2 }
    }
}

/// Disaggregate algorithm
#[derive(Debug, Clone, Default)]
pub struct Disaggregate;

impl Algorithm for Disaggregate {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = DisaggregateParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Disaggregate"
    }

    fn description(&self) -> &'static str {
        "Refine resolution by splitting every cell into factor x factor copies"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        disaggregate(&input, params.factor)
    }
}

/// Split every cell into `factor` x `factor` cells holding the same value
pub fn disaggregate<T: RasterElement>(raster: &Raster<T>, factor: usize) -> Result<Raster<T>> {
    check_factor("factor", factor)?;
    let (rows, cols) = raster.shape();
    let source = raster.data();
    let data = Array2::from_shape_fn((rows * factor, cols * factor), |(r, c)| {
        source[(r / factor, c / factor)]
    });
    let f = 1.0 / factor as f64;
    let mut out = raster.derive(data, raster.transform().scaled(f, f));
    out.set_nodata(raster.nodata());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geodeck_core::GeoTransform;

    fn ramp(rows: usize, cols: usize) -> Raster<f64> {
        let data: Vec<f64> = (0..rows * cols).map(|v| v as f64).collect();
        let mut r = Raster::from_vec(data, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(-75.0, -14.0, 0.5, -0.5));
        r.set_nodata(Some(f64::NAN));
        r
    }

    #[test]
    fn mean_of_two_by_two_blocks() {
        let out = aggregate(&ramp(4, 4), &AggregateParams::new(2, Reducer::Mean)).unwrap();
        assert_eq!(out.shape(), (2, 2));
        // block {0, 1, 4, 5}
        assert_relative_eq!(out.value_f64(0, 0).unwrap(), 2.5);
        // block {10, 11, 14, 15}
        assert_relative_eq!(out.value_f64(1, 1).unwrap(), 12.5);
    }

    #[test]
    fn resolution_and_cell_count_scale_with_factor() {
        let source = ramp(6, 9);
        let out = aggregate(&source, &AggregateParams::new(3, Reducer::Sum)).unwrap();
        assert_relative_eq!(out.resolution().0, 3.0 * source.resolution().0);
        assert_relative_eq!(out.resolution().1, 3.0 * source.resolution().1);
        assert_eq!(out.len(), source.len() / 9);
        assert_eq!(out.extent(), source.extent());
    }

    #[test]
    fn strict_rejects_indivisible_factor() {
        let err = aggregate(&ramp(5, 4), &AggregateParams::new(2, Reducer::Mean)).unwrap_err();
        assert!(matches!(
            err,
            Error::IndivisibleFactor { factor: 2, cells: 5, axis: "rows" }
        ));
    }

    #[test]
    fn expand_and_truncate_handle_partial_blocks() {
        let source = ramp(5, 4);
        let params = AggregateParams::new(2, Reducer::Max);

        let expanded = aggregate(&source, &params.clone().remainder(Remainder::Expand)).unwrap();
        assert_eq!(expanded.shape(), (3, 2));
        // last row of blocks only holds source row 4: {16, 17}
        assert_relative_eq!(expanded.value_f64(2, 0).unwrap(), 17.0);
        assert!(expanded.extent().ymin < source.extent().ymin);

        let truncated = aggregate(&source, &params.remainder(Remainder::Truncate)).unwrap();
        assert_eq!(truncated.shape(), (2, 2));
        assert!(truncated.extent().ymin > source.extent().ymin);
    }

    #[test]
    fn zero_factor_is_invalid() {
        let err = aggregate(&ramp(4, 4), &AggregateParams::new(0, Reducer::Mean)).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn nodata_is_skipped_or_propagated() {
        let mut source = ramp(2, 2);
        source.set(0, 0, f64::NAN).unwrap();

        let skipped = aggregate(&source, &AggregateParams::new(2, Reducer::Mean)).unwrap();
        assert_relative_eq!(skipped.value_f64(0, 0).unwrap(), 2.0);

        let params = AggregateParams {
            na_rm: false,
            ..AggregateParams::new(2, Reducer::Mean)
        };
        let propagated = aggregate(&source, &params).unwrap();
        assert_eq!(propagated.value_f64(0, 0), None);
    }

    #[test]
    fn median_and_modal() {
        let mut r = Raster::from_vec(vec![1.0, 3.0, 3.0, 9.0], 2, 2).unwrap();
        r.set_nodata(Some(f64::NAN));
        let median = aggregate(&r, &AggregateParams::new(2, Reducer::Median)).unwrap();
        assert_relative_eq!(median.value_f64(0, 0).unwrap(), 3.0);
        let modal = aggregate(&r, &AggregateParams::new(2, Reducer::Modal)).unwrap();
        assert_relative_eq!(modal.value_f64(0, 0).unwrap(), 3.0);
    }

    #[test]
    fn integer_rasters_aggregate_to_float() {
        let r: Raster<i16> = Raster::from_vec(vec![1, 2, 3, 4], 2, 2).unwrap();
        let out = aggregate(&r, &AggregateParams::new(2, Reducer::Mean)).unwrap();
        assert_relative_eq!(out.value_f64(0, 0).unwrap(), 2.5);
    }

    #[test]
    fn disaggregate_inverts_resolution() {
        let source = ramp(2, 3);
        let fine = disaggregate(&source, 2).unwrap();
        assert_eq!(fine.shape(), (4, 6));
        assert_relative_eq!(fine.resolution().0, source.resolution().0 / 2.0);
        assert_eq!(fine.value_f64(3, 5), source.value_f64(1, 2));
        assert_eq!(fine.extent(), source.extent());

        let back = Aggregate
            .execute(fine, AggregateParams::new(2, Reducer::Mean))
            .unwrap();
        assert_eq!(back.value_f64(1, 1), source.value_f64(1, 1));
    }
}
