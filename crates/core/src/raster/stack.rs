//! Multi-layer raster stack

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{Extent, GeoTransform, Raster};

/// An ordered set of named layers sharing one grid.
///
/// Every layer has the same shape, geotransform and CRS; [`RasterStack::push`]
/// rejects layers that do not conform.
#[derive(Debug, Clone, Default)]
pub struct RasterStack {
    layers: Vec<Raster<f64>>,
}

impl RasterStack {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Build a stack from layers, checking they share one grid
    pub fn from_layers(layers: impl IntoIterator<Item = Raster<f64>>) -> Result<Self> {
        let mut stack = Self::new();
        for layer in layers {
            stack.push(layer)?;
        }
        Ok(stack)
    }

    /// Append a layer; unnamed layers are called `layer.<n>`
    pub fn push(&mut self, mut layer: Raster<f64>) -> Result<()> {
        if let Some(first) = self.layers.first() {
            check_conforms(first, &layer)?;
        }
        if layer.name().is_none() {
            layer.set_name(format!("layer.{}", self.layers.len() + 1));
        }
        self.layers.push(layer);
        Ok(())
    }

    pub fn nlayers(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer names in stack order
    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name().unwrap_or("")).collect()
    }

    pub fn layer(&self, name: &str) -> Option<&Raster<f64>> {
        self.layers.iter().find(|l| l.name() == Some(name))
    }

    pub fn layer_at(&self, index: usize) -> Option<&Raster<f64>> {
        self.layers.get(index)
    }

    pub fn layers(&self) -> &[Raster<f64>] {
        &self.layers
    }

    pub fn into_layers(self) -> Vec<Raster<f64>> {
        self.layers
    }

    pub fn iter(&self) -> impl Iterator<Item = &Raster<f64>> {
        self.layers.iter()
    }

    /// Shape (rows, cols) shared by all layers
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.layers.first().map(|l| l.shape())
    }

    pub fn extent(&self) -> Option<Extent> {
        self.layers.first().map(|l| l.extent())
    }

    pub fn transform(&self) -> Option<&GeoTransform> {
        self.layers.first().map(|l| l.transform())
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.layers.first().and_then(|l| l.crs())
    }

    /// Label every layer with the same CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        for layer in &mut self.layers {
            layer.set_crs(crs.clone());
        }
    }

    /// Apply a fallible per-layer transformation, re-validating the result
    pub fn map_layers<F>(&self, mut f: F) -> Result<RasterStack>
    where
        F: FnMut(&Raster<f64>) -> Result<Raster<f64>>,
    {
        let mut out = RasterStack::new();
        for layer in &self.layers {
            let mut mapped = f(layer)?;
            if mapped.name().is_none() {
                if let Some(name) = layer.name() {
                    mapped.set_name(name);
                }
            }
            out.push(mapped)?;
        }
        Ok(out)
    }
}

impl IntoIterator for RasterStack {
    type Item = Raster<f64>;
    type IntoIter = std::vec::IntoIter<Raster<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.into_iter()
    }
}

fn check_conforms(first: &Raster<f64>, layer: &Raster<f64>) -> Result<()> {
    let (er, ec) = first.shape();
    let (ar, ac) = layer.shape();
    if (er, ec) != (ar, ac) {
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }
    if !first.transform().approx_eq(layer.transform(), 1e-9) {
        return Err(Error::TransformMismatch(
            first.name().unwrap_or("?").to_string(),
            layer.name().unwrap_or("?").to_string(),
        ));
    }
    match (first.crs(), layer.crs()) {
        (None, None) => Ok(()),
        (Some(a), Some(b)) if a.is_equivalent(b) => Ok(()),
        (a, b) => Err(Error::CrsMismatch(
            a.map(|c| c.identifier()).unwrap_or_else(|| "none".into()),
            b.map(|c| c.identifier()).unwrap_or_else(|| "none".into()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(3, 4, value).with_name(name);
        r.set_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        r.set_crs(Some(CRS::wgs84()));
        r
    }

    #[test]
    fn push_and_lookup() {
        let stack = RasterStack::from_layers(vec![layer("tmin1", 1.0), layer("tmin2", 2.0)]).unwrap();
        assert_eq!(stack.nlayers(), 2);
        assert_eq!(stack.names(), vec!["tmin1", "tmin2"]);
        assert_eq!(stack.layer("tmin2").unwrap().get(0, 0).unwrap(), 2.0);
        assert_eq!(stack.shape(), Some((3, 4)));
    }

    #[test]
    fn rejects_other_shape() {
        let mut stack = RasterStack::from_layers(vec![layer("a", 1.0)]).unwrap();
        let err = stack.push(Raster::filled(2, 2, 0.0)).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }));
    }

    #[test]
    fn rejects_shifted_grid_and_other_crs() {
        let mut stack = RasterStack::from_layers(vec![layer("a", 1.0)]).unwrap();

        let mut shifted = layer("b", 1.0);
        shifted.set_transform(GeoTransform::new(0.5, 3.0, 1.0, -1.0));
        assert!(matches!(stack.push(shifted), Err(Error::TransformMismatch(_, _))));

        let mut utm = layer("c", 1.0);
        utm.set_crs(Some(CRS::utm(30, true)));
        assert!(matches!(stack.push(utm), Err(Error::CrsMismatch(_, _))));
    }

    #[test]
    fn unnamed_layers_get_default_names() {
        let mut stack = RasterStack::new();
        stack.push(Raster::filled(1, 1, 0.0)).unwrap();
        stack.push(Raster::filled(1, 1, 0.0)).unwrap();
        assert_eq!(stack.names(), vec!["layer.1", "layer.2"]);
    }
}
