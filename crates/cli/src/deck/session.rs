//! Named objects shared between steps

use geodeck_algorithms::raster::ExtractTable;
use geodeck_colormap::RenderError;
use geodeck_core::raster::{Raster, RasterStack};
use geodeck_core::vector::FeatureCollection;
use geodeck_remote::{GeocodeResult, RemoteError};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors raised while running a deck
#[derive(Error, Debug)]
pub enum DeckError {
    #[error("no object named '{0}' in the session")]
    UnboundName(String),

    #[error("'{name}' is a {found}, expected {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
        found: ValueKind,
    },

    #[error("invalid step: {0}")]
    InvalidStep(String),

    #[error(transparent)]
    Core(#[from] geodeck_core::Error),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("step {index} ({op}) failed: {source}")]
    Step {
        index: usize,
        op: &'static str,
        #[source]
        source: Box<DeckError>,
    },
}

pub type Result<T> = std::result::Result<T, DeckError>;

/// Kind of a session value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Vector,
    Raster,
    Stack,
    Points,
    Table,
    Location,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Vector => "vector layer",
            ValueKind::Raster => "raster",
            ValueKind::Stack => "raster stack",
            ValueKind::Points => "point table",
            ValueKind::Table => "extracted value table",
            ValueKind::Location => "geocoded location",
        };
        f.write_str(name)
    }
}

/// An object a step produced
#[derive(Debug, Clone)]
pub enum Value {
    Vector(FeatureCollection),
    Raster(Raster<f64>),
    Stack(RasterStack),
    /// Point features read from delimited text
    Points(FeatureCollection),
    Table(ExtractTable),
    Location(GeocodeResult),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Vector(_) => ValueKind::Vector,
            Value::Raster(_) => ValueKind::Raster,
            Value::Stack(_) => ValueKind::Stack,
            Value::Points(_) => ValueKind::Points,
            Value::Table(_) => ValueKind::Table,
            Value::Location(_) => ValueKind::Location,
        }
    }
}

/// A raster or a stack, for steps that accept either
#[derive(Debug, Clone, Copy)]
pub enum Grid<'a> {
    Raster(&'a Raster<f64>),
    Stack(&'a RasterStack),
}

/// The explicit map of named objects that steps read and write
#[derive(Debug, Default)]
pub struct Session {
    values: BTreeMap<String, Value>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` to `name`, replacing any previous binding
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| DeckError::UnboundName(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn wrong(name: &str, expected: &'static str, found: &Value) -> DeckError {
        DeckError::WrongKind {
            name: name.to_string(),
            expected,
            found: found.kind(),
        }
    }

    pub fn vector(&self, name: &str) -> Result<&FeatureCollection> {
        match self.get(name)? {
            Value::Vector(fc) => Ok(fc),
            other => Err(Self::wrong(name, "a vector layer", other)),
        }
    }

    /// Features of a vector layer or a point table
    pub fn features(&self, name: &str) -> Result<&FeatureCollection> {
        match self.get(name)? {
            Value::Vector(fc) | Value::Points(fc) => Ok(fc),
            other => Err(Self::wrong(name, "a vector layer or point table", other)),
        }
    }

    pub fn raster(&self, name: &str) -> Result<&Raster<f64>> {
        match self.get(name)? {
            Value::Raster(r) => Ok(r),
            other => Err(Self::wrong(name, "a raster", other)),
        }
    }

    pub fn stack(&self, name: &str) -> Result<&RasterStack> {
        match self.get(name)? {
            Value::Stack(s) => Ok(s),
            other => Err(Self::wrong(name, "a raster stack", other)),
        }
    }

    pub fn grid(&self, name: &str) -> Result<Grid<'_>> {
        match self.get(name)? {
            Value::Raster(r) => Ok(Grid::Raster(r)),
            Value::Stack(s) => Ok(Grid::Stack(s)),
            other => Err(Self::wrong(name, "a raster or raster stack", other)),
        }
    }

    pub fn table(&self, name: &str) -> Result<&ExtractTable> {
        match self.get(name)? {
            Value::Table(t) => Ok(t),
            other => Err(Self::wrong(name, "an extracted value table", other)),
        }
    }

    pub fn location(&self, name: &str) -> Result<&GeocodeResult> {
        match self.get(name)? {
            Value::Location(l) => Ok(l),
            other => Err(Self::wrong(name, "a geocoded location", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lima() -> Value {
        Value::Location(GeocodeResult {
            address: "Lima".into(),
            lon: -77.04,
            lat: -12.05,
        })
    }

    #[test]
    fn unbound_name() {
        let session = Session::new();
        assert!(matches!(session.get("world"), Err(DeckError::UnboundName(n)) if n == "world"));
    }

    #[test]
    fn wrong_kind_names_both_sides() {
        let mut session = Session::new();
        session.bind("lima", lima());
        let err = session.raster("lima").unwrap_err();
        assert!(matches!(
            err,
            DeckError::WrongKind { found: ValueKind::Location, .. }
        ));
        assert_eq!(err.to_string(), "'lima' is a geocoded location, expected a raster");
        assert!(session.location("lima").is_ok());
    }

    #[test]
    fn rebinding_replaces() {
        let mut session = Session::new();
        session.bind("x", lima());
        session.bind("x", Value::Stack(RasterStack::new()));
        assert_eq!(session.len(), 1);
        assert!(session.stack("x").is_ok());
        assert!(matches!(session.grid("x"), Ok(Grid::Stack(_))));
    }
}
