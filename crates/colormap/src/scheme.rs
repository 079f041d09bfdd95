//! Color schemes and multi-stop interpolation engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RGB color as (r, g, b) with values in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Opaque RGBA bytes
    pub const fn rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }

    /// CSS hex notation, `#rrggbb`
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// A color stop: position in [0, 1] mapped to an RGB color.
#[derive(Debug, Clone, Copy)]
pub struct ColorStop {
    pub t: f64,
    pub color: Rgb,
}

impl ColorStop {
    pub const fn new(t: f64, r: u8, g: u8, b: u8) -> Self {
        Self {
            t,
            color: Rgb::new(r, g, b),
        }
    }
}

/// Available color schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    /// Green -> Yellow -> Brown -> White (elevation)
    #[default]
    Terrain,
    /// Perceptually uniform purple -> teal -> yellow
    Viridis,
    /// Blue -> Yellow -> Red (air temperature)
    Temperature,
    /// Blue -> White -> Red (divergent data)
    Divergent,
    /// Black -> White
    Grayscale,
    /// White -> Cyan -> Blue (precipitation, water depth)
    Water,
    /// 10 distinct colors for classes and groups
    Categorical,
}

impl ColorScheme {
    /// All available schemes.
    pub const ALL: &[ColorScheme] = &[
        Self::Terrain,
        Self::Viridis,
        Self::Temperature,
        Self::Divergent,
        Self::Grayscale,
        Self::Water,
        Self::Categorical,
    ];

    /// Lowercase identifier, as accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::Terrain => "terrain",
            Self::Viridis => "viridis",
            Self::Temperature => "temperature",
            Self::Divergent => "divergent",
            Self::Grayscale => "grayscale",
            Self::Water => "water",
            Self::Categorical => "categorical",
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let wanted = match wanted.as_str() {
            "gray" | "grey" | "greyscale" => "grayscale",
            "precipitation" | "prec" => "water",
            "temp" => "temperature",
            other => other,
        };
        ColorScheme::ALL
            .iter()
            .copied()
            .find(|scheme| scheme.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = ColorScheme::ALL.iter().map(|s| s.name()).collect();
                format!("unknown color scheme '{}' (expected one of {})", s, names.join(", "))
            })
    }
}

// ─── Color stop definitions ────────────────────────────────────────────

const TERRAIN_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 34, 139, 34),
    ColorStop::new(0.25, 144, 190, 60),
    ColorStop::new(0.50, 220, 200, 80),
    ColorStop::new(0.75, 180, 120, 60),
    ColorStop::new(1.00, 255, 255, 255),
];

const VIRIDIS_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 68, 1, 84),
    ColorStop::new(0.25, 59, 82, 139),
    ColorStop::new(0.50, 33, 145, 140),
    ColorStop::new(0.75, 94, 201, 98),
    ColorStop::new(1.00, 253, 231, 37),
];

const TEMPERATURE_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 49, 54, 149),
    ColorStop::new(0.25, 116, 173, 209),
    ColorStop::new(0.50, 255, 255, 191),
    ColorStop::new(0.75, 244, 109, 67),
    ColorStop::new(1.00, 165, 0, 38),
];

const DIVERGENT_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 44, 62, 180),
    ColorStop::new(0.25, 120, 160, 220),
    ColorStop::new(0.50, 240, 240, 240),
    ColorStop::new(0.75, 220, 120, 80),
    ColorStop::new(1.00, 180, 30, 30),
];

const WATER_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 240, 249, 255),
    ColorStop::new(0.25, 186, 228, 250),
    ColorStop::new(0.50, 80, 180, 230),
    ColorStop::new(0.75, 30, 120, 200),
    ColorStop::new(1.00, 8, 48, 107),
];

/// Categorical palette: 10 distinct classes.
const CATEGORICAL_PALETTE: &[Rgb] = &[
    Rgb::new(31, 119, 180),
    Rgb::new(255, 127, 14),
    Rgb::new(44, 160, 44),
    Rgb::new(214, 39, 40),
    Rgb::new(148, 103, 189),
    Rgb::new(140, 86, 75),
    Rgb::new(227, 119, 194),
    Rgb::new(127, 127, 127),
    Rgb::new(188, 189, 34),
    Rgb::new(23, 190, 207),
];

// ─── Interpolation engine ──────────────────────────────────────────────

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(c1.r as f64, c2.r as f64, t).round() as u8,
        lerp(c1.g as f64, c2.g as f64, t).round() as u8,
        lerp(c1.b as f64, c2.b as f64, t).round() as u8,
    )
}

fn multi_stop(stops: &[ColorStop], t: f64) -> Rgb {
    if t <= 0.0 {
        return stops[0].color;
    }
    if t >= 1.0 {
        return stops[stops.len() - 1].color;
    }
    for i in 1..stops.len() {
        if t <= stops[i].t {
            let ratio = (t - stops[i - 1].t) / (stops[i].t - stops[i - 1].t);
            return lerp_color(stops[i - 1].color, stops[i].color, ratio);
        }
    }
    stops[stops.len() - 1].color
}

/// Color of class `index`, cycling through the categorical palette
pub fn category(index: usize) -> Rgb {
    CATEGORICAL_PALETTE[index % CATEGORICAL_PALETTE.len()]
}

/// Evaluate a color scheme at normalized position `t` ∈ [0, 1].
///
/// For most schemes this performs multi-stop linear interpolation.
/// For `Categorical`, `t` is mapped to one of 10 discrete classes.
pub fn evaluate(scheme: ColorScheme, t: f64) -> Rgb {
    match scheme {
        ColorScheme::Terrain => multi_stop(TERRAIN_STOPS, t),
        ColorScheme::Viridis => multi_stop(VIRIDIS_STOPS, t),
        ColorScheme::Temperature => multi_stop(TEMPERATURE_STOPS, t),
        ColorScheme::Divergent => multi_stop(DIVERGENT_STOPS, t),
        ColorScheme::Grayscale => {
            let v = (t.clamp(0.0, 1.0) * 255.0).round() as u8;
            Rgb::new(v, v, v)
        }
        ColorScheme::Water => multi_stop(WATER_STOPS, t),
        ColorScheme::Categorical => {
            let idx = (t * 10.0).floor().clamp(0.0, 9.0) as usize;
            CATEGORICAL_PALETTE[idx]
        }
    }
}
