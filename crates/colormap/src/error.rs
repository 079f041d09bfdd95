//! Error types for rendering

use thiserror::Error;

/// Errors from plotting, web maps and KMZ export
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Core(#[from] geodeck_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{what} must be in EPSG:4326 longitude/latitude, found {found}")]
    NotGeographic { what: &'static str, found: String },

    #[error("Nothing to draw: {0}")]
    Empty(&'static str),

    #[error("Invalid plot option: {0}")]
    InvalidOption(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;
