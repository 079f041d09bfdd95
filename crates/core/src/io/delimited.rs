//! Delimited text point files (`.csv`, `.txt`)

use crate::error::{Error, Result};
use crate::vector::{PointColumns, PointTable};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Options for [`read_points`]
#[derive(Debug, Clone, Default)]
pub struct PointReadOptions {
    pub columns: PointColumns,
    /// Field separator; detected from the header line when `None`
    pub delimiter: Option<u8>,
}

/// Pick `,`, `;` or tab, whichever appears most in the header line
pub fn sniff_delimiter(header: &str) -> u8 {
    [b',', b';', b'\t']
        .into_iter()
        .map(|d| (d, header.bytes().filter(|b| *b == d).count()))
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

/// Read a delimited file of points with a header row
pub fn read_points<P: AsRef<Path>>(path: P, options: &PointReadOptions) -> Result<PointTable> {
    let path = path.as_ref();
    let delimiter = match options.delimiter {
        Some(d) => d,
        None => {
            let text = fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
            sniff_delimiter(text.lines().next().unwrap_or(""))
        }
    };
    let file = File::open(path).map_err(|e| Error::file(path, e))?;
    let table = PointTable::from_reader(BufReader::new(file), delimiter, &options.columns)?;
    debug!(
        "read {} points from {} (x = {}, y = {})",
        table.len(),
        path.display(),
        table.x_column,
        table.y_column
    );
    Ok(table)
}
