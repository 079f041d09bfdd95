//! File discovery for building raster stacks from a directory

use crate::error::{Error, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

/// Files in `dir` whose name matches `pattern`, in natural order
pub fn list_files<P: AsRef<Path>>(dir: P, pattern: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let re = Regex::new(pattern)?;
    let entries = fs::read_dir(dir).map_err(|e| Error::file(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::file(dir, e))?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if re.is_match(name) {
                files.push(path);
            }
        }
    }
    if files.is_empty() {
        return Err(Error::NoMatchingFiles {
            dir: dir.to_path_buf(),
            pattern: pattern.to_string(),
        });
    }

    files.sort_by(|a, b| {
        let a = a.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let b = b.file_name().and_then(|n| n.to_str()).unwrap_or("");
        natural_cmp(a, b)
    });
    Ok(files)
}

/// Compare names treating digit runs as numbers: `tmin2` < `tmin10`
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = chunks(a).into_iter();
    let mut b = chunks(b).into_iter();
    loop {
        match (a.next(), b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny).then_with(|| x.len().cmp(&y.len())),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn chunks(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev_digit: Option<bool> = None;
    for (i, c) in s.char_indices() {
        let digit = c.is_ascii_digit();
        if prev_digit.is_some_and(|p| p != digit) {
            out.push(&s[start..i]);
            start = i;
        }
        prev_digit = Some(digit);
    }
    if start < s.len() {
        out.push(&s[start..]);
    }
    out
}
