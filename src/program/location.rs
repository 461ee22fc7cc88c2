//! Ordering of macros by their position on the Info page.
//!
//! Macros are read row by row, left to right. Macros whose Y positions lie
//! within a tolerance band belong to the same row, so small vertical
//! misalignments between categories do not reorder a row.

use std::cmp::Ordering;
use std::path::Path;

use crate::error::{ConverterError, Result};

/// Default height of the band treated as one row.
pub const DEFAULT_LOCATION_TOLERANCE: i64 = 30;

/// A macro's name and screen position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroLocation {
    pub name: String,
    pub x: i64,
    pub y: i64,
}

impl MacroLocation {
    pub fn new(name: impl Into<String>, x: i64, y: i64) -> Self {
        Self {
            name: name.into(),
            x,
            y,
        }
    }
}

fn conflict(a: &MacroLocation, b: &MacroLocation, path: &Path) -> ConverterError {
    ConverterError::MacroLocationConflict {
        first: a.name.clone(),
        first_x: a.x,
        first_y: a.y,
        second: b.name.clone(),
        second_x: b.x,
        second_y: b.y,
        path: path.to_path_buf(),
    }
}

/// Compare two locations: rows first (Y within `tolerance` is the same
/// row), then X. Two macros in the same place are a conflict.
pub fn compare_locations(
    a: &MacroLocation,
    b: &MacroLocation,
    tolerance: i64,
    path: &Path,
) -> Result<Ordering> {
    if (a.y - b.y).abs() > tolerance {
        return Ok(a.y.cmp(&b.y));
    }
    match a.x.cmp(&b.x) {
        Ordering::Equal => Err(conflict(a, b, path)),
        ordering => Ok(ordering),
    }
}

/// Sort `items` into Info page reading order.
///
/// Rows are formed by walking the Y positions upwards and starting a new
/// row whenever a macro lies more than `tolerance` below the first macro
/// of the current row. This keeps the order total even when a chain of
/// small offsets spans more than one band.
pub fn order_by_location<T>(
    items: Vec<(T, MacroLocation)>,
    tolerance: i64,
    path: &Path,
) -> Result<Vec<T>> {
    let mut by_y: Vec<(T, MacroLocation)> = items;
    by_y.sort_by(|(_, a), (_, b)| a.y.cmp(&b.y).then(a.x.cmp(&b.x)));

    let mut rows: Vec<Vec<(T, MacroLocation)>> = Vec::new();
    let mut row_top: Option<i64> = None;
    for item in by_y {
        let y = item.1.y;
        match row_top {
            Some(top) if y - top <= tolerance => {}
            _ => {
                rows.push(Vec::new());
                row_top = Some(y);
            }
        }
        if let Some(row) = rows.last_mut() {
            row.push(item);
        }
    }

    let mut ordered = Vec::new();
    for mut row in rows {
        row.sort_by(|(_, a), (_, b)| a.x.cmp(&b.x));
        for pair in row.windows(2) {
            if pair[0].1.x == pair[1].1.x {
                return Err(conflict(&pair[0].1, &pair[1].1, path));
            }
        }
        ordered.extend(row.into_iter().map(|(item, _)| item));
    }
    Ok(ordered)
}
