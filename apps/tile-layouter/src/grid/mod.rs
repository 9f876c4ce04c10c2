//! Row/column search for tiling a canvas with a number of equally sized cells.

use std::num::NonZeroUsize;

use crate::layout::Size;

/// Number of rows and columns of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub rows: u32,
    pub columns: u32,
}

impl GridShape {
    pub fn cells(&self) -> usize {
        self.rows as usize * self.columns as usize
    }
}

/// Number of columns needed to hold `count` cells in `rows` rows.
fn columns_for(count: usize, rows: usize) -> usize {
    count.div_ceil(rows)
}

/// Fit scale of `preferred` into one cell of a `rows` x `columns` split of `canvas`.
pub fn fit_scale(canvas: Size, preferred: (f64, f64), rows: usize, columns: usize) -> f64 {
    let cell_width = canvas.width / columns as i32;
    let cell_height = canvas.height / rows as i32;
    f64::min(
        f64::from(cell_width) / preferred.0,
        f64::from(cell_height) / preferred.1,
    )
}

/// Picks the grid that lets a tile of size `preferred` be drawn the largest.
///
/// Rows are tried in increasing order and the search stops at the first row
/// count that does not strictly improve the scale, so on ties the smaller row
/// count wins. The search never goes past `count` rows.
pub fn solve(canvas: Size, preferred: (f64, f64), count: NonZeroUsize) -> GridShape {
    let count = count.get();

    let mut best_rows = 1;
    let mut best_scale = fit_scale(canvas, preferred, 1, columns_for(count, 1));

    for rows in 2..=count {
        let scale = fit_scale(canvas, preferred, rows, columns_for(count, rows));
        if scale <= best_scale {
            break;
        }
        best_rows = rows;
        best_scale = scale;
    }

    GridShape {
        rows: best_rows as u32,
        columns: columns_for(count, best_rows) as u32,
    }
}
