use std::fmt;
use std::num::NonZeroUsize;

use crate::grid::{self, GridShape};

/// Canvas dimensions of the mixer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Negotiated frame size of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: i32,
    pub height: i32,
}

impl Resolution {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Position and size written to a mixer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGeometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl fmt::Display for TileGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pos=({},{}) size=({},{})",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Arithmetic mean of the given resolutions, used as the preferred tile.
pub fn average_resolution(sizes: &[Resolution]) -> (f64, f64) {
    if sizes.is_empty() {
        return (0.0, 0.0);
    }

    let (w, h) = sizes.iter().fold((0.0, 0.0), |(w, h), r| {
        (w + f64::from(r.width), h + f64::from(r.height))
    });
    let n = sizes.len() as f64;
    (w / n, h / n)
}

/// Computed arrangement for one set of visible tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub shape: GridShape,
    /// One entry per placed tile, in the order of the input sizes.
    pub tiles: Vec<TileGeometry>,
}

/// Places `sizes` row-major into the best grid for `canvas`.
///
/// Returns `None` for an empty input. Every tile keeps its own aspect ratio and
/// is centered inside its cell; a partially filled last row is not re-packed.
pub fn plan(canvas: Size, sizes: &[Resolution]) -> Option<Plan> {
    let count = NonZeroUsize::new(sizes.len())?;
    let shape = grid::solve(canvas, average_resolution(sizes), count);

    let rows = shape.rows as i32;
    let columns = shape.columns as i32;
    let grid_width = canvas.width / columns;
    let grid_height = canvas.height / rows;
    let limit = sizes.len().min(shape.cells());

    let mut tiles = Vec::with_capacity(limit);
    'rows: for row in 0..rows {
        for col in 0..columns {
            let index = (row * columns + col) as usize;
            if index >= limit {
                break 'rows;
            }
            let Some(source) = sizes.get(index) else {
                break 'rows;
            };

            let scale = f64::min(
                f64::from(grid_width) / f64::from(source.width),
                f64::from(grid_height) / f64::from(source.height),
            );
            let width = f64::from(source.width) * scale;
            let height = f64::from(source.height) * scale;
            let x = f64::from(col * grid_width) + (f64::from(grid_width) - width) / 2.0;
            let y = f64::from(row * grid_height) + (f64::from(grid_height) - height) / 2.0;

            tiles.push(TileGeometry {
                x: x as i32,
                y: y as i32,
                width: width as i32,
                height: height as i32,
            });
        }
    }

    Some(Plan { shape, tiles })
}
