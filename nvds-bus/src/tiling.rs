/// Row/column geometry of the composite tiled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub rows: u32,
    pub columns: u32,
}

impl TileGrid {
    pub fn cells(&self) -> u32 {
        self.rows * self.columns
    }
}

/// Lays out `sources` tiles: `rows = floor(sqrt(n))`, `columns = ceil(n / rows)`.
///
/// A source count of zero is treated as one so the grid is never empty.
pub fn tile_grid(sources: usize) -> TileGrid {
    let n = u32::try_from(sources.max(1)).unwrap_or(u32::MAX);
    let rows = n.isqrt();
    TileGrid {
        rows,
        columns: n.div_ceil(rows),
    }
}

#[cfg(test)]
#[path = "tiling_test.rs"]
mod tiling_test;
