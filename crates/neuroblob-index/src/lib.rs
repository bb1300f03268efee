//! Uniform bucket grid used to keep world-object proximity queries off the
//! quadratic path.
//!
//! The grid partitions a bounded rectangle into `cols x rows` buckets and
//! tracks, per bucket, the set of keys whose bounding boxes overlap it. An
//! object spanning several buckets is registered in every one of them, so a
//! disk query only has to visit the buckets its bounding box touches and can
//! leave the exact distance filtering to the caller.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::hash::Hash;
use thiserror::Error;

/// Errors raised while configuring the index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The grid geometry was unusable.
    #[error("invalid index configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Column/row address of a single bucket.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CellCoord {
    pub col: u32,
    pub row: u32,
}

/// Axis-aligned bounding box in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Aabb {
    #[must_use]
    pub const fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Box centered on a point with the given half extents.
    #[must_use]
    pub fn around(x: f32, y: f32, half_w: f32, half_h: f32) -> Self {
        Self::new(x - half_w, y - half_h, x + half_w, y + half_h)
    }
}

/// Buckets overlapped by one object. Most objects are far smaller than a
/// bucket, so four inline slots cover the common case without allocating.
pub type CellSet = SmallVec<[CellCoord; 4]>;

/// Bucket grid over a bounded rectangle.
///
/// Coordinates outside the rectangle clamp to the nearest edge bucket, so
/// objects that straddle or sit just past the boundary stay queryable instead
/// of vanishing from the index.
#[derive(Debug, Clone)]
pub struct BucketGrid<K> {
    cols: u32,
    rows: u32,
    cell_width: f32,
    cell_height: f32,
    cells: Vec<HashSet<K>>,
}

impl<K> BucketGrid<K>
where
    K: Copy + Eq + Hash + Ord,
{
    /// Builds a grid of `cols x rows` buckets covering `width x height`.
    pub fn new(cols: u32, rows: u32, width: f32, height: f32) -> Result<Self, IndexError> {
        if cols == 0 || rows == 0 {
            return Err(IndexError::InvalidConfig(
                "grid must have at least one column and one row",
            ));
        }
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(IndexError::InvalidConfig(
                "grid extent must be positive and finite",
            ));
        }
        let bucket_count = (cols as usize)
            .checked_mul(rows as usize)
            .ok_or(IndexError::InvalidConfig("grid bucket count overflowed"))?;
        Ok(Self {
            cols,
            rows,
            cell_width: width / cols as f32,
            cell_height: height / rows as f32,
            cells: (0..bucket_count).map(|_| HashSet::new()).collect(),
        })
    }

    #[must_use]
    pub const fn cols(&self) -> u32 {
        self.cols
    }

    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    fn col_at(&self, x: f32) -> u32 {
        let col = (x / self.cell_width).floor();
        col.clamp(0.0, (self.cols - 1) as f32) as u32
    }

    fn row_at(&self, y: f32) -> u32 {
        let row = (y / self.cell_height).floor();
        row.clamp(0.0, (self.rows - 1) as f32) as u32
    }

    fn cell_mut(&mut self, coord: CellCoord) -> &mut HashSet<K> {
        let index = coord.row as usize * self.cols as usize + coord.col as usize;
        &mut self.cells[index]
    }

    fn cell(&self, coord: CellCoord) -> &HashSet<K> {
        let index = coord.row as usize * self.cols as usize + coord.col as usize;
        &self.cells[index]
    }

    /// Buckets overlapped by a bounding box, clamped to the grid.
    #[must_use]
    pub fn cells_for(&self, aabb: &Aabb) -> CellSet {
        let min_col = self.col_at(aabb.min_x);
        let max_col = self.col_at(aabb.max_x);
        let min_row = self.row_at(aabb.min_y);
        let max_row = self.row_at(aabb.max_y);
        let mut cells = CellSet::new();
        for row in min_row..=max_row {
            for col in min_col..=max_col {
                cells.push(CellCoord { col, row });
            }
        }
        cells
    }

    /// Registers `key` in every listed bucket. Re-inserting is a no-op.
    pub fn insert(&mut self, key: K, cells: &[CellCoord]) {
        for &coord in cells {
            self.cell_mut(coord).insert(key);
        }
    }

    /// Drops `key` from every listed bucket. Removing an absent key is a
    /// no-op.
    pub fn remove(&mut self, key: K, cells: &[CellCoord]) {
        for &coord in cells {
            self.cell_mut(coord).remove(&key);
        }
    }

    /// Moves `key` from its previous buckets to the ones covering `aabb`,
    /// touching only the symmetric difference, and returns the new bucket
    /// set for the caller to retain.
    pub fn relocate(&mut self, key: K, old_cells: &[CellCoord], aabb: &Aabb) -> CellSet {
        let new_cells = self.cells_for(aabb);
        for &coord in old_cells {
            if !new_cells.contains(&coord) {
                self.cell_mut(coord).remove(&key);
            }
        }
        for &coord in &new_cells {
            if !old_cells.contains(&coord) {
                self.cell_mut(coord).insert(key);
            }
        }
        new_cells
    }

    /// Broad-phase candidates for a disk query: every key registered in a
    /// bucket the disk's bounding box touches, ascending and deduplicated.
    /// A radius larger than the grid degrades to a full scan.
    #[must_use]
    pub fn candidates_in_disk(&self, center: (f32, f32), radius: f32) -> Vec<K> {
        let radius = radius.max(0.0);
        let min_col = self.col_at(center.0 - radius);
        let max_col = self.col_at(center.0 + radius);
        let min_row = self.row_at(center.1 - radius);
        let max_row = self.row_at(center.1 + radius);
        let mut found = Vec::new();
        for row in min_row..=max_row {
            for col in min_col..=max_col {
                found.extend(self.cell(CellCoord { col, row }).iter().copied());
            }
        }
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Empties every bucket while keeping the geometry.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }
}
