use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scene-local identifier for object parts (compact, render-friendly).
pub type LocalId = u32;

/// Errors surfaced by the external seams of the region core.
///
/// Most of this subsystem swallows-and-logs by design (bus dispatch,
/// coordination batches, dispatcher entry points); these variants exist for
/// the seams that legitimately report failure to their immediate caller:
/// the grid directory, the simulation transport, and the inventory service.
#[derive(Error, Debug)]
pub enum RegionError {
    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Inventory error: {0}")]
    Inventory(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Packed spatial encoding of a region's grid location.
///
/// The world grid addresses regions by cell; the handle packs the cell's
/// world coordinates (cells are 256m on a side) into a single u64 so it can
/// travel in coordination messages and map keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionHandle(pub u64);

impl RegionHandle {
    pub const CELL_SIZE: u32 = 256;

    /// Builds a handle from grid cell coordinates.
    pub fn from_cells(x: u32, y: u32) -> Self {
        let wx = (x * Self::CELL_SIZE) as u64;
        let wy = (y * Self::CELL_SIZE) as u64;
        RegionHandle((wx << 32) | wy)
    }

    /// Grid cell X coordinate.
    pub fn cell_x(&self) -> u32 {
        ((self.0 >> 32) as u32) / Self::CELL_SIZE
    }

    /// Grid cell Y coordinate.
    pub fn cell_y(&self) -> u32 {
        ((self.0 & 0xffff_ffff) as u32) / Self::CELL_SIZE
    }

    /// Whether two handles address adjacent (or identical) grid cells.
    pub fn is_neighbour_of(&self, other: &RegionHandle) -> bool {
        let dx = self.cell_x().abs_diff(other.cell_x());
        let dy = self.cell_y().abs_diff(other.cell_y());
        dx <= 1 && dy <= 1
    }
}

impl std::fmt::Display for RegionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.cell_x(), self.cell_y())
    }
}

/// Position or velocity in region-local space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}
