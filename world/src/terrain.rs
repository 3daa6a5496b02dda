//! Static terrain grid and the overlay recording dug and built cells.

use std::collections::BTreeMap;

use rabbit_escape_core::{CellCoord, TerrainCell, TerrainEdit};
use thiserror::Error;

use crate::LevelError;

/// Immutable grid of terrain cells fixed when the level loads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerrainGrid {
    width: u32,
    height: u32,
    cells: Vec<TerrainCell>,
}

impl TerrainGrid {
    /// Creates a grid from row-major cells.
    pub fn new(width: u32, height: u32, cells: Vec<TerrainCell>) -> Result<Self, LevelError> {
        if width == 0 || height == 0 {
            return Err(LevelError::EmptyTerrain);
        }

        let expected = u64::from(width) * u64::from(height);
        if u64::try_from(cells.len()).map_or(true, |actual| actual != expected) {
            return Err(LevelError::CellCountMismatch {
                expected,
                actual: cells.len(),
            });
        }

        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Builds a grid from textual rows using the [`TerrainCell::from_symbol`]
    /// legend. Every row must have the same length.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, LevelError> {
        let Some(first) = rows.first() else {
            return Err(LevelError::EmptyTerrain);
        };
        let width = first.as_ref().chars().count();

        let mut cells = Vec::with_capacity(width * rows.len());
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            let row_width = row.chars().count();
            if row_width != width {
                return Err(LevelError::RaggedRow {
                    row: y,
                    expected: width,
                    actual: row_width,
                });
            }

            for (x, symbol) in row.chars().enumerate() {
                let cell = TerrainCell::from_symbol(symbol)
                    .ok_or(LevelError::UnknownSymbol { symbol, x, y })?;
                cells.push(cell);
            }
        }

        let width = u32::try_from(width).map_err(|_| LevelError::EmptyTerrain)?;
        let height = u32::try_from(rows.len()).map_err(|_| LevelError::EmptyTerrain)?;
        Self::new(width, height, cells)
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Reports whether the cell lies inside the level.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        self.index(cell).is_some()
    }

    /// Returns the static cell at `cell`.
    pub fn cell_at(&self, cell: CellCoord) -> Result<TerrainCell, TerrainError> {
        self.index(cell)
            .and_then(|index| self.cells.get(index).copied())
            .ok_or(TerrainError::OutOfBounds {
                cell,
                width: self.width,
                height: self.height,
            })
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        let x = u32::try_from(cell.x()).ok()?;
        let y = u32::try_from(cell.y()).ok()?;
        if x < self.width && y < self.height {
            let width = usize::try_from(self.width).ok()?;
            Some(usize::try_from(y).ok()? * width + usize::try_from(x).ok()?)
        } else {
            None
        }
    }
}

/// Per-coordinate changes applied on top of the static grid.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TerrainOverlay {
    edits: BTreeMap<CellCoord, TerrainEdit>,
}

impl TerrainOverlay {
    pub(crate) fn apply(&mut self, cell: CellCoord, edit: TerrainEdit) {
        let _ = self.edits.insert(cell, edit);
    }

    /// Returns the edit recorded for `cell`, if any.
    #[must_use]
    pub fn edit_at(&self, cell: CellCoord) -> Option<TerrainEdit> {
        self.edits.get(&cell).copied()
    }

    /// Iterates the recorded edits in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, TerrainEdit)> + '_ {
        self.edits.iter().map(|(cell, edit)| (*cell, *edit))
    }

    /// Number of edited cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Reports whether no cell was edited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

/// Read-only view resolving the overlay against the static grid.
#[derive(Clone, Copy, Debug)]
pub struct TerrainView<'a> {
    grid: &'a TerrainGrid,
    overlay: &'a TerrainOverlay,
}

impl<'a> TerrainView<'a> {
    pub(crate) fn new(grid: &'a TerrainGrid, overlay: &'a TerrainOverlay) -> Self {
        Self { grid, overlay }
    }

    /// Returns the effective cell at `cell`.
    pub fn cell_at(&self, cell: CellCoord) -> Result<TerrainCell, TerrainError> {
        let base = self.grid.cell_at(cell)?;
        Ok(match self.overlay.edit_at(cell) {
            Some(TerrainEdit::Removed) => TerrainCell::Empty,
            Some(TerrainEdit::Built) => TerrainCell::Solid,
            None => base,
        })
    }

    /// Returns the effective cell, or `None` when `cell` lies outside the level.
    #[must_use]
    pub fn probe(&self, cell: CellCoord) -> Option<TerrainCell> {
        self.cell_at(cell).ok()
    }

    /// Provides the underlying static grid.
    #[must_use]
    pub fn grid(&self) -> &'a TerrainGrid {
        self.grid
    }
}

/// Errors raised by terrain access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TerrainError {
    /// The coordinate lies outside the level's fixed dimensions.
    #[error("cell {cell} lies outside the {width}x{height} level")]
    OutOfBounds {
        /// Offending coordinate.
        cell: CellCoord,
        /// Level width in cells.
        width: u32,
        /// Level height in cells.
        height: u32,
    },
}
