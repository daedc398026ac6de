//! Sparse grid of lazily created cells

use crate::cell::Aggregate;
use crate::errors::Result;
use crate::grid::GridDef;
use rayon::prelude::*;

/// Cells over a [`GridDef`], created on first reference
///
/// An absent cell means "no data" rather than a zero-valued cell.
#[derive(Debug, Clone)]
pub struct CellGrid<C> {
    grid_def: GridDef,
    cells: Vec<Option<C>>,
}

impl<C> CellGrid<C> {
    #[must_use]
    pub fn new(grid_def: GridDef) -> Self {
        let mut cells = Vec::with_capacity(grid_def.cell_count());
        cells.resize_with(grid_def.cell_count(), || None);
        Self { grid_def, cells }
    }

    #[must_use]
    pub const fn grid_def(&self) -> &GridDef {
        &self.grid_def
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.grid_def.width()
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.grid_def.height()
    }

    /// Cell at `(x, y)` if it exists; `None` also outside the grid
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<&C> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        self.cells[self.index(x, y)].as_ref()
    }

    /// Cell at `(x, y)`, created with `factory(x, y)` if absent
    ///
    /// # Errors
    ///
    /// Returns an error for indices outside the grid.
    pub fn get_or_create<F>(&mut self, x: usize, y: usize, factory: F) -> Result<&mut C>
    where
        F: FnOnce(usize, usize) -> C,
    {
        self.grid_def.check_index(x as i64, y as i64)?;
        let index = self.index(x, y);
        Ok(self.cells[index].get_or_insert_with(|| factory(x, y)))
    }

    /// Place `cell` at `(x, y)`, replacing any existing cell
    ///
    /// # Errors
    ///
    /// Returns an error for indices outside the grid.
    pub fn set(&mut self, x: usize, y: usize, cell: C) -> Result<()> {
        self.grid_def.check_index(x as i64, y as i64)?;
        let index = self.index(x, y);
        self.cells[index] = Some(cell);
        Ok(())
    }

    /// Existing cells with their coordinates, row by row
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &C)> + '_ {
        let width = self.width();
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(i, cell)| cell.as_ref().map(|c| (i % width, i / width, c)))
    }

    /// Run `f` on every slot in parallel, present or not
    ///
    /// Slots are disjoint, so `f` may create, mutate or clear its cell
    /// without synchronization. The first error stops the traversal.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_par_for_each_slot<F>(&mut self, f: F) -> Result<()>
    where
        C: Send,
        F: Fn(usize, usize, &mut Option<C>) -> Result<()> + Sync,
    {
        let width = self.width();
        self.cells
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(i, slot)| f(i % width, i / width, slot))
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width() + x
    }
}

impl<C: Aggregate> CellGrid<C> {
    /// Existing cells holding at least one sample
    pub fn non_empty(&self) -> impl Iterator<Item = (usize, usize, &C)> + '_ {
        self.iter().filter(|(_, _, c)| !c.is_empty())
    }

    #[must_use]
    pub fn non_empty_count(&self) -> usize {
        self.non_empty().count()
    }
}
