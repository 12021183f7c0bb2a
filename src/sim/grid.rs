//! Dense 3D occupancy grid
//!
//! One flat buffer of cell states addressed by (x, y, layer). Layout is
//! layer-major then row-major: `index = (layer * cells_y + y) * cells_x + x`,
//! so a whole layer is contiguous and rows within it are contiguous.
//!
//! Each cell is a small set of independent flags. The border is stamped once,
//! then captured as the clean snapshot; `clear_dynamic` restores that snapshot
//! with a single slice copy instead of visiting cells.

use std::fmt;

/// A single occupancy flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFlag {
    /// Inside some orb's avoidance shell
    Proximity,
    /// Inside some orb's body
    Filled,
    /// Outer wall of the grid
    Border,
}

impl CellFlag {
    /// Parse a flag name as used by debug overlays
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "proximity" => Some(CellFlag::Proximity),
            "filled" => Some(CellFlag::Filled),
            "border" => Some(CellFlag::Border),
            _ => None,
        }
    }

    #[inline]
    const fn bit(self) -> u8 {
        match self {
            CellFlag::Proximity => 1 << 0,
            CellFlag::Filled => 1 << 1,
            CellFlag::Border => 1 << 2,
        }
    }
}

/// Set of flags held by one cell
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct CellState(u8);

impl CellState {
    pub const EMPTY: CellState = CellState(0);
    pub const BORDER: CellState = CellState(CellFlag::Border.bit());

    #[inline]
    pub fn has(self, flag: CellFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    #[inline]
    pub fn with(self, flag: CellFlag) -> Self {
        CellState(self.0 | flag.bit())
    }

    #[inline]
    pub fn without(self, flag: CellFlag) -> Self {
        CellState(self.0 & !flag.bit())
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Orbs cannot enter filled or border cells
    #[inline]
    pub fn is_blocking(self) -> bool {
        self.has(CellFlag::Filled) || self.has(CellFlag::Border)
    }
}

impl fmt::Debug for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for flag in [CellFlag::Proximity, CellFlag::Filled, CellFlag::Border] {
            if self.has(flag) {
                set.entry(&flag);
            }
        }
        set.finish()
    }
}

/// Occupancy grid for one viewport geometry
#[derive(Debug, Clone)]
pub struct Grid {
    cells_x: u32,
    cells_y: u32,
    layers: u32,
    cells: Vec<CellState>,
    /// State right after border initialization
    clean: Vec<CellState>,
}

impl Grid {
    /// Create a grid with its border stamped and the clean snapshot saved
    pub fn new(cells_x: u32, cells_y: u32, layers: u32) -> Self {
        let cells_x = cells_x.max(1);
        let cells_y = cells_y.max(1);
        let layers = layers.max(1);
        let size = cells_x as usize * cells_y as usize * layers as usize;

        let mut grid = Self {
            cells_x,
            cells_y,
            layers,
            cells: vec![CellState::EMPTY; size],
            clean: Vec::new(),
        };
        grid.initialize_border();
        grid.save_clean_state();
        grid
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32, u32) {
        (self.cells_x, self.cells_y, self.layers)
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32, layer: i32) -> bool {
        x >= 0
            && y >= 0
            && layer >= 0
            && (x as u32) < self.cells_x
            && (y as u32) < self.cells_y
            && (layer as u32) < self.layers
    }

    /// Flat buffer index, or None outside the grid
    #[inline]
    pub fn index(&self, x: i32, y: i32, layer: i32) -> Option<usize> {
        if !self.in_bounds(x, y, layer) {
            return None;
        }
        let (x, y, layer) = (x as usize, y as usize, layer as usize);
        Some((layer * self.cells_y as usize + y) * self.cells_x as usize + x)
    }

    /// Cell state; anything outside the grid reads as border
    #[inline]
    pub fn get_cell(&self, x: i32, y: i32, layer: i32) -> CellState {
        match self.index(x, y, layer) {
            Some(i) => self.cells[i],
            None => CellState::BORDER,
        }
    }

    /// Overwrite a cell. Writes outside the grid are ignored.
    #[inline]
    pub fn set_cell(&mut self, x: i32, y: i32, layer: i32, state: CellState) {
        if let Some(i) = self.index(x, y, layer) {
            self.cells[i] = state;
        }
    }

    #[inline]
    pub fn add_cell_flag(&mut self, x: i32, y: i32, layer: i32, flag: CellFlag) {
        if let Some(i) = self.index(x, y, layer) {
            self.cells[i] = self.cells[i].with(flag);
        }
    }

    #[inline]
    pub fn remove_cell_flag(&mut self, x: i32, y: i32, layer: i32, flag: CellFlag) {
        if let Some(i) = self.index(x, y, layer) {
            self.cells[i] = self.cells[i].without(flag);
        }
    }

    #[inline]
    pub fn is_blocking(&self, x: i32, y: i32, layer: i32) -> bool {
        self.get_cell(x, y, layer).is_blocking()
    }

    /// Stamp BORDER on the outer x/y ring of every layer
    pub fn initialize_border(&mut self) {
        let (max_x, max_y) = (self.cells_x as i32 - 1, self.cells_y as i32 - 1);
        for layer in 0..self.layers as i32 {
            for x in 0..=max_x {
                self.add_cell_flag(x, 0, layer, CellFlag::Border);
                self.add_cell_flag(x, max_y, layer, CellFlag::Border);
            }
            for y in 0..=max_y {
                self.add_cell_flag(0, y, layer, CellFlag::Border);
                self.add_cell_flag(max_x, y, layer, CellFlag::Border);
            }
        }
    }

    /// Capture the current state as the reset target for `clear_dynamic`
    pub fn save_clean_state(&mut self) {
        self.clean.clear();
        self.clean.extend_from_slice(&self.cells);
    }

    /// Restore every cell to the clean snapshot in one bulk copy
    #[inline]
    pub fn clear_dynamic(&mut self) {
        self.cells.copy_from_slice(&self.clean);
    }

    /// Number of cells carrying `flag`
    pub fn count_with(&self, flag: CellFlag) -> usize {
        self.cells.iter().filter(|c| c.has(flag)).count()
    }

    /// Whether every cell matches the clean snapshot
    pub fn is_clean(&self) -> bool {
        self.cells == self.clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_grid_has_border_ring_on_every_layer() {
        let grid = Grid::new(6, 5, 3);
        for layer in 0..3 {
            assert!(grid.get_cell(0, 2, layer).has(CellFlag::Border));
            assert!(grid.get_cell(5, 2, layer).has(CellFlag::Border));
            assert!(grid.get_cell(3, 0, layer).has(CellFlag::Border));
            assert!(grid.get_cell(3, 4, layer).has(CellFlag::Border));
            assert!(grid.get_cell(2, 2, layer).is_empty());
        }
        // 2 * 6 + 2 * 3 border cells per layer
        assert_eq!(grid.count_with(CellFlag::Border), 18 * 3);
    }

    #[test]
    fn test_flags_combine_and_remove_independently() {
        let mut grid = Grid::new(8, 8, 2);
        grid.add_cell_flag(3, 3, 1, CellFlag::Proximity);
        grid.add_cell_flag(3, 3, 1, CellFlag::Filled);
        let cell = grid.get_cell(3, 3, 1);
        assert!(cell.has(CellFlag::Proximity) && cell.has(CellFlag::Filled));

        grid.remove_cell_flag(3, 3, 1, CellFlag::Filled);
        let cell = grid.get_cell(3, 3, 1);
        assert!(cell.has(CellFlag::Proximity));
        assert!(!cell.has(CellFlag::Filled));
        assert!(!cell.is_blocking());
    }

    #[test]
    fn test_set_cell_overwrites() {
        let mut grid = Grid::new(8, 8, 1);
        grid.add_cell_flag(2, 2, 0, CellFlag::Proximity);
        grid.set_cell(2, 2, 0, CellState::EMPTY.with(CellFlag::Filled));
        let cell = grid.get_cell(2, 2, 0);
        assert!(cell.has(CellFlag::Filled));
        assert!(!cell.has(CellFlag::Proximity));
    }

    #[test]
    fn test_clear_dynamic_keeps_border() {
        let mut grid = Grid::new(10, 10, 4);
        grid.add_cell_flag(4, 4, 2, CellFlag::Filled);
        grid.add_cell_flag(0, 4, 2, CellFlag::Filled);
        assert!(!grid.is_clean());

        grid.clear_dynamic();
        assert!(grid.is_clean());
        assert!(grid.get_cell(4, 4, 2).is_empty());
        let wall = grid.get_cell(0, 4, 2);
        assert!(wall.has(CellFlag::Border));
        assert!(!wall.has(CellFlag::Filled));
    }

    #[test]
    fn test_blocking_flags() {
        let mut grid = Grid::new(8, 8, 1);
        assert!(!grid.is_blocking(3, 3, 0));
        grid.add_cell_flag(3, 3, 0, CellFlag::Proximity);
        assert!(!grid.is_blocking(3, 3, 0));
        grid.add_cell_flag(3, 3, 0, CellFlag::Filled);
        assert!(grid.is_blocking(3, 3, 0));
        assert!(grid.is_blocking(0, 0, 0));
    }

    #[test]
    fn test_index_is_layer_major_row_major() {
        let grid = Grid::new(4, 3, 2);
        assert_eq!(grid.index(0, 0, 0), Some(0));
        assert_eq!(grid.index(1, 0, 0), Some(1));
        assert_eq!(grid.index(0, 1, 0), Some(4));
        assert_eq!(grid.index(0, 0, 1), Some(12));
        assert_eq!(grid.index(3, 2, 1), Some(23));
        assert_eq!(grid.index(4, 0, 0), None);
    }

    #[test]
    fn test_flag_names() {
        assert_eq!(CellFlag::from_name("Filled"), Some(CellFlag::Filled));
        assert_eq!(CellFlag::from_name("border"), Some(CellFlag::Border));
        assert_eq!(CellFlag::from_name("empty"), None);
    }

    #[test]
    fn test_debug_lists_flags() {
        let cell = CellState::EMPTY.with(CellFlag::Filled).with(CellFlag::Border);
        assert_eq!(format!("{:?}", cell), "{Filled, Border}");
    }

    proptest! {
        #[test]
        fn prop_out_of_range_is_blocking_and_writes_ignored(
            x in prop_oneof![(-50i32..0), (12i32..60)],
            y in -50i32..60,
            layer in -5i32..10,
        ) {
            let mut grid = Grid::new(12, 10, 5);
            prop_assert!(grid.is_blocking(x, y, layer));
            grid.add_cell_flag(x, y, layer, CellFlag::Filled);
            grid.set_cell(x, y, layer, CellState::EMPTY);
            prop_assert!(grid.is_clean());
        }
    }
}
