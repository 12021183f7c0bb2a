//! Grid geometry and pixel/cell conversion
//!
//! The grid is wider and taller than the visible viewport so parallax
//! scrolling can reveal orbs near the edges. `ViewportCells` describes the
//! visible sub-window and carries the conversion factors every pass uses.

use serde::{Deserialize, Serialize};

use crate::consts::{MOBILE_BREAKPOINT_PX, MOBILE_CELL_SCALE};
use crate::settings::GridSettings;

/// Display size as reported by the host (CSS pixels)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayMetrics {
    pub width_px: f32,
    pub height_px: f32,
}

impl DisplayMetrics {
    pub fn new(width_px: f32, height_px: f32) -> Self {
        Self { width_px, height_px }
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width_px * self.height_px
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    Mobile,
    Desktop,
}

impl DeviceClass {
    pub fn of(display: &DisplayMetrics) -> Self {
        if display.width_px < MOBILE_BREAKPOINT_PX {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }
}

/// Visible window of the grid plus conversion factors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportCells {
    pub start_x: i32,
    pub end_x: i32,
    pub start_y: i32,
    pub end_y: i32,
    pub cell_size_px: f32,
    /// Precomputed 1 / cell_size_px
    pub inv_cell_size_px: f32,
    pub cell_size_world: f32,
}

impl ViewportCells {
    /// Pixel X to cell X: `floor(px * inv) + start_x`
    #[inline]
    pub fn px_to_cell_x(&self, px: f32) -> i32 {
        (px * self.inv_cell_size_px).floor() as i32 + self.start_x
    }

    /// Pixel Y to cell Y: `floor(px * inv) + start_y`
    #[inline]
    pub fn px_to_cell_y(&self, px: f32) -> i32 {
        (px * self.inv_cell_size_px).floor() as i32 + self.start_y
    }

    /// Continuous depth to the nearest layer
    #[inline]
    pub fn z_to_layer(&self, z: f32) -> i32 {
        z.round() as i32
    }

    /// Pixel X of a cell's center
    #[inline]
    pub fn cell_center_px_x(&self, cell_x: i32) -> f32 {
        ((cell_x - self.start_x) as f32 + 0.5) * self.cell_size_px
    }

    /// Pixel Y of a cell's center
    #[inline]
    pub fn cell_center_px_y(&self, cell_y: i32) -> f32 {
        ((cell_y - self.start_y) as f32 + 0.5) * self.cell_size_px
    }

    /// Pixels per layer when measuring 3D distance (a layer is one cell deep)
    #[inline]
    pub fn depth_scale(&self) -> f32 {
        self.cell_size_px
    }

    pub fn visible_cells_x(&self) -> i32 {
        self.end_x - self.start_x + 1
    }

    pub fn visible_cells_y(&self) -> i32 {
        self.end_y - self.start_y + 1
    }
}

/// Everything derived from one display size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub cells_x: u32,
    pub cells_y: u32,
    pub layers: u32,
    pub device_class: DeviceClass,
    pub px_per_world_unit: f32,
    pub viewport: ViewportCells,
}

/// Derive grid geometry from display metrics. Pure: equal inputs always give
/// equal geometry, so it can be recomputed on every resize.
pub fn derive_geometry(display: DisplayMetrics, settings: &GridSettings) -> GridGeometry {
    let device_class = DeviceClass::of(&display);
    let (cell_size_px, layers) = match device_class {
        DeviceClass::Desktop => (settings.cell_size_px, settings.layers),
        DeviceClass::Mobile => (
            settings.cell_size_px * MOBILE_CELL_SCALE,
            settings.mobile_layers,
        ),
    };
    let cell_size_px = cell_size_px.max(1.0);

    let width = display.width_px.max(1.0);
    let height = display.height_px.max(1.0);
    let visible_x = (width / cell_size_px).ceil().max(1.0) as i32;
    let visible_y = (height / cell_size_px).ceil().max(1.0) as i32;

    // Parallax margin plus one cell for the border ring
    let margin_x = (visible_x as f32 * settings.parallax_margin).ceil() as i32 + 1;
    let margin_y = (visible_y as f32 * settings.parallax_margin).ceil() as i32 + 1;

    let px_per_world_unit = height / settings.world_height_units;

    GridGeometry {
        cells_x: (visible_x + 2 * margin_x) as u32,
        cells_y: (visible_y + 2 * margin_y) as u32,
        layers: layers.max(1),
        device_class,
        px_per_world_unit,
        viewport: ViewportCells {
            start_x: margin_x,
            end_x: margin_x + visible_x - 1,
            start_y: margin_y,
            end_y: margin_y + visible_y - 1,
            cell_size_px,
            inv_cell_size_px: 1.0 / cell_size_px,
            cell_size_world: cell_size_px / px_per_world_unit,
        },
    }
}
