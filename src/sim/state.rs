//! Simulation state and host entry points
//!
//! Owns the live orb set, the grid and viewport (absent until the host first
//! reports a display size), the seeded RNG and the simulation clock.

use glam::Vec3;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::coords::{DisplayMetrics, GridGeometry, ViewportCells, derive_geometry};
use super::grid::{CellState, Grid};
use super::lifecycle;
use super::orb::{Orb, OrbId};
use crate::settings::SimulationConfig;

/// Live orbs plus id allocation and selection
#[derive(Debug, Clone, Default)]
pub struct OrbSet {
    orbs: Vec<Orb>,
    next_id: u64,
    selected: Option<OrbId>,
}

impl OrbSet {
    pub fn new() -> Self {
        Self {
            orbs: Vec::new(),
            next_id: 1,
            selected: None,
        }
    }

    /// Allocate a new orb id
    pub fn next_orb_id(&mut self) -> OrbId {
        let id = OrbId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        id
    }

    pub fn len(&self) -> usize {
        self.orbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orbs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Orb> {
        self.orbs.iter()
    }

    pub fn as_slice(&self) -> &[Orb] {
        &self.orbs
    }

    pub fn as_mut_slice(&mut self) -> &mut [Orb] {
        &mut self.orbs
    }

    pub fn get(&self, id: OrbId) -> Option<&Orb> {
        self.orbs.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: OrbId) -> Option<&mut Orb> {
        self.orbs.iter_mut().find(|o| o.id == id)
    }

    pub fn push(&mut self, orb: Orb) {
        self.orbs.push(orb);
    }

    /// Remove an orb from the live set, dropping its selection
    pub fn remove(&mut self, id: OrbId) -> Option<Orb> {
        let index = self.orbs.iter().position(|o| o.id == id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.orbs.remove(index))
    }

    pub fn selected(&self) -> Option<OrbId> {
        self.selected
    }

    /// Select an orb; returns false if it does not exist
    pub fn select(&mut self, id: OrbId) -> bool {
        if self.get(id).is_some() {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }
}

/// Grid plus the geometry it was built from
#[derive(Debug, Clone)]
pub struct World {
    pub grid: Grid,
    pub geometry: GridGeometry,
    pub display: DisplayMetrics,
}

impl World {
    #[inline]
    pub fn viewport(&self) -> &ViewportCells {
        &self.geometry.viewport
    }
}

/// One-time entry burst progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BurstState {
    /// No burst requested
    Idle,
    /// Requested; fires on the first frame with a grid
    Pending,
    /// Fired at the given simulation time
    Fired { at_ms: f64 },
}

impl BurstState {
    /// Pending, or fired less than `settle_ms` ago
    pub fn is_settling(&self, now_ms: f64, settle_ms: f64) -> bool {
        match *self {
            BurstState::Idle => false,
            BurstState::Pending => true,
            BurstState::Fired { at_ms } => now_ms - at_ms < settle_ms,
        }
    }
}

/// Per-orb view handed to the renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbSnapshot {
    pub id: OrbId,
    pub pos: [f32; 3],
    pub vel: [f32; 3],
    pub size: u32,
    pub opacity: f32,
    pub selected: bool,
}

/// Complete simulation state
#[derive(Debug, Clone)]
pub struct SimState {
    pub orbs: OrbSet,
    /// None until the host reports a display size
    pub world: Option<World>,
    pub rng: Pcg32,
    /// Simulation time; stands still while physics is paused
    pub clock_ms: f64,
    pub frame: u64,
    pub burst: BurstState,
    /// Fractional continuous-spawn allowance carried between frames
    pub spawn_budget: f32,
}

impl SimState {
    pub fn new(seed: u64) -> Self {
        Self {
            orbs: OrbSet::new(),
            world: None,
            rng: Pcg32::seed_from_u64(seed),
            clock_ms: 0.0,
            frame: 0,
            burst: BurstState::Idle,
            spawn_budget: 0.0,
        }
    }

    /// Rebuild the grid if the display maps to a different geometry.
    /// Returns whether a rebuild happened.
    pub fn resize(&mut self, display: DisplayMetrics, config: &SimulationConfig) -> bool {
        let geometry = derive_geometry(display, &config.grid);
        if let Some(world) = &mut self.world {
            if world.geometry == geometry {
                world.display = display;
                return false;
            }
        }

        log::info!(
            "Rebuilding grid for {}x{} ({:?}): {}x{}x{} cells",
            display.width_px,
            display.height_px,
            geometry.device_class,
            geometry.cells_x,
            geometry.cells_y,
            geometry.layers
        );
        self.world = Some(World {
            grid: Grid::new(geometry.cells_x, geometry.cells_y, geometry.layers),
            geometry,
            display,
        });
        true
    }

    /// Ask for the one-time entry burst. Ignored once it has fired.
    pub fn request_burst(&mut self) {
        if self.burst == BurstState::Idle {
            self.burst = BurstState::Pending;
        }
    }

    /// Whether continuous spawning should hold off for the burst
    pub fn burst_settling(&self, config: &SimulationConfig) -> bool {
        self.burst
            .is_settling(self.clock_ms, config.spawn.burst_settle_ms)
    }

    pub fn viewport(&self) -> Option<&ViewportCells> {
        self.world.as_ref().map(|w| w.viewport())
    }

    /// Debug overlay query; None before the first resize
    pub fn cell(&self, x: i32, y: i32, layer: i32) -> Option<CellState> {
        self.world.as_ref().map(|w| w.grid.get_cell(x, y, layer))
    }

    /// Render view of every live orb
    pub fn snapshot(&self) -> Vec<OrbSnapshot> {
        let selected = self.orbs.selected();
        self.orbs
            .iter()
            .map(|o| OrbSnapshot {
                id: o.id,
                pos: o.pos.to_array(),
                vel: o.vel.to_array(),
                size: o.size,
                opacity: o.opacity(self.clock_ms),
                selected: selected == Some(o.id),
            })
            .collect()
    }

    /// Spawn an orb at a simulation-space position with a random heading
    pub fn spawn_orb(&mut self, pos: Vec3, size: u32, config: &SimulationConfig) -> Option<OrbId> {
        let world = self.world.as_mut()?;
        let viewport = world.geometry.viewport;
        lifecycle::spawn_orb(
            &mut self.orbs,
            &mut world.grid,
            &viewport,
            &mut self.rng,
            &config.spawn,
            lifecycle::SpawnRequest::at(pos, size),
            self.clock_ms,
        )
    }

    /// Delete an orb. Animated deletion lets it fade out and expire instead.
    pub fn delete_orb(&mut self, id: OrbId, animate: bool) -> bool {
        if animate {
            return lifecycle::retire_orb(&mut self.orbs, id, self.clock_ms);
        }
        match self.world.as_mut() {
            Some(world) => {
                let viewport = world.geometry.viewport;
                lifecycle::delete_orb(&mut self.orbs, &mut world.grid, &viewport, id)
            }
            None => self.orbs.remove(id).is_some(),
        }
    }

    pub fn select_orb(&mut self, id: OrbId) -> bool {
        self.orbs.select(id)
    }

    /// Orb nearest to a simulation-space point within `radius_px`
    pub fn orb_at(&self, point: glam::Vec2, radius_px: f32) -> Option<OrbId> {
        self.orbs
            .iter()
            .map(|o| (o.id, o.pos.truncate().distance(point)))
            .filter(|(_, d)| *d <= radius_px)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}
