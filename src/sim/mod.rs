//! Deterministic simulation module
//!
//! All orb physics and lifecycle logic lives here. This module must be pure
//! and deterministic:
//! - Seeded RNG only
//! - Stable iteration order (spawn order)
//! - No rendering or platform dependencies

pub mod collision;
pub mod coords;
pub mod grid;
pub mod lifecycle;
pub mod orb;
pub mod phases;
pub mod state;
pub mod tick;

pub use collision::{MoveCheck, PairOutcome, apply_reflection, can_spawn, check_move};
pub use coords::{DeviceClass, DisplayMetrics, GridGeometry, ViewportCells, derive_geometry};
pub use grid::{CellFlag, CellState, Grid};
pub use lifecycle::{SpawnRequest, continuous_spawn_target};
pub use orb::{BlockedAxes, Orb, OrbId, SpeedLimits};
pub use state::{BurstState, OrbSet, OrbSnapshot, SimState, World};
pub use tick::{FrameEffects, TickInput, tick};
