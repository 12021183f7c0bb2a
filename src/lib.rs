//! Orb Field - depth-layered particle simulation for animated backgrounds
//!
//! Core modules:
//! - `sim`: Grid occupancy, orb physics, collision and the per-frame pipeline
//! - `settings`: Explicit simulation configuration (toggles + tuning)
//! - `platform`: Browser bindings for a requestAnimationFrame host

pub mod platform;
pub mod settings;
pub mod sim;

pub use settings::{ConfigError, DensityPreset, SimulationConfig};

use glam::Vec3;
use rand::Rng;

/// Simulation constants
pub mod consts {
    /// Reference display area the density presets are calibrated against (4K)
    pub const REFERENCE_SCREEN_AREA: f32 = 3840.0 * 2160.0;

    /// Width below which a display is treated as mobile
    pub const MOBILE_BREAKPOINT_PX: f32 = 768.0;
    /// Mobile cells are larger so the grid stays small
    pub const MOBILE_CELL_SCALE: f32 = 1.5;

    /// Minimum separation multiplier for overlapping orbs
    pub const SEPARATION_MIN_MULT: f32 = 1.2;
    /// Separation multiplier at full overlap
    pub const SEPARATION_MAX_MULT: f32 = 2.0;
    /// Separation impulse for overlapping orbs that are not approaching (px/s)
    pub const STUCK_SEPARATION_SPEED: f32 = 20.0;

    /// Furthest ring (in cells) searched when nudging an embedded orb free
    pub const UNSTICK_SEARCH_RADIUS: i32 = 4;

    /// Frame rate the per-frame damping constants are tuned for
    pub const REFERENCE_FPS: f32 = 60.0;
    /// Largest frame delta the pipeline will integrate (tab switches etc.)
    pub const MAX_FRAME_DT: f32 = 0.1;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Frame-rate independent blend factor for a per-frame rate tuned at 60 FPS
///
/// `1 - (1 - rate)^(dt * 60)`: applying the factor once per frame gives the
/// same decay per second whatever the frame rate.
#[inline]
pub fn frame_blend(rate: f32, dt: f32) -> f32 {
    1.0 - (1.0 - rate.clamp(0.0, 1.0)).powf(dt * consts::REFERENCE_FPS)
}

/// Uniformly distributed direction on the unit sphere
pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let z: f32 = rng.random_range(-1.0..=1.0);
    let theta: f32 = rng.random_range(0.0..std::f32::consts::TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * theta.cos(), r * theta.sin(), z)
}
