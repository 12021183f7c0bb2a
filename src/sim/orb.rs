//! Orb entity and per-orb physics
//!
//! Positions are pixels on X/Y and continuous layer units on Z. An orb of
//! size `s` is a sphere of radius `s - 1` cells wrapped in an avoidance shell
//! of radius `floor(sqrt(s) + s)` cells.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::coords::ViewportCells;
use super::grid::{CellFlag, Grid};
use crate::frame_blend;

/// Stable orb identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrbId(pub u64);

impl fmt::Display for OrbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "orb-{}", self.0)
    }
}

/// Axes a move was blocked on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockedAxes {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl BlockedAxes {
    pub const NONE: BlockedAxes = BlockedAxes {
        x: false,
        y: false,
        z: false,
    };

    pub fn any(&self) -> bool {
        self.x || self.y || self.z
    }
}

/// Size-dependent speed limits
#[derive(Debug, Clone, Copy)]
pub struct SpeedLimits {
    pub base_max_speed: f32,
    pub min_max_speed: f32,
    pub soft_limit_ratio: f32,
    pub deceleration_rate: f32,
}

impl SpeedLimits {
    /// Hard cap: `max(min_max_speed, base_max_speed / sqrt(size))`
    #[inline]
    pub fn cap_for(&self, size: u32) -> f32 {
        self.min_max_speed
            .max(self.base_max_speed / (size.max(1) as f32).sqrt())
    }
}

/// A single simulated orb
#[derive(Debug, Clone)]
pub struct Orb {
    pub id: OrbId,
    pub pos: Vec3,
    pub vel: Vec3,
    /// XY-plane speed, kept in sync with `vel`
    pub speed: f32,
    /// XY-plane heading in radians, kept in sync with `vel`
    pub angle: f32,
    pub size: u32,
    /// Layer the orb drifts back toward
    pub depth_layer: f32,
    pub created_at_ms: f64,
    pub lifetime_ms: f64,
    pub spawn_anim_ms: f64,
    pub despawn_anim_ms: f64,
}

impl Orb {
    pub fn new(id: OrbId, pos: Vec3, vel: Vec3, size: u32, created_at_ms: f64) -> Self {
        let mut orb = Self {
            id,
            pos,
            vel,
            speed: 0.0,
            angle: 0.0,
            size: size.max(1),
            depth_layer: pos.z.round(),
            created_at_ms,
            lifetime_ms: f64::INFINITY,
            spawn_anim_ms: 0.0,
            despawn_anim_ms: 0.0,
        };
        orb.sync_heading();
        orb
    }

    /// Body radius in cells
    #[inline]
    pub fn body_radius(&self) -> i32 {
        self.size as i32 - 1
    }

    /// Avoidance shell radius in cells: `floor(sqrt(size) + (size - 1) + 1)`
    #[inline]
    pub fn avoidance_radius(&self) -> i32 {
        avoidance_radius_for(self.size)
    }

    /// Collision radius in pixels (a size-1 orb fills half a cell around its center)
    #[inline]
    pub fn radius_px(&self, viewport: &ViewportCells) -> f32 {
        (self.body_radius() as f32).max(0.5) * viewport.cell_size_px
    }

    /// Mass for collision response
    #[inline]
    pub fn mass(&self) -> f32 {
        self.size as f32
    }

    /// Cell containing the orb's center
    #[inline]
    pub fn cell(&self, viewport: &ViewportCells) -> (i32, i32, i32) {
        cell_of(self.pos, viewport)
    }

    /// Position in pixel space with depth scaled to pixels
    #[inline]
    pub fn px_position(&self, depth_scale: f32) -> Vec3 {
        Vec3::new(self.pos.x, self.pos.y, self.pos.z * depth_scale)
    }

    /// Velocity in pixel space with depth scaled to pixels
    #[inline]
    pub fn px_velocity(&self, depth_scale: f32) -> Vec3 {
        Vec3::new(self.vel.x, self.vel.y, self.vel.z * depth_scale)
    }

    /// Set velocity from a pixel-space vector
    #[inline]
    pub fn set_px_velocity(&mut self, v: Vec3, depth_scale: f32) {
        self.vel = Vec3::new(v.x, v.y, v.z / depth_scale);
        self.sync_heading();
    }

    /// Recompute `speed`/`angle` after `vel` was written directly
    #[inline]
    pub fn sync_heading(&mut self) {
        self.speed = self.vel.truncate().length();
        self.angle = self.vel.y.atan2(self.vel.x);
    }

    /// Rewrite the XY velocity from a speed and heading
    #[inline]
    pub fn set_heading(&mut self, speed: f32, angle: f32) {
        self.speed = speed;
        self.angle = angle;
        self.vel.x = speed * angle.cos();
        self.vel.y = speed * angle.sin();
    }

    /// Euler step `pos += vel * dt` on every axis that is not blocked
    pub fn update_position(&mut self, dt: f32, blocked: BlockedAxes) {
        if !blocked.x {
            self.pos.x += self.vel.x * dt;
        }
        if !blocked.y {
            self.pos.y += self.vel.y * dt;
        }
        if !blocked.z {
            self.pos.z += self.vel.z * dt;
        }
    }

    /// Ease speeds above the soft limit back down and never exceed the cap
    ///
    /// Speed is measured in pixel space, depth scaled by `depth_scale`.
    /// Excess over `cap * soft_limit_ratio` decays by
    /// `1 - (1 - deceleration_rate)^(dt * 60)` each frame, so the feel does not
    /// change with frame rate. With a ratio of 1 speeds at or under the cap are
    /// left alone.
    pub fn apply_speed_limit(&mut self, dt: f32, limits: &SpeedLimits, depth_scale: f32) {
        let cap = limits.cap_for(self.size);
        let soft = cap * limits.soft_limit_ratio;
        let v = self.px_velocity(depth_scale);
        let speed = v.length();
        if speed <= soft || speed == 0.0 {
            return;
        }

        let factor = frame_blend(limits.deceleration_rate, dt);
        let target = (speed - (speed - soft) * factor).min(cap);
        let scaled = v * (target / speed);
        if scaled.is_finite() {
            self.set_px_velocity(scaled, depth_scale);
        }
    }

    /// Stamp the orb's footprint: FILLED body, PROXIMITY shell
    pub fn mark_orb_circular(&self, grid: &mut Grid, viewport: &ViewportCells) {
        self.for_each_footprint_cell(viewport, |x, y, layer, flag| {
            grid.add_cell_flag(x, y, layer, flag);
        });
    }

    /// Remove exactly the flags `mark_orb_circular` adds
    pub fn clear_orb_circular(&self, grid: &mut Grid, viewport: &ViewportCells) {
        self.for_each_footprint_cell(viewport, |x, y, layer, flag| {
            grid.remove_cell_flag(x, y, layer, flag);
        });
    }

    fn for_each_footprint_cell<F>(&self, viewport: &ViewportCells, mut f: F)
    where
        F: FnMut(i32, i32, i32, CellFlag),
    {
        let (cx, cy, cl) = self.cell(viewport);
        if self.size == 1 {
            f(cx, cy, cl, CellFlag::Filled);
            return;
        }

        let r = self.body_radius();
        let a = self.avoidance_radius();
        let (r_sq, a_sq) = (r * r, a * a);
        for dl in -a..=a {
            for dy in -a..=a {
                for dx in -a..=a {
                    let dist_sq = dx * dx + dy * dy + dl * dl;
                    if dist_sq <= r_sq {
                        f(cx + dx, cy + dy, cl + dl, CellFlag::Filled);
                    } else if dist_sq <= a_sq {
                        f(cx + dx, cy + dy, cl + dl, CellFlag::Proximity);
                    }
                }
            }
        }
    }

    /// Whether the orb has outlived its lifetime
    #[inline]
    pub fn is_expired(&self, now_ms: f64) -> bool {
        now_ms - self.created_at_ms > self.lifetime_ms
    }

    /// Fade for the renderer: ramps in after spawn, out before expiry
    pub fn opacity(&self, now_ms: f64) -> f32 {
        let age = (now_ms - self.created_at_ms).max(0.0);
        let fade_in = if self.spawn_anim_ms > 0.0 {
            (age / self.spawn_anim_ms).min(1.0)
        } else {
            1.0
        };
        let remaining = self.lifetime_ms - age;
        let fade_out = if self.despawn_anim_ms > 0.0 && remaining.is_finite() {
            (remaining / self.despawn_anim_ms).clamp(0.0, 1.0)
        } else {
            1.0
        };
        (fade_in * fade_out) as f32
    }
}

#[inline]
pub fn avoidance_radius_for(size: u32) -> i32 {
    let size = size.max(1) as f32;
    (size.sqrt() + (size - 1.0) + 1.0).floor() as i32
}

/// Cell containing a continuous position
#[inline]
pub fn cell_of(pos: Vec3, viewport: &ViewportCells) -> (i32, i32, i32) {
    (
        viewport.px_to_cell_x(pos.x),
        viewport.px_to_cell_y(pos.y),
        viewport.z_to_layer(pos.z),
    )
}
