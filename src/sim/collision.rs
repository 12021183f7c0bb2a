//! Collision detection and response against the occupancy grid and between orbs
//!
//! Grid checks work on cells: an orb's body sphere is tested at each candidate
//! destination, one axis at a time, so an orb blocked on X still slides on Y.
//! Orb-orb response works in pixel space with depth scaled by the cell size.

use glam::Vec3;
use rand::Rng;

use super::coords::ViewportCells;
use super::grid::{CellFlag, Grid};
use super::orb::{BlockedAxes, Orb, cell_of};
use crate::consts::{
    SEPARATION_MAX_MULT, SEPARATION_MIN_MULT, STUCK_SEPARATION_SPEED, UNSTICK_SEARCH_RADIUS,
};
use crate::random_unit_vector;

/// Result of a grid move check
#[derive(Debug, Clone, Copy)]
pub struct MoveCheck {
    /// Tentative position after a full Euler step
    pub next: Vec3,
    /// Axes whose single-axis destination is blocked
    pub blocked: BlockedAxes,
    /// Every axis was free alone but the combined destination was not
    pub corner: bool,
}

/// Outcome of resolving one orb pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    /// Spheres do not overlap
    Apart,
    /// Overlapping and approaching: elastic impulse applied
    Bounced,
    /// Overlapping but not approaching: separation impulse injected
    Unstuck,
    /// Result was not finite; left for the next frame
    Skipped,
}

/// Whether any cell of a body sphere centered on a cell satisfies `test`
fn body_any<F>(grid: &Grid, (cx, cy, cl): (i32, i32, i32), radius: i32, test: F) -> bool
where
    F: Fn(&Grid, i32, i32, i32) -> bool,
{
    if radius <= 0 {
        return test(grid, cx, cy, cl);
    }
    let r_sq = radius * radius;
    for dl in -radius..=radius {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy + dl * dl <= r_sq && test(grid, cx + dx, cy + dy, cl + dl) {
                    return true;
                }
            }
        }
    }
    false
}

#[inline]
fn body_blocked(grid: &Grid, center: (i32, i32, i32), radius: i32) -> bool {
    body_any(grid, center, radius, |g, x, y, l| g.is_blocking(x, y, l))
}

/// Test the orb's next step against the grid, each axis independently
///
/// A candidate that stays in the current cell on its axis is never blocked.
/// When only the combined diagonal destination is blocked, every axis that
/// changes cell is reported blocked (a corner hit).
pub fn check_move(orb: &Orb, dt: f32, grid: &Grid, viewport: &ViewportCells) -> MoveCheck {
    let next = orb.pos + orb.vel * dt;
    let (cx, cy, cl) = orb.cell(viewport);
    let (nx, ny, nl) = cell_of(next, viewport);
    let r = orb.body_radius();

    let mut blocked = BlockedAxes {
        x: nx != cx && body_blocked(grid, (nx, cy, cl), r),
        y: ny != cy && body_blocked(grid, (cx, ny, cl), r),
        z: nl != cl && body_blocked(grid, (cx, cy, nl), r),
    };

    let changed = [nx != cx, ny != cy, nl != cl];
    let mut corner = false;
    if !blocked.any()
        && changed.iter().filter(|c| **c).count() > 1
        && body_blocked(grid, (nx, ny, nl), r)
    {
        corner = true;
        blocked = BlockedAxes {
            x: changed[0],
            y: changed[1],
            z: changed[2],
        };
    }

    MoveCheck {
        next,
        blocked,
        corner,
    }
}

/// Reflect velocity on every blocked axis
pub fn apply_reflection(orb: &mut Orb, check: &MoveCheck) {
    if !check.blocked.any() {
        return;
    }
    if check.blocked.x {
        orb.vel.x = -orb.vel.x;
    }
    if check.blocked.y {
        orb.vel.y = -orb.vel.y;
    }
    if check.blocked.z {
        orb.vel.z = -orb.vel.z;
    }
    orb.sync_heading();
}

/// Whether an orb of `size` may appear at `pos`: no body cell is FILLED or BORDER
pub fn can_spawn(pos: Vec3, size: u32, grid: &Grid, viewport: &ViewportCells) -> bool {
    let radius = size.max(1) as i32 - 1;
    !body_blocked(grid, cell_of(pos, viewport), radius)
}

/// Resolve one pair of orbs in place
///
/// Overlapping spheres are pushed apart by the overlap times a multiplier
/// growing from 1.2 to 2.0 with depth, split by inverse mass. Approaching
/// pairs get an elastic impulse; pairs that overlap without approaching get a
/// small separation impulse so they cannot stay stuck.
pub fn resolve_pair<R: Rng + ?Sized>(
    a: &mut Orb,
    b: &mut Orb,
    viewport: &ViewportCells,
    elasticity: f32,
    rng: &mut R,
) -> PairOutcome {
    let ds = viewport.depth_scale();
    let pa = a.px_position(ds);
    let pb = b.px_position(ds);
    let delta = pb - pa;
    let dist = delta.length();
    let min_dist = a.radius_px(viewport) + b.radius_px(viewport);
    if dist >= min_dist {
        return PairOutcome::Apart;
    }

    // Contact normal, random when the centers coincide
    let normal = if dist > 1e-6 {
        delta / dist
    } else {
        random_unit_vector(rng)
    };

    let (ma, mb) = (a.mass(), b.mass());
    let total = ma + mb;
    let (share_a, share_b) = (mb / total, ma / total);

    // Push apart; the lighter orb moves further
    let overlap = min_dist - dist;
    let ratio = (overlap / min_dist).clamp(0.0, 1.0);
    let separation = overlap * (SEPARATION_MIN_MULT + (SEPARATION_MAX_MULT - SEPARATION_MIN_MULT) * ratio);
    let new_pa = pa - normal * separation * share_a;
    let new_pb = pb + normal * separation * share_b;

    let va = a.px_velocity(ds);
    let vb = b.px_velocity(ds);
    let approach = (va - vb).dot(normal);

    let (new_va, new_vb, outcome) = if approach > 0.0 {
        // Elastic impulse along the normal
        let j = 2.0 * elasticity * approach;
        (
            va - normal * (j * share_a),
            vb + normal * (j * share_b),
            PairOutcome::Bounced,
        )
    } else {
        // Overlapping but not approaching: nudge apart
        let push = STUCK_SEPARATION_SPEED * ratio;
        (
            va - normal * (push * share_a),
            vb + normal * (push * share_b),
            PairOutcome::Unstuck,
        )
    };

    // Leave both orbs untouched on non-finite results
    if !(new_pa.is_finite() && new_pb.is_finite() && new_va.is_finite() && new_vb.is_finite()) {
        return PairOutcome::Skipped;
    }

    a.pos = Vec3::new(new_pa.x, new_pa.y, new_pa.z / ds);
    b.pos = Vec3::new(new_pb.x, new_pb.y, new_pb.z / ds);
    a.set_px_velocity(new_va, ds);
    b.set_px_velocity(new_vb, ds);
    outcome
}

/// Counts from one resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub bounces: usize,
    pub separations: usize,
    pub skipped: usize,
}

impl ResolutionStats {
    /// Whether any orb was displaced
    pub fn moved_any(&self) -> bool {
        self.bounces + self.separations > 0
    }
}

/// O(n²) elastic resolution over every orb pair
pub fn resolve_orb_orb_collisions<R: Rng + ?Sized>(
    orbs: &mut [Orb],
    viewport: &ViewportCells,
    elasticity: f32,
    rng: &mut R,
) -> ResolutionStats {
    let mut stats = ResolutionStats::default();
    for j in 1..orbs.len() {
        let (head, tail) = orbs.split_at_mut(j);
        let b = &mut tail[0];
        for a in head.iter_mut() {
            match resolve_pair(a, b, viewport, elasticity, rng) {
                PairOutcome::Apart => {}
                PairOutcome::Bounced => stats.bounces += 1,
                PairOutcome::Unstuck => stats.separations += 1,
                PairOutcome::Skipped => stats.skipped += 1,
            }
        }
    }
    stats
}

/// Gradual repulsion between orbs inside each other's avoidance reach
///
/// Acceleration falls off linearly to zero at the edge of the reach and is
/// integrated over `dt`, split by inverse mass.
pub fn apply_soft_avoidance(orbs: &mut [Orb], viewport: &ViewportCells, strength: f32, dt: f32) {
    if strength <= 0.0 {
        return;
    }
    let ds = viewport.depth_scale();
    let cs = viewport.cell_size_px;

    for j in 1..orbs.len() {
        let (head, tail) = orbs.split_at_mut(j);
        let b = &mut tail[0];
        for a in head.iter_mut() {
            let reach = (a.avoidance_radius() + b.avoidance_radius()) as f32 * 0.5 * cs;
            let delta = b.px_position(ds) - a.px_position(ds);
            let dist = delta.length();
            if dist >= reach || dist <= 1e-6 {
                continue;
            }

            let normal = delta / dist;
            let accel = strength * (1.0 - dist / reach);
            let total = a.mass() + b.mass();
            let new_va = a.px_velocity(ds) - normal * (accel * dt * b.mass() / total);
            let new_vb = b.px_velocity(ds) + normal * (accel * dt * a.mass() / total);
            if new_va.is_finite() && new_vb.is_finite() {
                a.set_px_velocity(new_va, ds);
                b.set_px_velocity(new_vb, ds);
            }
        }
    }
}

/// Whether the orb's body overlaps the border or leaves the grid
pub fn is_embedded(orb: &Orb, grid: &Grid, viewport: &ViewportCells) -> bool {
    body_any(grid, orb.cell(viewport), orb.body_radius(), |g, x, y, l| {
        g.get_cell(x, y, l).has(CellFlag::Border)
    })
}

/// Nudge an orb out of the border
///
/// Depth is clamped into range first, then rings around the orb are searched
/// (nearest first) for a placement where the whole body is free. If nothing
/// is found the orb is snapped inside the visible area. Returns whether the
/// orb was moved.
pub fn unstick(orb: &mut Orb, grid: &Grid, viewport: &ViewportCells) -> bool {
    if !is_embedded(orb, grid, viewport) {
        return false;
    }

    let (_, _, layers) = grid.dimensions();
    let max_layer = (layers as f32 - 1.0).max(0.0);
    if orb.pos.z < 0.0 || orb.pos.z > max_layer {
        orb.pos.z = orb.pos.z.clamp(0.0, max_layer);
        orb.depth_layer = orb.depth_layer.clamp(0.0, max_layer);
        if !is_embedded(orb, grid, viewport) {
            return true;
        }
    }

    let (cx, cy, cl) = orb.cell(viewport);
    let r = orb.body_radius();
    let cs = viewport.cell_size_px;
    for ring in 1..=UNSTICK_SEARCH_RADIUS {
        let mut offsets: Vec<(i32, i32)> = (-ring..=ring)
            .flat_map(|dy| (-ring..=ring).map(move |dx| (dx, dy)))
            .filter(|(dx, dy)| dx.abs().max(dy.abs()) == ring)
            .collect();
        offsets.sort_by_key(|(dx, dy)| dx * dx + dy * dy);

        if let Some((dx, dy)) = offsets
            .into_iter()
            .find(|(dx, dy)| !body_blocked(grid, (cx + dx, cy + dy, cl), r))
        {
            orb.pos.x += dx as f32 * cs;
            orb.pos.y += dy as f32 * cs;
            return true;
        }
    }

    let inset = (r as f32 + 1.5) * cs;
    let width = viewport.visible_cells_x() as f32 * cs;
    let height = viewport.visible_cells_y() as f32 * cs;
    orb.pos.x = orb.pos.x.clamp(inset, (width - inset).max(inset));
    orb.pos.y = orb.pos.y.clamp(inset, (height - inset).max(inset));
    true
}
