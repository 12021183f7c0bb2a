//! Per-frame physics passes
//!
//! Each pass walks the orb slice once (pairwise passes walk it quadratically).
//! `tick` runs them in a fixed order; they are public so hosts and tests can
//! drive single passes.

use glam::Vec2;
use rand::Rng;

use super::collision::{
    ResolutionStats, apply_reflection, apply_soft_avoidance, check_move,
    resolve_orb_orb_collisions, unstick,
};
use super::coords::ViewportCells;
use super::grid::Grid;
use super::orb::{Orb, SpeedLimits};
use crate::settings::PhysicsTuning;
use crate::{frame_blend, normalize_angle};

/// Reset dynamic occupancy and stamp every orb's footprint
pub fn mark_all(orbs: &[Orb], grid: &mut Grid, viewport: &ViewportCells) {
    grid.clear_dynamic();
    for orb in orbs {
        orb.mark_orb_circular(grid, viewport);
    }
}

/// Push orbs away from the pointer (simulation space)
pub fn apply_pointer_repulsion(orbs: &mut [Orb], pointer: Vec2, tuning: &PhysicsTuning, dt: f32) {
    let radius = tuning.mouse_radius_px;
    for orb in orbs.iter_mut() {
        let away = orb.pos.truncate() - pointer;
        let dist = away.length();
        if dist >= radius || dist < 1e-3 {
            continue;
        }
        let force = tuning.mouse_strength * (1.0 - dist / radius);
        let dv = away / dist * force * dt;
        orb.vel.x += dv.x;
        orb.vel.y += dv.y;
        orb.sync_heading();
    }
}

pub fn apply_speed_limits(
    orbs: &mut [Orb],
    viewport: &ViewportCells,
    tuning: &PhysicsTuning,
    dt: f32,
) {
    let limits = SpeedLimits {
        base_max_speed: tuning.base_max_speed,
        min_max_speed: tuning.min_max_speed,
        soft_limit_ratio: tuning.soft_limit_ratio,
        deceleration_rate: tuning.deceleration_rate,
    };
    let ds = viewport.depth_scale();
    for orb in orbs.iter_mut() {
        orb.apply_speed_limit(dt, &limits, ds);
    }
}

/// Random heading drift; speed is preserved
pub fn apply_wander<R: Rng + ?Sized>(orbs: &mut [Orb], strength: f32, dt: f32, rng: &mut R) {
    if strength <= 0.0 {
        return;
    }
    for orb in orbs.iter_mut() {
        let turn = rng.random_range(-1.0f32..=1.0) * strength * dt;
        orb.set_heading(orb.speed, normalize_angle(orb.angle + turn));
    }
}

/// Spring each orb toward its depth layer with frame-rate-independent damping
pub fn apply_depth_attraction(orbs: &mut [Orb], tuning: &PhysicsTuning, dt: f32) {
    let keep = 1.0 - frame_blend(tuning.depth_damping, dt);
    for orb in orbs.iter_mut() {
        orb.vel.z += (orb.depth_layer - orb.pos.z) * tuning.depth_attraction * dt;
        orb.vel.z *= keep;
    }
}

/// Soft avoidance then hard resolution, each behind its toggle
///
/// Resolution moves orbs, so occupancy is restamped afterwards when anything
/// moved; the wall pass must clear each orb exactly where it was marked.
#[allow(clippy::too_many_arguments)]
pub fn apply_orb_interactions<R: Rng + ?Sized>(
    orbs: &mut [Orb],
    grid: &mut Grid,
    viewport: &ViewportCells,
    tuning: &PhysicsTuning,
    avoidance: bool,
    collisions: bool,
    dt: f32,
    rng: &mut R,
) -> ResolutionStats {
    if avoidance {
        apply_soft_avoidance(orbs, viewport, tuning.avoidance_strength, dt);
    }
    if !collisions {
        return ResolutionStats::default();
    }
    let stats = resolve_orb_orb_collisions(orbs, viewport, tuning.elasticity, rng);
    if stats.moved_any() {
        mark_all(orbs, grid, viewport);
    }
    if stats.skipped > 0 {
        log::debug!("Skipped {} non-finite collision results", stats.skipped);
    }
    stats
}

/// Move every orb against the grid; returns how many were unstuck
pub fn resolve_wall_collisions(
    orbs: &mut [Orb],
    grid: &mut Grid,
    viewport: &ViewportCells,
    dt: f32,
) -> usize {
    let mut unstuck = 0;
    for orb in orbs.iter_mut() {
        orb.clear_orb_circular(grid, viewport);
        if unstick(orb, grid, viewport) {
            unstuck += 1;
        } else {
            let check = check_move(orb, dt, grid, viewport);
            apply_reflection(orb, &check);
            orb.update_position(dt, check.blocked);
        }
        orb.mark_orb_circular(grid, viewport);
    }
    unstuck
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GridSettings;
    use crate::sim::coords::{DisplayMetrics, derive_geometry};
    use crate::sim::grid::CellFlag;
    use crate::sim::orb::OrbId;
    use glam::Vec3;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn setup() -> (Grid, ViewportCells) {
        let geo = derive_geometry(DisplayMetrics::new(800.0, 600.0), &GridSettings::default());
        (Grid::new(geo.cells_x, geo.cells_y, geo.layers), geo.viewport)
    }

    fn orb(id: u64, pos: Vec3, vel: Vec3, size: u32) -> Orb {
        Orb::new(OrbId(id), pos, vel, size, 0.0)
    }

    #[test]
    fn test_mark_all_replaces_previous_marks() {
        let (mut grid, vp) = setup();
        let mut orbs = vec![orb(1, Vec3::new(100.0, 100.0, 4.0), Vec3::ZERO, 1)];
        mark_all(&orbs, &mut grid, &vp);
        let old = orbs[0].cell(&vp);

        orbs[0].pos.x += 80.0;
        mark_all(&orbs, &mut grid, &vp);
        assert!(grid.get_cell(old.0, old.1, old.2).is_empty());
        let new = orbs[0].cell(&vp);
        assert!(grid.get_cell(new.0, new.1, new.2).has(CellFlag::Filled));
        assert_eq!(grid.count_with(CellFlag::Filled), 1);
    }

    #[test]
    fn test_pointer_pushes_away_within_radius() {
        let tuning = PhysicsTuning::default();
        let mut orbs = vec![
            orb(1, Vec3::new(120.0, 100.0, 0.0), Vec3::ZERO, 1),
            orb(2, Vec3::new(700.0, 100.0, 0.0), Vec3::ZERO, 1),
        ];
        apply_pointer_repulsion(&mut orbs, Vec2::new(100.0, 100.0), &tuning, 1.0 / 60.0);
        assert!(orbs[0].vel.x > 0.0);
        assert!(orbs[0].vel.y.abs() < 1e-5);
        assert_eq!(orbs[1].vel, Vec3::ZERO);
    }

    #[test]
    fn test_wander_keeps_speed() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut orbs = vec![orb(1, Vec3::ZERO, Vec3::new(30.0, 40.0, 0.0), 1)];
        for _ in 0..100 {
            apply_wander(&mut orbs, 2.0, 1.0 / 60.0, &mut rng);
        }
        assert!((orbs[0].vel.truncate().length() - 50.0).abs() < 1e-2);

        let before = orbs[0].vel;
        apply_wander(&mut orbs, 0.0, 1.0 / 60.0, &mut rng);
        assert_eq!(orbs[0].vel, before);
    }

    #[test]
    fn test_depth_attraction_pulls_toward_layer() {
        let tuning = PhysicsTuning::default();
        let mut o = orb(1, Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 1);
        o.pos.z = 7.0;
        let mut orbs = vec![o];
        apply_depth_attraction(&mut orbs, &tuning, 1.0 / 60.0);
        assert!(orbs[0].vel.z < 0.0);

        let mut resting = vec![orb(2, Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, 1)];
        apply_depth_attraction(&mut resting, &tuning, 1.0 / 60.0);
        assert_eq!(resting[0].vel.z, 0.0);
    }

    #[test]
    fn test_interactions_respect_toggles() {
        let (mut grid, vp) = setup();
        let tuning = PhysicsTuning::default();
        let mut rng = Pcg32::seed_from_u64(1);
        let make = || {
            vec![
                orb(1, Vec3::new(100.0, 100.0, 5.0), Vec3::new(50.0, 0.0, 0.0), 1),
                orb(2, Vec3::new(106.0, 100.0, 5.0), Vec3::new(-50.0, 0.0, 0.0), 1),
            ]
        };

        let mut orbs = make();
        let stats = apply_orb_interactions(&mut orbs, &mut grid, &vp, &tuning, false, false, 1.0 / 60.0, &mut rng);
        assert_eq!(stats, ResolutionStats::default());
        assert_eq!(orbs[0].vel.x, 50.0);

        let mut orbs = make();
        mark_all(&orbs, &mut grid, &vp);
        let stats = apply_orb_interactions(&mut orbs, &mut grid, &vp, &tuning, false, true, 1.0 / 60.0, &mut rng);
        assert_eq!(stats.bounces, 1);
        assert!(orbs[0].vel.x < 0.0 && orbs[1].vel.x > 0.0);
        // Restamped at the separated positions
        let (x, y, l) = orbs[1].cell(&vp);
        assert!(grid.get_cell(x, y, l).has(CellFlag::Filled));
        assert_eq!(grid.count_with(CellFlag::Filled), 2);
    }

    #[test]
    fn test_wall_pass_moves_and_restamps() {
        let (mut grid, vp) = setup();
        let mut orbs = vec![orb(1, Vec3::new(200.0, 200.0, 5.0), Vec3::new(60.0, 0.0, 0.0), 2)];
        mark_all(&orbs, &mut grid, &vp);
        let filled = grid.count_with(CellFlag::Filled);
        let (ox, oy, ol) = orbs[0].cell(&vp);

        let unstuck = resolve_wall_collisions(&mut orbs, &mut grid, &vp, 0.5);
        assert_eq!(unstuck, 0);
        assert!((orbs[0].pos.x - 230.0).abs() < 1e-4);
        let (x, y, l) = orbs[0].cell(&vp);
        assert!(grid.get_cell(x, y, l).has(CellFlag::Filled));
        // Nothing left behind at the old spot
        assert!(!grid.get_cell(ox - 1, oy, ol).has(CellFlag::Filled));
        assert_eq!(grid.count_with(CellFlag::Filled), filled);
    }

    #[test]
    fn test_wall_pass_unsticks_embedded_orb() {
        let (mut grid, vp) = setup();
        let border_px = -(vp.start_x as f32) * vp.cell_size_px + 1.0;
        let mut orbs = vec![orb(1, Vec3::new(border_px, 300.0, 5.0), Vec3::new(-30.0, 0.0, 0.0), 2)];
        mark_all(&orbs, &mut grid, &vp);

        assert_eq!(resolve_wall_collisions(&mut orbs, &mut grid, &vp, 1.0 / 60.0), 1);
        assert!(orbs[0].pos.x > border_px);
    }
}
