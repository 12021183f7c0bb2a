//! Orb spawning, expiration and deletion
//!
//! Every function takes the grid and viewport explicitly so it can run at any
//! point of the frame; spawned orbs are stamped immediately and deleted orbs
//! are cleared before removal.

use std::f32::consts::TAU;

use glam::{Vec2, Vec3};
use rand::Rng;

use super::collision::can_spawn;
use super::coords::ViewportCells;
use super::grid::Grid;
use super::orb::{Orb, OrbId};
use super::state::OrbSet;
use crate::consts::REFERENCE_SCREEN_AREA;
use crate::random_unit_vector;
use crate::settings::SpawnSettings;

/// Where and how to place one orb
#[derive(Debug, Clone, Copy)]
pub struct SpawnRequest {
    pub pos: Vec3,
    pub size: u32,
    /// Fixed launch velocity; a random heading is drawn when absent
    pub velocity: Option<Vec3>,
}

impl SpawnRequest {
    pub fn at(pos: Vec3, size: u32) -> Self {
        Self {
            pos,
            size,
            velocity: None,
        }
    }
}

/// Population the continuous spawner aims for on a screen of `area_px`
pub fn continuous_spawn_target(area_px: f32, settings: &SpawnSettings) -> usize {
    let reference = settings.density.reference_count_at_4k() as f32;
    let scaled = (reference * area_px.max(0.0) / REFERENCE_SCREEN_AREA).round() as usize;
    scaled.max(settings.min_orb_count as usize)
}

/// Random size in `[min_size, max_size]`, skewed toward small orbs
pub fn random_size<R: Rng + ?Sized>(rng: &mut R, settings: &SpawnSettings) -> u32 {
    let span = settings.max_size.saturating_sub(settings.min_size) + 1;
    let u: f32 = rng.random();
    let pick = (u * u * span as f32).floor() as u32;
    (settings.min_size + pick).min(settings.max_size)
}

/// Random 3D launch velocity with speed in `[min_speed, max_speed]`
///
/// The heading is drawn in pixel space, so the depth component is converted
/// back to layers per second.
pub fn random_velocity<R: Rng + ?Sized>(
    rng: &mut R,
    settings: &SpawnSettings,
    depth_scale: f32,
) -> Vec3 {
    let speed = if settings.max_speed > settings.min_speed {
        rng.random_range(settings.min_speed..=settings.max_speed)
    } else {
        settings.min_speed
    };
    let v = random_unit_vector(rng) * speed;
    Vec3::new(v.x, v.y, v.z / depth_scale)
}

/// Random layer whose depth range fits a body of `size`
pub fn random_layer<R: Rng + ?Sized>(rng: &mut R, layers: u32, size: u32) -> f32 {
    let r = size.max(1) - 1;
    if layers > 2 * r {
        rng.random_range(r..layers - r) as f32
    } else {
        (layers / 2) as f32
    }
}

fn random_lifetime<R: Rng + ?Sized>(rng: &mut R, settings: &SpawnSettings) -> f64 {
    if settings.lifetime_max_ms > settings.lifetime_min_ms {
        rng.random_range(settings.lifetime_min_ms..=settings.lifetime_max_ms)
    } else {
        settings.lifetime_min_ms
    }
}

/// Spawn a single orb if its body fits at the requested position
pub fn spawn_orb<R: Rng + ?Sized>(
    set: &mut OrbSet,
    grid: &mut Grid,
    viewport: &ViewportCells,
    rng: &mut R,
    settings: &SpawnSettings,
    request: SpawnRequest,
    now_ms: f64,
) -> Option<OrbId> {
    let size = request.size.max(1);
    if !request.pos.is_finite() || !can_spawn(request.pos, size, grid, viewport) {
        return None;
    }

    let vel = request
        .velocity
        .unwrap_or_else(|| random_velocity(rng, settings, viewport.depth_scale()));
    let id = set.next_orb_id();
    let mut orb = Orb::new(id, request.pos, vel, size, now_ms);
    orb.lifetime_ms = random_lifetime(rng, settings);
    orb.spawn_anim_ms = settings.spawn_anim_ms;
    orb.despawn_anim_ms = settings.despawn_anim_ms;
    orb.mark_orb_circular(grid, viewport);
    set.push(orb);
    Some(id)
}

/// Spawn one orb at a random spot in the visible area, retrying on collision
pub fn spawn_random<R: Rng + ?Sized>(
    set: &mut OrbSet,
    grid: &mut Grid,
    viewport: &ViewportCells,
    rng: &mut R,
    settings: &SpawnSettings,
    now_ms: f64,
) -> Option<OrbId> {
    let (_, _, layers) = grid.dimensions();
    let width = viewport.visible_cells_x() as f32 * viewport.cell_size_px;
    let height = viewport.visible_cells_y() as f32 * viewport.cell_size_px;
    let size = random_size(rng, settings);

    for _ in 0..settings.spawn_attempts.max(1) {
        let pos = Vec3::new(
            rng.random_range(0.0..width),
            rng.random_range(0.0..height),
            random_layer(rng, layers, size),
        );
        let request = SpawnRequest::at(pos, size);
        if let Some(id) = spawn_orb(set, grid, viewport, rng, settings, request, now_ms) {
            return Some(id);
        }
    }
    None
}

/// Radiate `burst_count` orbs outward from `center`
///
/// Orbs start on a small disc around the center and fly away from it.
/// Placements that collide are retried a few times further out, then dropped.
pub fn spawn_burst<R: Rng + ?Sized>(
    set: &mut OrbSet,
    grid: &mut Grid,
    viewport: &ViewportCells,
    rng: &mut R,
    settings: &SpawnSettings,
    center: Vec2,
    now_ms: f64,
) -> Vec<OrbId> {
    let (_, _, layers) = grid.dimensions();
    let count = settings.burst_count;
    let cs = viewport.cell_size_px;
    let mut spawned = Vec::with_capacity(count as usize);

    for i in 0..count {
        let angle = (i as f32 + rng.random::<f32>()) / count as f32 * TAU;
        let dir = Vec2::from_angle(angle);
        let size = random_size(rng, settings);
        let layer = random_layer(rng, layers, size);
        let speed = settings.burst_speed * rng.random_range(0.6..=1.0);
        let vel = Vec3::new(dir.x * speed, dir.y * speed, 0.0);

        for attempt in 0..settings.spawn_attempts.max(1) {
            let offset = cs * (2.0 + attempt as f32 * size as f32 * 2.0);
            let start = center + dir * (offset + rng.random_range(0.0..cs));
            let request = SpawnRequest {
                pos: start.extend(layer),
                size,
                velocity: Some(vel),
            };
            if let Some(id) = spawn_orb(set, grid, viewport, rng, settings, request, now_ms) {
                spawned.push(id);
                break;
            }
        }
    }

    log::info!("Entry burst spawned {} of {} orbs", spawned.len(), count);
    spawned
}

/// Remove an orb immediately, clearing its footprint and any selection
pub fn delete_orb(set: &mut OrbSet, grid: &mut Grid, viewport: &ViewportCells, id: OrbId) -> bool {
    match set.remove(id) {
        Some(orb) => {
            orb.clear_orb_circular(grid, viewport);
            true
        }
        None => false,
    }
}

/// Shorten an orb's lifetime so it fades out over its despawn animation
pub fn retire_orb(set: &mut OrbSet, id: OrbId, now_ms: f64) -> bool {
    let Some(orb) = set.get_mut(id) else {
        return false;
    };
    let age = now_ms - orb.created_at_ms;
    orb.lifetime_ms = orb.lifetime_ms.min(age + orb.despawn_anim_ms);
    true
}

/// Delete every orb whose lifetime has elapsed; returns their ids
pub fn expire_orbs(
    set: &mut OrbSet,
    grid: &mut Grid,
    viewport: &ViewportCells,
    now_ms: f64,
) -> Vec<OrbId> {
    let expired: Vec<OrbId> = set
        .iter()
        .filter(|o| o.is_expired(now_ms))
        .map(|o| o.id)
        .collect();
    for &id in &expired {
        delete_orb(set, grid, viewport, id);
    }
    expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{DensityPreset, GridSettings};
    use crate::sim::coords::{DisplayMetrics, derive_geometry};
    use crate::sim::grid::CellFlag;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn setup() -> (OrbSet, Grid, ViewportCells, Pcg32) {
        let geo = derive_geometry(DisplayMetrics::new(800.0, 600.0), &GridSettings::default());
        (
            OrbSet::new(),
            Grid::new(geo.cells_x, geo.cells_y, geo.layers),
            geo.viewport,
            Pcg32::seed_from_u64(7),
        )
    }

    #[test]
    fn test_target_scales_with_area() {
        let settings = SpawnSettings::default();
        let full = continuous_spawn_target(3840.0 * 2160.0, &settings);
        let quarter = continuous_spawn_target(1920.0 * 1080.0, &settings);
        assert_eq!(full, 140);
        assert_eq!(quarter, 35);
    }

    #[test]
    fn test_target_has_floor() {
        let settings = SpawnSettings::default();
        assert_eq!(continuous_spawn_target(320.0 * 240.0, &settings), 12);
        assert_eq!(continuous_spawn_target(0.0, &settings), 12);
    }

    #[test]
    fn test_target_follows_density() {
        let mut settings = SpawnSettings::default();
        settings.density = DensityPreset::High;
        let high = continuous_spawn_target(3840.0 * 2160.0, &settings);
        settings.density = DensityPreset::Low;
        let low = continuous_spawn_target(3840.0 * 2160.0, &settings);
        assert!(high > low);
    }

    #[test]
    fn test_spawn_marks_grid_and_sets_lifetime() {
        let (mut set, mut grid, vp, mut rng) = setup();
        let settings = SpawnSettings::default();
        let id = spawn_orb(
            &mut set,
            &mut grid,
            &vp,
            &mut rng,
            &settings,
            SpawnRequest::at(Vec3::new(200.0, 200.0, 6.0), 2),
            0.0,
        )
        .unwrap();

        let orb = set.get(id).unwrap();
        let (x, y, l) = orb.cell(&vp);
        assert!(grid.get_cell(x, y, l).has(CellFlag::Filled));
        assert!(orb.lifetime_ms >= settings.lifetime_min_ms);
        assert!(orb.lifetime_ms <= settings.lifetime_max_ms);

        let ds = vp.depth_scale();
        let speed = orb.px_velocity(ds).length();
        assert!(speed >= settings.min_speed - 1e-3 && speed <= settings.max_speed + 1e-3);
    }

    #[test]
    fn test_spawn_rejected_on_occupied_body() {
        let (mut set, mut grid, vp, mut rng) = setup();
        let settings = SpawnSettings::default();
        let pos = Vec3::new(200.0, 200.0, 6.0);
        assert!(spawn_orb(&mut set, &mut grid, &vp, &mut rng, &settings, SpawnRequest::at(pos, 3), 0.0).is_some());
        assert!(spawn_orb(&mut set, &mut grid, &vp, &mut rng, &settings, SpawnRequest::at(pos, 1), 0.0).is_none());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_burst_radiates_from_center() {
        let (mut set, mut grid, vp, mut rng) = setup();
        let settings = SpawnSettings::default();
        let center = Vec2::new(400.0, 300.0);
        let ids = spawn_burst(&mut set, &mut grid, &vp, &mut rng, &settings, center, 0.0);

        assert!(!ids.is_empty());
        assert!(ids.len() <= settings.burst_count as usize);
        for orb in set.iter() {
            let outward = orb.pos.truncate() - center;
            assert!(outward.dot(orb.vel.truncate()) > 0.0);
        }
    }

    #[test]
    fn test_delete_and_expire_clear_grid() {
        let (mut set, mut grid, vp, mut rng) = setup();
        let settings = SpawnSettings::default();
        let a = spawn_orb(&mut set, &mut grid, &vp, &mut rng, &settings, SpawnRequest::at(Vec3::new(100.0, 100.0, 3.0), 2), 0.0).unwrap();
        let b = spawn_orb(&mut set, &mut grid, &vp, &mut rng, &settings, SpawnRequest::at(Vec3::new(400.0, 400.0, 3.0), 2), 0.0).unwrap();
        set.select(a);

        assert!(delete_orb(&mut set, &mut grid, &vp, a));
        assert_eq!(set.selected(), None);
        assert!(!delete_orb(&mut set, &mut grid, &vp, a));

        assert!(expire_orbs(&mut set, &mut grid, &vp, 1_000.0).is_empty());
        let expired = expire_orbs(&mut set, &mut grid, &vp, settings.lifetime_max_ms + 1.0);
        assert_eq!(expired, vec![b]);
        assert!(set.is_empty());
        assert!(grid.is_clean());
    }

    #[test]
    fn test_retire_shortens_lifetime() {
        let (mut set, mut grid, vp, mut rng) = setup();
        let settings = SpawnSettings::default();
        let id = spawn_orb(&mut set, &mut grid, &vp, &mut rng, &settings, SpawnRequest::at(Vec3::new(100.0, 100.0, 3.0), 1), 0.0).unwrap();

        assert!(retire_orb(&mut set, id, 2_000.0));
        let expiry = 2_000.0 + settings.despawn_anim_ms;
        assert!(!set.get(id).unwrap().is_expired(expiry - 1.0));
        assert_eq!(expire_orbs(&mut set, &mut grid, &vp, expiry + 1.0), vec![id]);
        assert!(!retire_orb(&mut set, id, 3_000.0));
    }

    proptest! {
        #[test]
        fn prop_target_monotonic_in_area(a in 0.0f32..2.0e7, b in 0.0f32..2.0e7) {
            let settings = SpawnSettings::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(continuous_spawn_target(lo, &settings) <= continuous_spawn_target(hi, &settings));
            prop_assert!(continuous_spawn_target(lo, &settings) >= settings.min_orb_count as usize);
        }

        #[test]
        fn prop_random_layer_fits_body(seed in any::<u64>(), layers in 1u32..24, size in 1u32..6) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let layer = random_layer(&mut rng, layers, size) as i32;
            let r = size as i32 - 1;
            prop_assert!(layer >= 0 && layer < layers as i32);
            if layers as i32 > 2 * r {
                prop_assert!(layer - r >= 0 && layer + r < layers as i32);
            }
        }

        #[test]
        fn prop_random_size_in_range(seed in any::<u64>()) {
            let settings = SpawnSettings::default();
            let mut rng = Pcg32::seed_from_u64(seed);
            let size = random_size(&mut rng, &settings);
            prop_assert!(size >= settings.min_size && size <= settings.max_size);
        }
    }
}
