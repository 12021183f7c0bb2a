//! Per-frame simulation tick
//!
//! Runs the physics passes in a fixed order once per host frame. The host
//! supplies the elapsed time; it is clamped so a long stall cannot tunnel
//! orbs through walls.

use glam::Vec2;

use super::coords::DisplayMetrics;
use super::lifecycle::{self, SpawnRequest, continuous_spawn_target};
use super::orb::OrbId;
use super::phases;
use super::state::{BurstState, SimState};
use crate::consts::MAX_FRAME_DT;
use crate::settings::SimulationConfig;

/// Host input sampled once per frame
#[derive(Debug, Clone)]
pub struct TickInput {
    /// Pointer position in screen pixels
    pub pointer: Option<Vec2>,
    /// Click/tap position in screen pixels
    pub click: Option<Vec2>,
    /// Scroll/parallax offset subtracted from screen positions
    pub scroll_offset: Vec2,
    /// Continuous spawning only runs while the page is visible
    pub page_visible: bool,
}

impl Default for TickInput {
    fn default() -> Self {
        Self {
            pointer: None,
            click: None,
            scroll_offset: Vec2::ZERO,
            page_visible: true,
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Default)]
pub struct FrameEffects {
    /// False when paused or before the first resize
    pub simulated: bool,
    pub burst_fired: bool,
    pub spawned: Vec<OrbId>,
    pub expired: Vec<OrbId>,
    pub bounces: usize,
    pub unstuck: usize,
}

#[inline]
fn screen_to_sim(screen: Vec2, input: &TickInput) -> Vec2 {
    screen - input.scroll_offset
}

#[inline]
fn screen_center(display: &DisplayMetrics) -> Vec2 {
    Vec2::new(display.width_px, display.height_px) * 0.5
}

/// Advance the simulation by one host frame
pub fn tick(
    state: &mut SimState,
    input: &TickInput,
    config: &SimulationConfig,
    dt: f32,
) -> FrameEffects {
    let mut effects = FrameEffects::default();
    let dt = if dt.is_finite() {
        dt.clamp(0.0, MAX_FRAME_DT)
    } else {
        0.0
    };

    state.frame += 1;
    if !config.pause_physics {
        state.clock_ms += f64::from(dt) * 1000.0;
    }
    let now = state.clock_ms;

    let SimState {
        orbs,
        world,
        rng,
        burst,
        spawn_budget,
        ..
    } = state;
    let Some(world) = world.as_mut() else {
        return effects;
    };
    let viewport = world.geometry.viewport;
    let display = world.display;
    let grid = &mut world.grid;

    if config.pause_physics {
        phases::mark_all(orbs.as_slice(), grid, &viewport);
        return effects;
    }
    effects.simulated = true;

    // Entry burst, deferred until a grid exists
    if *burst == BurstState::Pending {
        let center = screen_to_sim(screen_center(&display), input);
        let ids = lifecycle::spawn_burst(orbs, grid, &viewport, rng, &config.spawn, center, now);
        *burst = BurstState::Fired { at_ms: now };
        effects.burst_fired = true;
        effects.spawned.extend(ids);
    }

    // Click spawn
    if let Some(click) = input.click {
        if config.enable_spawn_on_click {
            let (_, _, layers) = grid.dimensions();
            let layer = lifecycle::random_layer(rng, layers, config.spawn.click_size);
            let pos = screen_to_sim(click, input).extend(layer);
            let request = SpawnRequest::at(pos, config.spawn.click_size);
            match lifecycle::spawn_orb(orbs, grid, &viewport, rng, &config.spawn, request, now) {
                Some(id) => effects.spawned.push(id),
                None => log::debug!("Click spawn at {:?} blocked", pos),
            }
        }
    }

    // 1. Mark initial
    phases::mark_all(orbs.as_slice(), grid, &viewport);

    // 2. Pointer repulsion
    if !config.disable_avoidance {
        if let Some(pointer) = input.pointer {
            let pointer = screen_to_sim(pointer, input);
            phases::apply_pointer_repulsion(orbs.as_mut_slice(), pointer, &config.physics, dt);
        }
    }

    // 3. Speed limit
    phases::apply_speed_limits(orbs.as_mut_slice(), &viewport, &config.physics, dt);

    // 4. Wander
    phases::apply_wander(orbs.as_mut_slice(), config.physics.wander_strength, dt, rng);

    // 5. Depth attraction
    phases::apply_depth_attraction(orbs.as_mut_slice(), &config.physics, dt);

    // 6. Orb-orb interaction
    let stats = phases::apply_orb_interactions(
        orbs.as_mut_slice(),
        grid,
        &viewport,
        &config.physics,
        !config.disable_avoidance,
        !config.disable_collisions,
        dt,
        rng,
    );
    effects.bounces = stats.bounces;

    // 7. Wall collision
    effects.unstuck = phases::resolve_wall_collisions(orbs.as_mut_slice(), grid, &viewport, dt);

    // 8. Mark final
    phases::mark_all(orbs.as_slice(), grid, &viewport);

    // 9. Expiration
    if config.enable_orb_despawning {
        effects.expired = lifecycle::expire_orbs(orbs, grid, &viewport, now);
    }

    // 10. Continuous spawn
    let settling = burst.is_settling(now, config.spawn.burst_settle_ms);
    if config.enable_orb_spawning && input.page_visible && !settling {
        let target = continuous_spawn_target(display.area(), &config.spawn);
        if orbs.len() < target {
            *spawn_budget += config.spawn.spawn_rate_per_sec * dt;
            while *spawn_budget >= 1.0 && orbs.len() < target {
                *spawn_budget -= 1.0;
                if let Some(id) =
                    lifecycle::spawn_random(orbs, grid, &viewport, rng, &config.spawn, now)
                {
                    effects.spawned.push(id);
                }
            }
        } else {
            *spawn_budget = 0.0;
        }
    }

    effects
}
