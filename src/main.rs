//! Orb Field headless runner
//!
//! Drives the simulation without a renderer and logs occupancy statistics.
//! Usage: `orb-field [config.json]`

#[cfg(not(target_arch = "wasm32"))]
fn main() -> Result<(), orb_field::ConfigError> {
    use std::path::Path;

    use orb_field::SimulationConfig;
    use orb_field::sim::{CellFlag, DisplayMetrics, SimState, TickInput, continuous_spawn_target, tick};

    const FRAMES: u32 = 600;
    const FRAME_DT: f32 = 1.0 / 60.0;

    env_logger::init();
    log::info!("Orb Field (native) starting...");

    let config = match std::env::args().nth(1) {
        Some(path) => SimulationConfig::load(Path::new(&path))?,
        None => SimulationConfig::default(),
    };

    let display = DisplayMetrics::new(1920.0, 1080.0);
    let mut state = SimState::new(0x5eed);
    state.resize(display, &config);
    state.request_burst();
    log::info!(
        "Target population {} ({} density)",
        continuous_spawn_target(display.area(), &config.spawn),
        config.spawn.density.as_str()
    );

    let input = TickInput::default();
    let (mut spawned, mut expired, mut bounces) = (0, 0, 0);
    for frame in 1..=FRAMES {
        let effects = tick(&mut state, &input, &config, FRAME_DT);
        spawned += effects.spawned.len();
        expired += effects.expired.len();
        bounces += effects.bounces;

        if frame % 60 == 0 {
            if let Some(world) = &state.world {
                log::info!(
                    "t={:.1}s orbs={} filled={} proximity={} bounces={}",
                    state.clock_ms / 1000.0,
                    state.orbs.len(),
                    world.grid.count_with(CellFlag::Filled),
                    world.grid.count_with(CellFlag::Proximity),
                    bounces
                );
            }
        }
    }

    log::info!(
        "Finished {} frames: {} spawned, {} expired, {} live",
        FRAMES,
        spawned,
        expired,
        state.orbs.len()
    );
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is platform::web::start, this is just to satisfy the compiler
}
