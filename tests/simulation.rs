//! Public API exercised the way a host drives it

use glam::{Vec2, Vec3};
use orb_field::SimulationConfig;
use orb_field::sim::{CellFlag, DisplayMetrics, SimState, TickInput, continuous_spawn_target, tick};

const DT: f32 = 1.0 / 60.0;

#[test]
fn host_session_stays_consistent() {
    let config = SimulationConfig::default();
    let mut state = SimState::new(2024);
    state.request_burst();
    state.resize(DisplayMetrics::new(1440.0, 900.0), &config);

    let mut input = TickInput {
        pointer: Some(Vec2::new(720.0, 450.0)),
        ..Default::default()
    };
    for frame in 0..600 {
        input.click = (frame == 100).then_some(Vec2::new(200.0, 200.0));
        tick(&mut state, &input, &config, DT);

        let vp = *state.viewport().unwrap();
        for orb in state.orbs.iter() {
            assert!(orb.pos.is_finite() && orb.vel.is_finite());
            let (x, y, l) = orb.cell(&vp);
            assert!(state.cell(x, y, l).unwrap().has(CellFlag::Filled));
        }
    }

    // Burst may overshoot the continuous target; the spawner never adds past it
    let target = continuous_spawn_target(1440.0 * 900.0, &config.spawn);
    assert!(state.orbs.len() <= target.max(config.spawn.burst_count as usize + 1));
}

#[test]
fn snapshot_serializes_for_renderer() {
    let config = SimulationConfig::default();
    let mut state = SimState::new(1);
    state.resize(DisplayMetrics::new(800.0, 600.0), &config);
    let id = state.spawn_orb(Vec3::new(300.0, 300.0, 4.0), 2, &config).unwrap();
    state.select_orb(id);

    let json = serde_json::to_string(&state.snapshot()).unwrap();
    assert!(json.contains("\"selected\":true"));
    assert!(json.contains("\"size\":2"));
}

#[test]
fn config_round_trips_through_json() {
    let mut config = SimulationConfig::default();
    config.disable_collisions = true;
    config.physics.elasticity = 0.9;

    let json = config.to_json().unwrap();
    let loaded = SimulationConfig::from_json(&json).unwrap();
    assert!(loaded.disable_collisions);
    assert!((loaded.physics.elasticity - 0.9).abs() < 1e-6);

    assert!(SimulationConfig::from_json(r#"{"physics": {"elasticity": 0.1}}"#).is_err());
}

#[test]
fn resize_to_mobile_rebuilds_and_keeps_running() {
    let config = SimulationConfig::default();
    let mut state = SimState::new(9);
    state.resize(DisplayMetrics::new(1280.0, 800.0), &config);
    for _ in 0..120 {
        tick(&mut state, &TickInput::default(), &config, DT);
    }

    assert!(state.resize(DisplayMetrics::new(390.0, 844.0), &config));
    for _ in 0..120 {
        tick(&mut state, &TickInput::default(), &config, DT);
    }
    let vp = *state.viewport().unwrap();
    let (_, _, layers) = state.world.as_ref().unwrap().grid.dimensions();
    assert_eq!(layers, 12);
    for orb in state.orbs.iter() {
        let (x, y, l) = orb.cell(&vp);
        assert!(state.cell(x, y, l).unwrap().has(CellFlag::Filled));
    }
}
