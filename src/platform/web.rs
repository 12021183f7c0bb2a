//! Browser bindings
//!
//! `OrbField` wraps the simulation state for JavaScript. The page forwards
//! resize, pointer, click, scroll and visibility events, calls `tick` from
//! requestAnimationFrame and draws from `snapshot_json`.

use glam::Vec2;
use wasm_bindgen::prelude::*;

use crate::settings::SimulationConfig;
use crate::sim::{CellFlag, DisplayMetrics, OrbId, SimState, TickInput, tick};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    // Already initialized when several fields share a page
    let _ = console_log::init_with_level(log::Level::Info);
    log::info!("Orb field module loaded");
}

/// Simulation instance driven by the page
#[wasm_bindgen]
pub struct OrbField {
    state: SimState,
    config: SimulationConfig,
    input: TickInput,
}

#[wasm_bindgen]
impl OrbField {
    /// Create a field; seeds from the clock when no seed is given
    #[wasm_bindgen(constructor)]
    pub fn new(seed: Option<f64>) -> OrbField {
        let seed = seed.unwrap_or_else(js_sys::Date::now) as u64;
        log::info!("Orb field created with seed: {}", seed);
        OrbField {
            state: SimState::new(seed),
            config: SimulationConfig::default(),
            input: TickInput::default(),
        }
    }

    /// Report the display size in CSS pixels; returns whether the grid was rebuilt
    pub fn resize(&mut self, width: f32, height: f32) -> bool {
        self.state.resize(DisplayMetrics::new(width, height), &self.config)
    }

    pub fn set_pointer(&mut self, x: f32, y: f32) {
        self.input.pointer = Some(Vec2::new(x, y));
    }

    pub fn clear_pointer(&mut self) {
        self.input.pointer = None;
    }

    /// Queue a click spawn for the next tick
    pub fn click(&mut self, x: f32, y: f32) {
        self.input.click = Some(Vec2::new(x, y));
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.input.page_visible = visible;
    }

    pub fn set_scroll_offset(&mut self, x: f32, y: f32) {
        self.input.scroll_offset = Vec2::new(x, y);
    }

    /// Request the one-time entry burst
    pub fn start_burst(&mut self) {
        self.state.request_burst();
    }

    /// Advance one frame; returns the live orb count
    pub fn tick(&mut self, dt_ms: f32) -> usize {
        let effects = tick(&mut self.state, &self.input, &self.config, dt_ms / 1000.0);
        self.input.click = None;
        if !effects.expired.is_empty() {
            log::debug!("{} orbs expired", effects.expired.len());
        }
        self.state.orbs.len()
    }

    pub fn orb_count(&self) -> usize {
        self.state.orbs.len()
    }

    /// Orbs as a JSON array for the renderer
    pub fn snapshot_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state.snapshot()).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Debug overlay query: whether a cell carries the named flag
    pub fn cell_has(&self, x: i32, y: i32, layer: i32, flag: &str) -> bool {
        match (CellFlag::from_name(flag), self.state.cell(x, y, layer)) {
            (Some(flag), Some(cell)) => cell.has(flag),
            _ => false,
        }
    }

    /// Replace the configuration; invalid JSON or values are rejected
    pub fn set_config_json(&mut self, json: &str) -> Result<(), JsValue> {
        let config =
            SimulationConfig::from_json(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.config = config;
        // Grid settings may have changed
        if let Some(display) = self.state.world.as_ref().map(|w| w.display) {
            self.state.resize(display, &self.config);
        }
        log::info!("Simulation config updated");
        Ok(())
    }

    pub fn config_json(&self) -> Result<String, JsValue> {
        self.config
            .to_json()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn delete_orb(&mut self, id: f64, animate: bool) -> bool {
        self.state.delete_orb(OrbId(id as u64), animate)
    }

    pub fn select_orb(&mut self, id: f64) -> bool {
        self.state.select_orb(OrbId(id as u64))
    }

    /// Id of the orb under a screen point, if any
    pub fn orb_at(&self, x: f32, y: f32, radius_px: f32) -> Option<f64> {
        let point = Vec2::new(x, y) - self.input.scroll_offset;
        self.state.orb_at(point, radius_px).map(|id| id.0 as f64)
    }
}
