//! Simulation configuration
//!
//! Everything the pipeline reads per frame lives in one explicit struct that
//! the host passes into `tick`. Debug toggles sit beside tuning values so a
//! debug panel can flip them without touching simulation state.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when loading or validating a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("{field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Orb density presets (orbs on a 4K display)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DensityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl DensityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            DensityPreset::Low => "Low",
            DensityPreset::Medium => "Medium",
            DensityPreset::High => "High",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(DensityPreset::Low),
            "medium" | "med" => Some(DensityPreset::Medium),
            "high" => Some(DensityPreset::High),
            _ => None,
        }
    }

    /// Continuous-spawn population on a 3840x2160 display
    pub fn reference_count_at_4k(&self) -> u32 {
        match self {
            DensityPreset::Low => 60,
            DensityPreset::Medium => 140,
            DensityPreset::High => 300,
        }
    }
}

/// Grid geometry inputs for the coordinate factory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Desktop cell edge in CSS pixels
    pub cell_size_px: f32,
    /// Depth layers on desktop
    pub layers: u32,
    /// Depth layers on mobile
    pub mobile_layers: u32,
    /// Extra cells on each side, as a fraction of the visible count (parallax)
    pub parallax_margin: f32,
    /// World units spanned by the viewport height
    pub world_height_units: f32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            cell_size_px: 8.0,
            layers: 20,
            mobile_layers: 12,
            parallax_margin: 0.1,
            world_height_units: 100.0,
        }
    }
}

/// Physics tuning values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    /// Speed cap for a size-1 orb (px/s); larger orbs get base / sqrt(size)
    pub base_max_speed: f32,
    /// Floor for the size-dependent speed cap (px/s)
    pub min_max_speed: f32,
    /// Fraction of the cap above which orbs are eased back down (1.0: only
    /// speeds over the cap)
    pub soft_limit_ratio: f32,
    /// Per-frame (at 60 FPS) share of excess speed removed
    pub deceleration_rate: f32,
    /// Heading jitter in radians per second
    pub wander_strength: f32,
    /// Pull toward the assigned depth layer (1/s²)
    pub depth_attraction: f32,
    /// Per-frame (at 60 FPS) damping of depth velocity
    pub depth_damping: f32,
    /// Acceleration between orbs inside each other's avoidance shell (px/s²)
    pub avoidance_strength: f32,
    /// Restitution for orb-orb impacts (0.5..=1.0 keeps pairs separating)
    pub elasticity: f32,
    /// Pointer influence radius (px)
    pub mouse_radius_px: f32,
    /// Pointer push at zero distance (px/s²)
    pub mouse_strength: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            base_max_speed: 120.0,
            min_max_speed: 30.0,
            soft_limit_ratio: 1.0,
            deceleration_rate: 0.05,
            wander_strength: 0.6,
            depth_attraction: 2.0,
            depth_damping: 0.08,
            avoidance_strength: 60.0,
            elasticity: 0.8,
            mouse_radius_px: 160.0,
            mouse_strength: 900.0,
        }
    }
}

/// Spawn and lifetime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnSettings {
    pub density: DensityPreset,
    /// Population floor regardless of screen area
    pub min_orb_count: u32,
    /// Continuous spawn rate (orbs per second)
    pub spawn_rate_per_sec: f32,
    /// Placement attempts per spawned orb
    pub spawn_attempts: u32,
    pub min_size: u32,
    pub max_size: u32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub lifetime_min_ms: f64,
    pub lifetime_max_ms: f64,
    pub spawn_anim_ms: f64,
    pub despawn_anim_ms: f64,
    /// Orbs in the one-time entry burst
    pub burst_count: u32,
    /// Burst launch speed (px/s)
    pub burst_speed: f32,
    /// Continuous spawning holds off this long after the burst
    pub burst_settle_ms: f64,
    /// Size of orbs spawned by clicking
    pub click_size: u32,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            density: DensityPreset::Medium,
            min_orb_count: 12,
            spawn_rate_per_sec: 4.0,
            spawn_attempts: 8,
            min_size: 1,
            max_size: 4,
            min_speed: 15.0,
            max_speed: 45.0,
            lifetime_min_ms: 20_000.0,
            lifetime_max_ms: 45_000.0,
            spawn_anim_ms: 600.0,
            despawn_anim_ms: 800.0,
            burst_count: 40,
            burst_speed: 90.0,
            burst_settle_ms: 2_500.0,
            click_size: 3,
        }
    }
}

/// Complete per-frame configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // === Debug toggles ===
    /// Freeze motion; occupancy is still stamped each frame
    pub pause_physics: bool,
    /// Skip hard orb-orb collision resolution
    pub disable_collisions: bool,
    /// Skip pointer repulsion and soft orb-orb avoidance
    pub disable_avoidance: bool,
    pub enable_orb_spawning: bool,
    pub enable_orb_despawning: bool,
    pub enable_spawn_on_click: bool,

    // === Tuning ===
    pub grid: GridSettings,
    pub physics: PhysicsTuning,
    pub spawn: SpawnSettings,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            pause_physics: false,
            disable_collisions: false,
            disable_avoidance: false,
            enable_orb_spawning: true,
            enable_orb_despawning: true,
            enable_spawn_on_click: true,
            grid: GridSettings::default(),
            physics: PhysicsTuning::default(),
            spawn: SpawnSettings::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a JSON config; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded simulation config from {}", path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });

        if !(self.grid.cell_size_px >= 1.0) {
            return invalid("grid.cell_size_px", "must be at least 1 pixel");
        }
        if self.grid.layers == 0 || self.grid.mobile_layers == 0 {
            return invalid("grid.layers", "must be positive");
        }
        if !(0.0..=1.0).contains(&self.grid.parallax_margin) {
            return invalid("grid.parallax_margin", "must be between 0 and 1");
        }
        if !(self.grid.world_height_units > 0.0) {
            return invalid("grid.world_height_units", "must be positive");
        }

        let p = &self.physics;
        if !(p.base_max_speed > 0.0) || !(p.min_max_speed > 0.0) {
            return invalid("physics.base_max_speed", "speed caps must be positive");
        }
        if !(p.soft_limit_ratio > 0.0 && p.soft_limit_ratio <= 1.0) {
            return invalid("physics.soft_limit_ratio", "must be in (0, 1]");
        }
        if !(0.0..=1.0).contains(&p.deceleration_rate) || !(0.0..=1.0).contains(&p.depth_damping) {
            return invalid("physics.deceleration_rate", "per-frame rates must be in [0, 1]");
        }
        if !(0.5..=1.0).contains(&p.elasticity) {
            return invalid("physics.elasticity", "must be between 0.5 and 1.0");
        }
        if !(p.mouse_radius_px > 0.0) {
            return invalid("physics.mouse_radius_px", "must be positive");
        }

        let s = &self.spawn;
        if s.min_size == 0 || s.min_size > s.max_size {
            return invalid("spawn.min_size", "must be at least 1 and not above max_size");
        }
        if s.click_size == 0 {
            return invalid("spawn.click_size", "must be at least 1");
        }
        if !(s.min_speed >= 0.0 && s.min_speed <= s.max_speed) {
            return invalid("spawn.min_speed", "must be non-negative and not above max_speed");
        }
        if !(s.lifetime_min_ms > 0.0 && s.lifetime_min_ms <= s.lifetime_max_ms) {
            return invalid("spawn.lifetime_min_ms", "must be positive and not above lifetime_max_ms");
        }
        if s.spawn_anim_ms < 0.0 || s.despawn_anim_ms < 0.0 {
            return invalid("spawn.spawn_anim_ms", "animation durations cannot be negative");
        }
        if s.spawn_rate_per_sec < 0.0 {
            return invalid("spawn.spawn_rate_per_sec", "cannot be negative");
        }

        Ok(())
    }
}
