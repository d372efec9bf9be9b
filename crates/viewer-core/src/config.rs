//! Viewer configuration.
//!
//! Timeout budgets and intersection thresholds are tunables, not invariants;
//! every field has a default so an empty file is a valid config.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::{CameraFraming, CameraState};
use crate::lighting::{LightingPreset, LightingProfile};

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Complete viewer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub viewport: ViewportConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub assets: AssetPathConfig,

    #[serde(default)]
    pub lighting: LightingConfig,

    #[serde(default)]
    pub camera: CameraConfig,
}

impl ViewerConfig {
    /// Load config from a file; `.json` is parsed as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let config = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            Self::from_toml_str(&content)?
        };
        Ok(config)
    }

    /// Parse TOML config text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeouts.initial_load_ms == 0 {
            return Err(invalid("timeouts.initial_load_ms", "must be positive"));
        }
        if self.timeouts.variant_switch_ms == 0 {
            return Err(invalid("timeouts.variant_switch_ms", "must be positive"));
        }
        if !(self.viewport.threshold > 0.0 && self.viewport.threshold <= 1.0) {
            return Err(invalid(
                "viewport.threshold",
                format!("{} is outside (0, 1]", self.viewport.threshold),
            ));
        }
        if self.viewport.root_margin_px < 0.0 {
            return Err(invalid("viewport.root_margin_px", "must not be negative"));
        }
        let cam = &self.camera;
        if cam.min_orbit_radius <= 0.0 || cam.min_orbit_radius > cam.max_orbit_radius {
            return Err(invalid(
                "camera",
                format!(
                    "orbit radius bounds {}..{} are not ordered",
                    cam.min_orbit_radius, cam.max_orbit_radius
                ),
            ));
        }
        if self.assets.model_extension.is_empty() || self.assets.poster_extension.is_empty() {
            return Err(invalid("assets", "extensions must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Load budgets for viewer attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Budget for the first load after intersection.
    #[serde(default = "default_initial_load_ms")]
    pub initial_load_ms: u64,
    /// Budget for a variant switch; shorter because the user is engaged.
    #[serde(default = "default_variant_switch_ms")]
    pub variant_switch_ms: u64,
}

fn default_initial_load_ms() -> u64 {
    8_000
}

fn default_variant_switch_ms() -> u64 {
    5_000
}

impl TimeoutConfig {
    pub fn initial_load(&self) -> Duration {
        Duration::from_millis(self.initial_load_ms)
    }

    pub fn variant_switch(&self) -> Duration {
        Duration::from_millis(self.variant_switch_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            initial_load_ms: default_initial_load_ms(),
            variant_switch_ms: default_variant_switch_ms(),
        }
    }
}

/// Intersection observation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportConfig {
    /// Prefetch margin around the viewport, in CSS pixels.
    #[serde(default = "default_root_margin_px")]
    pub root_margin_px: f64,
    /// Minimum visible fraction that counts as entering.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_root_margin_px() -> f64 {
    200.0
}

fn default_threshold() -> f64 {
    0.1
}

impl ViewportConfig {
    /// Margin formatted for the browser observer (`"200px"`).
    pub fn root_margin(&self) -> String {
        format!("{}px", self.root_margin_px)
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            root_margin_px: default_root_margin_px(),
            threshold: default_threshold(),
        }
    }
}

/// Resource cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a failed load is served from cache before a new attempt.
    #[serde(default = "default_failure_cooldown_ms")]
    pub failure_cooldown_ms: u64,
}

fn default_failure_cooldown_ms() -> u64 {
    10_000
}

impl CacheConfig {
    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_millis(self.failure_cooldown_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            failure_cooldown_ms: default_failure_cooldown_ms(),
        }
    }
}

/// Asset path template settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPathConfig {
    /// Prefix prepended to every path (e.g. a CDN origin).
    #[serde(default)]
    pub base_path: String,
    #[serde(default = "default_model_extension")]
    pub model_extension: String,
    #[serde(default = "default_poster_extension")]
    pub poster_extension: String,
    /// Model served for unknown products.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    /// Poster and error image served for unknown products.
    #[serde(default = "default_fallback_poster")]
    pub fallback_poster: String,
}

fn default_model_extension() -> String {
    "glb".to_string()
}

fn default_poster_extension() -> String {
    "webp".to_string()
}

fn default_fallback_model() -> String {
    "/models/fallback.glb".to_string()
}

fn default_fallback_poster() -> String {
    "/images/fallback-poster.webp".to_string()
}

impl Default for AssetPathConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            model_extension: default_model_extension(),
            poster_extension: default_poster_extension(),
            fallback_model: default_fallback_model(),
            fallback_poster: default_fallback_poster(),
        }
    }
}

/// Lighting preset selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightingConfig {
    #[serde(default)]
    pub preset: LightingProfile,
}

impl LightingConfig {
    pub fn preset(&self) -> LightingPreset {
        self.preset.preset()
    }
}

/// Camera framing bounds, with the initial orbit in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_min_radius")]
    pub min_orbit_radius: f64,
    #[serde(default = "default_max_radius")]
    pub max_orbit_radius: f64,
    #[serde(default)]
    pub initial_orbit: InitialOrbit,
}

fn default_min_radius() -> f64 {
    0.5
}

fn default_max_radius() -> f64 {
    10.0
}

impl CameraConfig {
    pub fn framing(&self) -> CameraFraming {
        let o = &self.initial_orbit;
        CameraFraming {
            min_orbit_radius: self.min_orbit_radius,
            max_orbit_radius: self.max_orbit_radius,
            initial_orbit: CameraState::from_degrees(o.theta_deg, o.phi_deg, o.radius)
                .with_target(o.target[0], o.target[1], o.target[2]),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            min_orbit_radius: default_min_radius(),
            max_orbit_radius: default_max_radius(),
            initial_orbit: InitialOrbit::default(),
        }
    }
}

/// Initial camera orbit in human units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialOrbit {
    pub theta_deg: f64,
    pub phi_deg: f64,
    pub radius: f64,
    #[serde(default)]
    pub target: [f64; 3],
}

impl Default for InitialOrbit {
    fn default() -> Self {
        Self {
            theta_deg: 30.0,
            phi_deg: 75.0,
            radius: 2.5,
            target: [0.0, 0.0, 0.0],
        }
    }
}
