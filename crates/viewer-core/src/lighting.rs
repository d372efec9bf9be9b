//! Lighting and exposure presets.
//!
//! Presets are a fixed enumeration applied identically to every product,
//! both on first load and after a variant switch.

use serde::{Deserialize, Serialize};

/// Environment map used for image-based lighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Neutral,
    Studio,
    Warehouse,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Neutral => "neutral",
            Environment::Studio => "studio",
            Environment::Warehouse => "warehouse",
        }
    }
}

/// Named lighting profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LightingProfile {
    #[default]
    Neutral,
    Studio,
    Showroom,
}

impl LightingProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            LightingProfile::Neutral => "neutral",
            LightingProfile::Studio => "studio",
            LightingProfile::Showroom => "showroom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "neutral" => Some(LightingProfile::Neutral),
            "studio" => Some(LightingProfile::Studio),
            "showroom" => Some(LightingProfile::Showroom),
            _ => None,
        }
    }

    /// The concrete settings for this profile.
    pub fn preset(&self) -> LightingPreset {
        match self {
            LightingProfile::Neutral => LightingPreset {
                environment: Environment::Neutral,
                exposure: 1.0,
                shadow_intensity: 0.6,
            },
            LightingProfile::Studio => LightingPreset {
                environment: Environment::Studio,
                exposure: 1.4,
                shadow_intensity: 0.9,
            },
            LightingProfile::Showroom => LightingPreset {
                environment: Environment::Warehouse,
                exposure: 1.8,
                shadow_intensity: 1.2,
            },
        }
    }
}

/// Concrete lighting settings handed to the render backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightingPreset {
    pub environment: Environment,
    /// Tone-mapping exposure, within 1.0–1.8.
    pub exposure: f32,
    /// Contact shadow strength, within 0.6–1.2.
    pub shadow_intensity: f32,
}

impl LightingPreset {
    pub const EXPOSURE_RANGE: (f32, f32) = (1.0, 1.8);
    pub const SHADOW_RANGE: (f32, f32) = (0.6, 1.2);

    /// Check that exposure and shadow intensity are in range.
    pub fn is_valid(&self) -> bool {
        let (emin, emax) = Self::EXPOSURE_RANGE;
        let (smin, smax) = Self::SHADOW_RANGE;
        (emin..=emax).contains(&self.exposure) && (smin..=smax).contains(&self.shadow_intensity)
    }
}

impl Default for LightingPreset {
    fn default() -> Self {
        LightingProfile::default().preset()
    }
}
