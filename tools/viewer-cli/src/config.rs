//! CLI configuration discovery.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use viewer_core::ViewerConfig;

/// File names searched for, in order, in each directory.
pub const CONFIG_NAMES: [&str; 3] = ["viewer.toml", ".viewer.toml", "viewer.json"];

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<ViewerConfig> {
    let config = ViewerConfig::load(path)
        .with_context(|| format!("Failed to load config file: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(config)
}

/// Find the nearest config file from `start` upward.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        for name in &CONFIG_NAMES {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Generate a default viewer.toml config file.
pub fn generate_default_config() -> String {
    r#"# 3D product viewer configuration

[timeouts]
initial_load_ms = 8000
variant_switch_ms = 5000

[viewport]
# Start loading this many pixels before the container scrolls into view.
root_margin_px = 200.0
threshold = 0.1

[cache]
failure_cooldown_ms = 10000

[assets]
base_path = ""
model_extension = "glb"
poster_extension = "webp"
fallback_model = "/models/fallback.glb"
fallback_poster = "/images/fallback-poster.webp"

[lighting]
# neutral, studio or showroom
preset = "neutral"

[camera]
min_orbit_radius = 0.5
max_orbit_radius = 10.0
initial_orbit = { theta_deg = 30.0, phi_deg = 75.0, radius = 2.5, target = [0.0, 0.0, 0.0] }
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_defaults() {
        let parsed = ViewerConfig::from_toml_str(&generate_default_config()).unwrap();
        assert_eq!(parsed, ViewerConfig::default());
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_find_config_walks_upward() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join(".viewer.toml"), "").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, root.join(".viewer.toml"));
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.toml");
        std::fs::write(&path, "[viewport]\nthreshold = 1.5\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("viewport.threshold"));
    }
}
